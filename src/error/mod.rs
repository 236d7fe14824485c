mod api;
mod app;
mod channel;
mod compose;
mod config;

#[cfg(test)]
mod test_support;

pub use api::ApiError;
pub use app::{AppError, AppResult};
pub use channel::ChannelError;
pub use compose::ComposeError;
pub use config::ConfigError;
