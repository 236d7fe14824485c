//! Configuration loading and resolution for the console binary.
mod apply;
mod loader;
pub mod types;

pub use apply::{Settings, resolve_settings};
pub use loader::load_config;

#[cfg(test)]
mod tests;
