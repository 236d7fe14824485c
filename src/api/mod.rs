//! One-shot request layer: every non-streaming interaction with the
//! controller goes through the [`ControllerApi`] port.
mod client;
mod port;

pub use client::HttpControllerApi;
pub use port::{ControllerApi, Estimate, OkResponse, TrimParameters, WsToken};

#[cfg(test)]
mod tests;
