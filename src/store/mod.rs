//! The normalized local model of everything the controller has told us,
//! plus the router that turns live-channel events into store updates.
mod router;
mod state;
mod views;

pub use router::{Effect, route};
pub use state::{ConnectionState, Store};
