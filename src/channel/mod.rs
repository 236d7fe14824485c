//! Live event channel to the controller: one-time token acquisition,
//! the websocket connection itself, and automatic reconnection.
mod backoff;
mod live;
mod protocol;
mod session;

pub use backoff::{BackoffPolicy, FixedDelay, RECONNECT_DELAY};
pub use live::{ChannelEvent, ConnectionPhase, run_channel};
pub use protocol::{
    ClientCommand, ConfigPayload, CountPayload, MaintenancePayload, RedownloadPayload,
    RunCommandPayload, RunCreatedPayload, RunLogPayload, RunResultPayload, RunRolesPayload,
    RunStatusPayload, RunTrimPayload, ServerEvent, SystemStatePayload,
};
pub use session::SessionManager;

#[cfg(test)]
mod tests;
