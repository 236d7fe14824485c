//! Wire-facing data model shared by the store, the live channel, and the
//! run composer.
mod reference;
mod run;
mod sweep;

pub use reference::{
    Architecture, ArchitectureRole, Commit, CommitAuthor, ControllerConfig, FieldType,
    InitialState, LaunchTemplate, RunFieldSpec, User,
};
pub use run::{
    ExecutedCommand, Percentile, RoleFailure, RunPatch, RunRole, RunStatus, TestResult, TestRun,
    is_unset, zero_time,
};
pub use sweep::Sweep;
