//! The run composer: a draft-building state machine for an unscheduled
//! test run, plus pre-submission validation and cost estimation.
mod draft;
mod failure;
mod roles;
mod submit;
mod sweep;

pub use draft::{FieldValue, FloatInput, NUMERIC_FIELDS, RunDraft};
pub use failure::{FailureTarget, apply_failure};
pub use roles::{
    AgentChoice, add_role, apply_role_composition, apply_role_config, assign_agent, delete_role,
};
pub use submit::{
    EstimateSummary, estimate, estimated_charge_usd, price_per_hour, validate, validate_and_submit,
};
pub use sweep::{SweepMode, select_sweep_parameter};
