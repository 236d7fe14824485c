use thiserror::Error;

/// Validation faults raised by the run composer. Every variant maps to a
/// user-facing message; none of them mutates the draft.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("You have to select a commit before scheduling a test.")]
    MissingCommit,
    #[error("You need to add at least one role to the system.")]
    NoRoles,
    #[error("Choose a role first.")]
    MissingRole,
    #[error("Count is invalid: {value}")]
    InvalidRoleCount { value: String },
    #[error("Fail after is invalid: {value}")]
    InvalidFailureDelay { value: String },
    #[error("Select what to fail.")]
    MissingFailureTarget,
    #[error("Value for {field} is not a number: {value}")]
    InvalidFloatField { field: &'static str, value: String },
    #[error("Unknown parameter field: {field}")]
    UnknownField { field: String },
    #[error("Unknown architecture: {id}")]
    UnknownArchitecture { id: String },
    #[error("Invalid agent choice: {value}")]
    InvalidAgentChoice { value: String },
    #[error("No role instance {role} {index} in the draft.")]
    RoleInstanceNotFound { role: String, index: usize },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
