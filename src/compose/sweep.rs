use crate::error::{AppError, AppResult, ComposeError};

use super::draft::{FloatInput, RunDraft};

/// Exactly one sweep strategy is active at a time. Switching modes
/// leaves the other modes' sub-parameters in place (inert until that
/// mode is reselected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepMode {
    #[default]
    None,
    Parameter,
    Time,
    Peak,
    Roles,
}

impl SweepMode {
    /// The wire tag: the empty string means "no sweep".
    #[must_use]
    pub const fn as_tag(self) -> &'static str {
        match self {
            SweepMode::None => "",
            SweepMode::Parameter => "parameter",
            SweepMode::Time => "time",
            SweepMode::Peak => "peak",
            SweepMode::Roles => "roles",
        }
    }

    /// Unrecognized tags fall back to no sweep rather than failing: the
    /// draft must stay editable even if the controller grows new modes.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "parameter" => SweepMode::Parameter,
            "time" => SweepMode::Time,
            "peak" => SweepMode::Peak,
            "roles" => SweepMode::Roles,
            _ => SweepMode::None,
        }
    }
}

/// Selects the swept parameter and seeds the range to a no-op sweep:
/// start and stop at the parameter's current value, increment zero.
/// Further range edits are explicit.
///
/// # Errors
///
/// Returns a validation fault when the field is unknown or has no
/// numeric value; the draft is left unchanged.
pub fn select_sweep_parameter(draft: &mut RunDraft, field: &str) -> AppResult<()> {
    let value = draft.numeric_value(field).ok_or_else(|| {
        AppError::compose(ComposeError::UnknownField {
            field: field.to_owned(),
        })
    })?;
    draft.sweep_parameter_param = field.to_owned();
    draft.sweep_parameter_start = FloatInput::from_value(value);
    draft.sweep_parameter_stop = FloatInput::from_value(value);
    draft.sweep_parameter_increment = FloatInput::from_value(0.0);
    Ok(())
}
