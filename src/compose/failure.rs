use crate::error::{AppError, AppResult, ComposeError};
use crate::model::{RoleFailure, RunRole};

/// What a failure injection applies to: a single role instance, every
/// instance of one role tag within a region, or everything in a region.
/// Region matching uses the region inferred from each assignment's
/// launch template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureTarget {
    Instance { role: String, index: usize },
    RoleInRegion { role: String, region: String },
    Region { region: String },
}

impl FailureTarget {
    /// Parses the selector strings the failure picker produces:
    /// `role:<tag>|<index>`, `regionrole:<region>|<tag>`, or
    /// `region:<region>`.
    ///
    /// # Errors
    ///
    /// Returns a validation fault for an empty or malformed selector.
    pub fn parse(value: &str) -> AppResult<Self> {
        if value.is_empty() {
            return Err(AppError::compose(ComposeError::MissingFailureTarget));
        }
        if let Some(rest) = value.strip_prefix("role:")
            && let Some((role, raw_index)) = rest.split_once('|')
            && let Ok(index) = raw_index.parse::<usize>()
        {
            return Ok(FailureTarget::Instance {
                role: role.to_owned(),
                index,
            });
        }
        if let Some(rest) = value.strip_prefix("regionrole:")
            && let Some((region, role)) = rest.split_once('|')
        {
            return Ok(FailureTarget::RoleInRegion {
                role: role.to_owned(),
                region: region.to_owned(),
            });
        }
        if let Some(region) = value.strip_prefix("region:") {
            return Ok(FailureTarget::Region {
                region: region.to_owned(),
            });
        }
        Err(AppError::compose(ComposeError::MissingFailureTarget))
    }

    fn matches(&self, assignment: &RunRole) -> bool {
        match self {
            FailureTarget::Instance { role, index } => {
                assignment.role == *role && assignment.index == *index
            }
            FailureTarget::RoleInRegion { role, region } => {
                assignment.role == *role && assignment.region.as_deref() == Some(region.as_str())
            }
            FailureTarget::Region { region } => {
                assignment.region.as_deref() == Some(region.as_str())
            }
        }
    }
}

/// Applies (or with `delay == None` clears) a failure spec on every
/// assignment the target matches. The delay is validated before any
/// assignment is touched, so an invalid delay changes nothing.
///
/// # Errors
///
/// Returns a validation fault when the delay does not parse as an
/// integer number of seconds.
pub fn apply_failure(
    list: &mut [RunRole],
    target: &FailureTarget,
    delay: Option<&str>,
) -> AppResult<()> {
    let failure = match delay {
        None => None,
        Some(text) => {
            let after_seconds = text.trim().parse::<i64>().map_err(|err| {
                tracing::debug!("Bad failure delay {:?}: {}", text, err);
                AppError::compose(ComposeError::InvalidFailureDelay {
                    value: text.to_owned(),
                })
            })?;
            Some(RoleFailure { after_seconds })
        }
    };
    for assignment in list.iter_mut().filter(|a| target.matches(a)) {
        assignment.failure = failure;
    }
    Ok(())
}
