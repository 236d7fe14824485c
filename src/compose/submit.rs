use crate::api::{ControllerApi, Estimate};
use crate::error::{ApiError, AppError, AppResult, ComposeError};

use super::draft::RunDraft;

/// Per-hour price table for the instance types the launch templates
/// offer. Unknown types price at zero; this feeds an operator
/// confirmation dialog, not billing.
#[must_use]
pub fn price_per_hour(instance_type: &str) -> f64 {
    match instance_type {
        "c5n.large" => 0.12,
        "c5n.2xlarge" => 0.45,
        "c5n.9xlarge" => 1.96,
        "c5n.metal" => 3.9,
        _ => 0.0,
    }
}

#[must_use]
pub fn estimated_charge_usd(estimate: &Estimate) -> f64 {
    estimate
        .instance_hours
        .iter()
        .map(|(instance_type, hours)| hours * price_per_hour(instance_type))
        .sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateSummary {
    pub estimate: Estimate,
    pub charge_usd: f64,
}

/// Posts the coerced draft for an instance-hour projection and derives
/// the dollar figure locally.
///
/// # Errors
///
/// Returns a validation fault when a float field does not parse, or the
/// api error when the round-trip fails. The draft is untouched either
/// way.
pub async fn estimate<TApi>(api: &TApi, draft: &RunDraft) -> AppResult<EstimateSummary>
where
    TApi: ControllerApi + Sync,
{
    let payload = draft.to_run()?;
    let estimate = api.estimate_run(&payload).await?;
    let charge_usd = estimated_charge_usd(&estimate);
    Ok(EstimateSummary {
        estimate,
        charge_usd,
    })
}

/// Local preconditions checked before any submission traffic: a commit
/// must be selected and at least one role present.
///
/// # Errors
///
/// Returns the violated precondition as a validation fault.
pub fn validate(draft: &RunDraft) -> AppResult<()> {
    if draft.commit_hash.is_empty() {
        return Err(AppError::compose(ComposeError::MissingCommit));
    }
    if draft.roles.is_empty() {
        return Err(AppError::compose(ComposeError::NoRoles));
    }
    Ok(())
}

/// Validates and submits the draft. On any failure the draft is left
/// intact so the operator can fix and retry.
///
/// # Errors
///
/// Returns a validation fault (no network call made), the api error for
/// transport problems, or [`ApiError::NotOk`] when the controller
/// declines the schedule request.
pub async fn validate_and_submit<TApi>(api: &TApi, draft: &RunDraft) -> AppResult<()>
where
    TApi: ControllerApi + Sync,
{
    validate(draft)?;
    let payload = draft.to_run()?;
    let response = api.schedule_run(&payload).await?;
    if !response.ok {
        return Err(AppError::api(ApiError::NotOk {
            path: "testruns/schedule".to_owned(),
        }));
    }
    Ok(())
}
