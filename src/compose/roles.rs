use std::collections::HashMap;

use crate::error::{AppError, AppResult, ComposeError};
use crate::model::{LaunchTemplate, RunRole};

/// A resolved agent selection: an agent that is already online, or a
/// launch template to boot a fresh one from (which pins the region).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentChoice {
    Existing { agent_id: i32 },
    Launch { template_id: String, region: String },
}

impl AgentChoice {
    /// Parses the selector strings the role pickers produce:
    /// `agent:<id>` for an online agent, `template:<id>` for a launch
    /// template (region inferred from the template list).
    ///
    /// # Errors
    ///
    /// Returns a validation fault for malformed selectors or unknown
    /// template ids.
    pub fn parse(value: &str, templates: &[LaunchTemplate]) -> AppResult<Self> {
        if let Some(raw_id) = value.strip_prefix("agent:") {
            let agent_id = raw_id.parse::<i32>().map_err(|err| {
                tracing::debug!("Bad agent selector {:?}: {}", value, err);
                AppError::compose(ComposeError::InvalidAgentChoice {
                    value: value.to_owned(),
                })
            })?;
            return Ok(AgentChoice::Existing { agent_id });
        }
        if let Some(template_id) = value.strip_prefix("template:") {
            let template = templates
                .iter()
                .find(|template| template.id == template_id)
                .ok_or_else(|| {
                    AppError::compose(ComposeError::InvalidAgentChoice {
                        value: value.to_owned(),
                    })
                })?;
            return Ok(AgentChoice::Launch {
                template_id: template.id.clone(),
                region: template.region.clone(),
            });
        }
        Err(AppError::compose(ComposeError::InvalidAgentChoice {
            value: value.to_owned(),
        }))
    }

    #[must_use]
    pub fn from_template(template: &LaunchTemplate) -> Self {
        AgentChoice::Launch {
            template_id: template.id.clone(),
            region: template.region.clone(),
        }
    }

    /// Rewrites one assignment's binding. An existing-agent choice
    /// clears any launch-template reference and vice versa.
    fn bind(&self, role: &mut RunRole) {
        match self {
            AgentChoice::Existing { agent_id } => {
                role.agent_id = Some(*agent_id);
                role.launch_template_id = None;
                role.region = None;
            }
            AgentChoice::Launch {
                template_id,
                region,
            } => {
                role.agent_id = None;
                role.launch_template_id = Some(template_id.clone());
                role.region = Some(region.clone());
            }
        }
    }
}

/// Replaces every assignment of one role tag with `count` fresh ones,
/// indexed `0..count` and bound to the given choices (cycled when there
/// are fewer choices than instances).
///
/// # Errors
///
/// Returns a validation fault for an empty role tag or an unparsable
/// count; the list is left unchanged.
pub fn apply_role_config(
    list: &mut Vec<RunRole>,
    role: &str,
    count_text: &str,
    choices: &[AgentChoice],
) -> AppResult<()> {
    if role.is_empty() {
        return Err(AppError::compose(ComposeError::MissingRole));
    }
    let count = count_text.trim().parse::<usize>().map_err(|err| {
        tracing::debug!("Bad role count {:?}: {}", count_text, err);
        AppError::compose(ComposeError::InvalidRoleCount {
            value: count_text.to_owned(),
        })
    })?;
    list.retain(|assignment| assignment.role != role);
    for index in 0..count {
        let mut assignment = RunRole::unassigned(role, index);
        if let Some(choice) = pick_cyclic(choices, index) {
            choice.bind(&mut assignment);
        }
        list.push(assignment);
    }
    Ok(())
}

fn pick_cyclic(choices: &[AgentChoice], index: usize) -> Option<&AgentChoice> {
    index
        .checked_rem(choices.len())
        .and_then(|slot| choices.get(slot))
}

/// Appends one unbound instance of `role` at the next free index.
pub fn add_role(list: &mut Vec<RunRole>, role: &str) {
    let next_index = list
        .iter()
        .filter(|assignment| assignment.role == role)
        .count();
    list.push(RunRole::unassigned(role, next_index));
}

/// Removes the highest-indexed instance of `role`. Trimming from the
/// end keeps the per-tag indices dense without renumbering.
pub fn delete_role(list: &mut Vec<RunRole>, role: &str) {
    let target = list
        .iter()
        .enumerate()
        .filter(|(_, assignment)| assignment.role == role)
        .max_by_key(|(_, assignment)| assignment.index)
        .map(|(position, _)| position);
    if let Some(position) = target {
        list.remove(position);
    }
}

/// Rewrites the agent binding of one role instance.
///
/// # Errors
///
/// Returns a validation fault when no instance matches `(role, index)`.
pub fn assign_agent(
    list: &mut [RunRole],
    role: &str,
    index: usize,
    choice: &AgentChoice,
) -> AppResult<()> {
    let assignment = list
        .iter_mut()
        .find(|assignment| assignment.role == role && assignment.index == index)
        .ok_or_else(|| {
            AppError::compose(ComposeError::RoleInstanceNotFound {
                role: role.to_owned(),
                index,
            })
        })?;
    choice.bind(assignment);
    Ok(())
}

/// Rebuilds the whole assignment list from a flat tag list (a preset
/// composition), assigning dense zero-based indices per tag.
pub fn apply_role_composition(list: &mut Vec<RunRole>, roles: &[String]) {
    let mut indices: HashMap<&str, usize> = HashMap::new();
    let mut rebuilt = Vec::with_capacity(roles.len());
    for role in roles {
        let index = indices.entry(role.as_str()).or_insert(0);
        rebuilt.push(RunRole::unassigned(role, *index));
        *index = index.saturating_add(1);
    }
    *list = rebuilt;
}
