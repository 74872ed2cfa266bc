use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::UserId;

pub const DEFAULT_DEADLINE_HOURS: u32 = 48;

opaque_id!(RouteId);

wire_enum!(
    /// How approvers inside one step resolve it. Resolution itself happens on
    /// the backend; the client only carries the value and highlights parallel
    /// steps.
    StepType,
    Other {
        Sequential => "sequential",
        Parallel => "parallel",
    }
);

impl StepType {
    pub fn is_parallel(&self) -> bool {
        matches!(self, Self::Parallel)
    }
}

impl Default for StepType {
    fn default() -> Self {
        Self::Sequential
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approver {
    pub user_id: UserId,
    pub name: String,
}

impl Approver {
    pub fn new(user_id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), name: name.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStep {
    pub order: u32,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub step_type: StepType,
    #[serde(default)]
    pub approvers: Vec<Approver>,
    #[serde(default = "default_deadline_hours")]
    pub deadline_hours: u32,
}

impl RouteStep {
    pub fn new(order: u32) -> Self {
        Self {
            order,
            name: String::new(),
            step_type: StepType::Sequential,
            approvers: Vec::new(),
            deadline_hours: DEFAULT_DEADLINE_HOURS,
        }
    }

    /// Label shown for the step; blank names fall back to `Step {order}`.
    pub fn display_name(&self) -> String {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            format!("Step {}", self.order)
        } else {
            trimmed.to_owned()
        }
    }

    pub fn has_approver(&self, user_id: &UserId) -> bool {
        self.approvers.iter().any(|approver| &approver.user_id == user_id)
    }
}

fn default_deadline_hours() -> u32 {
    DEFAULT_DEADLINE_HOURS
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRoute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RouteId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub steps: Vec<RouteStep>,
}

impl ApprovalRoute {
    pub fn validate(&self) -> Result<(), RouteValidationError> {
        validate_route(&self.name, &self.steps)
    }

    pub fn approver_count(&self) -> usize {
        self.steps.iter().map(|step| step.approvers.len()).sum()
    }
}

/// Body of `POST /approval-routes` and `PATCH /approval-routes/{id}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub steps: Vec<RouteStep>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RouteValidationError {
    #[error("route name is required")]
    MissingName,
    #[error("route must contain at least one step")]
    NoSteps,
    #[error("step {order} (`{name}`) must have at least one approver")]
    StepWithoutApprovers { order: u32, name: String },
    #[error("step {order} (`{name}`) must have a positive deadline")]
    InvalidDeadline { order: u32, name: String },
    #[error("step {order} (`{name}`) lists approver `{user_id}` more than once")]
    DuplicateApprover { order: u32, name: String, user_id: UserId },
    #[error("step at position {position} has order {order}, expected {expected}")]
    OrderMismatch { position: usize, order: u32, expected: u32 },
}

impl RouteValidationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingName => "Enter a route name.".to_owned(),
            Self::NoSteps => "Add at least one approval step.".to_owned(),
            Self::StepWithoutApprovers { name, .. } => {
                format!("Add at least one approver to \"{name}\".")
            }
            Self::InvalidDeadline { name, .. } => {
                format!("Set a deadline of at least one hour for \"{name}\".")
            }
            Self::DuplicateApprover { name, .. } => {
                format!("An approver appears twice in \"{name}\".")
            }
            Self::OrderMismatch { .. } => "Approval steps are out of order.".to_owned(),
        }
    }
}

/// Checks the rules a route must satisfy before it is persisted.
pub fn validate_route(name: &str, steps: &[RouteStep]) -> Result<(), RouteValidationError> {
    if name.trim().is_empty() {
        return Err(RouteValidationError::MissingName);
    }

    if steps.is_empty() {
        return Err(RouteValidationError::NoSteps);
    }

    for (position, step) in steps.iter().enumerate() {
        let expected = position as u32 + 1;
        if step.order != expected {
            return Err(RouteValidationError::OrderMismatch {
                position,
                order: step.order,
                expected,
            });
        }
        if step.approvers.is_empty() {
            return Err(RouteValidationError::StepWithoutApprovers {
                order: step.order,
                name: step.display_name(),
            });
        }
        let repeated = step.approvers.iter().enumerate().find_map(|(index, approver)| {
            step.approvers[..index]
                .iter()
                .any(|earlier| earlier.user_id == approver.user_id)
                .then(|| approver.user_id.clone())
        });
        if let Some(user_id) = repeated {
            return Err(RouteValidationError::DuplicateApprover {
                order: step.order,
                name: step.display_name(),
                user_id,
            });
        }
        if step.deadline_hours == 0 {
            return Err(RouteValidationError::InvalidDeadline {
                order: step.order,
                name: step.display_name(),
            });
        }
    }

    Ok(())
}
