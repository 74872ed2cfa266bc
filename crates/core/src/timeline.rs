//! Read-only projection of the approval history.
//!
//! Attempts and step instances are kept in the order the backend sends them
//! (newest attempt first, steps by ascending order). Nothing is re-sorted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::approval::{ApprovalInstance, InstanceStatus, StepInstance, StepStatus};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StatusVisual {
    pub icon: &'static str,
    pub color: &'static str,
    pub label: &'static str,
}

const APPROVED: StatusVisual = StatusVisual { icon: "check", color: "green", label: "Approved" };
const REJECTED: StatusVisual = StatusVisual { icon: "x", color: "red", label: "Rejected" };
const PENDING: StatusVisual = StatusVisual { icon: "clock", color: "amber", label: "Pending" };
const SKIPPED: StatusVisual = StatusVisual { icon: "skip", color: "gray", label: "Skipped" };
const IN_PROGRESS: StatusVisual =
    StatusVisual { icon: "clock", color: "blue", label: "In progress" };

/// Unrecognised statuses render like `pending`.
pub fn step_visual(status: &StepStatus) -> StatusVisual {
    match status {
        StepStatus::Approved => APPROVED,
        StepStatus::Rejected => REJECTED,
        StepStatus::Skipped => SKIPPED,
        StepStatus::Pending | StepStatus::Unknown(_) => PENDING,
    }
}

pub fn instance_visual(status: &InstanceStatus) -> StatusVisual {
    match status {
        InstanceStatus::Approved => APPROVED,
        InstanceStatus::Rejected => REJECTED,
        InstanceStatus::InProgress | InstanceStatus::Unknown(_) => IN_PROGRESS,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepView {
    pub step_order: u32,
    pub approver_name: String,
    pub status: String,
    pub visual: StatusVisual,
    pub is_current: bool,
    pub overdue: bool,
    pub carry_over: bool,
    pub comment: Option<String>,
    pub decision_at: Option<DateTime<Utc>>,
    pub deadline_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttemptView {
    pub attempt: u32,
    pub status: String,
    pub visual: StatusVisual,
    pub current_step_order: Option<u32>,
    pub steps: Vec<StepView>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TimelineView {
    pub attempts: Vec<AttemptView>,
}

impl TimelineView {
    pub fn project(instances: &[ApprovalInstance], now: DateTime<Utc>) -> Self {
        Self { attempts: instances.iter().map(|instance| project_attempt(instance, now)).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Plain-text rendering used by the CLI.
    pub fn render_text(&self) -> String {
        if self.attempts.is_empty() {
            return "no approval history".to_owned();
        }

        let mut lines = Vec::new();
        for attempt in &self.attempts {
            lines.push(format!("attempt {} [{}]", attempt.attempt, attempt.visual.label));
            for step in &attempt.steps {
                let mut line = format!(
                    "  {} step {} {} ({})",
                    if step.is_current { ">" } else { "-" },
                    step.step_order,
                    step.approver_name,
                    step.visual.label
                );
                if step.carry_over {
                    line.push_str(" carried over");
                }
                if step.overdue {
                    line.push_str(" OVERDUE");
                }
                if let Some(comment) = &step.comment {
                    line.push_str(&format!(": {comment}"));
                }
                lines.push(line);
            }
        }
        lines.join("\n")
    }
}

fn project_attempt(instance: &ApprovalInstance, now: DateTime<Utc>) -> AttemptView {
    let current = instance.current_step_order.filter(|_| instance.is_active());
    AttemptView {
        attempt: instance.attempt,
        status: instance.status.to_string(),
        visual: instance_visual(&instance.status),
        current_step_order: current,
        steps: instance.step_instances.iter().map(|step| project_step(step, current, now)).collect(),
    }
}

fn project_step(step: &StepInstance, current: Option<u32>, now: DateTime<Utc>) -> StepView {
    StepView {
        step_order: step.step_order,
        approver_name: step.approver_name.clone(),
        status: step.status.to_string(),
        visual: step_visual(&step.status),
        is_current: current == Some(step.step_order),
        overdue: step.is_overdue(now),
        carry_over: step.carry_over,
        comment: step.comment.clone().filter(|comment| !comment.trim().is_empty()),
        decision_at: step.decision_at,
        deadline_at: step.deadline_at,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{step_visual, TimelineView, PENDING};
    use crate::domain::approval::{ApprovalInstance, InstanceStatus, StepInstance, StepStatus};

    fn step(order: u32, status: &str) -> StepInstance {
        StepInstance {
            id: format!("s-{order}").into(),
            step_order: order,
            approver_id: format!("u{order}").into(),
            approver_name: format!("User {order}"),
            status: StepStatus::from(status),
            decision_at: None,
            comment: None,
            deadline_at: None,
            carry_over: false,
        }
    }

    #[test]
    fn unknown_step_status_uses_pending_visual() {
        assert_eq!(step_visual(&StepStatus::from("delegated")), PENDING);
        assert_eq!(step_visual(&StepStatus::Pending), PENDING);
    }

    #[test]
    fn projection_keeps_backend_order_and_flags() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).single().expect("valid time");
        let mut carried = step(1, "approved");
        carried.carry_over = true;
        let mut late = step(2, "pending");
        late.deadline_at = Some(now - Duration::hours(2));
        late.comment = Some("  ".to_owned());

        let instances = vec![
            ApprovalInstance {
                id: "i-2".into(),
                attempt: 2,
                status: InstanceStatus::InProgress,
                current_step_order: Some(2),
                step_instances: vec![carried, late],
            },
            ApprovalInstance {
                id: "i-1".into(),
                attempt: 1,
                status: InstanceStatus::Rejected,
                current_step_order: Some(2),
                step_instances: vec![step(1, "approved"), step(2, "rejected")],
            },
        ];

        let view = TimelineView::project(&instances, now);
        assert_eq!(view.attempts.iter().map(|a| a.attempt).collect::<Vec<_>>(), vec![2, 1]);

        let active = &view.attempts[0];
        assert!(active.steps[0].carry_over);
        assert!(active.steps[1].is_current);
        assert!(active.steps[1].overdue);
        assert_eq!(active.steps[1].comment, None);

        let finished = &view.attempts[1];
        assert_eq!(finished.current_step_order, None);
        assert!(!finished.steps[1].is_current);
        assert_eq!(finished.steps[1].visual.color, "red");
    }

    #[test]
    fn text_rendering_survives_unknown_statuses() {
        let instances = vec![ApprovalInstance {
            id: "i-1".into(),
            attempt: 1,
            status: InstanceStatus::from("paused"),
            current_step_order: None,
            step_instances: vec![step(1, "mystery")],
        }];

        let text = TimelineView::project(&instances, Utc::now()).render_text();
        assert!(text.contains("attempt 1"));
        assert!(text.contains("step 1 User 1 (Pending)"));
    }

    #[test]
    fn empty_history_renders_placeholder() {
        assert_eq!(TimelineView::project(&[], Utc::now()).render_text(), "no approval history");
    }
}
