use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

opaque_id!(InstanceId);
opaque_id!(StepInstanceId);

wire_enum!(
    InstanceStatus,
    Unknown {
        InProgress => "in_progress",
        Approved => "approved",
        Rejected => "rejected",
    }
);

wire_enum!(
    StepStatus,
    Unknown {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Skipped => "skipped",
    }
);

/// One approver's decision, or pending slot, inside an approval attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInstance {
    pub id: StepInstanceId,
    pub step_order: u32,
    pub approver_id: UserId,
    #[serde(default)]
    pub approver_name: String,
    pub status: StepStatus,
    #[serde(default, deserialize_with = "crate::domain::timestamp::deserialize_optional")]
    pub decision_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "crate::domain::timestamp::deserialize_optional")]
    pub deadline_at: Option<DateTime<Utc>>,
    /// Decision copied forward from an earlier attempt.
    #[serde(default)]
    pub carry_over: bool,
}

impl StepInstance {
    pub fn is_pending(&self) -> bool {
        self.status == StepStatus::Pending
    }

    /// Display hint only; the backend enforces deadlines.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && self.deadline_at.is_some_and(|deadline| deadline < now)
    }
}

/// One execution attempt of a route against a document. Read-only on the
/// client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalInstance {
    pub id: InstanceId,
    pub attempt: u32,
    pub status: InstanceStatus,
    #[serde(default)]
    pub current_step_order: Option<u32>,
    #[serde(default)]
    pub step_instances: Vec<StepInstance>,
}

impl ApprovalInstance {
    pub fn is_active(&self) -> bool {
        self.status == InstanceStatus::InProgress
    }

    pub fn current_step_instances(&self) -> impl Iterator<Item = &StepInstance> {
        let current = self.current_step_order;
        self.step_instances.iter().filter(move |step| Some(step.step_order) == current)
    }

    /// True when `user_id` holds a pending slot on the step this attempt is
    /// waiting on.
    pub fn awaits_decision_from(&self, user_id: &UserId) -> bool {
        self.is_active()
            && self
                .current_step_instances()
                .any(|step| step.is_pending() && &step.approver_id == user_id)
    }

    pub fn carried_over_count(&self) -> usize {
        self.step_instances.iter().filter(|step| step.carry_over).count()
    }
}

pub fn active_instance(instances: &[ApprovalInstance]) -> Option<&ApprovalInstance> {
    instances.iter().find(|instance| instance.is_active())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{ApprovalInstance, InstanceStatus, StepInstance, StepStatus};

    fn step(order: u32, approver: &str, status: StepStatus) -> StepInstance {
        StepInstance {
            id: format!("s-{order}-{approver}").into(),
            step_order: order,
            approver_id: approver.into(),
            approver_name: approver.to_owned(),
            status,
            decision_at: None,
            comment: None,
            deadline_at: None,
            carry_over: false,
        }
    }

    #[test]
    fn instance_decodes_backend_payload() {
        let instance: ApprovalInstance = serde_json::from_str(
            r#"{
                "id": 10,
                "attempt": 2,
                "status": "in_progress",
                "current_step_order": 1,
                "step_instances": [{
                    "id": 100,
                    "step_order": 1,
                    "approver_id": 5,
                    "approver_name": "Alice",
                    "status": "escalated",
                    "decision_at": null,
                    "deadline_at": "2024-03-07T12:00:00Z",
                    "carry_over": true
                }]
            }"#,
        )
        .expect("instance json");

        assert_eq!(instance.attempt, 2);
        assert!(instance.is_active());
        assert_eq!(instance.step_instances[0].status, StepStatus::Unknown("escalated".to_owned()));
        assert_eq!(instance.carried_over_count(), 1);
    }

    #[test]
    fn timestamps_without_offset_are_read_as_utc() {
        let instances: Vec<ApprovalInstance> = serde_json::from_str(
            r#"[{
                "id": 11,
                "attempt": 1,
                "status": "in_progress",
                "current_step_order": 1,
                "step_instances": [
                    {"id": 1, "step_order": 1, "approver_id": 5, "status": "approved",
                     "decision_at": "2024-03-06T09:30:00+00:00",
                     "deadline_at": "2024-03-07T12:00:00.123456"},
                    {"id": 2, "step_order": 1, "approver_id": 6, "status": "pending",
                     "deadline_at": "soon"}
                ]
            }]"#,
        )
        .expect("naive timestamps decode");

        let slots = &instances[0].step_instances;
        assert_eq!(slots[0].decision_at, Utc.with_ymd_and_hms(2024, 3, 6, 9, 30, 0).single());
        let deadline = slots[0].deadline_at.expect("naive deadline kept");
        assert_eq!(deadline.timestamp_subsec_micros(), 123_456);
        assert_eq!(
            Some(deadline - Duration::microseconds(123_456)),
            Utc.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).single()
        );
        assert_eq!(slots[1].deadline_at, None);
    }

    #[test]
    fn only_current_step_pending_slots_await_decisions() {
        let instance = ApprovalInstance {
            id: "i-1".into(),
            attempt: 1,
            status: InstanceStatus::InProgress,
            current_step_order: Some(2),
            step_instances: vec![
                step(1, "A", StepStatus::Approved),
                step(2, "B", StepStatus::Pending),
                step(3, "C", StepStatus::Pending),
            ],
        };

        assert!(instance.awaits_decision_from(&"B".into()));
        assert!(!instance.awaits_decision_from(&"A".into()));
        assert!(!instance.awaits_decision_from(&"C".into()));
    }

    #[test]
    fn overdue_only_applies_to_pending_steps() {
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 9, 0, 0).single().expect("valid time");
        let mut pending = step(1, "A", StepStatus::Pending);
        pending.deadline_at = Some(now - Duration::hours(1));
        assert!(pending.is_overdue(now));

        let mut decided = pending.clone();
        decided.status = StepStatus::Approved;
        assert!(!decided.is_overdue(now));

        pending.deadline_at = Some(now + Duration::hours(1));
        assert!(!pending.is_overdue(now));
    }
}
