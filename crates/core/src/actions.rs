//! Which approval actions the current user may trigger on a document.
//!
//! Pure functions of the document, the attempt history and the caller's
//! identity. The backend stays authoritative: a hidden action is a UI hint,
//! not an enforcement point.

use serde::{Deserialize, Serialize};

use crate::domain::approval::ApprovalInstance;
use crate::domain::document::{Document, DocumentEvent, DocumentStatus};
use crate::domain::user::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ApprovalAction {
    /// Document already has a route; submit without an override.
    Submit { resubmit: bool },
    /// Document has no route; one must be chosen before submitting.
    ChooseRouteAndSubmit { resubmit: bool },
    Approve,
    Reject,
    Cancel,
    DownloadSheet,
}

impl ApprovalAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Submit { resubmit: false } => "Submit for approval",
            Self::Submit { resubmit: true } => "Resubmit for approval",
            Self::ChooseRouteAndSubmit { resubmit: false } => "Choose route and submit",
            Self::ChooseRouteAndSubmit { resubmit: true } => "Choose route and resubmit",
            Self::Approve => "Approve",
            Self::Reject => "Reject",
            Self::Cancel => "Cancel document",
            Self::DownloadSheet => "Download approval sheet",
        }
    }

    pub fn requires_confirmation(&self) -> bool {
        matches!(self, Self::Cancel)
    }

    /// Lifecycle event the action asks the backend for, if any.
    pub fn event(&self) -> Option<DocumentEvent> {
        match self {
            Self::Submit { .. } | Self::ChooseRouteAndSubmit { .. } => Some(DocumentEvent::Submit),
            Self::Approve => Some(DocumentEvent::Approve),
            Self::Reject => Some(DocumentEvent::Reject),
            Self::Cancel => Some(DocumentEvent::Cancel),
            Self::DownloadSheet => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ActionContext<'a> {
    pub document: &'a Document,
    pub instances: &'a [ApprovalInstance],
    pub user_id: &'a UserId,
}

impl<'a> ActionContext<'a> {
    pub fn new(
        document: &'a Document,
        instances: &'a [ApprovalInstance],
        user_id: &'a UserId,
    ) -> Self {
        Self { document, instances, user_id }
    }

    pub fn is_creator(&self) -> bool {
        self.document.is_created_by(self.user_id)
    }
}

/// True iff an in-progress attempt has a pending slot for `user_id` on its
/// current step.
pub fn is_pending_approver(user_id: &UserId, instances: &[ApprovalInstance]) -> bool {
    instances.iter().any(|instance| instance.awaits_decision_from(user_id))
}

pub fn can_submit(document: &Document, is_creator: bool) -> bool {
    is_creator && matches!(document.status, DocumentStatus::Draft | DocumentStatus::Rejected)
}

pub fn can_cancel(document: &Document, is_creator: bool) -> bool {
    is_creator && !matches!(document.status, DocumentStatus::Cancelled | DocumentStatus::Approved)
}

pub fn can_download_sheet(document: &Document) -> bool {
    matches!(
        document.status,
        DocumentStatus::Approved | DocumentStatus::Rejected | DocumentStatus::PendingApproval
    )
}

pub fn available_actions(context: &ActionContext<'_>) -> Vec<ApprovalAction> {
    let document = context.document;
    let is_creator = context.is_creator();
    let mut actions = Vec::new();

    if can_submit(document, is_creator) {
        let resubmit = document.status.is_resubmittable();
        if document.has_approval_route() {
            actions.push(ApprovalAction::Submit { resubmit });
        } else {
            actions.push(ApprovalAction::ChooseRouteAndSubmit { resubmit });
        }
    }

    if is_pending_approver(context.user_id, context.instances) {
        actions.push(ApprovalAction::Approve);
        actions.push(ApprovalAction::Reject);
    }

    if can_cancel(document, is_creator) {
        actions.push(ApprovalAction::Cancel);
    }

    if can_download_sheet(document) {
        actions.push(ApprovalAction::DownloadSheet);
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::{
        available_actions, can_cancel, can_submit, is_pending_approver, ActionContext,
        ApprovalAction,
    };
    use crate::domain::approval::{ApprovalInstance, InstanceStatus, StepInstance, StepStatus};
    use crate::domain::document::{Document, DocumentStatus};
    use crate::domain::user::UserId;

    fn document(status: &str, route: Option<&str>) -> Document {
        Document {
            id: "d-1".into(),
            title: "Laptop purchase".to_owned(),
            status: DocumentStatus::from(status),
            creator_id: "creator".into(),
            approval_route_id: route.map(Into::into),
            document_type: None,
            created_at: None,
        }
    }

    fn step(order: u32, approver: &str, status: StepStatus) -> StepInstance {
        StepInstance {
            id: format!("s-{order}").into(),
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

    fn two_step_instance() -> Vec<ApprovalInstance> {
        vec![ApprovalInstance {
            id: "i-1".into(),
            attempt: 1,
            status: InstanceStatus::InProgress,
            current_step_order: Some(2),
            step_instances: vec![
                step(1, "A", StepStatus::Approved),
                step(2, "B", StepStatus::Pending),
            ],
        }]
    }

    #[test]
    fn pending_approver_is_the_current_step_pending_slot() {
        let instances = two_step_instance();
        assert!(is_pending_approver(&"B".into(), &instances));
        assert!(!is_pending_approver(&"A".into(), &instances));
    }

    #[test]
    fn completed_instances_have_no_pending_approvers() {
        let mut instances = two_step_instance();
        instances[0].status = InstanceStatus::Rejected;
        assert!(!is_pending_approver(&"B".into(), &instances));
    }

    #[test]
    fn submit_and_cancel_predicates_follow_status() {
        assert!(can_submit(&document("draft", None), true));
        assert!(can_submit(&document("rejected", None), true));
        assert!(!can_submit(&document("pending_approval", None), true));
        assert!(!can_submit(&document("draft", None), false));

        assert!(can_cancel(&document("pending_approval", None), true));
        assert!(!can_cancel(&document("approved", None), true));
        assert!(!can_cancel(&document("cancelled", None), true));
        assert!(!can_cancel(&document("draft", None), false));
    }

    #[test]
    fn rejected_document_offers_distinct_resubmit() {
        let doc = document("rejected", Some("r-1"));
        let creator = UserId::from("creator");
        let actions = available_actions(&ActionContext::new(&doc, &[], &creator));

        assert!(actions.contains(&ApprovalAction::Submit { resubmit: true }));
        assert_ne!(
            ApprovalAction::Submit { resubmit: true }.label(),
            ApprovalAction::Submit { resubmit: false }.label()
        );
    }

    #[test]
    fn approved_document_cannot_be_cancelled() {
        let doc = document("approved", Some("r-1"));
        let creator = UserId::from("creator");
        let actions = available_actions(&ActionContext::new(&doc, &[], &creator));

        assert_eq!(actions, vec![ApprovalAction::DownloadSheet]);
    }

    #[test]
    fn document_without_route_requires_route_choice() {
        let doc = document("draft", None);
        let creator = UserId::from("creator");
        let actions = available_actions(&ActionContext::new(&doc, &[], &creator));

        assert_eq!(
            actions,
            vec![ApprovalAction::ChooseRouteAndSubmit { resubmit: false }, ApprovalAction::Cancel]
        );
    }

    #[test]
    fn pending_approver_sees_decision_actions_only() {
        let doc = document("pending_approval", Some("r-1"));
        let instances = two_step_instance();
        let approver = UserId::from("B");
        let actions = available_actions(&ActionContext::new(&doc, &instances, &approver));

        assert_eq!(
            actions,
            vec![ApprovalAction::Approve, ApprovalAction::Reject, ApprovalAction::DownloadSheet]
        );
        assert!(ApprovalAction::Cancel.requires_confirmation());
    }
}
