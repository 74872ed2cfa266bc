use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::route::RouteId;
use crate::domain::user::UserId;
use crate::errors::DomainError;

opaque_id!(DocumentId);

wire_enum!(
    /// Server-authoritative document lifecycle. `approved` and `cancelled`
    /// are terminal; `rejected` may be resubmitted.
    DocumentStatus,
    Unknown {
        Draft => "draft",
        PendingApproval => "pending_approval",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentEvent {
    Submit,
    Approve,
    Reject,
    Cancel,
}

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Cancelled)
    }

    pub fn is_resubmittable(&self) -> bool {
        matches!(self, Self::Rejected)
    }

    /// Unknown statuses only accept cancellation, which the backend allows
    /// from every non-terminal state.
    pub fn accepts(&self, event: DocumentEvent) -> bool {
        match event {
            DocumentEvent::Submit => matches!(self, Self::Draft | Self::Rejected),
            DocumentEvent::Approve | DocumentEvent::Reject => {
                matches!(self, Self::PendingApproval)
            }
            DocumentEvent::Cancel => !self.is_terminal(),
        }
    }

    /// Status the backend is expected to report after `event`. An approval
    /// may leave the document pending while later steps remain, so the
    /// result for `Approve` is the pessimistic `pending_approval`.
    pub fn transition(&self, event: DocumentEvent) -> Result<Self, DomainError> {
        if !self.accepts(event) {
            return Err(DomainError::InvalidDocumentTransition { from: self.clone(), event });
        }

        Ok(match event {
            DocumentEvent::Submit | DocumentEvent::Approve => Self::PendingApproval,
            DocumentEvent::Reject => Self::Rejected,
            DocumentEvent::Cancel => Self::Cancelled,
        })
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Draft => "Draft",
            Self::PendingApproval => "Pending approval",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::Cancelled => "Cancelled",
            Self::Unknown(raw) => raw.as_str(),
        }
    }
}

/// Document record as consumed by the approval core. Document CRUD lives
/// elsewhere; only the fields the approval actions need are modelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    #[serde(default)]
    pub title: String,
    pub status: DocumentStatus,
    pub creator_id: UserId,
    #[serde(default)]
    pub approval_route_id: Option<RouteId>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default, deserialize_with = "crate::domain::timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Document {
    pub fn is_created_by(&self, user_id: &UserId) -> bool {
        &self.creator_id == user_id
    }

    pub fn has_approval_route(&self) -> bool {
        self.approval_route_id.is_some()
    }
}
