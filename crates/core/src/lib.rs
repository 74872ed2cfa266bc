#[macro_use]
pub mod domain;

pub mod actions;
pub mod audit;
pub mod config;
pub mod dictionary;
pub mod editor;
pub mod errors;
pub mod session;
pub mod timeline;

pub use actions::{available_actions, is_pending_approver, ActionContext, ApprovalAction};
pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use dictionary::DictionaryType;
pub use domain::approval::{
    ApprovalInstance, InstanceId, InstanceStatus, StepInstance, StepInstanceId, StepStatus,
};
pub use domain::document::{Document, DocumentEvent, DocumentId, DocumentStatus};
pub use domain::draft::{DocumentDraft, DocumentForm, DraftValidationError};
pub use domain::route::{
    ApprovalRoute, Approver, RouteId, RoutePayload, RouteStep, RouteValidationError, StepType,
};
pub use domain::user::{UserId, UserSummary};
pub use editor::{ApproverPool, ApproverSearch, EditorError, RouteEditor};
pub use errors::{ApplicationError, DomainError, ErrorClass, InterfaceError};
pub use session::{Session, SessionError};
pub use timeline::{StatusVisual, TimelineView};
