//! Executes approval actions against the backend.
//!
//! Every action is checked locally first (availability, route choice,
//! confirmation, in-flight guard, lifecycle transition) and only then sent.
//! A successful call never patches local state: the caller reloads the view.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use docflow_core::audit::NoopAuditSink;
use docflow_core::{
    ApplicationError, ApprovalAction, AuditCategory, AuditContext, AuditEvent, AuditOutcome,
    AuditSink, DocumentId, DomainError, RouteId, Session,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, WorkflowApi};
use crate::view::DocumentSnapshot;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    NotConfirmed,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Self::Confirmed
        } else {
            Self::NotConfirmed
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The backend accepted the action; local data is stale.
    ReloadRequired,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalSheet {
    pub document_id: DocumentId,
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("`{action}` is not available for this document")]
    ActionUnavailable { action: &'static str },
    #[error("choose an approval route before submitting")]
    RouteSelectionRequired,
    #[error("cancelling a document must be confirmed")]
    ConfirmationRequired,
    #[error("another action is still in progress")]
    Busy,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Transition(#[from] ApiError),
}

impl From<DispatchError> for ApplicationError {
    fn from(error: DispatchError) -> Self {
        match error {
            DispatchError::Domain(error) => Self::Domain(error),
            DispatchError::Transition(error) => error.into(),
            other => Self::Rejected(other.to_string()),
        }
    }
}

/// Clears the in-flight flag when dropped.
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

enum Request<'a> {
    Submit(Option<&'a RouteId>),
    Approve(Option<&'a str>),
    Reject(Option<&'a str>),
    Cancel,
}

impl Request<'_> {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Submit(_) => "approval.submit",
            Self::Approve(_) => "approval.approve",
            Self::Reject(_) => "approval.reject",
            Self::Cancel => "approval.cancel",
        }
    }
}

pub struct ActionDispatcher<A> {
    api: Arc<A>,
    session: Session,
    audit: Arc<dyn AuditSink>,
    in_flight: Arc<AtomicBool>,
}

impl<A> ActionDispatcher<A>
where
    A: WorkflowApi,
{
    pub fn new(api: Arc<A>, session: Session) -> Self {
        Self {
            api,
            session,
            audit: Arc::new(NoopAuditSink),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// True while a call is running; the UI disables every action.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn available_actions(&self, snapshot: &DocumentSnapshot) -> Vec<ApprovalAction> {
        snapshot.available_actions(&self.session)
    }

    /// `route_id` overrides the document's route; it is mandatory when the
    /// document has none.
    pub async fn submit(
        &self,
        snapshot: &DocumentSnapshot,
        route_id: Option<RouteId>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let context = self.audit_context(snapshot);
        let available = self.available_actions(snapshot);
        let action = available
            .iter()
            .copied()
            .find(|action| {
                matches!(
                    action,
                    ApprovalAction::Submit { .. } | ApprovalAction::ChooseRouteAndSubmit { .. }
                )
            })
            .ok_or(DispatchError::ActionUnavailable { action: "Submit for approval" });
        let action = self.refuse_on_error(&context, "approval.submit", action)?;

        if matches!(action, ApprovalAction::ChooseRouteAndSubmit { .. }) && route_id.is_none() {
            return self.refuse(&context, "approval.submit", DispatchError::RouteSelectionRequired);
        }

        self.execute(snapshot, &context, action, Request::Submit(route_id.as_ref())).await
    }

    pub async fn approve(
        &self,
        snapshot: &DocumentSnapshot,
        comment: Option<String>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let context = self.audit_context(snapshot);
        self.require(snapshot, &context, ApprovalAction::Approve, "approval.approve")?;
        let request = Request::Approve(comment.as_deref());
        self.execute(snapshot, &context, ApprovalAction::Approve, request).await
    }

    pub async fn reject(
        &self,
        snapshot: &DocumentSnapshot,
        comment: Option<String>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let context = self.audit_context(snapshot);
        self.require(snapshot, &context, ApprovalAction::Reject, "approval.reject")?;
        let request = Request::Reject(comment.as_deref());
        self.execute(snapshot, &context, ApprovalAction::Reject, request).await
    }

    pub async fn cancel(
        &self,
        snapshot: &DocumentSnapshot,
        confirmation: Confirmation,
    ) -> Result<DispatchOutcome, DispatchError> {
        let context = self.audit_context(snapshot);
        self.require(snapshot, &context, ApprovalAction::Cancel, "approval.cancel")?;
        if confirmation != Confirmation::Confirmed {
            return self.refuse(&context, "approval.cancel", DispatchError::ConfirmationRequired);
        }
        self.execute(snapshot, &context, ApprovalAction::Cancel, Request::Cancel).await
    }

    /// Fetches the rendered approval sheet with the session's credentials.
    pub async fn download_sheet(
        &self,
        snapshot: &DocumentSnapshot,
    ) -> Result<ApprovalSheet, DispatchError> {
        const EVENT: &str = "approval.sheet_download";
        let context = self.audit_context(snapshot);
        self.require(snapshot, &context, ApprovalAction::DownloadSheet, EVENT)?;
        let _guard = self.refuse_on_error(&context, EVENT, self.begin())?;

        let document_id = snapshot.document.id.clone();
        match self.api.approval_sheet(&document_id).await {
            Ok(bytes) => {
                self.audit.emit(
                    AuditEvent::new(&context, EVENT, AuditCategory::Artifact, AuditOutcome::Success)
                        .with_metadata("bytes", bytes.len().to_string()),
                );
                info!(
                    event_name = EVENT,
                    correlation_id = %context.correlation_id,
                    document_id = %document_id,
                    bytes = bytes.len(),
                    "approval sheet downloaded"
                );
                Ok(ApprovalSheet {
                    file_name: format!("approval-sheet-{document_id}.pdf"),
                    document_id,
                    bytes,
                })
            }
            Err(error) => Err(self.failed(&context, EVENT, AuditCategory::Artifact, error)),
        }
    }

    /// Marks a call as in flight. Fails when one already is.
    pub(crate) fn begin(&self) -> Result<InFlightGuard, DispatchError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| DispatchError::Busy)?;
        Ok(InFlightGuard { flag: Arc::clone(&self.in_flight) })
    }

    async fn execute(
        &self,
        snapshot: &DocumentSnapshot,
        context: &AuditContext,
        action: ApprovalAction,
        request: Request<'_>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let event_type = request.event_type();
        let _guard = self.refuse_on_error(context, event_type, self.begin())?;

        if let Some(event) = action.event() {
            let transition = snapshot.document.status.transition(event).map_err(DispatchError::from);
            self.refuse_on_error(context, event_type, transition)?;
        }

        let document_id = &snapshot.document.id;
        let result = match request {
            Request::Submit(route_id) => self.api.submit(document_id, route_id).await,
            Request::Approve(comment) => self.api.approve(document_id, comment).await,
            Request::Reject(comment) => self.api.reject(document_id, comment).await,
            Request::Cancel => self.api.cancel(document_id).await,
        };

        match result {
            Ok(()) => {
                self.audit.emit(AuditEvent::new(
                    context,
                    event_type,
                    AuditCategory::Transition,
                    AuditOutcome::Success,
                ));
                info!(
                    event_name = event_type,
                    correlation_id = %context.correlation_id,
                    document_id = %document_id,
                    actor = %context.actor,
                    "approval action accepted"
                );
                Ok(DispatchOutcome::ReloadRequired)
            }
            Err(error) => Err(self.failed(context, event_type, AuditCategory::Transition, error)),
        }
    }

    fn require(
        &self,
        snapshot: &DocumentSnapshot,
        context: &AuditContext,
        action: ApprovalAction,
        event_type: &str,
    ) -> Result<(), DispatchError> {
        if self.available_actions(snapshot).contains(&action) {
            Ok(())
        } else {
            let error = DispatchError::ActionUnavailable { action: action.label() };
            self.refuse(context, event_type, error)
        }
    }

    fn refuse_on_error<T>(
        &self,
        context: &AuditContext,
        event_type: &str,
        result: Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        result.or_else(|error| self.refuse(context, event_type, error))
    }

    fn refuse<T>(
        &self,
        context: &AuditContext,
        event_type: &str,
        error: DispatchError,
    ) -> Result<T, DispatchError> {
        self.audit.emit(
            AuditEvent::new(context, event_type, AuditCategory::Transition, AuditOutcome::Rejected)
                .with_metadata("reason", error.to_string()),
        );
        info!(
            event_name = event_type,
            correlation_id = %context.correlation_id,
            actor = %context.actor,
            error = %error,
            "approval action refused locally"
        );
        Err(error)
    }

    fn failed(
        &self,
        context: &AuditContext,
        event_type: &str,
        category: AuditCategory,
        error: ApiError,
    ) -> DispatchError {
        let mut event = AuditEvent::new(context, event_type, category, AuditOutcome::Failed)
            .with_metadata("error", error.to_string());
        if let Some(status) = error.status() {
            event = event.with_metadata("status", status.to_string());
        }
        self.audit.emit(event);
        warn!(
            event_name = event_type,
            correlation_id = %context.correlation_id,
            actor = %context.actor,
            error = %error,
            "approval action failed"
        );
        DispatchError::Transition(error)
    }

    fn audit_context(&self, snapshot: &DocumentSnapshot) -> AuditContext {
        AuditContext::start(Some(snapshot.document.id.clone()), self.session.user_id().to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use docflow_core::{Document, DocumentStatus, Session};
    use secrecy::SecretString;

    use super::{ActionDispatcher, Confirmation, DispatchError};
    use crate::memory::{InMemoryWorkflowApi, RecordedCall};
    use crate::view::DocumentSnapshot;

    fn session(user: &str) -> Session {
        let claims = URL_SAFE_NO_PAD.encode(format!("{{\"sub\":\"{user}\"}}"));
        Session::from_token(SecretString::from(format!("eyJhbGciOiJub25lIn0.{claims}.sig")))
            .expect("session")
    }

    fn snapshot(status: DocumentStatus) -> DocumentSnapshot {
        DocumentSnapshot::new(
            Document {
                id: "d-1".into(),
                title: "Contract".to_owned(),
                status,
                creator_id: "creator".into(),
                approval_route_id: Some("r-1".into()),
                document_type: None,
                created_at: None,
            },
            Vec::new(),
        )
    }

    #[test]
    fn in_flight_guard_excludes_a_second_call_until_dropped() {
        let dispatcher =
            ActionDispatcher::new(Arc::new(InMemoryWorkflowApi::new()), session("creator"));

        let guard = dispatcher.begin().expect("first call");
        assert!(dispatcher.is_busy());
        assert!(matches!(dispatcher.begin(), Err(DispatchError::Busy)));

        drop(guard);
        assert!(!dispatcher.is_busy());
        assert!(dispatcher.begin().is_ok());
    }

    #[tokio::test]
    async fn busy_dispatcher_sends_nothing() {
        let api = Arc::new(
            InMemoryWorkflowApi::new().with_document(snapshot(DocumentStatus::Draft).document),
        );
        let dispatcher = ActionDispatcher::new(Arc::clone(&api), session("creator"));

        let _guard = dispatcher.begin().expect("held");
        let error = dispatcher
            .cancel(&snapshot(DocumentStatus::Draft), Confirmation::Confirmed)
            .await
            .expect_err("busy");

        assert_eq!(error, DispatchError::Busy);
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_cancel_is_refused_before_any_request() {
        let api = Arc::new(InMemoryWorkflowApi::new());
        let dispatcher = ActionDispatcher::new(Arc::clone(&api), session("creator"));

        let error = dispatcher
            .cancel(&snapshot(DocumentStatus::PendingApproval), false.into())
            .await
            .expect_err("needs confirmation");

        assert_eq!(error, DispatchError::ConfirmationRequired);
        assert!(!api.calls().await.iter().any(|call| matches!(call, RecordedCall::Cancel(_))));
    }
}
