//! Per-document approval state for one open view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use docflow_core::{
    available_actions, ActionContext, ApprovalAction, ApprovalInstance, ApprovalRoute, Document,
    DocumentId, Session, TimelineView,
};
use tracing::{debug, warn};

use crate::api::{ApiError, WorkflowApi};

/// Document plus its attempt history, as last fetched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentSnapshot {
    pub document: Document,
    pub instances: Vec<ApprovalInstance>,
}

impl DocumentSnapshot {
    pub fn new(document: Document, instances: Vec<ApprovalInstance>) -> Self {
        Self { document, instances }
    }

    pub fn context<'a>(&'a self, session: &'a Session) -> ActionContext<'a> {
        ActionContext::new(&self.document, &self.instances, session.user_id())
    }

    pub fn available_actions(&self, session: &Session) -> Vec<ApprovalAction> {
        available_actions(&self.context(session))
    }

    pub fn timeline(&self, now: DateTime<Utc>) -> TimelineView {
        TimelineView::project(&self.instances, now)
    }
}

pub struct DocumentApprovalView<A> {
    api: Arc<A>,
    document_id: DocumentId,
    snapshot: Option<DocumentSnapshot>,
    routes: Option<Vec<ApprovalRoute>>,
    last_error: Option<ApiError>,
}

impl<A> DocumentApprovalView<A>
where
    A: WorkflowApi,
{
    pub fn new(api: Arc<A>, document_id: DocumentId) -> Self {
        Self { api, document_id, snapshot: None, routes: None, last_error: None }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Re-fetches the document and its attempt history. On failure the
    /// previous data is kept and the error is remembered in `last_error`.
    /// Routes are fetched until one listing succeeds; a failed listing does
    /// not fail the refresh.
    pub async fn refresh(&mut self) -> Result<&DocumentSnapshot, ApiError> {
        match self.fetch().await {
            Ok(snapshot) => {
                debug!(
                    event_name = "view.refreshed",
                    document_id = %self.document_id,
                    attempts = snapshot.instances.len(),
                    "approval view refreshed"
                );
                self.last_error = None;
                self.load_routes().await;
                Ok(self.snapshot.insert(snapshot))
            }
            Err(error) => {
                warn!(
                    event_name = "view.refresh_failed",
                    document_id = %self.document_id,
                    error = %error,
                    "approval view refresh failed; keeping previous state"
                );
                self.last_error = Some(error.clone());
                Err(error)
            }
        }
    }

    async fn fetch(&self) -> Result<DocumentSnapshot, ApiError> {
        let document = self.api.get_document(&self.document_id).await?;
        let instances = self.api.approval_status(&self.document_id).await?;
        Ok(DocumentSnapshot::new(document, instances))
    }

    /// Route listing is optional for the view: a failure leaves `routes`
    /// unset so the next refresh asks again.
    async fn load_routes(&mut self) {
        if self.routes.is_some() {
            return;
        }
        match self.api.list_routes().await {
            Ok(routes) => self.routes = Some(routes),
            Err(error) => {
                warn!(
                    event_name = "view.routes_failed",
                    document_id = %self.document_id,
                    error = %error,
                    "route list unavailable; route choice disabled"
                );
                self.last_error = Some(error);
            }
        }
    }

    pub fn snapshot(&self) -> Option<&DocumentSnapshot> {
        self.snapshot.as_ref()
    }

    /// Active routes offered when the document has none of its own.
    pub fn routes(&self) -> &[ApprovalRoute] {
        self.routes.as_deref().unwrap_or_default()
    }

    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    pub fn available_actions(&self, session: &Session) -> Vec<ApprovalAction> {
        self.snapshot.as_ref().map(|snapshot| snapshot.available_actions(session)).unwrap_or_default()
    }

    pub fn timeline(&self, now: DateTime<Utc>) -> TimelineView {
        self.snapshot.as_ref().map(|snapshot| snapshot.timeline(now)).unwrap_or_default()
    }
}
