//! Loading, saving and retiring approval routes.

use std::sync::Arc;

use docflow_core::config::ApprovalsConfig;
use docflow_core::domain::route::DEFAULT_DEADLINE_HOURS;
use docflow_core::editor::APPROVER_SEARCH_LIMIT;
use docflow_core::{
    ApplicationError, ApprovalRoute, ApproverPool, DomainError, RouteEditor, RouteId,
    RouteValidationError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, WorkflowApi};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SaveError {
    #[error(transparent)]
    Validation(#[from] RouteValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl SaveError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(error) => error.user_message(),
            Self::Api(error) => error.to_string(),
        }
    }
}

impl From<SaveError> for ApplicationError {
    fn from(error: SaveError) -> Self {
        match error {
            SaveError::Validation(error) => Self::Domain(DomainError::RouteValidation(error)),
            SaveError::Api(error) => error.into(),
        }
    }
}

pub struct RouteService<A> {
    api: Arc<A>,
    default_deadline_hours: u32,
    approver_search_limit: usize,
}

impl<A> RouteService<A>
where
    A: WorkflowApi,
{
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            default_deadline_hours: DEFAULT_DEADLINE_HOURS,
            approver_search_limit: APPROVER_SEARCH_LIMIT,
        }
    }

    pub fn with_settings(mut self, settings: &ApprovalsConfig) -> Self {
        self.default_deadline_hours = settings.default_deadline_hours;
        self.approver_search_limit = settings.approver_search_limit;
        self
    }

    pub async fn list(&self) -> Result<Vec<ApprovalRoute>, ApiError> {
        self.api.list_routes().await
    }

    pub fn new_editor(&self) -> RouteEditor {
        RouteEditor::new().with_default_deadline(self.default_deadline_hours)
    }

    pub async fn open(&self, id: &RouteId) -> Result<RouteEditor, ApiError> {
        let route = self.api.get_route(id).await?;
        Ok(RouteEditor::from_route(route).with_default_deadline(self.default_deadline_hours))
    }

    /// Candidate approvers for one editing session.
    pub async fn load_approver_pool(&self) -> Result<ApproverPool, ApiError> {
        let users = self.api.search_users(None).await?;
        Ok(ApproverPool::new(users).with_limit(self.approver_search_limit))
    }

    /// Validates locally, then creates or updates. A route that fails
    /// validation is never sent. Concurrent edits are last-writer-wins.
    pub async fn save(&self, editor: &RouteEditor) -> Result<ApprovalRoute, SaveError> {
        let payload = match editor.to_payload() {
            Ok(payload) => payload,
            Err(error) => {
                info!(
                    event_name = "routes.save_refused",
                    route_id = editor.id().map(RouteId::as_str).unwrap_or("new"),
                    error = %error,
                    "route failed local validation"
                );
                return Err(error.into());
            }
        };

        let result = match editor.id() {
            Some(id) => self.api.update_route(id, &payload).await,
            None => self.api.create_route(&payload).await,
        };

        match result {
            Ok(route) => {
                info!(
                    event_name = "routes.saved",
                    route_id = route.id.as_ref().map(RouteId::as_str).unwrap_or("unknown"),
                    steps = route.steps.len(),
                    approvers = route.approver_count(),
                    created = editor.id().is_none(),
                    "approval route saved"
                );
                Ok(route)
            }
            Err(error) => {
                warn!(
                    event_name = "routes.save_failed",
                    route_id = editor.id().map(RouteId::as_str).unwrap_or("new"),
                    error = %error,
                    "approval route save failed"
                );
                Err(error.into())
            }
        }
    }

    pub async fn deactivate(&self, id: &RouteId) -> Result<(), ApiError> {
        self.api.deactivate_route(id).await?;
        info!(event_name = "routes.deactivated", route_id = %id, "approval route deactivated");
        Ok(())
    }
}
