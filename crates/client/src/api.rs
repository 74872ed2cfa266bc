use async_trait::async_trait;
use docflow_core::{
    ApplicationError, ApprovalInstance, ApprovalRoute, Document, DocumentId, RouteId,
    RoutePayload, UserSummary,
};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    /// Non-success response; `message` is the backend's own wording.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("response could not be decoded: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<ApiError> for ApplicationError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Status { message, .. } => Self::Rejected(message),
            other => Self::Integration(other.to_string()),
        }
    }
}

/// The document-workflow REST backend. One method per endpoint; no method
/// retries.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    async fn list_routes(&self) -> Result<Vec<ApprovalRoute>, ApiError>;

    async fn get_route(&self, id: &RouteId) -> Result<ApprovalRoute, ApiError>;

    async fn create_route(&self, payload: &RoutePayload) -> Result<ApprovalRoute, ApiError>;

    async fn update_route(
        &self,
        id: &RouteId,
        payload: &RoutePayload,
    ) -> Result<ApprovalRoute, ApiError>;

    /// Soft delete: the route stops being offered but history keeps it.
    async fn deactivate_route(&self, id: &RouteId) -> Result<(), ApiError>;

    async fn get_document(&self, id: &DocumentId) -> Result<Document, ApiError>;

    async fn submit(&self, id: &DocumentId, route_id: Option<&RouteId>) -> Result<(), ApiError>;

    async fn approve(&self, id: &DocumentId, comment: Option<&str>) -> Result<(), ApiError>;

    async fn reject(&self, id: &DocumentId, comment: Option<&str>) -> Result<(), ApiError>;

    async fn cancel(&self, id: &DocumentId) -> Result<(), ApiError>;

    /// Attempt history, newest attempt first.
    async fn approval_status(&self, id: &DocumentId) -> Result<Vec<ApprovalInstance>, ApiError>;

    async fn approval_sheet(&self, id: &DocumentId) -> Result<Vec<u8>, ApiError>;

    async fn search_users(&self, query: Option<&str>) -> Result<Vec<UserSummary>, ApiError>;
}
