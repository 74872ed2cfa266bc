//! REST client and action layer for the document-approval workflow.

pub mod api;
pub mod dispatcher;
pub mod http;
pub mod memory;
pub mod routes;
pub mod view;

pub use api::{ApiError, WorkflowApi};
pub use dispatcher::{
    ActionDispatcher, ApprovalSheet, Confirmation, DispatchError, DispatchOutcome,
};
pub use http::HttpWorkflowApi;
pub use memory::{InMemoryWorkflowApi, RecordedCall};
pub use routes::{RouteService, SaveError};
pub use view::{DocumentApprovalView, DocumentSnapshot};
