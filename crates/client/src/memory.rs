//! Deterministic stand-in for the workflow backend.
//!
//! Keeps routes, documents, attempt histories and users in memory, records
//! every call, and can be told to fail the next call. Step advancement is
//! deliberately simple: one decision resolves a step.

use std::collections::HashMap;

use async_trait::async_trait;
use docflow_core::{
    ApprovalInstance, ApprovalRoute, Document, DocumentId, DocumentStatus, InstanceStatus,
    RouteId, RoutePayload, StepInstance, StepStatus, UserId, UserSummary,
};
use tokio::sync::RwLock;

use crate::api::{ApiError, WorkflowApi};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedCall {
    ListRoutes,
    GetRoute(RouteId),
    CreateRoute(RoutePayload),
    UpdateRoute(RouteId, RoutePayload),
    DeactivateRoute(RouteId),
    GetDocument(DocumentId),
    Submit { document_id: DocumentId, route_id: Option<RouteId> },
    Approve { document_id: DocumentId, comment: Option<String> },
    Reject { document_id: DocumentId, comment: Option<String> },
    Cancel(DocumentId),
    ApprovalStatus(DocumentId),
    ApprovalSheet(DocumentId),
    SearchUsers(Option<String>),
}

impl RecordedCall {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateRoute(_)
                | Self::UpdateRoute(..)
                | Self::DeactivateRoute(_)
                | Self::Submit { .. }
                | Self::Approve { .. }
                | Self::Reject { .. }
                | Self::Cancel(_)
        )
    }
}

#[derive(Default)]
struct BackendState {
    routes: Vec<(ApprovalRoute, bool)>,
    documents: HashMap<DocumentId, Document>,
    instances: HashMap<DocumentId, Vec<ApprovalInstance>>,
    sheets: HashMap<DocumentId, Vec<u8>>,
    users: Vec<UserSummary>,
    acting_user: Option<UserId>,
    next_failure: Option<ApiError>,
    route_listing_denied: bool,
    next_id: u64,
    calls: Vec<RecordedCall>,
}

#[derive(Default)]
pub struct InMemoryWorkflowApi {
    state: RwLock<BackendState>,
}

fn not_found(what: &str) -> ApiError {
    ApiError::Status { status: 404, message: format!("{what} not found") }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::Status { status: 400, message: message.into() }
}

impl InMemoryWorkflowApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, route: ApprovalRoute) -> Self {
        self.state.get_mut().routes.push((route, true));
        self
    }

    pub fn with_document(mut self, document: Document) -> Self {
        self.state.get_mut().documents.insert(document.id.clone(), document);
        self
    }

    pub fn with_instances(mut self, document_id: DocumentId, instances: Vec<ApprovalInstance>) -> Self {
        self.state.get_mut().instances.insert(document_id, instances);
        self
    }

    pub fn with_sheet(mut self, document_id: DocumentId, bytes: Vec<u8>) -> Self {
        self.state.get_mut().sheets.insert(document_id, bytes);
        self
    }

    pub fn with_users(mut self, users: Vec<UserSummary>) -> Self {
        self.state.get_mut().users = users;
        self
    }

    /// Whose pending slot `approve`/`reject` resolve. Without one, the first
    /// pending slot of the current step is used.
    pub fn with_acting_user(mut self, user_id: UserId) -> Self {
        self.state.get_mut().acting_user = Some(user_id);
        self
    }

    /// Makes `list_routes` answer 403, as it does for users without route
    /// administration rights.
    pub async fn deny_route_listing(&self, denied: bool) {
        self.state.write().await.route_listing_denied = denied;
    }

    pub async fn fail_next(&self, error: ApiError) {
        self.state.write().await.next_failure = Some(error);
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.state.read().await.calls.clone()
    }

    pub async fn mutation_count(&self) -> usize {
        self.state.read().await.calls.iter().filter(|call| call.is_mutation()).count()
    }

    pub async fn document(&self, id: &DocumentId) -> Option<Document> {
        self.state.read().await.documents.get(id).cloned()
    }

    pub async fn route(&self, id: &RouteId) -> Option<ApprovalRoute> {
        let state = self.state.read().await;
        state.routes.iter().find(|(route, _)| route.id.as_ref() == Some(id)).map(|(r, _)| r.clone())
    }

    async fn begin(&self, call: RecordedCall) -> Result<tokio::sync::RwLockWriteGuard<'_, BackendState>, ApiError> {
        let mut state = self.state.write().await;
        state.calls.push(call);
        match state.next_failure.take() {
            Some(error) => Err(error),
            None => Ok(state),
        }
    }
}

impl BackendState {
    fn document_mut(&mut self, id: &DocumentId) -> Result<&mut Document, ApiError> {
        self.documents.get_mut(id).ok_or_else(|| not_found("Document"))
    }

    fn active_route(&self, id: &RouteId) -> Option<&ApprovalRoute> {
        self.routes
            .iter()
            .find(|(route, active)| *active && route.id.as_ref() == Some(id))
            .map(|(route, _)| route)
    }

    fn allocate_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn open_attempt(&mut self, document_id: &DocumentId, route: &ApprovalRoute) {
        let attempt = self
            .instances
            .get(document_id)
            .and_then(|history| history.iter().map(|instance| instance.attempt).max())
            .unwrap_or(0)
            + 1;

        let mut step_instances = Vec::new();
        for step in &route.steps {
            for approver in &step.approvers {
                step_instances.push(StepInstance {
                    id: self.allocate_id("step-instance").into(),
                    step_order: step.order,
                    approver_id: approver.user_id.clone(),
                    approver_name: approver.name.clone(),
                    status: StepStatus::Pending,
                    decision_at: None,
                    comment: None,
                    deadline_at: None,
                    carry_over: false,
                });
            }
        }

        let instance = ApprovalInstance {
            id: self.allocate_id("instance").into(),
            attempt,
            status: InstanceStatus::InProgress,
            current_step_order: route.steps.first().map(|step| step.order),
            step_instances,
        };
        self.instances.entry(document_id.clone()).or_default().insert(0, instance);
    }

    fn decide(
        &mut self,
        document_id: &DocumentId,
        decision: StepStatus,
        comment: Option<&str>,
    ) -> Result<(), ApiError> {
        let status = self.document_mut(document_id)?.status.clone();
        if status != DocumentStatus::PendingApproval {
            return Err(bad_request(format!("Document is not pending approval (status: {status})")));
        }

        let acting_user = self.acting_user.clone();
        let instance = self
            .instances
            .get_mut(document_id)
            .and_then(|history| history.iter_mut().find(|instance| instance.is_active()))
            .ok_or_else(|| bad_request("No active approval for this document"))?;
        let current = instance.current_step_order;
        let slot = instance
            .step_instances
            .iter_mut()
            .filter(|step| Some(step.step_order) == current && step.is_pending())
            .find(|step| acting_user.as_ref().map_or(true, |user| &step.approver_id == user))
            .ok_or_else(|| bad_request("You are not an approver for the current step"))?;

        slot.status = decision.clone();
        slot.comment = comment.map(str::to_owned);
        slot.decision_at = Some(chrono::Utc::now());

        let next_status = if decision == StepStatus::Rejected {
            instance.status = InstanceStatus::Rejected;
            DocumentStatus::Rejected
        } else {
            let next_order = instance
                .step_instances
                .iter()
                .map(|step| step.step_order)
                .filter(|order| Some(*order) > current)
                .min();
            match next_order {
                Some(order) => {
                    instance.current_step_order = Some(order);
                    DocumentStatus::PendingApproval
                }
                None => {
                    instance.status = InstanceStatus::Approved;
                    DocumentStatus::Approved
                }
            }
        };

        self.document_mut(document_id)?.status = next_status;
        Ok(())
    }
}

#[async_trait]
impl WorkflowApi for InMemoryWorkflowApi {
    async fn list_routes(&self) -> Result<Vec<ApprovalRoute>, ApiError> {
        let state = self.begin(RecordedCall::ListRoutes).await?;
        if state.route_listing_denied {
            return Err(ApiError::Status { status: 403, message: "Forbidden".to_owned() });
        }
        Ok(state.routes.iter().filter(|(_, active)| *active).map(|(r, _)| r.clone()).collect())
    }

    async fn get_route(&self, id: &RouteId) -> Result<ApprovalRoute, ApiError> {
        let state = self.begin(RecordedCall::GetRoute(id.clone())).await?;
        state.active_route(id).cloned().ok_or_else(|| not_found("Approval route"))
    }

    async fn create_route(&self, payload: &RoutePayload) -> Result<ApprovalRoute, ApiError> {
        let mut state = self.begin(RecordedCall::CreateRoute(payload.clone())).await?;
        let route = ApprovalRoute {
            id: Some(state.allocate_id("route").into()),
            name: payload.name.clone(),
            description: payload.description.clone(),
            steps: payload.steps.clone(),
        };
        state.routes.push((route.clone(), true));
        Ok(route)
    }

    async fn update_route(
        &self,
        id: &RouteId,
        payload: &RoutePayload,
    ) -> Result<ApprovalRoute, ApiError> {
        let mut state = self.begin(RecordedCall::UpdateRoute(id.clone(), payload.clone())).await?;
        let (route, _) = state
            .routes
            .iter_mut()
            .find(|(route, active)| *active && route.id.as_ref() == Some(id))
            .ok_or_else(|| not_found("Approval route"))?;
        route.name = payload.name.clone();
        route.description = payload.description.clone();
        route.steps = payload.steps.clone();
        Ok(route.clone())
    }

    async fn deactivate_route(&self, id: &RouteId) -> Result<(), ApiError> {
        let mut state = self.begin(RecordedCall::DeactivateRoute(id.clone())).await?;
        let (_, active) = state
            .routes
            .iter_mut()
            .find(|(route, active)| *active && route.id.as_ref() == Some(id))
            .ok_or_else(|| not_found("Approval route"))?;
        *active = false;
        Ok(())
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Document, ApiError> {
        let state = self.begin(RecordedCall::GetDocument(id.clone())).await?;
        state.documents.get(id).cloned().ok_or_else(|| not_found("Document"))
    }

    async fn submit(&self, id: &DocumentId, route_id: Option<&RouteId>) -> Result<(), ApiError> {
        let mut state = self
            .begin(RecordedCall::Submit { document_id: id.clone(), route_id: route_id.cloned() })
            .await?;

        let document = state.document_mut(id)?;
        if !matches!(document.status, DocumentStatus::Draft | DocumentStatus::Rejected) {
            return Err(bad_request(format!(
                "Document cannot be submitted in status {}",
                document.status
            )));
        }
        let chosen = route_id
            .cloned()
            .or_else(|| document.approval_route_id.clone())
            .ok_or_else(|| bad_request("Approval route is required"))?;

        let route = state.active_route(&chosen).cloned().ok_or_else(|| not_found("Approval route"))?;
        let document = state.document_mut(id)?;
        document.approval_route_id = Some(chosen);
        document.status = DocumentStatus::PendingApproval;
        state.open_attempt(id, &route);
        Ok(())
    }

    async fn approve(&self, id: &DocumentId, comment: Option<&str>) -> Result<(), ApiError> {
        let mut state = self
            .begin(RecordedCall::Approve {
                document_id: id.clone(),
                comment: comment.map(str::to_owned),
            })
            .await?;
        state.decide(id, StepStatus::Approved, comment)
    }

    async fn reject(&self, id: &DocumentId, comment: Option<&str>) -> Result<(), ApiError> {
        let mut state = self
            .begin(RecordedCall::Reject {
                document_id: id.clone(),
                comment: comment.map(str::to_owned),
            })
            .await?;
        state.decide(id, StepStatus::Rejected, comment)
    }

    async fn cancel(&self, id: &DocumentId) -> Result<(), ApiError> {
        let mut state = self.begin(RecordedCall::Cancel(id.clone())).await?;
        let document = state.document_mut(id)?;
        if document.status.is_terminal() {
            return Err(bad_request(format!(
                "Document cannot be cancelled in status {}",
                document.status
            )));
        }
        document.status = DocumentStatus::Cancelled;
        Ok(())
    }

    async fn approval_status(&self, id: &DocumentId) -> Result<Vec<ApprovalInstance>, ApiError> {
        let state = self.begin(RecordedCall::ApprovalStatus(id.clone())).await?;
        if !state.documents.contains_key(id) {
            return Err(not_found("Document"));
        }
        Ok(state.instances.get(id).cloned().unwrap_or_default())
    }

    async fn approval_sheet(&self, id: &DocumentId) -> Result<Vec<u8>, ApiError> {
        let state = self.begin(RecordedCall::ApprovalSheet(id.clone())).await?;
        state.sheets.get(id).cloned().ok_or_else(|| not_found("Approval sheet"))
    }

    async fn search_users(&self, query: Option<&str>) -> Result<Vec<UserSummary>, ApiError> {
        let state = self.begin(RecordedCall::SearchUsers(query.map(str::to_owned))).await?;
        let needle = query.map(|query| query.trim().to_lowercase()).unwrap_or_default();
        Ok(state
            .users
            .iter()
            .filter(|user| needle.is_empty() || user.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }
}
