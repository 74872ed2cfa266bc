use std::time::Duration;

use async_trait::async_trait;
use docflow_core::config::ApiConfig;
use docflow_core::{
    ApprovalInstance, ApprovalRoute, Document, DocumentId, RouteId, RoutePayload, Session,
    UserSummary,
};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::api::{ApiError, WorkflowApi};

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    route_id: Option<&'a RouteId>,
}

#[derive(Debug, Serialize)]
struct DecisionBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

/// `reqwest` implementation of [`WorkflowApi`]. Every request carries the
/// session's bearer token.
#[derive(Clone, Debug)]
pub struct HttpWorkflowApi {
    client: Client,
    base_url: String,
    token: SecretString,
    timeout: Duration,
}

impl HttpWorkflowApi {
    pub fn new(base_url: impl Into<String>, token: SecretString, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self { client: Client::new(), base_url, token, timeout }
    }

    pub fn from_config(config: &ApiConfig, session: &Session) -> Self {
        Self::new(
            config.base_url.clone(),
            session.token().clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .bearer_auth(self.token.expose_secret())
            .timeout(self.timeout)
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<Response, ApiError> {
        debug!(event_name = "api.request", operation, "sending request");

        let response = builder.send().await.map_err(|error| {
            warn!(event_name = "api.request_failed", operation, error = %error, "request failed");
            if error.is_timeout() {
                ApiError::Timeout
            } else {
                ApiError::Transport(error.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = extract_error_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_owned());
        warn!(
            event_name = "api.request_rejected",
            operation,
            status = status.as_u16(),
            message = %message,
            "backend rejected request"
        );
        Err(ApiError::Status { status: status.as_u16(), message })
    }

    async fn json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<T, ApiError> {
        let response = self.send(builder, operation).await?;
        response.json::<T>().await.map_err(|error| ApiError::Decode(error.to_string()))
    }

    async fn empty(
        &self,
        builder: RequestBuilder,
        operation: &'static str,
    ) -> Result<(), ApiError> {
        self.send(builder, operation).await.map(|_| ())
    }
}

/// Ids are percent-encoded so `/`, `?` or `#` inside one stay in its
/// path segment.
fn route_path(id: &RouteId) -> String {
    format!("approval-routes/{}", encode(id.as_str()))
}

fn document_path(id: &DocumentId, action: &str) -> String {
    let base = format!("documents/{}", encode(id.as_str()));
    if action.is_empty() {
        base
    } else {
        format!("{base}/{action}")
    }
}

/// Pulls the human-readable message out of an error body. Understands
/// `{"detail": "..."}`, `{"detail": [{"msg": "..."}]}`, `{"message": "..."}`
/// and `{"error": "..."}`; any other non-empty body is returned as is.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_owned());
    };

    for key in ["detail", "message", "error"] {
        match value.get(key) {
            Some(Value::String(message)) if !message.trim().is_empty() => {
                return Some(message.clone());
            }
            Some(Value::Array(items)) => {
                let messages: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !messages.is_empty() {
                    return Some(messages.join("; "));
                }
            }
            _ => {}
        }
    }

    Some(trimmed.to_owned())
}

#[async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn list_routes(&self) -> Result<Vec<ApprovalRoute>, ApiError> {
        self.json(self.request(Method::GET, "approval-routes"), "routes.list").await
    }

    async fn get_route(&self, id: &RouteId) -> Result<ApprovalRoute, ApiError> {
        self.json(self.request(Method::GET, &route_path(id)), "routes.get").await
    }

    async fn create_route(&self, payload: &RoutePayload) -> Result<ApprovalRoute, ApiError> {
        self.json(self.request(Method::POST, "approval-routes").json(payload), "routes.create")
            .await
    }

    async fn update_route(
        &self,
        id: &RouteId,
        payload: &RoutePayload,
    ) -> Result<ApprovalRoute, ApiError> {
        self.json(self.request(Method::PATCH, &route_path(id)).json(payload), "routes.update")
            .await
    }

    async fn deactivate_route(&self, id: &RouteId) -> Result<(), ApiError> {
        self.empty(self.request(Method::DELETE, &route_path(id)), "routes.delete").await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Document, ApiError> {
        self.json(self.request(Method::GET, &document_path(id, "")), "documents.get").await
    }

    async fn submit(&self, id: &DocumentId, route_id: Option<&RouteId>) -> Result<(), ApiError> {
        self.empty(
            self.request(Method::POST, &document_path(id, "submit"))
                .json(&SubmitBody { route_id }),
            "documents.submit",
        )
        .await
    }

    async fn approve(&self, id: &DocumentId, comment: Option<&str>) -> Result<(), ApiError> {
        self.empty(
            self.request(Method::POST, &document_path(id, "approve"))
                .json(&DecisionBody { comment }),
            "documents.approve",
        )
        .await
    }

    async fn reject(&self, id: &DocumentId, comment: Option<&str>) -> Result<(), ApiError> {
        self.empty(
            self.request(Method::POST, &document_path(id, "reject"))
                .json(&DecisionBody { comment }),
            "documents.reject",
        )
        .await
    }

    async fn cancel(&self, id: &DocumentId) -> Result<(), ApiError> {
        self.empty(self.request(Method::POST, &document_path(id, "cancel")), "documents.cancel")
            .await
    }

    async fn approval_status(&self, id: &DocumentId) -> Result<Vec<ApprovalInstance>, ApiError> {
        self.json(
            self.request(Method::GET, &document_path(id, "approval-status")),
            "documents.approval_status",
        )
        .await
    }

    async fn approval_sheet(&self, id: &DocumentId) -> Result<Vec<u8>, ApiError> {
        let response = self
            .send(
                self.request(Method::GET, &document_path(id, "approval-sheet")),
                "documents.approval_sheet",
            )
            .await?;
        let bytes = response.bytes().await.map_err(|error| ApiError::Decode(error.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn search_users(&self, query: Option<&str>) -> Result<Vec<UserSummary>, ApiError> {
        let mut builder = self.request(Method::GET, "users");
        if let Some(query) = query.map(str::trim).filter(|query| !query.is_empty()) {
            builder = builder.query(&[("search", query)]);
        }
        self.json(builder, "users.search").await
    }
}
