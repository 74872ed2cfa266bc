use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use docflow_client::{
    ActionDispatcher, Confirmation, DispatchError, DocumentApprovalView, DocumentSnapshot,
};
use docflow_core::config::LoadOptions;
use docflow_core::{ApprovalAction, AuditEvent, AuditSink, RouteId, TimelineView};
use serde::Serialize;
use tracing::info;

use crate::commands::context::CommandContext;
use crate::commands::CommandResult;

/// Writes audit events to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: AuditEvent) {
        info!(
            event_name = "audit.recorded",
            audit_event = %event.event_type,
            outcome = ?event.outcome,
            correlation_id = %event.context.correlation_id,
            document_id = event.context.document_id.as_ref().map(|id| id.as_str()).unwrap_or("unknown"),
            actor = %event.context.actor,
            "audit event"
        );
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentAction {
    Submit { route_id: Option<String> },
    Approve { comment: Option<String> },
    Reject { comment: Option<String> },
    Cancel { confirmed: bool },
}

impl DocumentAction {
    fn command(&self) -> &'static str {
        match self {
            Self::Submit { .. } => "submit",
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Cancel { .. } => "cancel",
        }
    }
}

#[derive(Debug, Serialize)]
struct ActionSummary {
    #[serde(flatten)]
    action: ApprovalAction,
    label: &'static str,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    document_id: String,
    title: String,
    status: String,
    status_label: String,
    route_id: Option<String>,
    actions: Vec<ActionSummary>,
    timeline: TimelineView,
}

fn report(snapshot: &DocumentSnapshot, context: &CommandContext) -> StatusReport {
    let document = &snapshot.document;
    StatusReport {
        document_id: document.id.to_string(),
        title: document.title.clone(),
        status: document.status.to_string(),
        status_label: document.status.label().to_owned(),
        route_id: document.approval_route_id.as_ref().map(ToString::to_string),
        actions: snapshot
            .available_actions(&context.session)
            .into_iter()
            .map(|action| ActionSummary { label: action.label(), action })
            .collect(),
        timeline: snapshot.timeline(Utc::now()),
    }
}

pub fn status(options: LoadOptions, document_id: &str) -> CommandResult {
    let context = match CommandContext::load("status", options) {
        Ok(context) => context,
        Err(result) => return result,
    };

    let mut view = DocumentApprovalView::new(Arc::clone(&context.api), document_id.into());
    let loaded = context.block_on(async { view.refresh().await.cloned() });
    match loaded {
        Ok(snapshot) => {
            let report = report(&snapshot, &context);
            let message = report.timeline.render_text();
            CommandResult::success_with_data("status", message, report)
        }
        Err(error) => CommandResult::from_error("status", error),
    }
}

pub fn run_action(options: LoadOptions, document_id: &str, action: DocumentAction) -> CommandResult {
    let command = action.command();
    let context = match CommandContext::load(command, options) {
        Ok(context) => context,
        Err(result) => return result,
    };
    let dispatcher = ActionDispatcher::new(Arc::clone(&context.api), context.session.clone())
        .with_audit_sink(Arc::new(TracingAuditSink));
    let mut view = DocumentApprovalView::new(Arc::clone(&context.api), document_id.into());

    let result = context.block_on(async {
        let snapshot = view.refresh().await.map_err(DispatchError::from)?.clone();
        match action {
            DocumentAction::Submit { route_id } => {
                dispatcher.submit(&snapshot, route_id.map(RouteId::from)).await?
            }
            DocumentAction::Approve { comment } => dispatcher.approve(&snapshot, comment).await?,
            DocumentAction::Reject { comment } => dispatcher.reject(&snapshot, comment).await?,
            DocumentAction::Cancel { confirmed } => {
                dispatcher.cancel(&snapshot, Confirmation::from(confirmed)).await?
            }
        };
        // Local state is never patched; reload to learn the outcome.
        let reloaded = view.refresh().await.cloned().ok();
        Ok::<_, DispatchError>(reloaded.unwrap_or(snapshot))
    });

    match result {
        Ok(snapshot) => {
            let report = report(&snapshot, &context);
            let message = format!("{command} accepted; document is now {}", report.status_label);
            CommandResult::success_with_data(command, message, report)
        }
        Err(DispatchError::ConfirmationRequired) => CommandResult::failure(
            command,
            "confirmation_required",
            "cancelling a document is irreversible; re-run with --yes to confirm",
            5,
        ),
        Err(DispatchError::RouteSelectionRequired) => CommandResult::failure(
            command,
            "route_required",
            "this document has no approval route; pass --route <id>",
            5,
        ),
        Err(error) => CommandResult::from_error(command, error),
    }
}

#[derive(Debug, Serialize)]
struct SheetReport {
    document_id: String,
    path: String,
    bytes: usize,
}

pub fn sheet(options: LoadOptions, document_id: &str, out: Option<PathBuf>) -> CommandResult {
    let context = match CommandContext::load("sheet", options) {
        Ok(context) => context,
        Err(result) => return result,
    };
    let dispatcher = ActionDispatcher::new(Arc::clone(&context.api), context.session.clone());
    let mut view = DocumentApprovalView::new(Arc::clone(&context.api), document_id.into());

    let downloaded = context.block_on(async {
        let snapshot = view.refresh().await.map_err(DispatchError::from)?.clone();
        dispatcher.download_sheet(&snapshot).await
    });
    let sheet = match downloaded {
        Ok(sheet) => sheet,
        Err(error) => return CommandResult::from_error("sheet", error),
    };

    let path = out.unwrap_or_else(|| PathBuf::from(&sheet.file_name));
    if let Err(error) = fs::write(&path, &sheet.bytes) {
        return CommandResult::failure(
            "sheet",
            "io",
            format!("could not write `{}`: {error}", path.display()),
            6,
        );
    }

    CommandResult::success_with_data(
        "sheet",
        format!("approval sheet saved to {}", path.display()),
        SheetReport {
            document_id: sheet.document_id.to_string(),
            path: path.display().to_string(),
            bytes: sheet.bytes.len(),
        },
    )
}
