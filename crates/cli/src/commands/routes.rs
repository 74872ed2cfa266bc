use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use docflow_client::{HttpWorkflowApi, RouteService};
use docflow_core::config::LoadOptions;
use docflow_core::{ApprovalRoute, RouteEditor, RouteId, RouteStep};
use serde::Serialize;

use crate::commands::context::CommandContext;
use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct RouteSummary {
    id: Option<String>,
    name: String,
    steps: usize,
    approvers: usize,
}

impl From<&ApprovalRoute> for RouteSummary {
    fn from(route: &ApprovalRoute) -> Self {
        Self {
            id: route.id.as_ref().map(ToString::to_string),
            name: route.name.clone(),
            steps: route.steps.len(),
            approvers: route.approver_count(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RouteDetail {
    id: String,
    name: String,
    description: Option<String>,
    steps: Vec<RouteStep>,
}

fn service(context: &CommandContext) -> RouteService<HttpWorkflowApi> {
    RouteService::new(Arc::clone(&context.api)).with_settings(&context.config.approvals)
}

fn read_route_file(path: &Path) -> anyhow::Result<ApprovalRoute> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read route file `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("route file `{}` is not a valid route", path.display()))
}

pub fn list(options: LoadOptions) -> CommandResult {
    let context = match CommandContext::load("routes.list", options) {
        Ok(context) => context,
        Err(result) => return result,
    };

    match context.block_on(service(&context).list()) {
        Ok(routes) => {
            let summaries: Vec<RouteSummary> = routes.iter().map(RouteSummary::from).collect();
            CommandResult::success_with_data(
                "routes.list",
                format!("{} active route(s)", summaries.len()),
                summaries,
            )
        }
        Err(error) => CommandResult::from_error("routes.list", error),
    }
}

pub fn show(options: LoadOptions, id: &str) -> CommandResult {
    let context = match CommandContext::load("routes.show", options) {
        Ok(context) => context,
        Err(result) => return result,
    };

    match context.block_on(service(&context).open(&RouteId::from(id))) {
        Ok(editor) => {
            let detail = RouteDetail {
                id: id.to_owned(),
                name: editor.name().to_owned(),
                description: editor.description().map(str::to_owned),
                steps: editor.steps().cloned().collect(),
            };
            CommandResult::success_with_data("routes.show", detail.name.clone(), detail)
        }
        Err(error) => CommandResult::from_error("routes.show", error),
    }
}

/// Creates a route from a JSON file, or replaces route `id` with it.
pub fn save(options: LoadOptions, id: Option<&str>, file: &Path) -> CommandResult {
    let command = if id.is_some() { "routes.update" } else { "routes.create" };
    let mut route = match read_route_file(file) {
        Ok(route) => route,
        Err(error) => return CommandResult::failure(command, "input", format!("{error:#}"), 2),
    };
    route.id = id.map(RouteId::from);

    let context = match CommandContext::load(command, options) {
        Ok(context) => context,
        Err(result) => return result,
    };
    let editor = RouteEditor::from_route(route)
        .with_default_deadline(context.config.approvals.default_deadline_hours);

    match context.block_on(service(&context).save(&editor)) {
        Ok(saved) => CommandResult::success_with_data(
            command,
            format!("route `{}` saved", saved.name),
            RouteSummary::from(&saved),
        ),
        Err(error) => CommandResult::from_error(command, error),
    }
}

pub fn delete(options: LoadOptions, id: &str) -> CommandResult {
    let context = match CommandContext::load("routes.delete", options) {
        Ok(context) => context,
        Err(result) => return result,
    };

    match context.block_on(service(&context).deactivate(&RouteId::from(id))) {
        Ok(()) => CommandResult::success("routes.delete", format!("route {id} deactivated")),
        Err(error) => CommandResult::from_error("routes.delete", error),
    }
}
