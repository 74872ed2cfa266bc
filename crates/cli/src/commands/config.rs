use std::env;
use std::fs;
use std::path::PathBuf;

use docflow_core::config::{locate_file, AppConfig, LoadOptions, ENV_OVERRIDES};
use secrecy::ExposeSecret;
use serde::Serialize;
use toml::Value;

use crate::commands::context::config_failure;
use crate::commands::CommandResult;

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(options: LoadOptions) -> CommandResult {
    let file_path = locate_file(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return config_failure("config", &error),
    };
    let file = file_path.and_then(|path| {
        let doc = fs::read_to_string(&path).ok()?.parse::<Value>().ok()?;
        Some((path, doc))
    });

    let entries: Vec<ConfigEntry> = ENV_OVERRIDES
        .into_iter()
        .map(|(key, env_keys)| ConfigEntry {
            key,
            value: display_value(&config, key),
            source: field_source(key, env_keys, file.as_ref()),
        })
        .collect();

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    lines.extend(
        entries.iter().map(|entry| format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)),
    );

    CommandResult::success_with_data("config", lines.join("\n"), entries)
}

fn display_value(config: &AppConfig, key: &str) -> String {
    let unset = || "<unset>".to_owned();
    match key {
        "api.base_url" => config.api.base_url.clone(),
        "api.timeout_secs" => config.api.timeout_secs.to_string(),
        "auth.token" => config
            .auth
            .token
            .as_ref()
            .map(|token| redact_token(token.expose_secret()))
            .unwrap_or_else(unset),
        "auth.token_file" => config
            .auth
            .token_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(unset),
        "approvals.default_deadline_hours" => config.approvals.default_deadline_hours.to_string(),
        "approvals.approver_search_limit" => config.approvals.approver_search_limit.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format).to_lowercase(),
        _ => unset(),
    }
}

/// Command-line flags are not visible here, so a flag that shadows an env
/// variable is still reported as `env`.
fn field_source(key: &str, env_keys: &[&str], file: Option<&(PathBuf, Value)>) -> String {
    let from_env = env_keys
        .iter()
        .find(|name| env::var(name).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(name) = from_env {
        return format!("env ({name})");
    }

    match file {
        Some((path, doc)) if has_key(doc, key) => format!("file ({})", path.display()),
        _ => "default".to_owned(),
    }
}

fn has_key(doc: &Value, dotted: &str) -> bool {
    dotted.split('.').try_fold(doc, |node, part| node.get(part)).is_some()
}

/// Keeps the start of the JWT header segment and hides the claims and
/// signature.
fn redact_token(token: &str) -> String {
    let token = token.trim();
    if token.is_empty() {
        return "<empty>".to_owned();
    }

    token
        .split_once('.')
        .and_then(|(header, _)| header.get(..4))
        .map_or_else(|| "<redacted>".to_owned(), |prefix| format!("{prefix}***"))
}
