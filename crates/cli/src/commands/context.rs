use std::future::Future;
use std::sync::Arc;

use docflow_client::HttpWorkflowApi;
use docflow_core::config::{AppConfig, ConfigError, LoadOptions};
use docflow_core::Session;
use tokio::runtime::Runtime;

use crate::commands::CommandResult;

/// Everything a backend-facing command needs: validated config, the
/// signed-in session, an HTTP client and a single-threaded runtime.
pub struct CommandContext {
    pub config: AppConfig,
    pub session: Session,
    pub api: Arc<HttpWorkflowApi>,
    runtime: Runtime,
}

impl CommandContext {
    pub fn load(command: &str, options: LoadOptions) -> Result<Self, CommandResult> {
        let config = AppConfig::load(options).map_err(|error| config_failure(command, &error))?;

        let token = config.auth.resolve_token().map_err(|error| {
            CommandResult::failure(command, "auth", format!("authentication issue: {error}"), 2)
        })?;
        let session = Session::from_token(token).map_err(|error| {
            CommandResult::failure(command, "auth", format!("access token rejected: {error}"), 2)
        })?;

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
            |error| {
                CommandResult::failure(
                    command,
                    "runtime_init",
                    format!("failed to initialize async runtime: {error}"),
                    3,
                )
            },
        )?;

        let api = Arc::new(HttpWorkflowApi::from_config(&config.api, &session));
        Ok(Self { config, session, api, runtime })
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

pub(crate) fn config_failure(command: &str, error: &ConfigError) -> CommandResult {
    CommandResult::failure(command, "config_validation", format!("configuration issue: {error}"), 2)
}
