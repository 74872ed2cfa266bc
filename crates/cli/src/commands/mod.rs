pub mod config;
pub mod context;
pub mod document;
pub mod routes;

use docflow_core::{ApplicationError, ErrorClass};
use serde::Serialize;
use serde_json::{json, Value};

/// What a command prints (one JSON object on stdout) and how the process
/// exits.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct Payload<'a> {
    command: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Payload<'_> {
    fn finish(self, exit_code: u8) -> CommandResult {
        let output = serde_json::to_string(&self).unwrap_or_else(|error| {
            json!({
                "command": self.command,
                "status": "error",
                "error_class": "serialization",
                "message": error.to_string(),
            })
            .to_string()
        });
        CommandResult { exit_code, output }
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Payload { command, status: "ok", error_class: None, message: message.into(), data: None }
            .finish(0)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: impl Serialize,
    ) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Payload {
                command,
                status: "ok",
                error_class: None,
                message: message.into(),
                data: Some(data),
            }
            .finish(0),
            Err(error) => Self::failure(command, "serialization", error.to_string(), 6),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Payload {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
            data: None,
        }
        .finish(exit_code)
    }

    /// Maps a layered error onto the user-facing message and exit code.
    /// Backend rejections keep the backend's wording.
    pub fn from_error(command: &str, error: impl Into<ApplicationError>) -> Self {
        let interface = error.into().into_interface(command);
        let (exit_code, message) = match interface.class {
            ErrorClass::Validation | ErrorClass::Rejected => (5, interface.user_message().to_owned()),
            ErrorClass::Unavailable => {
                (4, format!("{} ({})", interface.user_message(), interface.detail))
            }
            ErrorClass::Internal => (6, interface.user_message().to_owned()),
        };
        Self::failure(command, interface.class.as_str(), message, exit_code)
    }
}

#[cfg(test)]
mod tests {
    use docflow_core::{ApplicationError, DomainError, RouteValidationError};
    use serde_json::Value;

    use super::CommandResult;

    fn payload(result: &CommandResult) -> Value {
        serde_json::from_str(&result.output).expect("json output")
    }

    #[test]
    fn backend_rejections_keep_their_wording() {
        let result = CommandResult::from_error(
            "approve",
            ApplicationError::Rejected("Document is not pending approval".to_owned()),
        );

        assert_eq!(result.exit_code, 5);
        let payload = payload(&result);
        assert_eq!(payload["error_class"], "rejected");
        assert_eq!(payload["message"], "Document is not pending approval");
    }

    #[test]
    fn route_validation_is_reported_as_validation() {
        let result = CommandResult::from_error(
            "routes.create",
            DomainError::from(RouteValidationError::NoSteps),
        );

        let payload = payload(&result);
        assert_eq!(payload["error_class"], "validation");
        assert_eq!(payload["message"], "Add at least one approval step.");
    }

    #[test]
    fn success_payload_carries_data_only_when_present() {
        let plain = payload(&CommandResult::success("cancel", "done"));
        assert!(plain.get("data").is_none());

        let with_data = payload(&CommandResult::success_with_data("routes.list", "1 route", [1, 2]));
        assert_eq!(with_data["data"], serde_json::json!([1, 2]));
    }
}
