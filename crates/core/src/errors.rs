use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::document::{DocumentEvent, DocumentStatus};
use crate::domain::route::RouteValidationError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("document in status `{from}` cannot accept {event:?}")]
    InvalidDocumentTransition { from: DocumentStatus, event: DocumentEvent },
    #[error(transparent)]
    RouteValidation(#[from] RouteValidationError),
}

/// Failures of a use case, before they are shaped for an operator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// The backend refused the request; the text is its own detail.
    #[error("backend refused the request: {0}")]
    Rejected(String),
    #[error("backend unreachable or misbehaving: {0}")]
    Integration(String),
    #[error("configuration problem: {0}")]
    Configuration(String),
}

/// How an operator-facing error is classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    Rejected,
    Unavailable,
    Internal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Rejected => "rejected",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An [`ApplicationError`] ready to show, tagged with the id of the request
/// that produced it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{class}: {detail}")]
pub struct InterfaceError {
    pub class: ErrorClass,
    pub detail: String,
    pub correlation_id: String,
}

impl InterfaceError {
    /// Validation and backend refusals are shown as they are. Transport
    /// and internal failures get a fixed sentence; `detail` keeps the cause.
    pub fn user_message(&self) -> &str {
        match self.class {
            ErrorClass::Validation | ErrorClass::Rejected => &self.detail,
            ErrorClass::Unavailable => {
                "The service is temporarily unavailable. Try the action again."
            }
            ErrorClass::Internal => "An unexpected internal error occurred.",
        }
    }
}

impl ApplicationError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Domain(_) => ErrorClass::Validation,
            Self::Rejected(_) => ErrorClass::Rejected,
            Self::Integration(_) => ErrorClass::Unavailable,
            Self::Configuration(_) => ErrorClass::Internal,
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let class = self.class();
        let detail = match self {
            Self::Domain(DomainError::RouteValidation(error)) => error.user_message(),
            Self::Domain(error) => error.to_string(),
            Self::Rejected(detail) | Self::Integration(detail) | Self::Configuration(detail) => {
                detail
            }
        };
        InterfaceError { class, detail, correlation_id: correlation_id.into() }
    }
}
