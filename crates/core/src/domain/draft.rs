use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const INPUT_DATE_FORMAT: &str = "%Y-%m-%d";
const FORM_DATE_FORMAT: &str = "%d.%m.%Y";

/// Document creation form, checked before the upload call is made.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub title: String,
    pub file_name: Option<String>,
    pub due_date: Option<String>,
    pub description: Option<String>,
}

/// Field values as the backend form expects them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DocumentForm {
    pub title: String,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DraftValidationError {
    #[error("document title is required")]
    MissingTitle,
    #[error("document file is required")]
    MissingFile,
    #[error("invalid date `{value}` (expected YYYY-MM-DD)")]
    InvalidDate { value: String },
}

impl DocumentDraft {
    pub fn validate(&self) -> Result<(), DraftValidationError> {
        self.to_form().map(|_| ())
    }

    pub fn to_form(&self) -> Result<DocumentForm, DraftValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DraftValidationError::MissingTitle);
        }

        let file_name = self
            .file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(DraftValidationError::MissingFile)?;

        let due_date = self
            .due_date
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(reformat_date)
            .transpose()?;

        Ok(DocumentForm {
            title: title.to_owned(),
            file_name: file_name.to_owned(),
            due_date,
            description: self
                .description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned),
        })
    }
}

/// `YYYY-MM-DD` to `DD.MM.YYYY`. One direction only.
pub fn reformat_date(value: &str) -> Result<String, DraftValidationError> {
    NaiveDate::parse_from_str(value, INPUT_DATE_FORMAT)
        .map(|date| date.format(FORM_DATE_FORMAT).to_string())
        .map_err(|_| DraftValidationError::InvalidDate { value: value.to_owned() })
}
