//! Records exchanged with the document-workflow backend.
//!
//! Identifiers are opaque: the backend may send them as JSON strings or
//! integers, the client always carries them as strings. Status-like fields
//! are closed enums with a catch-all variant holding the raw wire value, so
//! a newer backend never breaks deserialization and the value survives a
//! round trip unchanged.

use serde::Deserialize;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(from = "crate::domain::RawId")]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<crate::domain::RawId> for $name {
            fn from(raw: crate::domain::RawId) -> Self {
                Self(raw.into_string())
            }
        }
    };
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $fallback:ident { $($variant:ident => $wire:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            $fallback(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::$fallback(raw) => raw.as_str(),
                }
            }

            pub fn is_recognized(&self) -> bool {
                !matches!(self, Self::$fallback(_))
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::$fallback(raw),
                }
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::from(raw.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_owned()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod approval;
pub mod document;
pub mod draft;
pub mod route;
pub mod timestamp;
pub mod user;

#[doc(hidden)]
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Integer(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            Self::Text(value) => value,
            Self::Integer(value) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::route::{RouteId, StepType};

    #[test]
    fn ids_accept_strings_and_integers() {
        let from_text: RouteId = serde_json::from_str("\"r-1\"").expect("string id");
        let from_number: RouteId = serde_json::from_str("42").expect("integer id");

        assert_eq!(from_text, RouteId::from("r-1"));
        assert_eq!(from_number, RouteId::from("42"));
        assert_eq!(serde_json::to_string(&from_number).expect("serialize"), "\"42\"");
    }

    #[test]
    fn unknown_wire_values_survive_round_trip() {
        let parsed: StepType = serde_json::from_str("\"quorum\"").expect("unknown step type");
        assert_eq!(parsed, StepType::Other("quorum".to_owned()));
        assert!(!parsed.is_recognized());
        assert_eq!(serde_json::to_string(&parsed).expect("serialize"), "\"quorum\"");
    }
}
