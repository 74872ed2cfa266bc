use serde::{Deserialize, Serialize};

use crate::domain::route::Approver;

opaque_id!(UserId);

/// One entry of the `GET /users` candidate pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserSummary {
    /// `needle` must already be lowercased.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.full_name.to_lowercase().contains(needle)
            || self.email.as_deref().is_some_and(|email| email.to_lowercase().contains(needle))
    }

    pub fn to_approver(&self) -> Approver {
        Approver { user_id: self.id.clone(), name: self.full_name.clone() }
    }
}
