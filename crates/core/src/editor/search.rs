use crate::domain::user::UserSummary;

pub const APPROVER_SEARCH_LIMIT: usize = 5;

/// Snapshot of the user directory, fetched once per editing session.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApproverPool {
    users: Vec<UserSummary>,
    limit: usize,
}

impl ApproverPool {
    pub fn new(users: Vec<UserSummary>) -> Self {
        Self { users, limit: APPROVER_SEARCH_LIMIT }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Case-insensitive substring match on full name or email, in pool order,
    /// capped at the pool limit. A blank query matches nobody.
    pub fn search(&self, query: &str) -> Vec<UserSummary> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.users
            .iter()
            .filter(|user| user.matches_lowercase(&needle))
            .take(self.limit)
            .cloned()
            .collect()
    }
}

/// Search box state owned by a single route step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApproverSearch {
    query: String,
    results: Vec<UserSummary>,
}

impl ApproverSearch {
    pub fn update(&mut self, query: &str, pool: &ApproverPool) -> &[UserSummary] {
        self.query = query.to_owned();
        self.results = pool.search(query);
        &self.results
    }

    pub fn clear(&mut self) {
        self.query.clear();
        self.results.clear();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[UserSummary] {
        &self.results
    }
}
