//! Client-side construction of an approval route.
//!
//! Step order is always derived from position: every mutation that changes
//! the step list renumbers the steps to `1..=len`. Nothing is persisted per
//! edit; the finished route is validated and sent as a whole.

pub mod search;

use thiserror::Error;
use tracing::debug;

use crate::domain::route::{
    validate_route, ApprovalRoute, Approver, RouteId, RoutePayload, RouteStep,
    RouteValidationError, StepType, DEFAULT_DEADLINE_HOURS,
};
use crate::domain::user::{UserId, UserSummary};

pub use search::{ApproverPool, ApproverSearch, APPROVER_SEARCH_LIMIT};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EditorError {
    #[error("step index {index} is out of range for {len} step(s)")]
    StepOutOfRange { index: usize, len: usize },
    #[error("deadline must be at least one hour, got {hours}")]
    InvalidDeadline { hours: u32 },
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct EditorStep {
    step: RouteStep,
    search: ApproverSearch,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteEditor {
    id: Option<RouteId>,
    name: String,
    description: Option<String>,
    steps: Vec<EditorStep>,
    default_deadline_hours: u32,
}

impl Default for RouteEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteEditor {
    pub fn new() -> Self {
        Self {
            id: None,
            name: String::new(),
            description: None,
            steps: Vec::new(),
            default_deadline_hours: DEFAULT_DEADLINE_HOURS,
        }
    }

    /// Deadline given to newly added steps. Zero keeps the built-in default.
    pub fn with_default_deadline(mut self, hours: u32) -> Self {
        if hours > 0 {
            self.default_deadline_hours = hours;
        }
        self
    }

    /// Opens an existing route for editing. Steps are taken in the order
    /// received and renumbered from their positions. Repeated approvers in a
    /// step are dropped, keeping the first entry.
    pub fn from_route(route: ApprovalRoute) -> Self {
        let mut editor = Self {
            id: route.id,
            name: route.name,
            description: route.description,
            steps: route
                .steps
                .into_iter()
                .map(|mut step| {
                    drop_repeated_approvers(&mut step);
                    EditorStep { step, search: ApproverSearch::default() }
                })
                .collect(),
            default_deadline_hours: DEFAULT_DEADLINE_HOURS,
        };
        editor.renumber();
        editor
    }

    pub fn id(&self) -> Option<&RouteId> {
        self.id.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description.filter(|value| !value.trim().is_empty());
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, index: usize) -> Option<&RouteStep> {
        self.steps.get(index).map(|entry| &entry.step)
    }

    pub fn steps(&self) -> impl Iterator<Item = &RouteStep> {
        self.steps.iter().map(|entry| &entry.step)
    }

    /// Appends a sequential step with no approvers and returns its index.
    pub fn add_step(&mut self) -> usize {
        let mut step = RouteStep::new(self.steps.len() as u32 + 1);
        step.deadline_hours = self.default_deadline_hours;
        self.steps.push(EditorStep { step, search: ApproverSearch::default() });
        self.steps.len() - 1
    }

    pub fn remove_step(&mut self, index: usize) -> Result<RouteStep, EditorError> {
        self.check_index(index)?;
        let removed = self.steps.remove(index).step;
        self.renumber();
        debug!(
            event_name = "editor.step_removed",
            removed_order = removed.order,
            remaining = self.steps.len(),
            "route step removed"
        );
        Ok(removed)
    }

    /// Moves the step at `from` so that it ends up at index `to`. Search
    /// state travels with its step.
    pub fn move_step(&mut self, from: usize, to: usize) -> Result<(), EditorError> {
        self.check_index(from)?;
        self.check_index(to)?;
        if from == to {
            return Ok(());
        }

        let entry = self.steps.remove(from);
        self.steps.insert(to, entry);
        self.renumber();
        Ok(())
    }

    /// Adds `approver` to the step unless a user with the same id is already
    /// there. Returns whether the set changed.
    pub fn add_approver(&mut self, index: usize, approver: Approver) -> Result<bool, EditorError> {
        let entry = self.entry_mut(index)?;
        if entry.step.has_approver(&approver.user_id) {
            return Ok(false);
        }

        entry.step.approvers.push(approver);
        entry.search.clear();
        Ok(true)
    }

    pub fn remove_approver(&mut self, index: usize, user_id: &UserId) -> Result<bool, EditorError> {
        let entry = self.entry_mut(index)?;
        let before = entry.step.approvers.len();
        entry.step.approvers.retain(|approver| &approver.user_id != user_id);
        Ok(entry.step.approvers.len() != before)
    }

    pub fn set_step_type(&mut self, index: usize, step_type: StepType) -> Result<(), EditorError> {
        self.entry_mut(index)?.step.step_type = step_type;
        Ok(())
    }

    pub fn set_step_name(
        &mut self,
        index: usize,
        name: impl Into<String>,
    ) -> Result<(), EditorError> {
        self.entry_mut(index)?.step.name = name.into();
        Ok(())
    }

    pub fn set_deadline_hours(&mut self, index: usize, hours: u32) -> Result<(), EditorError> {
        if hours == 0 {
            return Err(EditorError::InvalidDeadline { hours });
        }
        self.entry_mut(index)?.step.deadline_hours = hours;
        Ok(())
    }

    /// Runs the approver search for one step; other steps keep their own
    /// query and results.
    pub fn search_approvers(
        &mut self,
        index: usize,
        query: &str,
        pool: &ApproverPool,
    ) -> Result<&[UserSummary], EditorError> {
        let entry = self.entry_mut(index)?;
        Ok(entry.search.update(query, pool))
    }

    pub fn search(&self, index: usize) -> Option<&ApproverSearch> {
        self.steps.get(index).map(|entry| &entry.search)
    }

    pub fn validate(&self) -> Result<(), RouteValidationError> {
        let steps: Vec<RouteStep> = self.steps().cloned().collect();
        validate_route(&self.name, &steps)
    }

    /// Validated request body with blank step names filled in.
    pub fn to_payload(&self) -> Result<RoutePayload, RouteValidationError> {
        self.validate()?;

        let steps = self
            .steps()
            .map(|step| {
                let mut step = step.clone();
                step.name = step.display_name();
                step
            })
            .collect();

        Ok(RoutePayload {
            name: self.name.trim().to_owned(),
            description: self.description.clone(),
            steps,
        })
    }

    fn renumber(&mut self) {
        for (position, entry) in self.steps.iter_mut().enumerate() {
            entry.step.order = position as u32 + 1;
        }
    }

    fn check_index(&self, index: usize) -> Result<(), EditorError> {
        if index < self.steps.len() {
            Ok(())
        } else {
            Err(EditorError::StepOutOfRange { index, len: self.steps.len() })
        }
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut EditorStep, EditorError> {
        let len = self.steps.len();
        self.steps.get_mut(index).ok_or(EditorError::StepOutOfRange { index, len })
    }
}

fn drop_repeated_approvers(step: &mut RouteStep) {
    let before = step.approvers.len();
    let mut seen: Vec<UserId> = Vec::with_capacity(before);
    step.approvers.retain(|approver| {
        if seen.contains(&approver.user_id) {
            false
        } else {
            seen.push(approver.user_id.clone());
            true
        }
    });
    if step.approvers.len() != before {
        debug!(
            event_name = "editor.duplicate_approvers_dropped",
            order = step.order,
            dropped = before - step.approvers.len(),
            "repeated approvers removed from loaded step"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{ApproverPool, EditorError, RouteEditor};
    use crate::domain::route::{ApprovalRoute, Approver, RouteStep, RouteValidationError, StepType};
    use crate::domain::user::UserSummary;

    fn assert_dense(editor: &RouteEditor) {
        for (position, step) in editor.steps().enumerate() {
            assert_eq!(step.order, position as u32 + 1, "order must follow position");
        }
    }

    fn purchase_approval() -> RouteEditor {
        let mut editor = RouteEditor::new();
        editor.set_name("Purchase Approval");

        let first = editor.add_step();
        editor.add_approver(first, Approver::new("u1", "Alice")).expect("step 1");
        editor.set_deadline_hours(first, 24).expect("deadline");

        let second = editor.add_step();
        editor.set_step_type(second, StepType::Parallel).expect("type");
        editor.add_approver(second, Approver::new("u2", "Bob")).expect("bob");
        editor.add_approver(second, Approver::new("u3", "Carol")).expect("carol");
        editor
    }

    #[test]
    fn new_steps_use_defaults() {
        let mut editor = RouteEditor::new();
        let index = editor.add_step();
        let step = editor.step(index).expect("step exists");

        assert_eq!(step.order, 1);
        assert_eq!(step.step_type, StepType::Sequential);
        assert!(step.approvers.is_empty());
        assert_eq!(step.deadline_hours, 48);
    }

    #[test]
    fn order_stays_dense_across_mutations() {
        let mut editor = RouteEditor::new();
        for _ in 0..5 {
            editor.add_step();
            assert_dense(&editor);
        }

        editor.remove_step(1).expect("remove middle");
        assert_dense(&editor);
        editor.move_step(0, 3).expect("move first to last");
        assert_dense(&editor);
        editor.move_step(3, 0).expect("move last to first");
        assert_dense(&editor);
        editor.remove_step(3).expect("remove last");
        assert_dense(&editor);
        editor.add_step();
        assert_dense(&editor);
        assert_eq!(editor.len(), 4);
    }

    #[test]
    fn move_step_carries_its_content() {
        let mut editor = purchase_approval();
        editor.move_step(1, 0).expect("swap");

        let first = editor.step(0).expect("first");
        assert_eq!(first.order, 1);
        assert_eq!(first.step_type, StepType::Parallel);
        assert_eq!(first.approvers.len(), 2);
        assert_eq!(editor.step(1).expect("second").approvers[0].name, "Alice");
    }

    #[test]
    fn adding_the_same_approver_twice_is_a_no_op() {
        let mut editor = RouteEditor::new();
        let index = editor.add_step();

        assert!(editor.add_approver(index, Approver::new("u1", "Alice")).expect("first add"));
        let once = editor.step(index).expect("step").approvers.clone();
        assert!(!editor.add_approver(index, Approver::new("u1", "Alice")).expect("second add"));

        assert_eq!(editor.step(index).expect("step").approvers, once);
    }

    #[test]
    fn remove_approver_filters_by_user_id() {
        let mut editor = purchase_approval();
        assert!(editor.remove_approver(1, &"u2".into()).expect("remove bob"));
        assert!(!editor.remove_approver(1, &"u9".into()).expect("unknown user"));

        let names: Vec<&str> =
            editor.step(1).expect("step").approvers.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Carol"]);
    }

    #[test]
    fn out_of_range_indices_leave_state_unchanged() {
        let mut editor = purchase_approval();
        let before = editor.clone();

        assert_eq!(editor.remove_step(5), Err(EditorError::StepOutOfRange { index: 5, len: 2 }));
        assert!(editor.move_step(0, 2).is_err());
        assert!(editor.set_deadline_hours(0, 0).is_err());
        assert_eq!(editor, before);
    }

    #[test]
    fn save_validation_fails_for_empty_route() {
        let mut editor = RouteEditor::new();
        editor.set_name("Empty");
        assert_eq!(editor.to_payload(), Err(RouteValidationError::NoSteps));
    }

    #[test]
    fn save_validation_names_unstaffed_step() {
        let mut editor = purchase_approval();
        let index = editor.add_step();
        editor.set_step_name(index, "Legal").expect("name");

        assert_eq!(
            editor.validate(),
            Err(RouteValidationError::StepWithoutApprovers { order: 3, name: "Legal".to_owned() })
        );
    }

    #[test]
    fn removing_first_step_keeps_second_steps_approvers() {
        let mut editor = purchase_approval();
        editor.remove_step(0).expect("remove step 1");

        assert_eq!(editor.len(), 1);
        let remaining = editor.step(0).expect("remaining step");
        assert_eq!(remaining.order, 1);
        assert_eq!(remaining.step_type, StepType::Parallel);
        assert_eq!(remaining.deadline_hours, 48);
        assert_eq!(
            remaining.approvers,
            vec![Approver::new("u2", "Bob"), Approver::new("u3", "Carol")]
        );
    }

    #[test]
    fn payload_fills_blank_step_names() {
        let payload = purchase_approval().to_payload().expect("valid route");

        assert_eq!(payload.name, "Purchase Approval");
        assert_eq!(payload.steps[0].name, "Step 1");
        assert_eq!(payload.steps[0].deadline_hours, 24);
        assert_eq!(payload.steps[1].name, "Step 2");
    }

    #[test]
    fn loaded_routes_are_renumbered_and_keep_id() {
        let mut step = RouteStep::new(7);
        step.approvers.push(Approver::new("u1", "Alice"));
        let editor = RouteEditor::from_route(ApprovalRoute {
            id: Some("r-9".into()),
            name: "Legacy".to_owned(),
            description: None,
            steps: vec![step],
        });

        assert_eq!(editor.id().map(|id| id.as_str()), Some("r-9"));
        assert_eq!(editor.step(0).expect("step").order, 1);
        assert!(editor.validate().is_ok());
    }

    #[test]
    fn loaded_routes_keep_each_approver_once_per_step() {
        let mut step = RouteStep::new(1);
        step.approvers.push(Approver::new("u1", "Alice"));
        step.approvers.push(Approver::new("u2", "Bob"));
        step.approvers.push(Approver::new("u1", "Alice (copy)"));
        let editor = RouteEditor::from_route(ApprovalRoute {
            id: Some("r-3".into()),
            name: "Imported".to_owned(),
            description: None,
            steps: vec![step],
        });

        let payload = editor.to_payload().expect("valid after dedupe");
        let names: Vec<&str> =
            payload.steps[0].approvers.iter().map(|approver| approver.name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[test]
    fn each_step_keeps_its_own_search_state() {
        let pool = ApproverPool::new(vec![
            UserSummary { id: "u1".into(), full_name: "Alice".to_owned(), email: None },
            UserSummary { id: "u2".into(), full_name: "Bob".to_owned(), email: None },
        ]);
        let mut editor = RouteEditor::new();
        editor.add_step();
        editor.add_step();

        editor.search_approvers(0, "ali", &pool).expect("search step 1");
        editor.search_approvers(1, "bo", &pool).expect("search step 2");

        assert_eq!(editor.search(0).expect("search").results()[0].full_name, "Alice");
        assert_eq!(editor.search(1).expect("search").results()[0].full_name, "Bob");

        let bob = editor.search(1).expect("search").results()[0].to_approver();
        editor.add_approver(1, bob).expect("add bob");
        assert!(editor.search(1).expect("search").query().is_empty());
        assert_eq!(editor.search(0).expect("search").query(), "ali");
    }
}
