//! Mutable state of a loaded stack
//!
//! Owned by the session and lent to the engine for each operation.

use cstack_model::{
    AdvancementParams, CommandRecords, ParameterCache, Step, StepKey,
};

/// Steps, selection, and the live data the engine reads
#[derive(Debug, Clone, Default)]
pub struct StackState {
    /// Steps in order
    pub steps: Vec<Step>,
    /// Selected step
    pub selection: Option<StepKey>,
    /// Stack-level advancement criteria
    pub advancement: AdvancementParams,
    /// Acknowledgment records by command id
    pub records: CommandRecords,
    /// Latest parameter values
    pub parameters: ParameterCache,
}

impl StackState {
    /// State over the given steps, nothing selected
    #[must_use]
    pub fn new(steps: Vec<Step>, advancement: AdvancementParams) -> Self {
        Self {
            steps,
            advancement,
            ..Self::default()
        }
    }

    /// Position of a step
    #[must_use]
    pub fn index_of(&self, key: StepKey) -> Option<usize> {
        self.steps.iter().position(|s| s.key() == key)
    }

    /// Position of the selected step
    #[must_use]
    pub fn selected_index(&self) -> Option<usize> {
        self.selection.and_then(|key| self.index_of(key))
    }

    /// Selected step
    #[must_use]
    pub fn selected(&self) -> Option<&Step> {
        self.selected_index().map(|i| &self.steps[i])
    }

    /// Step by key
    #[must_use]
    pub fn step(&self, key: StepKey) -> Option<&Step> {
        self.steps.iter().find(|s| s.key() == key)
    }

    /// Step by key, mutably
    pub fn step_mut(&mut self, key: StepKey) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.key() == key)
    }

    /// Select the step at `index`, or clear the selection when out of range
    pub fn select_index(&mut self, index: usize) {
        self.selection = self.steps.get(index).map(Step::key);
    }

    /// Select the step after `key`; clears the selection past the end
    ///
    /// Returns the newly selected step.
    pub fn advance_selection(&mut self, key: StepKey) -> Option<StepKey> {
        let next = self.index_of(key).and_then(|i| self.steps.get(i + 1));
        self.selection = next.map(Step::key);
        self.selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> StackState {
        StackState::new(
            vec![Step::text("a"), Step::text("b")],
            AdvancementParams::default(),
        )
    }

    #[test]
    fn advance_moves_to_next_then_clears() {
        let mut state = state();
        let first = state.steps[0].key();
        let second = state.steps[1].key();

        assert_eq!(state.advance_selection(first), Some(second));
        assert_eq!(state.selected_index(), Some(1));
        assert_eq!(state.advance_selection(second), None);
        assert!(state.selected().is_none());
    }

    #[test]
    fn select_out_of_range_clears() {
        let mut state = state();
        state.select_index(0);
        assert!(state.selection.is_some());
        state.select_index(5);
        assert!(state.selection.is_none());
    }
}
