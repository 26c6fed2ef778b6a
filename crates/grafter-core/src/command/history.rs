//! Bounded undo/redo stack with a cursor.

use super::Command;
use std::collections::VecDeque;
use std::fmt;

/// Executed commands, oldest first, and how many of them are currently applied.
///
/// Entries `[0, applied)` can be undone, most recent first; entries `[applied, len)`
/// can be redone, oldest first. Pushing a new command drops everything redoable.
pub struct CommandHistory {
    stack: VecDeque<Box<dyn Command>>,
    applied: usize,
    max_levels: usize,
}

impl fmt::Debug for CommandHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHistory")
            .field("len", &self.stack.len())
            .field("applied", &self.applied)
            .field("max_levels", &self.max_levels)
            .finish()
    }
}

impl CommandHistory {
    /// `max_levels == 0` means unlimited.
    #[must_use]
    pub fn new(max_levels: usize) -> Self {
        Self {
            stack: VecDeque::new(),
            applied: 0,
            max_levels,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    #[must_use]
    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    pub fn set_max_levels(&mut self, max_levels: usize) {
        self.max_levels = max_levels;
        self.trim();
    }

    /// Index of the most recently applied entry.
    pub fn last_executed_index(&self) -> Option<usize> {
        self.applied.checked_sub(1)
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.applied < self.stack.len()
    }

    /// Record a freshly executed command.
    pub fn push(&mut self, command: Box<dyn Command>) {
        self.stack.truncate(self.applied);
        self.stack.push_back(command);
        self.trim();
        self.applied = self.stack.len();
    }

    fn trim(&mut self) {
        if self.max_levels == 0 {
            return;
        }
        while self.stack.len() > self.max_levels {
            self.stack.pop_front();
            self.applied = self.applied.saturating_sub(1);
        }
    }

    pub fn clear(&mut self) {
        self.stack.clear();
        self.applied = 0;
    }

    /// The command the next undo reverts.
    pub fn undo_target(&mut self) -> Option<&mut Box<dyn Command>> {
        let index = self.last_executed_index()?;
        self.stack.get_mut(index)
    }

    /// The command the next redo re-executes.
    pub fn redo_target(&mut self) -> Option<&mut Box<dyn Command>> {
        self.stack.get_mut(self.applied)
    }

    /// Move the cursor back after a successful undo.
    pub fn step_back(&mut self) {
        self.applied = self.applied.saturating_sub(1);
    }

    /// Move the cursor forward after a successful redo.
    pub fn step_forward(&mut self) {
        if self.applied < self.stack.len() {
            self.applied += 1;
        }
    }

    /// Descriptions of undoable commands, most recent first.
    pub fn undoable_descriptions(&self) -> Vec<String> {
        self.stack
            .iter()
            .take(self.applied)
            .rev()
            .map(|c| c.description())
            .collect()
    }

    /// Descriptions of redoable commands, next redo first.
    pub fn redoable_descriptions(&self) -> Vec<String> {
        self.stack
            .iter()
            .skip(self.applied)
            .map(|c| c.description())
            .collect()
    }

    /// "Undo <description>", or "Undo" if nothing is undoable or the command is anonymous.
    pub fn next_undo_action(&self) -> String {
        action_label("Undo", self.undoable_descriptions().first())
    }

    /// "Redo <description>", or "Redo" if nothing is redoable or the command is anonymous.
    pub fn next_redo_action(&self) -> String {
        action_label("Redo", self.redoable_descriptions().first())
    }
}

pub(crate) fn action_label(action: &str, description: Option<&String>) -> String {
    match description {
        Some(d) if !d.is_empty() => format!("{action} {d}"),
        _ => action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FnCommand;

    fn named(name: &str) -> Box<dyn Command> {
        Box::new(FnCommand::new(name, |_| Ok(())))
    }

    #[test]
    fn push_moves_cursor_to_top() {
        let mut history = CommandHistory::new(0);
        history.push(named("A"));
        history.push(named("B"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.last_executed_index(), Some(1));
        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.next_undo_action(), "Undo B");
    }

    #[test]
    fn push_after_undo_truncates_redo() {
        let mut history = CommandHistory::new(0);
        history.push(named("A"));
        history.push(named("B"));
        history.step_back();
        assert_eq!(history.redoable_descriptions(), vec!["B".to_string()]);

        history.push(named("C"));
        assert_eq!(
            history.undoable_descriptions(),
            vec!["C".to_string(), "A".to_string()]
        );
        assert!(!history.can_redo());
    }

    #[test]
    fn cap_drops_oldest() {
        let mut history = CommandHistory::new(2);
        history.push(named("A"));
        history.push(named("B"));
        history.push(named("C"));

        assert_eq!(history.len(), 2);
        assert_eq!(
            history.undoable_descriptions(),
            vec!["C".to_string(), "B".to_string()]
        );
    }

    #[test]
    fn lowering_the_cap_trims_existing_entries() {
        let mut history = CommandHistory::new(0);
        for name in ["A", "B", "C", "D"] {
            history.push(named(name));
        }
        history.set_max_levels(1);
        assert_eq!(history.len(), 1);
        assert_eq!(history.last_executed_index(), Some(0));
    }

    #[test]
    fn labels_fall_back_for_anonymous_or_empty() {
        let mut history = CommandHistory::new(0);
        assert_eq!(history.next_undo_action(), "Undo");
        assert_eq!(history.next_redo_action(), "Redo");

        history.push(named(""));
        assert_eq!(history.next_undo_action(), "Undo");
    }

    #[test]
    fn targets_follow_cursor() {
        let mut history = CommandHistory::new(0);
        history.push(named("A"));
        assert_eq!(
            history.undo_target().map(|c| c.description()),
            Some("A".to_string())
        );
        assert!(history.redo_target().is_none());

        history.step_back();
        assert!(history.undo_target().is_none());
        assert_eq!(
            history.redo_target().map(|c| c.description()),
            Some("A".to_string())
        );
    }
}
