use std::cell::Cell;
use std::rc::Rc;

use crate::model::command::Command;

pub const DEFAULT_UNDO_LIMIT: usize = 500;

/// What the log is doing right now. Recording only happens when `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplayMode {
    #[default]
    Idle,
    Undoing,
    Redoing,
}

/// Holds a replay mode for its lifetime and puts the previous mode back
/// on drop, including on early return or unwinding.
#[must_use = "the replay mode resets as soon as the guard is dropped"]
pub struct ReplayGuard {
    mode: Rc<Cell<ReplayMode>>,
    previous: ReplayMode,
}

impl Drop for ReplayGuard {
    fn drop(&mut self) {
        self.mode.set(self.previous);
    }
}

/// The undo/redo log
#[derive(Debug)]
pub struct CommandLog {
    undo: Vec<Command>,
    redo: Vec<Command>,
    limit: usize,
    mode: Rc<Cell<ReplayMode>>,
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl CommandLog {
    pub fn new(limit: usize) -> Self {
        CommandLog {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
            mode: Rc::new(Cell::new(ReplayMode::Idle)),
        }
    }

    /// Rebuild a log from persisted stacks (oldest first in both)
    pub fn from_parts(undo: Vec<Command>, redo: Vec<Command>, limit: usize) -> Self {
        let mut log = CommandLog::new(limit);
        log.undo = undo;
        log.redo = redo;
        log.trim();
        log
    }

    pub fn mode(&self) -> ReplayMode {
        self.mode.get()
    }

    pub fn is_replaying(&self) -> bool {
        self.mode() != ReplayMode::Idle
    }

    /// Enter `mode` until the returned guard is dropped
    pub fn enter(&self, mode: ReplayMode) -> ReplayGuard {
        let previous = self.mode.replace(mode);
        ReplayGuard {
            mode: Rc::clone(&self.mode),
            previous,
        }
    }

    /// Append a command and drop the redo branch.
    /// Ignored while an undo or redo is being replayed.
    pub fn record(&mut self, command: Command) -> bool {
        if self.is_replaying() {
            tracing::debug!(kind = %command.kind(), mode = ?self.mode(), "recording suppressed");
            return false;
        }
        tracing::debug!(kind = %command.kind(), description = %command.description, "recorded command");
        self.undo.push(command);
        self.trim();
        self.redo.clear();
        true
    }

    fn trim(&mut self) {
        if self.undo.len() > self.limit {
            self.undo.drain(..self.undo.len() - self.limit);
        }
    }

    /// Take the command to undo
    pub(crate) fn pop_undo(&mut self) -> Option<Command> {
        self.undo.pop()
    }

    /// Take the command to redo
    pub(crate) fn pop_redo(&mut self) -> Option<Command> {
        self.redo.pop()
    }

    /// File an undone command so it can be redone
    pub(crate) fn push_redo(&mut self, command: Command) {
        self.redo.push(command);
    }

    /// File a redone command so it can be undone again (keeps the redo branch)
    pub(crate) fn push_undo(&mut self, command: Command) {
        self.undo.push(command);
        self.trim();
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo.last().map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo.last().map(|c| c.description.as_str())
    }

    pub fn peek_last_undo(&self) -> Option<&Command> {
        self.undo.last()
    }

    pub fn peek_last_redo(&self) -> Option<&Command> {
        self.redo.last()
    }

    /// Recorded commands, oldest first
    pub fn undo_stack(&self) -> &[Command] {
        &self.undo
    }

    /// Undone commands, most recently undone last
    pub fn redo_stack(&self) -> &[Command] {
        &self.redo
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty() && self.redo.is_empty()
    }
}
