//! # Command Engine
//!
//! Commands are units of work with optional undo. The [`CommandManager`] runs them one
//! at a time on a dedicated worker thread and keeps a bounded undo/redo history.
//!
//! ```text
//! caller ──execute/undo/redo──► pending queue ──► worker thread
//!                                                   │
//!                               CommandHistory ◄────┤ (locked while a command runs)
//!                               CommandListener ◄───┘ started / completed / finished
//! ```
//!
//! Each running command gets a [`CommandContext`] carrying its cancellation token and
//! progress state. Cancellation is cooperative: long-running work polls
//! [`CommandContext::check_cancelled`].

mod history;
mod manager;

pub use history::CommandHistory;
pub use manager::{
    ActionKind, CommandCompletion, CommandListener, CommandManager, CommandManagerConfig,
    GraphChangeFlag,
};

use crate::primitives::ANONYMOUS_COMMAND;
use crate::progress::{ProgressSink, ProgressState};
use crate::types::GrafterError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// CANCELLATION
// =============================================================================

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> Result<(), GrafterError> {
        if self.is_cancelled() {
            Err(GrafterError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// What a command sees while it runs.
#[derive(Debug, Clone)]
pub struct CommandContext {
    token: CancellationToken,
    progress: Arc<ProgressState>,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::detached()
    }
}

impl CommandContext {
    pub fn new(token: CancellationToken, progress: Arc<ProgressState>) -> Self {
        Self { token, progress }
    }

    /// A context not attached to any engine.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(CancellationToken::new(), Arc::new(ProgressState::new()))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn progress_state(&self) -> &Arc<ProgressState> {
        &self.progress
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn check_cancelled(&self) -> Result<(), GrafterError> {
        self.token.check()
    }
}

impl ProgressSink for CommandContext {
    fn set_progress(&self, progress: i32) {
        self.progress.set_progress(progress);
    }

    fn set_phase(&self, phase: &str) {
        self.progress.set_phase(phase);
    }

    fn set_sub_phase(&self, sub_phase: &str) {
        self.progress.set_sub_phase(sub_phase);
    }
}

// =============================================================================
// COMMAND
// =============================================================================

/// A unit of work the engine can run, and possibly revert.
pub trait Command: Send {
    /// Short label, e.g. "Apply Transforms". Shown as "Undo <description>".
    fn description(&self) -> String {
        String::new()
    }

    /// Present-progressive label shown while executing.
    fn verb(&self) -> String {
        self.description()
    }

    /// Label shown once the command has completed.
    fn past_participle(&self) -> String {
        String::new()
    }

    fn cancellable(&self) -> bool {
        false
    }

    fn execute(&mut self, ctx: &CommandContext) -> Result<(), GrafterError>;

    fn undo(&mut self, _ctx: &CommandContext) -> Result<(), GrafterError> {
        Ok(())
    }
}

/// Name used for a command in logs.
pub(crate) fn label(description: &str) -> &str {
    if description.is_empty() {
        ANONYMOUS_COMMAND
    } else {
        description
    }
}

/// Callback signature used by [`FnCommand`].
pub type CommandFn = Box<dyn FnMut(&CommandContext) -> Result<(), GrafterError> + Send>;

/// A command assembled from closures.
pub struct FnCommand {
    description: String,
    verb: String,
    past_participle: String,
    cancellable: bool,
    execute: CommandFn,
    undo: Option<CommandFn>,
}

impl FnCommand {
    pub fn new(
        description: impl Into<String>,
        execute: impl FnMut(&CommandContext) -> Result<(), GrafterError> + Send + 'static,
    ) -> Self {
        let description = description.into();
        Self {
            verb: description.clone(),
            description,
            past_participle: String::new(),
            cancellable: false,
            execute: Box::new(execute),
            undo: None,
        }
    }

    #[must_use]
    pub fn with_verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = verb.into();
        self
    }

    #[must_use]
    pub fn with_past_participle(mut self, past_participle: impl Into<String>) -> Self {
        self.past_participle = past_participle.into();
        self
    }

    #[must_use]
    pub fn with_undo(
        mut self,
        undo: impl FnMut(&CommandContext) -> Result<(), GrafterError> + Send + 'static,
    ) -> Self {
        self.undo = Some(Box::new(undo));
        self
    }

    #[must_use]
    pub fn cancellable(mut self) -> Self {
        self.cancellable = true;
        self
    }
}

impl fmt::Debug for FnCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCommand")
            .field("description", &self.description)
            .field("cancellable", &self.cancellable)
            .field("undoable", &self.undo.is_some())
            .finish()
    }
}

impl Command for FnCommand {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn verb(&self) -> String {
        self.verb.clone()
    }

    fn past_participle(&self) -> String {
        self.past_participle.clone()
    }

    fn cancellable(&self) -> bool {
        self.cancellable
    }

    fn execute(&mut self, ctx: &CommandContext) -> Result<(), GrafterError> {
        (self.execute)(ctx)
    }

    fn undo(&mut self, ctx: &CommandContext) -> Result<(), GrafterError> {
        match &mut self.undo {
            Some(undo) => undo(ctx),
            None => Ok(()),
        }
    }
}
