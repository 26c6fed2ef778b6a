//! # Engine Primitives
//!
//! Hardcoded runtime constants for the Grafter core.

/// Default cap on the undo/redo stack.
///
/// A cap of `0` means unlimited; the oldest entries are dropped once the cap is exceeded.
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 50;

/// Progress value meaning "running, but no estimate available".
pub const PROGRESS_INDETERMINATE: i32 = -1;

/// Progress value meaning "complete".
pub const PROGRESS_MAX: i32 = 100;

/// Name given to the command engine's dedicated worker thread.
pub const WORKER_THREAD_NAME: &str = "grafter-command-worker";

/// Label used when an anonymous command is described in logs.
pub const ANONYMOUS_COMMAND: &str = "Anon Command";

/// Convert a loop position into a 0–100 progress value.
///
/// Returns `0` when `total` is zero.
#[must_use]
pub fn progress_percent(done: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((done.saturating_mul(100)) / total).min(PROGRESS_MAX as usize) as i32
}
