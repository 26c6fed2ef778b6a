//! # Progress
//!
//! Progress, phase and sub-phase reporting for long-running work.

use crate::primitives::PROGRESS_INDETERMINATE;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};

/// Receives progress from running commands and transforms.
pub trait ProgressSink: Send + Sync {
    /// `0..=100`, or [`PROGRESS_INDETERMINATE`].
    fn set_progress(&self, progress: i32);

    fn set_phase(&self, phase: &str);

    fn set_sub_phase(&self, sub_phase: &str);

    fn clear_phase(&self) {
        self.set_phase("");
        self.set_sub_phase("");
    }
}

/// Thread-safe progress snapshot, written by the worker and polled by observers.
#[derive(Debug)]
pub struct ProgressState {
    progress: AtomicI32,
    phase: Mutex<String>,
    sub_phase: Mutex<String>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            progress: AtomicI32::new(PROGRESS_INDETERMINATE),
            phase: Mutex::new(String::new()),
            sub_phase: Mutex::new(String::new()),
        }
    }

    #[must_use]
    pub fn progress(&self) -> i32 {
        self.progress.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> String {
        self.phase.lock().clone()
    }

    pub fn sub_phase(&self) -> String {
        self.sub_phase.lock().clone()
    }
}

impl ProgressSink for ProgressState {
    fn set_progress(&self, progress: i32) {
        self.progress.store(progress, Ordering::Release);
    }

    fn set_phase(&self, phase: &str) {
        *self.phase.lock() = phase.to_string();
    }

    fn set_sub_phase(&self, sub_phase: &str) {
        *self.sub_phase.lock() = sub_phase.to_string();
    }
}

/// Discards all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_progress(&self, _progress: i32) {}

    fn set_phase(&self, _phase: &str) {}

    fn set_sub_phase(&self, _sub_phase: &str) {}
}
