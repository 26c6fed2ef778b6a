//! The worker-thread command engine.

use super::history::{CommandHistory, action_label};
use super::{CancellationToken, Command, CommandContext, label};
use crate::graph::GraphObserver;
use crate::primitives::{DEFAULT_MAX_UNDO_LEVELS, WORKER_THREAD_NAME};
use crate::progress::ProgressState;
use crate::types::GrafterError;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

// =============================================================================
// PUBLIC TYPES
// =============================================================================

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandManagerConfig {
    /// Undo stack cap; `0` means unlimited.
    pub max_undo_levels: usize,
}

impl Default for CommandManagerConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
        }
    }
}

/// Which kind of action a completion reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Execute,
    ExecuteOnce,
    Undo,
    Redo,
}

/// Outcome of one drained action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandCompletion {
    pub action: ActionKind,
    pub success: bool,
    pub description: String,
    pub past_participle: String,
    /// Set when the action failed for a reason other than cancellation.
    pub error: Option<String>,
}

impl CommandCompletion {
    fn succeeded(action: ActionKind, description: String, past_participle: String) -> Self {
        Self {
            action,
            success: true,
            description,
            past_participle,
            error: None,
        }
    }

    fn failed(action: ActionKind, description: String, error: Option<String>) -> Self {
        Self {
            action,
            success: false,
            description,
            past_participle: String::new(),
            error,
        }
    }

    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        !self.success && self.error.is_none()
    }
}

/// Engine events. All methods are called from the worker thread.
pub trait CommandListener: Send + Sync {
    /// The engine went from idle to busy.
    fn on_started(&self) {}

    fn on_command_completed(&self, _completion: &CommandCompletion) {}

    /// The pending queue drained and the engine is idle again.
    fn on_finished(&self) {}

    fn on_stack_cleared(&self) {}

    fn on_cancelling_changed(&self, _cancelling: bool) {}
}

struct NoListener;

impl CommandListener for NoListener {}

/// Set whenever the observed graph mutates; reset by the engine before each execute.
#[derive(Debug, Clone, Default)]
pub struct GraphChangeFlag(Arc<AtomicBool>);

impl GraphChangeFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl GraphObserver for GraphChangeFlag {
    fn on_graph_changed(&self, _version: u64) {
        self.mark();
    }
}

// =============================================================================
// SHARED STATE
// =============================================================================

enum PendingAction {
    Execute(Box<dyn Command>),
    ExecuteOnce(Box<dyn Command>),
    Undo,
    Redo,
}

#[derive(Default)]
struct QueueState {
    pending: VecDeque<PendingAction>,
    busy: bool,
    shutdown: bool,
}

struct CurrentCommand {
    verb: String,
    cancellable: bool,
    token: CancellationToken,
    progress: Arc<ProgressState>,
}

#[derive(Default)]
struct CurrentState {
    command: Option<CurrentCommand>,
    cancelling: bool,
}

struct Shared {
    queue: Mutex<QueueState>,
    work_available: Condvar,
    idle: Condvar,
    history: Mutex<CommandHistory>,
    current: Mutex<CurrentState>,
    graph_changed: GraphChangeFlag,
    listener: Arc<dyn CommandListener>,
}

impl Shared {
    fn begin(&self, verb: String, cancellable: bool) -> CommandContext {
        let ctx = CommandContext::default();
        let mut current = self.current.lock();
        current.command = Some(CurrentCommand {
            verb,
            cancellable,
            token: ctx.token().clone(),
            progress: Arc::clone(ctx.progress_state()),
        });
        ctx
    }

    fn end(&self) {
        let was_cancelling = {
            let mut current = self.current.lock();
            current.command = None;
            std::mem::replace(&mut current.cancelling, false)
        };
        if was_cancelling {
            self.listener.on_cancelling_changed(false);
        }
    }

    fn enqueue(&self, action: PendingAction) {
        let mut queue = self.queue.lock();
        if queue.shutdown {
            return;
        }
        queue.pending.push_back(action);
        self.work_available.notify_one();
    }
}

// =============================================================================
// COMMAND MANAGER
// =============================================================================

/// Serialises commands onto a dedicated worker thread and owns the undo history.
///
/// Requests return immediately; completions are reported to the
/// [`CommandListener`]. Dropping the manager cancels the running command, discards
/// anything still pending and joins the worker.
pub struct CommandManager {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("busy", &self.busy())
            .field("can_undo", &self.can_undo())
            .field("can_redo", &self.can_redo())
            .finish()
    }
}

impl CommandManager {
    pub fn new(config: CommandManagerConfig) -> Result<Self, GrafterError> {
        Self::with_listener(config, Arc::new(NoListener))
    }

    pub fn with_listener(
        config: CommandManagerConfig,
        listener: Arc<dyn CommandListener>,
    ) -> Result<Self, GrafterError> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState::default()),
            work_available: Condvar::new(),
            idle: Condvar::new(),
            history: Mutex::new(CommandHistory::new(config.max_undo_levels)),
            current: Mutex::new(CurrentState::default()),
            graph_changed: GraphChangeFlag::new(),
            listener,
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(&worker_shared))
            .map_err(|e| GrafterError::Io(e.to_string()))?;

        tracing::debug!(
            max_undo_levels = config.max_undo_levels,
            "command engine started"
        );

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    // -------------------------------------------------------------------------
    // Requests
    // -------------------------------------------------------------------------

    /// Queue a command; on success it is pushed onto the undo stack.
    pub fn execute(&self, command: impl Command + 'static) {
        self.execute_boxed(Box::new(command));
    }

    pub fn execute_boxed(&self, command: Box<dyn Command>) {
        self.shared.enqueue(PendingAction::Execute(command));
    }

    /// Queue a command that is never added to the undo stack.
    ///
    /// If it mutates the observed graph, the undo stack is cleared.
    pub fn execute_once(&self, command: impl Command + 'static) {
        self.shared
            .enqueue(PendingAction::ExecuteOnce(Box::new(command)));
    }

    pub fn undo(&self) {
        self.shared.enqueue(PendingAction::Undo);
    }

    pub fn redo(&self) {
        self.shared.enqueue(PendingAction::Redo);
    }

    /// Request cancellation of the running command. No effect when idle.
    pub fn cancel(&self) {
        let notify = {
            let mut guard = self.shared.current.lock();
            let current = &mut *guard;
            match &current.command {
                Some(command) => {
                    command.token.cancel();
                    !std::mem::replace(&mut current.cancelling, true)
                }
                None => false,
            }
        };
        if notify {
            tracing::debug!("cancellation requested");
            self.shared.listener.on_cancelling_changed(true);
        }
    }

    /// Block until every queued action has been drained.
    pub fn wait(&self) {
        let mut queue = self.shared.queue.lock();
        while (queue.busy || !queue.pending.is_empty()) && !queue.shutdown {
            self.shared.idle.wait(&mut queue);
        }
    }

    /// Empty the undo stack. Waits for a running command to finish first.
    pub fn clear_command_stack(&self) {
        self.shared.history.lock().clear();
        self.shared.listener.on_stack_cleared();
    }

    /// Discard queued actions and empty the undo stack.
    pub fn clear(&self) {
        let discarded = {
            let mut queue = self.shared.queue.lock();
            std::mem::take(&mut queue.pending).len()
        };
        if discarded > 0 {
            tracing::debug!(discarded, "pending actions discarded");
        }
        self.clear_command_stack();
    }

    pub fn set_max_undo_levels(&self, max_undo_levels: usize) {
        self.shared.history.lock().set_max_levels(max_undo_levels);
    }

    /// Flag to register as an observer on the graph commands mutate.
    pub fn graph_change_flag(&self) -> GraphChangeFlag {
        self.shared.graph_changed.clone()
    }

    // -------------------------------------------------------------------------
    // Queries (never block on a running command)
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn busy(&self) -> bool {
        let queue = self.shared.queue.lock();
        queue.busy || !queue.pending.is_empty()
    }

    /// `false` while a command is running.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.shared
            .history
            .try_lock()
            .is_some_and(|h| h.can_undo())
    }

    /// `false` while a command is running.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.shared
            .history
            .try_lock()
            .is_some_and(|h| h.can_redo())
    }

    /// Empty while a command is running.
    pub fn undoable_command_descriptions(&self) -> Vec<String> {
        self.shared
            .history
            .try_lock()
            .map(|h| h.undoable_descriptions())
            .unwrap_or_default()
    }

    /// Empty while a command is running.
    pub fn redoable_command_descriptions(&self) -> Vec<String> {
        self.shared
            .history
            .try_lock()
            .map(|h| h.redoable_descriptions())
            .unwrap_or_default()
    }

    /// "Undo <description>"; plain "Undo" while a command is running.
    pub fn next_undo_action(&self) -> String {
        self.shared
            .history
            .try_lock()
            .map(|h| h.next_undo_action())
            .unwrap_or_else(|| action_label("Undo", None))
    }

    /// "Redo <description>"; plain "Redo" while a command is running.
    pub fn next_redo_action(&self) -> String {
        self.shared
            .history
            .try_lock()
            .map(|h| h.next_redo_action())
            .unwrap_or_else(|| action_label("Redo", None))
    }

    /// Progress of the running command, `None` when idle.
    pub fn command_progress(&self) -> Option<i32> {
        let current = self.shared.current.lock();
        current.command.as_ref().map(|c| c.progress.progress())
    }

    pub fn command_verb(&self) -> Option<String> {
        let current = self.shared.current.lock();
        current.command.as_ref().map(|c| c.verb.clone())
    }

    pub fn command_phase(&self) -> Option<String> {
        let current = self.shared.current.lock();
        current.command.as_ref().map(|c| c.progress.phase())
    }

    #[must_use]
    pub fn command_is_cancellable(&self) -> bool {
        let current = self.shared.current.lock();
        current.command.as_ref().is_some_and(|c| c.cancellable)
    }

    #[must_use]
    pub fn command_is_cancelling(&self) -> bool {
        self.shared.current.lock().cancelling
    }
}

impl Drop for CommandManager {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock();
            queue.shutdown = true;
            queue.pending.clear();
        }
        if let Some(current) = &self.shared.current.lock().command {
            current.token.cancel();
        }
        self.shared.work_available.notify_all();
        self.shared.idle.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!("command worker panicked");
            }
        }
    }
}

// =============================================================================
// WORKER
// =============================================================================

fn run_worker(shared: &Shared) {
    loop {
        let (action, started) = {
            let mut queue = shared.queue.lock();
            loop {
                if queue.shutdown {
                    return;
                }
                if let Some(action) = queue.pending.pop_front() {
                    let started = !queue.busy;
                    queue.busy = true;
                    break (action, started);
                }
                shared.work_available.wait(&mut queue);
            }
        };

        if started {
            shared.listener.on_started();
        }

        let completion = match action {
            PendingAction::Execute(command) => run_execute(shared, command, false),
            PendingAction::ExecuteOnce(command) => run_execute(shared, command, true),
            PendingAction::Undo => run_undo(shared),
            PendingAction::Redo => run_redo(shared),
        };
        shared.listener.on_command_completed(&completion);

        let finished = {
            let mut queue = shared.queue.lock();
            if queue.pending.is_empty() {
                queue.busy = false;
                shared.idle.notify_all();
                true
            } else {
                false
            }
        };
        if finished {
            shared.listener.on_finished();
        }
    }
}

fn run_execute(shared: &Shared, mut command: Box<dyn Command>, once: bool) -> CommandCompletion {
    let action = if once {
        ActionKind::ExecuteOnce
    } else {
        ActionKind::Execute
    };
    let description = command.description();
    let span = tracing::info_span!("execute", command = %label(&description), once);
    let _enter = span.enter();

    let mut history = shared.history.lock();
    let ctx = shared.begin(command.verb(), command.cancellable());
    shared.graph_changed.reset();

    let result = command.execute(&ctx);
    let mut stack_cleared = false;
    let completion = match result {
        Ok(()) if !ctx.is_cancelled() => {
            let past_participle = command.past_participle();
            if !once {
                history.push(command);
            } else if shared.graph_changed.is_set() {
                history.clear();
                stack_cleared = true;
            }
            tracing::info!("command completed");
            CommandCompletion::succeeded(action, description, past_participle)
        }
        Ok(()) | Err(GrafterError::Cancelled) => {
            tracing::info!("command cancelled");
            CommandCompletion::failed(action, description, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "command failed");
            CommandCompletion::failed(action, description, Some(e.to_string()))
        }
    };
    drop(history);
    shared.end();

    if stack_cleared {
        tracing::debug!("undo stack cleared by one-shot command");
        shared.listener.on_stack_cleared();
    }
    completion
}

fn run_undo(shared: &Shared) -> CommandCompletion {
    let mut history = shared.history.lock();
    let Some(command) = history.undo_target() else {
        return CommandCompletion::failed(
            ActionKind::Undo,
            String::new(),
            Some("nothing to undo".to_string()),
        );
    };

    let description = command.description();
    let span = tracing::info_span!("undo", command = %label(&description));
    let _enter = span.enter();

    let ctx = shared.begin(progressive("Undoing", &description), command.cancellable());
    let result = command.undo(&ctx);
    let completion = match result {
        Ok(()) if !ctx.is_cancelled() => {
            history.step_back();
            tracing::info!("command undone");
            CommandCompletion::succeeded(ActionKind::Undo, description, String::new())
        }
        Ok(()) | Err(GrafterError::Cancelled) => {
            CommandCompletion::failed(ActionKind::Undo, description, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "undo failed");
            CommandCompletion::failed(ActionKind::Undo, description, Some(e.to_string()))
        }
    };
    drop(history);
    shared.end();
    completion
}

fn run_redo(shared: &Shared) -> CommandCompletion {
    let mut history = shared.history.lock();
    let Some(command) = history.redo_target() else {
        return CommandCompletion::failed(
            ActionKind::Redo,
            String::new(),
            Some("nothing to redo".to_string()),
        );
    };

    let description = command.description();
    let span = tracing::info_span!("redo", command = %label(&description));
    let _enter = span.enter();

    let ctx = shared.begin(progressive("Redoing", &description), command.cancellable());
    let result = command.execute(&ctx);
    let completion = match result {
        Ok(()) if !ctx.is_cancelled() => {
            let past_participle = command.past_participle();
            history.step_forward();
            tracing::info!("command redone");
            CommandCompletion::succeeded(ActionKind::Redo, description, past_participle)
        }
        Ok(()) | Err(GrafterError::Cancelled) => {
            CommandCompletion::failed(ActionKind::Redo, description, None)
        }
        Err(e) => {
            tracing::warn!(error = %e, "redo failed");
            CommandCompletion::failed(ActionKind::Redo, description, Some(e.to_string()))
        }
    };
    drop(history);
    shared.end();
    completion
}

fn progressive(verb: &str, description: &str) -> String {
    if description.is_empty() {
        verb.to_string()
    } else {
        format!("{verb} {description}")
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FnCommand;
    use crate::graph::Graph;
    use std::sync::atomic::AtomicI64;
    use std::sync::mpsc;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        completions: Mutex<Vec<CommandCompletion>>,
        started: Mutex<usize>,
        finished: Mutex<usize>,
        cleared: Mutex<usize>,
        cancelling: Mutex<Vec<bool>>,
    }

    impl CommandListener for Recorder {
        fn on_started(&self) {
            *self.started.lock() += 1;
        }

        fn on_command_completed(&self, completion: &CommandCompletion) {
            self.completions.lock().push(completion.clone());
        }

        fn on_finished(&self) {
            *self.finished.lock() += 1;
        }

        fn on_stack_cleared(&self) {
            *self.cleared.lock() += 1;
        }

        fn on_cancelling_changed(&self, cancelling: bool) {
            self.cancelling.lock().push(cancelling);
        }
    }

    fn manager() -> (CommandManager, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let manager = CommandManager::with_listener(
            CommandManagerConfig::default(),
            Arc::clone(&recorder) as Arc<dyn CommandListener>,
        )
        .expect("manager");
        (manager, recorder)
    }

    fn adder(value: &Arc<AtomicI64>, amount: i64, name: &str) -> FnCommand {
        let up = Arc::clone(value);
        let down = Arc::clone(value);
        FnCommand::new(name, move |_| {
            up.fetch_add(amount, Ordering::SeqCst);
            Ok(())
        })
        .with_undo(move |_| {
            down.fetch_sub(amount, Ordering::SeqCst);
            Ok(())
        })
        .with_past_participle(format!("{name} done"))
    }

    #[test]
    fn execute_undo_redo_round_trip() {
        let (manager, recorder) = manager();
        let value = Arc::new(AtomicI64::new(0));

        manager.execute(adder(&value, 5, "Add Five"));
        manager.wait();
        assert_eq!(value.load(Ordering::SeqCst), 5);
        assert!(manager.can_undo());
        assert_eq!(manager.next_undo_action(), "Undo Add Five");

        manager.undo();
        manager.wait();
        assert_eq!(value.load(Ordering::SeqCst), 0);
        assert!(manager.can_redo());
        assert_eq!(manager.next_redo_action(), "Redo Add Five");

        manager.redo();
        manager.wait();
        assert_eq!(value.load(Ordering::SeqCst), 5);

        let completions = recorder.completions.lock();
        assert_eq!(completions.len(), 3);
        assert!(completions.iter().all(|c| c.success));
        assert_eq!(completions[2].action, ActionKind::Redo);
        assert_eq!(completions[2].past_participle, "Add Five done");
    }

    #[test]
    fn actions_run_in_submission_order() {
        let (manager, _) = manager();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..10 {
            let log = Arc::clone(&log);
            manager.execute(FnCommand::new(format!("step {i}"), move |_| {
                log.lock().push(i);
                Ok(())
            }));
        }
        manager.wait();
        assert_eq!(*log.lock(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn execute_after_undo_discards_redo() {
        let (manager, _) = manager();
        let value = Arc::new(AtomicI64::new(0));

        manager.execute(adder(&value, 1, "A"));
        manager.execute(adder(&value, 2, "B"));
        manager.undo();
        manager.execute(adder(&value, 4, "C"));
        manager.wait();

        assert_eq!(value.load(Ordering::SeqCst), 5);
        assert!(!manager.can_redo());
        assert_eq!(
            manager.undoable_command_descriptions(),
            vec!["C".to_string(), "A".to_string()]
        );
    }

    #[test]
    fn failed_command_is_not_recorded() {
        let (manager, recorder) = manager();
        manager.execute(FnCommand::new("Broken", |_| {
            Err(GrafterError::CommandFailed("boom".to_string()))
        }));
        manager.wait();

        assert!(!manager.can_undo());
        let completions = recorder.completions.lock();
        assert!(!completions[0].success);
        assert!(
            completions[0]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("boom"))
        );
    }

    #[test]
    fn undo_with_empty_stack_reports_failure() {
        let (manager, recorder) = manager();
        manager.undo();
        manager.redo();
        manager.wait();

        let completions = recorder.completions.lock();
        assert_eq!(completions.len(), 2);
        assert!(completions.iter().all(|c| !c.success && c.error.is_some()));
    }

    #[test]
    fn one_shot_clears_stack_only_when_graph_changes() {
        let (manager, recorder) = manager();
        let value = Arc::new(AtomicI64::new(0));
        let flag = manager.graph_change_flag();
        let mut graph = Graph::new();
        graph.add_observer(Arc::new(flag));
        let graph = Arc::new(Mutex::new(graph));

        manager.execute(adder(&value, 1, "A"));
        manager.execute_once(FnCommand::new("Inspect", |_| Ok(())));
        manager.wait();
        assert!(manager.can_undo());

        let target = Arc::clone(&graph);
        manager.execute_once(FnCommand::new("Grow", move |_| {
            target.lock().add_node();
            Ok(())
        }));
        manager.wait();
        assert!(!manager.can_undo());
        assert_eq!(*recorder.cleared.lock(), 1);
    }

    #[test]
    fn cancellation_stops_cooperative_command() {
        let (manager, recorder) = manager();
        let (tx, rx) = mpsc::channel();
        manager.execute(
            FnCommand::new("Spin", move |ctx| {
                tx.send(()).expect("signal");
                loop {
                    ctx.check_cancelled()?;
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
            .cancellable(),
        );

        rx.recv_timeout(Duration::from_secs(5)).expect("started");
        assert!(manager.command_is_cancellable());
        assert_eq!(manager.command_verb().as_deref(), Some("Spin"));
        assert!(!manager.can_undo());
        manager.cancel();
        manager.wait();

        assert!(!manager.can_undo());
        assert!(!manager.command_is_cancelling());
        assert_eq!(*recorder.cancelling.lock(), vec![true, false]);
        let completions = recorder.completions.lock();
        assert!(completions[0].was_cancelled());
    }

    #[test]
    fn cancel_when_idle_is_a_no_op() {
        let (manager, recorder) = manager();
        manager.cancel();
        assert!(!manager.command_is_cancelling());
        assert!(recorder.cancelling.lock().is_empty());
    }

    #[test]
    fn started_and_finished_bracket_a_batch() {
        let (manager, recorder) = manager();
        let (tx, rx) = mpsc::channel::<()>();
        manager.execute(FnCommand::new("Gate", move |_| {
            rx.recv_timeout(Duration::from_secs(5))
                .map_err(|e| GrafterError::CommandFailed(e.to_string()))
        }));
        manager.execute(FnCommand::new("Next", |_| Ok(())));
        tx.send(()).expect("release");
        manager.wait();

        assert_eq!(*recorder.started.lock(), 1);
        assert_eq!(*recorder.finished.lock(), 1);
        assert!(!manager.busy());
    }

    #[test]
    fn undo_levels_are_capped() {
        let manager = CommandManager::new(CommandManagerConfig { max_undo_levels: 3 })
            .expect("manager");
        let value = Arc::new(AtomicI64::new(0));
        for i in 0..6 {
            manager.execute(adder(&value, 1, &format!("C{i}")));
        }
        manager.wait();
        assert_eq!(manager.undoable_command_descriptions().len(), 3);

        manager.set_max_undo_levels(1);
        assert_eq!(
            manager.undoable_command_descriptions(),
            vec!["C5".to_string()]
        );
    }

    #[test]
    fn drop_cancels_running_command() {
        let (tx, rx) = mpsc::channel();
        let manager = CommandManager::new(CommandManagerConfig::default()).expect("manager");
        manager.execute(
            FnCommand::new("Forever", move |ctx| {
                tx.send(()).expect("signal");
                loop {
                    ctx.check_cancelled()?;
                    std::thread::sleep(Duration::from_millis(1));
                }
            })
            .cancellable(),
        );
        rx.recv_timeout(Duration::from_secs(5)).expect("started");
        drop(manager);
    }

    #[test]
    fn clear_command_stack_empties_history() {
        let (manager, recorder) = manager();
        let value = Arc::new(AtomicI64::new(0));
        manager.execute(adder(&value, 1, "A"));
        manager.wait();

        manager.clear_command_stack();
        assert!(!manager.can_undo());
        assert_eq!(*recorder.cleared.lock(), 1);
    }
}
