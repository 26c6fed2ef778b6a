//! # Session Actions
//!
//! Undoable commands over a shared [`Session`], plus a listener that keeps a log
//! of recent completions.
//!
//! Commands lock the session for the whole of `execute`/`undo`; they run on the
//! command worker, never on an async task.

use grafter_core::{
    CancellationToken, Command, CommandCompletion, CommandContext, CommandListener, FnCommand,
    GrafterError, Graph, NodeId, Session, TransformConfig,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// A session shared between the command worker and its readers.
pub type SharedSession = Arc<Mutex<Session>>;

/// Number of completions kept by [`CompletionLog`].
pub const COMPLETION_LOG_LEN: usize = 32;

pub fn shared(session: Session) -> SharedSession {
    Arc::new(Mutex::new(session))
}

// =============================================================================
// APPLY TRANSFORMS
// =============================================================================

/// Replace the transform chain and rebuild. Undo restores the previous chain.
pub struct ApplyTransformsCommand {
    session: SharedSession,
    chain: Vec<TransformConfig>,
    previous: Vec<TransformConfig>,
}

impl ApplyTransformsCommand {
    pub fn new(session: SharedSession, chain: Vec<TransformConfig>) -> Self {
        Self {
            session,
            chain,
            previous: Vec::new(),
        }
    }

    fn chain_label(chain: &[TransformConfig]) -> String {
        if chain.is_empty() {
            "none".to_string()
        } else {
            chain
                .iter()
                .map(TransformConfig::name)
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// Install `chain` and rebuild, returning the chain it replaced. On failure the
/// replaced chain is reinstated and rebuilt without cancellation.
fn switch_chain(
    session: &mut Session,
    chain: Vec<TransformConfig>,
    ctx: &CommandContext,
) -> Result<Vec<TransformConfig>, GrafterError> {
    let previous = session.set_transforms(chain);
    match session.rebuild(ctx, ctx.token()) {
        Ok(delta) => {
            tracing::debug!(
                added_nodes = delta.added_nodes.len(),
                removed_nodes = delta.removed_nodes.len(),
                added_edges = delta.added_edges.len(),
                removed_edges = delta.removed_edges.len(),
                "transforms applied"
            );
            Ok(previous)
        }
        Err(error) => {
            session.set_transforms(previous);
            session.rebuild(ctx, &CancellationToken::new())?;
            Err(error)
        }
    }
}

impl Command for ApplyTransformsCommand {
    fn description(&self) -> String {
        format!("Apply Transforms ({})", Self::chain_label(&self.chain))
    }

    fn verb(&self) -> String {
        "Applying Transforms".to_string()
    }

    fn past_participle(&self) -> String {
        "Transforms Applied".to_string()
    }

    fn cancellable(&self) -> bool {
        true
    }

    fn execute(&mut self, ctx: &CommandContext) -> Result<(), GrafterError> {
        let mut session = self.session.lock();
        self.previous = switch_chain(&mut session, self.chain.clone(), ctx)?;
        Ok(())
    }

    fn undo(&mut self, ctx: &CommandContext) -> Result<(), GrafterError> {
        let mut session = self.session.lock();
        switch_chain(&mut session, self.previous.clone(), ctx).map(|_| ())
    }
}

// =============================================================================
// REMOVE NODES
// =============================================================================

/// Remove nodes (whole merged sets) from the source graph and rebuild.
/// Undo restores the source as it was.
pub struct RemoveNodesCommand {
    session: SharedSession,
    ids: Vec<NodeId>,
    snapshot: Option<Graph>,
}

impl RemoveNodesCommand {
    pub fn new(session: SharedSession, ids: Vec<NodeId>) -> Self {
        Self {
            session,
            ids,
            snapshot: None,
        }
    }
}

impl Command for RemoveNodesCommand {
    fn description(&self) -> String {
        match self.ids.len() {
            1 => "Remove Node".to_string(),
            n => format!("Remove {} Nodes", n),
        }
    }

    fn verb(&self) -> String {
        "Removing Nodes".to_string()
    }

    fn past_participle(&self) -> String {
        "Nodes Removed".to_string()
    }

    fn execute(&mut self, ctx: &CommandContext) -> Result<(), GrafterError> {
        let mut session = self.session.lock();
        if let Some(&missing) = self.ids.iter().find(|&&id| !session.source().contains_node(id)) {
            return Err(GrafterError::NodeNotFound(missing));
        }
        self.snapshot = Some(session.source_snapshot());
        session.remove_source_nodes(&self.ids);
        session.rebuild(ctx, &CancellationToken::new())?;
        Ok(())
    }

    fn undo(&mut self, ctx: &CommandContext) -> Result<(), GrafterError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| GrafterError::CommandFailed("nothing to restore".to_string()))?;
        let mut session = self.session.lock();
        session.restore_source(snapshot);
        session.rebuild(ctx, &CancellationToken::new())?;
        Ok(())
    }
}

/// One-shot node removal: nothing to undo, so the engine clears its history.
pub fn remove_nodes_once(session: SharedSession, ids: Vec<NodeId>) -> FnCommand {
    let description = format!("Delete {} Node(s)", ids.len());
    FnCommand::new(description, move |ctx| {
        let mut session = session.lock();
        session.remove_source_nodes(&ids);
        session.rebuild(ctx, &CancellationToken::new()).map(|_| ())
    })
    .with_verb("Deleting Nodes")
    .with_past_participle("Nodes Deleted")
}

// =============================================================================
// COMPLETION LOG
// =============================================================================

/// Listener that logs every completion and keeps the most recent ones.
#[derive(Debug, Default)]
pub struct CompletionLog {
    completions: Mutex<VecDeque<CommandCompletion>>,
}

impl CompletionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<CommandCompletion> {
        self.completions.lock().back().cloned()
    }

    /// Recent completions, oldest first.
    pub fn recent(&self) -> Vec<CommandCompletion> {
        self.completions.lock().iter().cloned().collect()
    }
}

impl CommandListener for CompletionLog {
    fn on_command_completed(&self, completion: &CommandCompletion) {
        if completion.success {
            tracing::info!(action = ?completion.action, "{}", completion.past_participle);
        } else if completion.was_cancelled() {
            tracing::info!(action = ?completion.action, "{} cancelled", completion.description);
        } else {
            tracing::warn!(
                action = ?completion.action,
                error = completion.error.as_deref().unwrap_or_default(),
                "{} failed",
                completion.description
            );
        }

        let mut completions = self.completions.lock();
        if completions.len() == COMPLETION_LOG_LEN {
            completions.pop_front();
        }
        completions.push_back(completion.clone());
    }

    fn on_stack_cleared(&self) {
        tracing::info!("undo history cleared");
    }

    fn on_cancelling_changed(&self, cancelling: bool) {
        tracing::debug!(cancelling, "cancellation state changed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::GraphFile;
    use grafter_core::{
        CommandManager, CommandManagerConfig, Condition, ConditionOp, ElementKind, FilterConfig,
    };

    fn session() -> SharedSession {
        let file = GraphFile::from_json(
            r#"{
                "nodes": [
                    { "id": "a", "attributes": { "score": 1 } },
                    { "id": "b", "attributes": { "score": 2 } },
                    { "id": "c", "attributes": { "score": 3 } }
                ],
                "edges": [
                    { "source": "a", "target": "b" },
                    { "source": "b", "target": "c" }
                ]
            }"#,
        )
        .expect("parse");
        let session = shared(file.into_session().expect("import"));
        session
            .lock()
            .rebuild(&CommandContext::detached(), &CancellationToken::new())
            .expect("rebuild");
        session
    }

    fn keep_score_below(limit: f64) -> Vec<TransformConfig> {
        vec![TransformConfig::Filter(FilterConfig {
            element: ElementKind::Node,
            condition: Condition::number("score", ConditionOp::GreaterOrEqual, limit),
            invert: false,
        })]
    }

    fn manager() -> (CommandManager, Arc<CompletionLog>) {
        let log = Arc::new(CompletionLog::new());
        let manager = CommandManager::with_listener(
            CommandManagerConfig::default(),
            Arc::clone(&log) as Arc<dyn CommandListener>,
        )
        .expect("manager");
        (manager, log)
    }

    #[test]
    fn apply_transforms_round_trip() {
        let session = session();
        let (manager, log) = manager();

        manager.execute(ApplyTransformsCommand::new(
            Arc::clone(&session),
            keep_score_below(3.0),
        ));
        manager.wait();
        assert_eq!(session.lock().target().node_count(), 2);
        assert_eq!(
            manager.next_undo_action(),
            "Undo Apply Transforms (Filter)"
        );

        manager.undo();
        manager.wait();
        assert_eq!(session.lock().target().node_count(), 3);
        assert!(session.lock().transforms().is_empty());

        manager.redo();
        manager.wait();
        assert_eq!(session.lock().target().node_count(), 2);
        assert!(log.recent().iter().all(|c| c.success));
    }

    #[test]
    fn cancelled_apply_reinstates_previous_chain() {
        let session = session();
        let detached = CommandContext::detached();
        let mut first = ApplyTransformsCommand::new(Arc::clone(&session), keep_score_below(3.0));
        first.execute(&detached).expect("apply");
        assert_eq!(session.lock().target().node_count(), 2);

        let token = CancellationToken::new();
        token.cancel();
        let cancelled = CommandContext::new(token, Arc::clone(detached.progress_state()));
        let mut second = ApplyTransformsCommand::new(Arc::clone(&session), keep_score_below(2.0));
        let result = second.execute(&cancelled);

        assert!(matches!(result, Err(GrafterError::Cancelled)));
        let guard = session.lock();
        assert_eq!(guard.transforms(), keep_score_below(3.0).as_slice());
        assert_eq!(guard.target().node_ids(), vec![NodeId(0), NodeId(1)]);
    }

    #[test]
    fn remove_nodes_undo_restores_source() {
        let session = session();
        let (manager, _log) = manager();

        manager.execute(RemoveNodesCommand::new(Arc::clone(&session), vec![NodeId(1)]));
        manager.wait();
        assert_eq!(session.lock().source().node_count(), 2);
        assert_eq!(session.lock().target().edge_count(), 0);

        manager.undo();
        manager.wait();
        assert_eq!(session.lock().source().node_count(), 3);
        assert_eq!(session.lock().target().edge_count(), 2);
    }

    #[test]
    fn removing_missing_node_fails_without_recording() {
        let session = session();
        let (manager, log) = manager();

        manager.execute(RemoveNodesCommand::new(Arc::clone(&session), vec![NodeId(9)]));
        manager.wait();

        assert!(!manager.can_undo());
        let last = log.last().expect("completion");
        assert!(!last.success);
        assert!(last.error.expect("error").contains("Node not found"));
    }

    #[test]
    fn one_shot_removal_clears_history() {
        let session = session();
        let (manager, _log) = manager();
        session
            .lock()
            .add_source_observer(Arc::new(manager.graph_change_flag()));

        manager.execute(ApplyTransformsCommand::new(
            Arc::clone(&session),
            keep_score_below(2.0),
        ));
        manager.execute_once(remove_nodes_once(Arc::clone(&session), vec![NodeId(0)]));
        manager.wait();

        assert!(!manager.can_undo());
        assert_eq!(session.lock().source().node_count(), 2);
    }

    #[test]
    fn completion_log_is_bounded() {
        let log = CompletionLog::new();
        for _ in 0..COMPLETION_LOG_LEN + 5 {
            log.on_command_completed(&CommandCompletion {
                action: grafter_core::ActionKind::Execute,
                success: true,
                description: "X".to_string(),
                past_participle: "X done".to_string(),
                error: None,
            });
        }
        assert_eq!(log.recent().len(), COMPLETION_LOG_LEN);
    }
}
