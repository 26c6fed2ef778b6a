//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::actions::{ApplyTransformsCommand, CompletionLog, shared};
use crate::api;
use crate::import::GraphFile;
use crate::settings::Settings;
use grafter_core::{
    CancellationToken, CommandListener, CommandManager, GrafterError, NullProgress, Session,
    TransformChain,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// TRANSFORM CHAIN FILES
// =============================================================================

/// Maximum transform chain file size (1 MB).
const MAX_CHAIN_FILE_SIZE: u64 = 1024 * 1024;

/// Parse a transform chain: JSON when the text starts with `{`, TOML otherwise.
pub fn parse_chain(text: &str) -> Result<TransformChain, GrafterError> {
    if text.trim_start().starts_with('{') {
        serde_json::from_str(text)
            .map_err(|e| GrafterError::Config(format!("Invalid transform chain: {}", e)))
    } else {
        toml::from_str(text)
            .map_err(|e| GrafterError::Config(format!("Invalid transform chain: {}", e)))
    }
}

/// Read a transform chain file.
pub fn load_chain(path: &Path) -> Result<TransformChain, GrafterError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| GrafterError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    if metadata.len() > MAX_CHAIN_FILE_SIZE {
        return Err(GrafterError::Config(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_CHAIN_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| GrafterError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    parse_chain(&text)
}

fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(settings: &Settings, graph: Option<&Path>) -> Result<(), GrafterError> {
    let session = match graph {
        Some(path) => GraphFile::from_file(path)?.into_session()?,
        None => Session::default(),
    };

    println!("Grafter Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:         {}", settings.bind_address());
    println!("  Max undo levels: {}", settings.max_undo_levels);
    if let Some(path) = graph {
        println!("  Graph:           {}", path.display());
    }
    println!();
    println!("Endpoints:");
    println!("  GET  /health       - Health check");
    println!("  GET  /status       - Engine and session status");
    println!("  GET  /history      - Undo/redo history");
    println!("  GET  /graph        - Derived graph summary");
    println!("  POST /transforms   - Replace the transform chain");
    println!("  POST /nodes/remove - Remove source nodes");
    println!("  POST /undo, /redo, /cancel");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(settings, session).await
}

// =============================================================================
// RUN COMMAND
// =============================================================================

#[derive(Debug, Serialize)]
struct RunReport {
    graph: String,
    source_nodes: usize,
    source_edges: usize,
    nodes: usize,
    edges: usize,
    components: usize,
    added_nodes: usize,
    removed_nodes: usize,
    added_edges: usize,
    removed_edges: usize,
    alerts: Vec<api::AlertJson>,
    derived_attributes: Vec<String>,
}

/// Load a graph, apply a transform chain through the command engine and report.
pub fn cmd_run(
    settings: &Settings,
    json_mode: bool,
    graph_path: &Path,
    chain_path: Option<&Path>,
) -> Result<(), GrafterError> {
    let chain = match chain_path {
        Some(path) => load_chain(path)?,
        None => TransformChain::default(),
    };

    let mut session = GraphFile::from_file(graph_path)?.into_session()?;
    session.rebuild(&NullProgress, &CancellationToken::new())?;
    let session = shared(session);

    let log = Arc::new(CompletionLog::new());
    let manager = CommandManager::with_listener(
        settings.command_config(),
        Arc::clone(&log) as Arc<dyn CommandListener>,
    )?;
    manager.execute(ApplyTransformsCommand::new(
        Arc::clone(&session),
        chain.transforms,
    ));
    manager.wait();

    if let Some(completion) = log.last() {
        if !completion.success {
            return Err(GrafterError::CommandFailed(
                completion
                    .error
                    .unwrap_or_else(|| format!("{} cancelled", completion.description)),
            ));
        }
    }

    let session = session.lock();
    let metrics = session.metrics();
    let delta = session.transformed().delta();
    let report = RunReport {
        graph: graph_path.display().to_string(),
        source_nodes: metrics.source_nodes,
        source_edges: metrics.source_edges,
        nodes: metrics.nodes,
        edges: metrics.edges,
        components: metrics.components,
        added_nodes: delta.added_nodes.len(),
        removed_nodes: delta.removed_nodes.len(),
        added_edges: delta.added_edges.len(),
        removed_edges: delta.removed_edges.len(),
        alerts: session.alerts().iter().map(api::AlertJson::from).collect(),
        derived_attributes: session
            .attributes()
            .iter()
            .filter(|a| a.is_derived())
            .map(|a| a.name().to_string())
            .collect(),
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Grafter Run");
    println!("===========");
    println!("Graph: {}", report.graph);
    println!();
    println!("Source:     {} nodes, {} edges", report.source_nodes, report.source_edges);
    println!("Derived:    {} nodes, {} edges", report.nodes, report.edges);
    println!("Components: {}", report.components);
    println!();
    println!(
        "Removed by transforms: {} nodes, {} edges",
        report.removed_nodes, report.removed_edges
    );
    if !report.derived_attributes.is_empty() {
        println!("Derived attributes:    {}", report.derived_attributes.join(", "));
    }
    for alert in &report.alerts {
        println!(
            "[{:?}] transform {} ({}): {}",
            alert.alert_type, alert.index, alert.transform, alert.text
        );
    }

    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate a transform chain without a graph.
pub fn cmd_check(json_mode: bool, chain_path: &Path) -> Result<(), GrafterError> {
    let chain = load_chain(chain_path)?;
    let errors = chain.validate();

    if json_mode {
        let output = serde_json::json!({
            "transforms": chain.transforms.iter().map(|t| t.name()).collect::<Vec<_>>(),
            "errors": errors
                .iter()
                .map(|(index, error)| serde_json::json!({ "index": index, "error": error.to_string() }))
                .collect::<Vec<_>>(),
        });
        print_json(&output);
    } else {
        println!("Transform chain: {}", chain_path.display());
        for (index, transform) in chain.transforms.iter().enumerate() {
            let verdict = errors
                .iter()
                .find(|(i, _)| *i == index)
                .map(|(_, e)| e.to_string())
                .unwrap_or_else(|| "ok".to_string());
            println!("  {}. {:<8} {}", index, transform.name(), verdict);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(GrafterError::Config(format!(
            "{} invalid transform(s)",
            errors.len()
        )))
    }
}
