//! # grafter
//!
//! Application layer over `grafter-core`: settings, JSON graph import, undoable
//! session commands, the CLI and the HTTP API.

pub mod actions;
pub mod api;
pub mod cli;
pub mod import;
pub mod settings;
