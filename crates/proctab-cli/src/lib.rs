//! proctab CLI Library
//!
//! Orchestrator-facing command line over the supervisor: manifests in,
//! terminal output out.

pub mod console;
pub mod manifest;
pub mod process_cmd;
