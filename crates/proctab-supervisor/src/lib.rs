//! proctab Supervisor Library
//!
//! Out-of-process supervision of detached commands:
//! - Launching container commands as detached processes
//! - A pid-file registry that survives supervisor restarts
//! - Liveness reconciliation that purges records of dead processes
//! - Best-effort output sinks for orchestrator-facing progress

pub mod registry;
pub mod sink;
pub mod subprocess;
pub mod supervisor;

pub use registry::Registry;
pub use sink::{ChannelSink, MemorySink, NullSink, OutputSink};
pub use subprocess::{LaunchRequest, Launcher};
pub use supervisor::Supervisor;
