//! Detached subprocess launching and pid-level process control.

pub mod launcher;
pub mod probe;

pub use launcher::{LaunchPlan, LaunchRequest, Launcher};
pub use probe::{OsProbe, ProcessProbe, is_pid_alive, terminate};
