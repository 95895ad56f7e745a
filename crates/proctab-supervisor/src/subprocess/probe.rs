//! OS-level process liveness and signalling by pid.

use tracing::{debug, warn};

/// Answers "is pid P currently running on this host?".
pub trait ProcessProbe: Send + Sync {
    fn is_running(&self, pid: u32) -> bool;
}

/// Probe backed by `kill(pid, 0)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsProbe;

impl ProcessProbe for OsProbe {
    fn is_running(&self, pid: u32) -> bool {
        is_pid_alive(pid)
    }
}

/// Convert to a pid `kill(2)` will treat as a single process.
///
/// 0 and anything that wraps negative address process groups instead.
fn signal_target(pid: u32) -> Option<libc::pid_t> {
    libc::pid_t::try_from(pid).ok().filter(|p| *p > 0)
}

/// Whether a process with this pid exists and has not exited.
///
/// `EPERM` means the process exists under another user, so it counts as
/// alive. Zombies have exited and count as dead.
pub fn is_pid_alive(pid: u32) -> bool {
    let Some(target) = signal_target(pid) else {
        return false;
    };

    // SAFETY: signal 0 performs only the existence and permission checks;
    // nothing is delivered to the target.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(target, 0) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return err.raw_os_error() == Some(libc::EPERM);
    }

    !is_zombie(pid)
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .ok()
        .and_then(|stat| parse_stat_state(&stat))
        .is_some_and(|state| state == 'Z')
}

#[cfg(not(target_os = "linux"))]
const fn is_zombie(_pid: u32) -> bool {
    false
}

/// Process state from a `/proc/<pid>/stat` line.
///
/// The command name may itself contain spaces and parentheses, so the state
/// is read after the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat_state(stat: &str) -> Option<char> {
    let (_, rest) = stat.rsplit_once(')')?;
    rest.trim_start().chars().next()
}

/// Send `SIGTERM` to a pid without waiting for it to take effect.
pub fn terminate(pid: u32) -> std::io::Result<()> {
    let Some(target) = signal_target(pid) else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("refusing to signal pid {pid}"),
        ));
    };

    debug!(pid, "Sending SIGTERM");
    // SAFETY: target is a positive pid, so kill(2) addresses exactly one
    // process and cannot fan out to a process group.
    #[allow(unsafe_code)]
    let ret = unsafe { libc::kill(target, libc::SIGTERM) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        warn!(pid, error = %err, "Failed to send SIGTERM");
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn own_process_is_alive() {
        assert!(is_pid_alive(std::process::id()));
        assert!(OsProbe.is_running(std::process::id()));
    }

    #[test]
    fn group_addressing_pids_are_never_alive() {
        assert!(!is_pid_alive(0));
        assert!(!is_pid_alive(u32::MAX));
    }

    #[test]
    fn reaped_child_is_not_alive() {
        // A freed pid can be handed out again before the check; a few
        // fresh children make a false positive on every one implausible.
        let dead = (0..5).any(|_| {
            let mut child = std::process::Command::new("true").spawn().unwrap();
            let pid = child.id();
            child.wait().unwrap();
            !is_pid_alive(pid)
        });
        assert!(dead);
    }

    #[test]
    fn terminate_rejects_group_pids() {
        let err = terminate(0).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
    }

    #[test]
    fn stat_state_skips_command_name() {
        assert_eq!(parse_stat_state("42 (my (odd) cmd) Z 1 42"), Some('Z'));
        assert_eq!(parse_stat_state("7 (sleep) S 1 7"), Some('S'));
        assert_eq!(parse_stat_state("garbage"), None);
    }
}
