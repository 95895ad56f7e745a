//! Detached process launcher.
//!
//! Turns a container definition into a running process that outlives the
//! supervisor: the command runs under `<shell> -c` in its own process group,
//! with stdout/stderr appended to per-container files under the system's
//! `logs/` directory. Exit is observed by a background task and reported
//! best-effort; nothing the child does later can fail a returned `start`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use proctab_core::{
    ContainerDefinition, ContainerInstance, Error, LauncherConfig, Mode, PreviewDescription,
    Result, System,
};
use tokio::process::Command;
use tracing::{error, info, warn};

use super::probe;
use crate::sink::{OutputSink, forward, forward_preview};

/// Environment variable carrying the container host address to the child.
pub const DOCKER_HOST_IP_VAR: &str = "DOCKER_HOST_IP";

/// Everything the orchestrator says about one container operation.
#[derive(Debug, Clone, Copy)]
pub struct LaunchRequest<'a> {
    pub mode: Mode,
    pub target: &'a str,
    pub system: &'a System,
    pub definition: &'a ContainerDefinition,
    pub container: &'a ContainerInstance,
}

/// A fully resolved launch, ready to hand to the shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// The definition's command as written.
    pub command: String,
    /// Shell script passed to `<shell> -c`.
    pub script: String,
    pub working_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub stdout_log: PathBuf,
    pub stderr_log: PathBuf,
    pub docker_host_ip: String,
}

/// Launches detached processes and signals them by pid.
#[derive(Debug, Clone, Default)]
pub struct Launcher {
    config: LauncherConfig,
}

impl Launcher {
    pub const fn new(config: LauncherConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Report what `start` would run, without running it.
    pub fn preview(
        &self,
        definition: &ContainerDefinition,
        sink: &dyn OutputSink,
    ) -> PreviewDescription {
        let preview = PreviewDescription::for_definition(definition);
        forward_preview(sink, &preview);
        preview
    }

    /// Resolve the working directory, environment and script for a launch.
    ///
    /// Environment values are interpolated into the script unescaped so that
    /// callers can rely on shell expansion in them; they must come from a
    /// trusted deployment model.
    pub fn plan(
        &self,
        system: &System,
        definition: &ContainerDefinition,
        container: &ContainerInstance,
    ) -> Result<LaunchPlan> {
        let command = definition
            .command()
            .ok_or_else(|| Error::MissingExecute {
                container_id: definition.id.clone(),
            })?
            .to_string();

        let mut working_dir = system.repo_root(definition);
        if let Some(cwd) = definition.cwd_override() {
            working_dir = working_dir.join(cwd);
        }

        let logs_dir = system.logs_dir(&self.config.logs_dir_name);
        let stdout_log = logs_dir.join(format!("{}.log", container.id));
        let stderr_log = logs_dir.join(format!("{}.errors", container.id));

        let mut script = self.profile_prelude();
        for (key, value) in container.environment() {
            script.push_str(&format!("export {key}={value}; "));
        }
        script.push_str(&format!(
            "exec {command} >>{} 2>>{}",
            shell_quote(&stdout_log),
            shell_quote(&stderr_log)
        ));

        if let Some(ip) = container.target_ip() {
            script = script.replace(&self.config.target_ip_placeholder, ip);
        }

        Ok(LaunchPlan {
            command,
            script,
            working_dir,
            logs_dir,
            stdout_log,
            stderr_log,
            docker_host_ip: self.config.docker_host_ip(),
        })
    }

    fn profile_prelude(&self) -> String {
        self.config
            .profile_files
            .iter()
            .map(|file| format!("test -f {file} && source {file}; "))
            .collect()
    }

    /// Start the container's process.
    ///
    /// Returns the new pid, or `None` in preview mode. The caller owns
    /// persisting the pid; see `Supervisor::start`.
    pub async fn start(
        &self,
        request: &LaunchRequest<'_>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Option<u32>> {
        info!(
            container_id = %request.container.id,
            mode = %request.mode,
            target = request.target,
            "starting"
        );
        forward(sink.as_ref(), "starting");

        if request.mode.is_preview() {
            self.preview(request.definition, sink.as_ref());
            return Ok(None);
        }

        let plan = self.plan(request.system, request.definition, request.container)?;
        self.spawn(&plan, sink).await.map(Some)
    }

    /// Spawn a resolved plan as a detached process.
    pub async fn spawn(&self, plan: &LaunchPlan, sink: Arc<dyn OutputSink>) -> Result<u32> {
        tokio::fs::create_dir_all(&plan.logs_dir).await?;

        let mut std_cmd = std::process::Command::new(&self.config.shell);
        std_cmd
            .arg("-c")
            .arg(&plan.script)
            .current_dir(&plan.working_dir)
            .env(DOCKER_HOST_IP_VAR, &plan.docker_host_ip)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // Own process group: terminal signals aimed at the supervisor skip it.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            std_cmd.process_group(0);
        }
        let mut cmd = Command::from(std_cmd);
        cmd.kill_on_drop(false);

        info!(
            command = %plan.command,
            working_dir = %plan.working_dir.display(),
            "Spawning detached process"
        );
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("process {} failed with error {e}", plan.command);
                error!("{message}");
                forward(sink.as_ref(), &message);
                return Err(Error::SpawnFailed {
                    command: plan.command.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let Some(pid) = child.id() else {
            return Err(Error::SpawnFailed {
                command: plan.command.clone(),
                reason: "process exited before its pid could be read".to_string(),
            });
        };

        let command = plan.command.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    let message = format!("process {command} {}", describe_exit(status));
                    if status.success() {
                        info!(pid, "{message}");
                    } else {
                        warn!(pid, "{message}");
                    }
                    forward(sink.as_ref(), &message);
                }
                Err(e) => {
                    let message = format!("process {command} failed with error {e}");
                    error!(pid, "{message}");
                    forward(sink.as_ref(), &message);
                }
            }
        });

        info!(pid, "Process started");
        Ok(pid)
    }

    /// Ask the container's process to terminate.
    ///
    /// Fire-and-forget: whether the process actually went away is settled by
    /// the registry's next reconciliation, so delivery failures only log.
    pub fn stop(&self, request: &LaunchRequest<'_>, sink: &dyn OutputSink) -> Result<()> {
        if request.mode.is_preview() {
            return Ok(());
        }
        let Some(pid) = request.container.pid else {
            info!(container_id = %request.container.id, "No pid recorded, nothing to stop");
            return Ok(());
        };

        forward(sink, &format!("stopping process {pid}"));
        if let Err(e) = probe::terminate(pid) {
            warn!(pid, container_id = %request.container.id, error = %e, "Stop signal not delivered");
        }
        Ok(())
    }
}

fn describe_exit(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exited with code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("terminated by signal {signal}");
        }
    }
    "exited".to_string()
}

/// Single-quote a path for the shell.
fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', r"'\''"))
}
