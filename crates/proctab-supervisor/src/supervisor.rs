//! Orchestrator-facing surface: launcher and registry bound together.

use std::sync::Arc;

use proctab_core::{Config, ContainerDefinition, PreviewDescription, ProcessRecord, Result};
use tracing::error;

use crate::registry::Registry;
use crate::sink::OutputSink;
use crate::subprocess::{LaunchRequest, Launcher};

/// Starts, stops and lists supervised processes.
#[derive(Debug, Clone)]
pub struct Supervisor {
    launcher: Launcher,
    registry: Registry,
}

impl Supervisor {
    pub const fn new(launcher: Launcher, registry: Registry) -> Self {
        Self { launcher, registry }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            Launcher::new(config.launcher.clone()),
            Registry::from_config(&config.registry)?,
        ))
    }

    pub const fn launcher(&self) -> &Launcher {
        &self.launcher
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn preview(
        &self,
        definition: &ContainerDefinition,
        sink: &dyn OutputSink,
    ) -> PreviewDescription {
        self.launcher.preview(definition, sink)
    }

    /// Start a container and, outside preview mode, record its pid.
    ///
    /// The record is written only after the spawn succeeded. If writing it
    /// fails the process keeps running unrecorded and the error is returned.
    pub async fn start(
        &self,
        request: &LaunchRequest<'_>,
        sink: Arc<dyn OutputSink>,
    ) -> Result<Option<u32>> {
        let Some(pid) = self.launcher.start(request, sink).await? else {
            return Ok(None);
        };

        if let Err(e) = self
            .registry
            .write_record(pid, request.system, request.target, request.container)
            .await
        {
            error!(pid, container_id = %request.container.id, error = %e, "Started process could not be recorded");
            return Err(e);
        }
        Ok(Some(pid))
    }

    pub fn stop(&self, request: &LaunchRequest<'_>, sink: &dyn OutputSink) -> Result<()> {
        self.launcher.stop(request, sink)
    }

    /// Records of every supervised process that is still running.
    pub async fn read_all_process_details(&self) -> Result<Vec<ProcessRecord>> {
        self.registry.read_all().await
    }
}
