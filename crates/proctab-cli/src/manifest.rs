//! Launch manifests: the deployment-model slice one CLI call operates on.

use std::path::Path;

use anyhow::Context;
use proctab_core::{ContainerDefinition, ContainerInstance, Mode, System};
use proctab_supervisor::LaunchRequest;
use serde::Deserialize;

fn default_target() -> String {
    "alltargets".to_string()
}

/// `{ target, system, containerDefinition, container }` as JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default = "default_target")]
    pub target: String,
    pub system: System,
    pub container_definition: ContainerDefinition,
    pub container: ContainerInstance,
}

impl Manifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))
    }

    pub fn request(&self, mode: Mode) -> LaunchRequest<'_> {
        LaunchRequest {
            mode,
            target: &self.target,
            system: &self.system,
            definition: &self.container_definition,
            container: &self.container,
        }
    }
}
