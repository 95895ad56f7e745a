//! Data handed over by the deployment model, and the record persisted per pid.
//!
//! The deployment model owns systems, container definitions and container
//! instances; proctab only reads the handful of fields it needs and carries
//! everything else through untouched (`extra`) so that a stored snapshot
//! round-trips exactly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Execution mode requested by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Spawn processes and persist records.
    #[default]
    Live,
    /// Report what would run. No process, no record.
    Preview,
}

impl Mode {
    pub const fn is_preview(self) -> bool {
        matches!(self, Self::Preview)
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preview" => Ok(Self::Preview),
            "live" => Ok(Self::Live),
            other => Err(Error::Config(format!("unknown mode: {other}"))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Live => f.write_str("live"),
            Self::Preview => f.write_str("preview"),
        }
    }
}

/// A deployed system: the unit that owns repositories and containers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Root of the system's checked-out repositories.
    pub repo_path: PathBuf,
}

impl System {
    /// Repository root for a container definition.
    ///
    /// Definitions that name a repository live under
    /// `<repo_path>/workspace/<repo-name>`; the rest run from `repo_path`.
    pub fn repo_root(&self, definition: &ContainerDefinition) -> PathBuf {
        definition
            .specific
            .repository_url
            .as_deref()
            .and_then(repo_name_from_url)
            .map_or_else(
                || self.repo_path.clone(),
                |name| self.repo_path.join("workspace").join(name),
            )
    }

    /// Directory holding per-container `.log` / `.errors` files.
    pub fn logs_dir(&self, dir_name: &str) -> PathBuf {
        self.repo_path.join(dir_name)
    }
}

/// Last path segment of a git URL with any `.git` suffix removed.
fn repo_name_from_url(url: &str) -> Option<&str> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    (!name.is_empty()).then_some(name)
}

/// Static description of a container: what to run and where.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub specific: DefinitionSpecific,
}

impl ContainerDefinition {
    /// The command to execute, if the definition carries a non-empty one.
    pub fn command(&self) -> Option<&str> {
        self.specific
            .execute
            .as_ref()
            .and_then(|execute| execute.process.as_deref())
            .filter(|process| !process.trim().is_empty())
    }

    /// Optional working directory relative to the repository root.
    pub fn cwd_override(&self) -> Option<&Path> {
        self.specific
            .execute
            .as_ref()
            .and_then(|execute| execute.cwd.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionSpecific {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execute: Option<ExecuteBlock>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `execute` block of a process container definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecuteBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// A concrete container placed in a system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInstance {
    pub id: String,
    #[serde(rename = "type", default)]
    pub container_type: String,
    #[serde(default)]
    pub container_definition_id: String,
    /// Pid of the process backing this instance, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific: Option<InstanceSpecific>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContainerInstance {
    /// Environment entries in mapping order.
    pub fn environment(&self) -> impl Iterator<Item = (&str, String)> {
        self.specific
            .iter()
            .flat_map(|specific| specific.environment.iter())
            .map(|(key, value)| (key.as_str(), env_value(value)))
    }

    /// Address other containers reach this one on.
    ///
    /// Only instances with `specific` networking metadata have one; the
    /// private address wins over the public one, then the lowercase key.
    pub fn target_ip(&self) -> Option<&str> {
        let specific = self.specific.as_ref()?;
        [
            specific.private_ip_address.as_deref(),
            specific.ip_address.as_deref(),
            specific.ipaddress.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|ip| !ip.is_empty())
    }
}

/// Strings are used verbatim; anything else is rendered as JSON text.
fn env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSpecific {
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Map::is_empty"
    )]
    pub environment: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipaddress: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An explicit `null` environment means no variables.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Map<String, Value>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// What a preview reports instead of running anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewDescription {
    #[serde(rename = "cmd")]
    pub command: String,
    pub host: String,
}

impl PreviewDescription {
    pub const PREVIEW_HOST: &'static str = "localhost";

    pub fn for_definition(definition: &ContainerDefinition) -> Self {
        let command = definition.command().map_or_else(
            || {
                format!(
                    "missing execute block for container: {} deploy will fail",
                    definition.id
                )
            },
            str::to_string,
        );
        Self {
            command,
            host: Self::PREVIEW_HOST.to_string(),
        }
    }
}

/// One registry entry: "pid P belongs to container C of system S".
///
/// Written once after a successful spawn and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRecord {
    pub system_id: String,
    pub target: String,
    pub pid: u32,
    #[serde(rename = "type", default)]
    pub container_type: String,
    pub container_id: String,
    #[serde(default)]
    pub container_definition_id: String,
    /// Snapshot of the container instance at launch time.
    pub container: ContainerInstance,
}

impl ProcessRecord {
    pub fn new(pid: u32, system: &System, target: &str, container: &ContainerInstance) -> Self {
        Self {
            system_id: system.id.clone(),
            target: target.to_string(),
            pid,
            container_type: container.container_type.clone(),
            container_id: container.id.clone(),
            container_definition_id: container.container_definition_id.clone(),
            container: container.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(value: Value) -> ContainerDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn mode_parses_known_values() {
        assert_eq!("preview".parse::<Mode>().unwrap(), Mode::Preview);
        assert_eq!("live".parse::<Mode>().unwrap(), Mode::Live);
        assert!("dry".parse::<Mode>().is_err());
    }

    #[test]
    fn command_requires_non_empty_process() {
        let def = definition(json!({"id": "web", "specific": {"execute": {"process": "node app.js"}}}));
        assert_eq!(def.command(), Some("node app.js"));

        let blank = definition(json!({"id": "web", "specific": {"execute": {"process": "  "}}}));
        assert_eq!(blank.command(), None);

        let bare = definition(json!({"id": "web"}));
        assert_eq!(bare.command(), None);
    }

    #[test]
    fn repo_root_uses_repository_name() {
        let system = System {
            id: "sys".into(),
            name: None,
            repo_path: PathBuf::from("/srv/sys"),
        };
        let def = definition(json!({
            "id": "web",
            "specific": {"repositoryUrl": "git@github.com:acme/web-app.git"}
        }));
        assert_eq!(
            system.repo_root(&def),
            PathBuf::from("/srv/sys/workspace/web-app")
        );

        let https = definition(json!({
            "id": "web",
            "specific": {"repositoryUrl": "https://github.com/acme/api/"}
        }));
        assert_eq!(system.repo_root(&https), PathBuf::from("/srv/sys/workspace/api"));

        let local = definition(json!({"id": "web"}));
        assert_eq!(system.repo_root(&local), PathBuf::from("/srv/sys"));
    }

    #[test]
    fn target_ip_prefers_private_address() {
        let instance: ContainerInstance = serde_json::from_value(json!({
            "id": "web-1",
            "specific": {
                "ipaddress": "192.168.0.9",
                "ipAddress": "54.1.2.3",
                "privateIpAddress": "10.0.0.5"
            }
        }))
        .unwrap();
        assert_eq!(instance.target_ip(), Some("10.0.0.5"));

        let public_only: ContainerInstance = serde_json::from_value(json!({
            "id": "web-1",
            "specific": {"ipaddress": "192.168.0.9", "ipAddress": "54.1.2.3"}
        }))
        .unwrap();
        assert_eq!(public_only.target_ip(), Some("54.1.2.3"));

        let plain: ContainerInstance = serde_json::from_value(json!({"id": "web-1"})).unwrap();
        assert_eq!(plain.target_ip(), None);
    }

    #[test]
    fn environment_keeps_mapping_order() {
        let instance: ContainerInstance = serde_json::from_value(json!({
            "id": "web-1",
            "specific": {"environment": {"ZED": "1", "ALPHA": "two", "PORT": 8080}}
        }))
        .unwrap();
        let env: Vec<_> = instance.environment().collect();
        assert_eq!(
            env,
            vec![
                ("ZED", "1".to_string()),
                ("ALPHA", "two".to_string()),
                ("PORT", "8080".to_string())
            ]
        );
    }

    #[test]
    fn null_environment_is_empty() {
        let instance: ContainerInstance = serde_json::from_value(json!({
            "id": "web-1",
            "specific": {"environment": null, "privateIpAddress": "10.0.0.5"}
        }))
        .unwrap();
        assert_eq!(instance.environment().count(), 0);
        assert_eq!(instance.target_ip(), Some("10.0.0.5"));
    }

    #[test]
    fn record_without_type_or_definition_id_still_parses() {
        let record: ProcessRecord = serde_json::from_value(json!({
            "systemId": "sys-1",
            "target": "alltargets",
            "pid": 5,
            "containerId": "web-1",
            "container": {"id": "web-1"}
        }))
        .unwrap();
        assert_eq!(record.pid, 5);
        assert_eq!(record.container_type, "");
        assert_eq!(record.container_definition_id, "");
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let system = System {
            id: "sys-1".into(),
            name: None,
            repo_path: PathBuf::from("/srv"),
        };
        let instance: ContainerInstance = serde_json::from_value(json!({
            "id": "web-1",
            "type": "process",
            "containerDefinitionId": "web",
            "specific": {"privateIpAddress": "10.0.0.5"},
            "contains": []
        }))
        .unwrap();
        let record = ProcessRecord::new(4242, &system, "alltargets", &instance);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["systemId"], "sys-1");
        assert_eq!(value["target"], "alltargets");
        assert_eq!(value["pid"], 4242);
        assert_eq!(value["type"], "process");
        assert_eq!(value["containerId"], "web-1");
        assert_eq!(value["containerDefinitionId"], "web");
        assert_eq!(value["container"]["contains"], json!([]));

        let back: ProcessRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn preview_reports_placeholder_for_missing_command() {
        let def = definition(json!({"id": "db"}));
        let preview = PreviewDescription::for_definition(&def);
        assert_eq!(
            preview.command,
            "missing execute block for container: db deploy will fail"
        );
        assert_eq!(preview.host, "localhost");
    }
}
