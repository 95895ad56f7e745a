//! Configuration resolution for proctab.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/proctab/settings.json)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the binary)
//!
//! Registry and launcher receive their section at construction time and
//! never consult the process environment on their own.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Registry directory relative to the home directory.
pub const DATA_SUBDIR: &str = ".nscale/data";

/// Loopback address used when no container host is configured.
pub const DEFAULT_HOST_IP: Ipv4Addr = Ipv4Addr::LOCALHOST;

static DOCKER_HOST_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"tcp://([0-9.]+):([0-9]+)").ok());

/// Complete proctab configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            launcher: LauncherConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Where the pid registry lives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Registry directory. `None` resolves to `<home>/.nscale/data`.
    pub data_dir: Option<PathBuf>,
}

impl RegistryConfig {
    /// Resolve the registry directory against a home directory.
    pub fn resolve_data_dir(&self, home: Option<&Path>) -> Result<PathBuf> {
        match (&self.data_dir, home) {
            (Some(dir), _) => Ok(dir.clone()),
            (None, Some(home)) => Ok(home.join(DATA_SUBDIR)),
            (None, None) => Err(Error::HomeDirUnavailable),
        }
    }
}

/// How processes are launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Interactive shell used to run the composed command.
    pub shell: PathBuf,
    /// Profile files sourced (if present) before the command runs.
    pub profile_files: Vec<String>,
    /// Name of the per-system log directory under the repository root.
    pub logs_dir_name: String,
    /// Token replaced by the target container's address.
    pub target_ip_placeholder: String,
    /// Raw `tcp://host:port` container host address, if any.
    pub docker_host: Option<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/bash"),
            profile_files: vec!["~/.bashrc".to_string(), "~/.bash_profile".to_string()],
            logs_dir_name: "logs".to_string(),
            target_ip_placeholder: "__TARGETIP__".to_string(),
            docker_host: None,
        }
    }
}

impl LauncherConfig {
    /// Container host address derived from `docker_host`.
    pub fn docker_host_ip(&self) -> String {
        self.docker_host
            .as_deref()
            .and_then(parse_docker_host)
            .unwrap_or_else(|| DEFAULT_HOST_IP.to_string())
    }
}

/// Host part of a `tcp://host:port` address.
pub fn parse_docker_host(value: &str) -> Option<String> {
    let re = DOCKER_HOST_RE.as_ref()?;
    let caps = re.captures(value)?;
    caps.get(1).map(|m| m.as_str().to_string())
}

/// Load configuration with hierarchical resolution.
pub fn load_config() -> Result<Config> {
    let mut config = match global_config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "Loading global config");
            load_config_file(&path)?
        }
        _ => Config::default(),
    };
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|p| p.join("proctab").join("settings.json"))
}

/// Read a settings file.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("PROCTAB_DATA_DIR") {
        config.registry.data_dir = Some(PathBuf::from(val));
    }
    if let Some(val) = var("PROCTAB_SHELL") {
        config.launcher.shell = PathBuf::from(val);
    }
    if let Some(val) = var("PROCTAB_LOG_LEVEL") {
        config.log_level = val;
    }
    if let Some(val) = var("DOCKER_HOST") {
        config.launcher.docker_host = Some(val);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn docker_host_ip_parses_tcp_address() {
        let config = LauncherConfig {
            docker_host: Some("tcp://192.168.59.103:2376".into()),
            ..Default::default()
        };
        assert_eq!(config.docker_host_ip(), "192.168.59.103");
    }

    #[test]
    fn docker_host_ip_falls_back_to_loopback() {
        assert_eq!(LauncherConfig::default().docker_host_ip(), "127.0.0.1");

        let malformed = LauncherConfig {
            docker_host: Some("unix:///var/run/docker.sock".into()),
            ..Default::default()
        };
        assert_eq!(malformed.docker_host_ip(), "127.0.0.1");
    }

    #[test]
    fn data_dir_defaults_under_home() {
        let registry = RegistryConfig::default();
        let dir = registry.resolve_data_dir(Some(Path::new("/home/ops"))).unwrap();
        assert_eq!(dir, PathBuf::from("/home/ops/.nscale/data"));
        assert!(matches!(
            registry.resolve_data_dir(None),
            Err(Error::HomeDirUnavailable)
        ));
    }

    #[test]
    fn explicit_data_dir_wins() {
        let registry = RegistryConfig {
            data_dir: Some(PathBuf::from("/var/lib/proctab")),
        };
        assert_eq!(
            registry.resolve_data_dir(None).unwrap(),
            PathBuf::from("/var/lib/proctab")
        );
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PROCTAB_DATA_DIR", "/tmp/pids"),
            ("DOCKER_HOST", "tcp://10.1.1.1:2375"),
            ("PROCTAB_LOG_LEVEL", "debug"),
        ]);
        let mut config = Config::default();
        apply_env_overrides(&mut config, |k| vars.get(k).map(ToString::to_string));

        assert_eq!(config.registry.data_dir, Some(PathBuf::from("/tmp/pids")));
        assert_eq!(config.launcher.docker_host_ip(), "10.1.1.1");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.launcher.shell, PathBuf::from("/bin/bash"));
    }

    #[test]
    fn settings_file_fills_missing_sections_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"registry": {"data_dir": "/srv/pids"}}"#).unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.registry.data_dir, Some(PathBuf::from("/srv/pids")));
        assert_eq!(config.launcher.logs_dir_name, "logs");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn unreadable_settings_file_is_config_error() {
        let result = load_config_file(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
