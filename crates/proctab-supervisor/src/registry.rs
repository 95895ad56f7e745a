//! Durable pid registry.
//!
//! One JSON file per supervised process, named `<pid>.pid`, in a single
//! directory. The files are the only link between the supervisor and the
//! detached children it started, so every read re-checks liveness and
//! deletes the records of processes that are gone before returning
//! anything.
//!
//! Reads and deletions are strictly sequential in listing order. Several
//! supervisors may share the directory without locking: deletions are
//! delete-if-present and records are written via rename, so a reader never
//! observes a half-written file.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proctab_core::{ContainerInstance, Error, ProcessRecord, RegistryConfig, Result, System};
use tracing::{debug, info, warn};

use crate::subprocess::{OsProbe, ProcessProbe};

/// File name suffix of a registry record.
pub const PID_SUFFIX: &str = ".pid";

const TMP_SUFFIX: &str = ".tmp";

/// The on-disk process table.
#[derive(Clone)]
pub struct Registry {
    data_dir: PathBuf,
    probe: Arc<dyn ProcessProbe>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Registry in `data_dir`, checking liveness against the OS.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self::with_probe(data_dir, Arc::new(OsProbe))
    }

    pub fn with_probe(data_dir: impl Into<PathBuf>, probe: Arc<dyn ProcessProbe>) -> Self {
        Self {
            data_dir: data_dir.into(),
            probe,
        }
    }

    /// Registry at the configured location, defaulting under the user's home.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let home = dirs::home_dir();
        Ok(Self::new(config.resolve_data_dir(home.as_deref())?))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the record for `pid`.
    pub fn record_path(&self, pid: &str) -> PathBuf {
        self.data_dir.join(format!("{pid}{PID_SUFFIX}"))
    }

    /// Persist the record for a freshly spawned process.
    ///
    /// Creates the registry directory on first use. An existing record for
    /// the same pid belongs to an earlier process that reused the id and is
    /// replaced.
    pub async fn write_record(
        &self,
        pid: u32,
        system: &System,
        target: &str,
        container: &ContainerInstance,
    ) -> Result<ProcessRecord> {
        let record = ProcessRecord::new(pid, system, target, container);
        let json = serde_json::to_string_pretty(&record)?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        let path = self.record_path(&pid.to_string());
        let tmp = self.data_dir.join(format!("{pid}{PID_SUFFIX}{TMP_SUFFIX}"));
        let written = match tokio::fs::write(&tmp, json).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await
                && cleanup.kind() != ErrorKind::NotFound
            {
                warn!(pid, path = %tmp.display(), error = %cleanup, "Failed to remove partial record");
            }
            return Err(e.into());
        }

        info!(
            pid,
            container_id = %record.container_id,
            system_id = %record.system_id,
            path = %path.display(),
            "Recorded process"
        );
        Ok(record)
    }

    /// Pid strings of every record in the directory, in ascending pid order.
    ///
    /// A missing directory is an empty registry.
    pub async fn list_known_pids(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some(pid) = name.strip_suffix(PID_SUFFIX).filter(|p| !p.is_empty()) {
                pids.push(pid.to_string());
            }
        }
        pids.sort_by(|a, b| pid_order(a).cmp(&pid_order(b)));
        Ok(pids)
    }

    /// Keep the candidates whose process is running; delete the rest.
    ///
    /// A record whose name is not a pid cannot be running and is deleted
    /// too. Failing to delete never fails the call.
    pub async fn reconcile(&self, candidates: Vec<String>) -> Result<Vec<String>> {
        let mut live = Vec::with_capacity(candidates.len());
        for pid in candidates {
            let running = pid
                .parse::<u32>()
                .is_ok_and(|p| self.probe.is_running(p));
            if running {
                live.push(pid);
            } else {
                self.remove(&pid).await;
            }
        }
        Ok(live)
    }

    /// Delete the record for `pid` if it exists.
    ///
    /// Returns whether this call removed it.
    pub async fn remove(&self, pid: &str) -> bool {
        let path = self.record_path(pid);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(pid, "Purged record of dead process");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(pid, "Record already removed");
                false
            }
            Err(e) => {
                warn!(pid, path = %path.display(), error = %e, "Failed to purge record");
                false
            }
        }
    }

    /// Records of all processes that are still running.
    ///
    /// Stale records are purged on the way. One undecodable record fails the
    /// whole read.
    pub async fn read_all(&self) -> Result<Vec<ProcessRecord>> {
        let known = self.list_known_pids().await?;
        let live = self.reconcile(known).await?;
        if live.is_empty() {
            return Ok(Vec::new());
        }

        let mut records = Vec::with_capacity(live.len());
        for pid in live {
            let path = self.record_path(&pid);
            let data = match tokio::fs::read_to_string(&path).await {
                Ok(data) => data,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(pid = %pid, "Record removed by a concurrent reader");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let record = serde_json::from_str(&data)
                .map_err(|source| Error::CorruptRecord { path, source })?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Numeric pids first, ascending; anything else after, by name.
fn pid_order(pid: &str) -> (u64, &str) {
    (pid.parse().unwrap_or(u64::MAX), pid)
}
