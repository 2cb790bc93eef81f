//! A file-backed stand-in for the coordinated configuration store.
//!
//! Watches a directory tree shaped like the real store's key layout and
//! turns filesystem events into the same `Set`/`Delete` stream a live store
//! would emit over its own wire protocol. Layout, mirroring
//! `/proc/logyard/config/...`:
//!
//! - `<base>/drains/<name>`         — drain URI, one line
//! - `<base>/retry_limits/<prefix>` — duration string (`"30m"`, `"0"` = infinite)
//! - `<base>/cluster_endpoint`      — `host:port` of the shared redis/control node

use logyard_core::control::ConfigChange;
use logyard_core::error::{LogyardError, Result};
use logyard_core::retry::RetryLimits;
use logyard_core::types::DrainConfig;
use logyard_core::uri::drain_config_from_uri;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Everything read from the store at startup, before the live watch begins.
pub struct ConfigSnapshot {
    pub drains: HashMap<String, DrainConfig>,
    pub retry_limits: RetryLimits,
    pub cluster_endpoint: Option<String>,
}

pub struct FileConfigStore {
    base: PathBuf,
    rev: Arc<AtomicU64>,
}

/// Keeps the underlying filesystem watcher alive; dropping it stops the watch.
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
}

impl FileConfigStore {
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into(), rev: Arc::new(AtomicU64::new(0)) }
    }

    fn drains_dir(&self) -> PathBuf {
        self.base.join("drains")
    }

    fn retry_limits_dir(&self) -> PathBuf {
        self.base.join("retry_limits")
    }

    fn cluster_endpoint_path(&self) -> PathBuf {
        self.base.join("cluster_endpoint")
    }

    /// Write (or overwrite) a drain's URI. Used by the daemon's control API
    /// to implement the CLI's `add` command; the watcher observes the
    /// resulting filesystem event and emits the matching `ConfigChange::Set`.
    ///
    /// # Errors
    ///
    /// `Store` if the drains directory can't be created or the file can't
    /// be written.
    pub async fn put_drain(&self, name: &str, uri: &str) -> Result<()> {
        let dir = self.drains_dir();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| LogyardError::Store(e.to_string()))?;
        tokio::fs::write(dir.join(name), uri).await.map_err(|e| LogyardError::Store(e.to_string()))
    }

    /// Remove a drain's entry. Idempotent: removing an already-absent drain
    /// is not an error.
    ///
    /// # Errors
    ///
    /// `Store` if the file exists but can't be removed.
    pub async fn remove_drain(&self, name: &str) -> Result<()> {
        match tokio::fs::remove_file(self.drains_dir().join(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LogyardError::Store(e.to_string())),
        }
    }

    /// Read the full current state of the store, for startup bootstrap.
    ///
    /// # Errors
    ///
    /// `Store` if a present file can't be read (permissions, I/O failure).
    /// Malformed entries are logged and skipped rather than failing the load.
    pub async fn load(&self) -> Result<ConfigSnapshot> {
        let drains = self.load_drains().await?;
        let retry_limits = self.load_retry_limits().await?;
        let cluster_endpoint = tokio::fs::read_to_string(self.cluster_endpoint_path())
            .await
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(ConfigSnapshot { drains, retry_limits, cluster_endpoint })
    }

    async fn load_drains(&self) -> Result<HashMap<String, DrainConfig>> {
        let mut drains = HashMap::new();
        let Ok(mut entries) = tokio::fs::read_dir(self.drains_dir()).await else {
            return Ok(drains);
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| LogyardError::Store(e.to_string()))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let uri =
                tokio::fs::read_to_string(entry.path()).await.map_err(|e| LogyardError::Store(e.to_string()))?;
            match drain_config_from_uri(&name, uri.trim()) {
                Ok(config) => {
                    drains.insert(name, config);
                },
                Err(err) => tracing::warn!(drain = %name, error = %err, "skipping malformed drain config"),
            }
        }
        Ok(drains)
    }

    async fn load_retry_limits(&self) -> Result<RetryLimits> {
        let mut limits = RetryLimits::new();
        let Ok(mut entries) = tokio::fs::read_dir(self.retry_limits_dir()).await else {
            return Ok(limits);
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| LogyardError::Store(e.to_string()))? {
            let prefix = entry.file_name().to_string_lossy().into_owned();
            let raw =
                tokio::fs::read_to_string(entry.path()).await.map_err(|e| LogyardError::Store(e.to_string()))?;
            match parse_duration(raw.trim()) {
                Some(budget) => limits.set(prefix, budget),
                None => tracing::warn!(prefix = %prefix, value = %raw.trim(), "skipping malformed retry limit"),
            }
        }
        Ok(limits)
    }

    /// Start watching `drains/` for adds, edits and removals, returning a
    /// stream of `ConfigChange`s alongside the guard keeping the watch alive.
    ///
    /// # Errors
    ///
    /// `Store` if the drains directory can't be created or the OS watcher
    /// can't be installed on it.
    pub fn watch(&self) -> Result<(mpsc::Receiver<ConfigChange>, WatchGuard)> {
        let drains_dir = self.drains_dir();
        std::fs::create_dir_all(&drains_dir).map_err(|e| LogyardError::Store(e.to_string()))?;

        let (tx, rx) = mpsc::channel(64);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = events_tx.send(event);
            }
        })
        .map_err(|e| LogyardError::Store(e.to_string()))?;
        watcher.watch(&drains_dir, RecursiveMode::NonRecursive).map_err(|e| LogyardError::Store(e.to_string()))?;

        let rev = self.rev.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                for path in event.paths {
                    let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else { continue };
                    let Some(change) = change_for(&event.kind, &path, &name, &rev).await else { continue };
                    if tx.send(change).await.is_err() {
                        return;
                    }
                }
            }
        });

        Ok((rx, WatchGuard { _watcher: watcher }))
    }
}

async fn change_for(
    kind: &notify::EventKind,
    path: &std::path::Path,
    name: &str,
    rev: &Arc<AtomicU64>,
) -> Option<ConfigChange> {
    match kind {
        notify::EventKind::Remove(_) => {
            let rev = rev.fetch_add(1, Ordering::SeqCst) + 1;
            Some(ConfigChange::Delete { name: name.to_string(), rev })
        },
        notify::EventKind::Create(_) | notify::EventKind::Modify(_) => {
            // The remove event for an in-flight rename follows separately;
            // a read failure here just means we raced it, not a real error.
            let uri = tokio::fs::read_to_string(path).await.ok()?;
            match drain_config_from_uri(name, uri.trim()) {
                Ok(config) => {
                    let rev = rev.fetch_add(1, Ordering::SeqCst) + 1;
                    Some(ConfigChange::Set { name: name.to_string(), config, rev })
                },
                Err(err) => {
                    tracing::warn!(drain = %name, error = %err, "ignoring malformed drain config update");
                    None
                },
            }
        },
        _ => None,
    }
}

/// Go-style duration literal (`"30m"`, `"10s"`, `"2h"`, bare seconds), with
/// `"0"` meaning an infinite retry budget rather than zero retries.
fn parse_duration(raw: &str) -> Option<Duration> {
    if raw == "0" {
        return Some(Duration::MAX);
    }
    match raw.chars().last()? {
        unit @ ('s' | 'm' | 'h') => {
            let n: u64 = raw[..raw.len() - 1].parse().ok()?;
            let secs = match unit {
                's' => n,
                'm' => n.checked_mul(60)?,
                'h' => n.checked_mul(3600)?,
                _ => unreachable!(),
            };
            Some(Duration::from_secs(secs))
        },
        _ => raw.parse::<u64>().ok().map(Duration::from_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_literals_parse() {
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("2h"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("45"), Some(Duration::from_secs(45)));
        assert_eq!(parse_duration("0"), Some(Duration::MAX));
        assert_eq!(parse_duration("bogus"), None);
    }

    #[tokio::test]
    async fn loads_existing_drains_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("drains")).await.unwrap();
        tokio::fs::write(dir.path().join("drains/syslog"), "tcp://10.0.0.1:514?filters=systail.").await.unwrap();
        tokio::fs::create_dir_all(dir.path().join("retry_limits")).await.unwrap();
        tokio::fs::write(dir.path().join("retry_limits/syslog"), "30m").await.unwrap();
        tokio::fs::write(dir.path().join("cluster_endpoint"), "10.1.1.1:6380\n").await.unwrap();

        let store = FileConfigStore::new(dir.path());
        let snapshot = store.load().await.unwrap();

        assert!(snapshot.drains.contains_key("syslog"));
        assert_eq!(snapshot.cluster_endpoint.as_deref(), Some("10.1.1.1:6380"));
        assert_eq!(
            snapshot.retry_limits.budget_for("syslog", Duration::from_secs(1)),
            Duration::from_secs(1800)
        );
    }

    #[tokio::test]
    async fn put_then_remove_drain_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());

        store.put_drain("syslog", "tcp://10.0.0.1:514").await.unwrap();
        let snapshot = store.load().await.unwrap();
        assert!(snapshot.drains.contains_key("syslog"));

        store.remove_drain("syslog").await.unwrap();
        let snapshot = store.load().await.unwrap();
        assert!(!snapshot.drains.contains_key("syslog"));

        // Removing an already-absent drain is not an error.
        store.remove_drain("syslog").await.unwrap();
    }

    #[tokio::test]
    async fn watch_reports_set_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConfigStore::new(dir.path());
        let (mut changes, _guard) = store.watch().unwrap();

        let drain_path = dir.path().join("drains/syslog");
        tokio::fs::write(&drain_path, "tcp://10.0.0.1:514").await.unwrap();
        let set = tokio::time::timeout(Duration::from_secs(5), changes.recv()).await.unwrap().unwrap();
        assert_eq!(set.name(), "syslog");
        assert!(matches!(set, ConfigChange::Set { .. }));

        tokio::fs::remove_file(&drain_path).await.unwrap();
        let delete = tokio::time::timeout(Duration::from_secs(5), changes.recv()).await.unwrap().unwrap();
        assert_eq!(delete.name(), "syslog");
        assert!(matches!(delete, ConfigChange::Delete { .. }));
    }
}
