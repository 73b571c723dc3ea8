use std::{
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    status::{StatusSink, StatusSnapshot},
};

/// Status file at a well-known path, replaced atomically on every update
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously written snapshot, or `None` if no file exists yet.
    pub async fn load(&self) -> AppResult<Option<StatusSnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to a uniquely named sibling, then rename over `path`.
fn replace_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staging = NamedTempFile::new_in(dir)?;
    staging.write_all(body)?;
    staging.as_file().sync_all()?;
    staging.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StatusSink for StatusFile {
    fn name(&self) -> &'static str {
        "status-file"
    }

    async fn publish(&self, snapshot: &StatusSnapshot) -> AppResult<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_atomically(&path, &body))
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))??;
        debug!(path = %self.path.display(), "status file updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use chrono::{DateTime, Utc};

    fn snapshot(is_running: bool, secs: i64) -> StatusSnapshot {
        let at = DateTime::<Utc>::from_timestamp(secs, 0).unwrap();
        StatusSnapshot {
            is_running,
            wallet_address: Some(Address::repeat_byte(0x5e)),
            last_check: Some(at),
            started_at: is_running.then_some(at),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("monitoring-status.json"));
        assert_eq!(file.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_publish_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("monitoring-status.json"));

        file.publish(&snapshot(true, 1_000)).await.unwrap();
        file.publish(&snapshot(false, 2_000)).await.unwrap();

        assert_eq!(file.load().await.unwrap(), Some(snapshot(false, 2_000)));
        // no staging files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(file.path()).unwrap()).unwrap();
        assert_eq!(raw["isRunning"], false);
        assert_eq!(raw["startedAt"], serde_json::Value::Null);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publishes_all_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let file = std::sync::Arc::new(StatusFile::new(dir.path().join("monitoring-status.json")));

        let writes = (0..32i64).map(|i| {
            let file = file.clone();
            tokio::spawn(async move { file.publish(&snapshot(i % 2 == 0, 1_000 + i)).await })
        });
        for result in futures::future::join_all(writes).await {
            result.unwrap().unwrap();
        }

        assert!(file.load().await.unwrap().is_some());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_reads_snapshot_written_by_other_tools() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitoring-status.json");
        std::fs::write(
            &path,
            r#"{"isRunning": false, "walletAddress": null, "lastCheck": null, "startedAt": null}"#,
        )
        .unwrap();
        let file = StatusFile::new(path);
        assert_eq!(file.load().await.unwrap(), Some(StatusSnapshot::stopped()));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitoring-status.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(StatusFile::new(path).load().await.is_err());
    }
}
