// Status probe - how external tooling reads worker health.
//
// Prefers the live HTTP endpoint; falls back to the status file when the
// worker is unreachable, treating a stale lastCheck as not running.

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    api::models::StatusResponse,
    status::{file::StatusFile, Health},
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeSource {
    Http,
    File,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub source: ProbeSource,
    pub is_running: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub wallet_address: Option<String>,
    pub worker_healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct StatusProbe {
    client: reqwest::Client,
    status_url: String,
    status_file: StatusFile,
    stale_after: Duration,
}

impl StatusProbe {
    pub fn new(status_url: impl Into<String>, status_file: impl Into<PathBuf>, stale_after: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            status_url: status_url.into(),
            status_file: StatusFile::new(status_file),
            stale_after,
        }
    }

    pub async fn probe(&self) -> ProbeReport {
        match self.probe_http().await {
            Ok(report) => return report,
            Err(e) => info!(error = %e, "HTTP status endpoint not available, trying status file"),
        }
        self.probe_file(Utc::now()).await
    }

    async fn probe_http(&self) -> Result<ProbeReport, reqwest::Error> {
        let response = self
            .client
            .get(&self.status_url)
            .timeout(HTTP_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        let body: StatusResponse = response.json().await?;
        debug!(status = ?body.status, "status endpoint answered");

        Ok(ProbeReport {
            source: ProbeSource::Http,
            is_running: body.monitoring.is_running,
            last_check: body.monitoring.last_check,
            wallet_address: Some(body.monitoring.wallet_address),
            worker_healthy: body.status.is_healthy(),
            message: None,
        })
    }

    async fn probe_file(&self, now: DateTime<Utc>) -> ProbeReport {
        let snapshot = match self.status_file.load().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                return ProbeReport {
                    source: ProbeSource::None,
                    is_running: false,
                    last_check: None,
                    wallet_address: None,
                    worker_healthy: false,
                    message: Some("Monitoring service not started yet".to_string()),
                }
            }
            Err(e) => {
                return ProbeReport {
                    source: ProbeSource::File,
                    is_running: false,
                    last_check: None,
                    wallet_address: None,
                    worker_healthy: false,
                    message: Some(format!("unreadable status file: {}", e)),
                }
            }
        };

        let health = Health::classify(snapshot.is_running, snapshot.last_check, now, self.stale_after);
        ProbeReport {
            source: ProbeSource::File,
            is_running: health.is_healthy(),
            last_check: snapshot.last_check,
            wallet_address: snapshot.wallet_address.map(|a| a.to_string()),
            worker_healthy: health.is_healthy(),
            message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{StatusSink, StatusSnapshot};
    use alloy::primitives::Address;

    // Nothing listens on port 9 (discard) in the test environment
    const UNREACHABLE: &str = "http://127.0.0.1:9/status";

    async fn write_snapshot(path: &std::path::Path, is_running: bool, last_check: DateTime<Utc>) {
        StatusFile::new(path)
            .publish(&StatusSnapshot {
                is_running,
                wallet_address: Some(Address::repeat_byte(0x5e)),
                last_check: Some(last_check),
                started_at: Some(last_check),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_http_and_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let probe = StatusProbe::new(UNREACHABLE, dir.path().join("status.json"), Duration::from_secs(300));
        let report = probe.probe().await;
        assert_eq!(report.source, ProbeSource::None);
        assert!(!report.is_running);
        assert!(!report.worker_healthy);
    }

    #[tokio::test]
    async fn test_fresh_file_reports_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        write_snapshot(&path, true, Utc::now()).await;

        let probe = StatusProbe::new(UNREACHABLE, &path, Duration::from_secs(300));
        let report = probe.probe().await;
        assert_eq!(report.source, ProbeSource::File);
        assert!(report.is_running);
        assert!(report.worker_healthy);
    }

    #[tokio::test]
    async fn test_recently_stopped_worker_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        write_snapshot(&path, false, Utc::now()).await;

        let probe = StatusProbe::new(UNREACHABLE, &path, Duration::from_secs(300));
        let report = probe.probe().await;
        assert_eq!(report.source, ProbeSource::File);
        assert!(!report.is_running);
        assert!(!report.worker_healthy);
    }

    #[tokio::test]
    async fn test_stale_file_masks_running_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let long_ago = Utc::now() - chrono::Duration::minutes(10);
        write_snapshot(&path, true, long_ago).await;

        let probe = StatusProbe::new(UNREACHABLE, &path, Duration::from_secs(300));
        let report = probe.probe_file(Utc::now()).await;
        assert_eq!(report.source, ProbeSource::File);
        assert!(!report.is_running);
        assert!(!report.worker_healthy);
        assert_eq!(report.last_check, Some(long_ago));
    }
}
