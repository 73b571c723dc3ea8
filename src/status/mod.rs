// Worker health: one in-memory source of truth, published to sinks
// (status file) and read directly by the HTTP handlers.
pub mod file;
pub mod probe;

use std::{sync::Arc, time::{Duration, Instant}};

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::AppResult;

/// Persisted view of the worker, as written to the status file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub wallet_address: Option<Address>,
    pub last_check: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
}

impl StatusSnapshot {
    pub fn stopped() -> Self {
        Self {
            is_running: false,
            wallet_address: None,
            last_check: None,
            started_at: None,
        }
    }
}

/// Resident memory of this process, when the platform exposes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss_bytes: Option<u64>,
    pub virtual_bytes: Option<u64>,
}

impl MemoryUsage {
    #[cfg(target_os = "linux")]
    pub fn current() -> Self {
        let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
        Self {
            rss_bytes: proc_status_bytes(&status, "VmRSS:"),
            virtual_bytes: proc_status_bytes(&status, "VmSize:"),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn current() -> Self {
        Self {
            rss_bytes: None,
            virtual_bytes: None,
        }
    }
}

/// `VmRSS:    1234 kB` style line from /proc/self/status, in bytes
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn proc_status_bytes(status: &str, key: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with(key))?;
    let mut fields = line[key.len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

/// Live health report: the snapshot plus process metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    pub is_running: bool,
    pub wallet_address: Address,
    pub last_check: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub uptime_secs: f64,
    pub memory: MemoryUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Healthy,
    Unhealthy,
}

impl Health {
    /// Healthy only while running AND the last check is fresher than
    /// `stale_after`; a wedged loop that never signalled stop goes stale.
    pub fn classify(
        is_running: bool,
        last_check: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        stale_after: Duration,
    ) -> Self {
        let Some(last_check) = last_check else {
            return Health::Unhealthy;
        };
        let fresh = match (now - last_check).to_std() {
            Ok(age) => age < stale_after,
            // last_check in the future: clock skew, treat as fresh
            Err(_) => true,
        };
        if is_running && fresh {
            Health::Healthy
        } else {
            Health::Unhealthy
        }
    }

    pub fn is_healthy(self) -> bool {
        self == Health::Healthy
    }
}

/// Destination for status snapshots published by the board
#[async_trait]
pub trait StatusSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn publish(&self, snapshot: &StatusSnapshot) -> AppResult<()>;
}

/// Single-writer status store shared by the worker and its readers
pub struct StatusBoard {
    snapshot: RwLock<StatusSnapshot>,
    /// Held across mutate + publish so sinks see updates in order
    publishing: tokio::sync::Mutex<()>,
    signer: Address,
    process_started: Instant,
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl StatusBoard {
    pub fn new(signer: Address) -> Self {
        Self {
            snapshot: RwLock::new(StatusSnapshot {
                wallet_address: Some(signer),
                ..StatusSnapshot::stopped()
            }),
            publishing: tokio::sync::Mutex::new(()),
            signer,
            process_started: Instant::now(),
            sinks: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.snapshot.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.snapshot.read().is_running
    }

    pub fn worker_status(&self) -> WorkerStatus {
        let snapshot = self.snapshot();
        WorkerStatus {
            is_running: snapshot.is_running,
            wallet_address: self.signer,
            last_check: snapshot.last_check,
            started_at: snapshot.started_at,
            uptime_secs: self.process_started.elapsed().as_secs_f64(),
            memory: MemoryUsage::current(),
        }
    }

    pub async fn mark_started(&self, now: DateTime<Utc>) {
        self.update(|s| {
            s.is_running = true;
            s.started_at = Some(now);
            s.last_check = Some(now);
        })
        .await;
    }

    pub async fn mark_stopped(&self) {
        self.update(|s| {
            s.is_running = false;
            s.started_at = None;
        })
        .await;
    }

    /// Record a sweep boundary; `last_check` never moves backwards.
    pub async fn record_check(&self, now: DateTime<Utc>) {
        self.update(|s| {
            s.last_check = Some(s.last_check.map_or(now, |previous| previous.max(now)));
        })
        .await;
    }

    async fn update(&self, mutate: impl FnOnce(&mut StatusSnapshot)) {
        let _publishing = self.publishing.lock().await;
        let snapshot = {
            let mut guard = self.snapshot.write();
            mutate(&mut *guard);
            guard.clone()
        };

        for sink in &self.sinks {
            if let Err(e) = sink.publish(&snapshot).await {
                error!(sink = sink.name(), error = %e, "failed to publish monitoring status");
            }
        }
    }
}
