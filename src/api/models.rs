use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    chain::{ContractStatus, MonitoredContract},
    status::{Health, MemoryUsage, WorkerStatus},
};

// ========== RESPONSE MODELS ==========

/// Body of `GET /status` and `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: Health,
    pub monitoring: MonitoringInfo,
    pub worker: WorkerInfo,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringInfo {
    pub is_running: bool,
    pub last_check: Option<DateTime<Utc>>,
    /// Milliseconds; `null` until the first check
    pub time_since_last_check: Option<i64>,
    pub wallet_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    /// Process uptime in seconds
    pub uptime: f64,
    pub memory_usage: MemoryUsage,
    pub pid: u32,
}

impl StatusResponse {
    pub fn from_worker(status: &WorkerStatus, now: DateTime<Utc>, stale_after: Duration) -> Self {
        Self {
            status: Health::classify(status.is_running, status.last_check, now, stale_after),
            monitoring: MonitoringInfo {
                is_running: status.is_running,
                last_check: status.last_check,
                time_since_last_check: status
                    .last_check
                    .map(|at| (now - at).num_milliseconds()),
                wallet_address: status.wallet_address.to_string(),
            },
            worker: WorkerInfo {
                uptime: status.uptime_secs,
                memory_usage: status.memory,
                pid: std::process::id(),
            },
            timestamp: now,
        }
    }
}

/// Body of the start/stop control endpoints
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub success: bool,
    pub message: String,
}

/// Contract record plus its derived lifecycle status
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDetailsResponse {
    #[serde(flatten)]
    pub contract: MonitoredContract,
    pub status: ContractStatus,
    /// Seconds until the inactivity threshold elapses
    pub time_remaining: u64,
}

impl ContractDetailsResponse {
    pub fn new(contract: MonitoredContract, now_unix: i64) -> Self {
        Self {
            status: contract.status(now_unix),
            time_remaining: contract.time_remaining(now_unix),
            contract,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundResponse {
    pub status: &'static str,
    pub available_endpoints: Vec<&'static str>,
}
