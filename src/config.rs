use std::{path::PathBuf, str::FromStr, time::Duration};

use alloy::{primitives::Address, signers::local::PrivateKeySigner};
use serde::Deserialize;

use crate::error::{AppError, AppResult};

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Raw settings as they come out of the layered `config` sources.
///
/// Required values are optional here so their absence can be reported
/// as `ConfigurationMissing` instead of a generic deserialize error.
#[derive(Debug, Deserialize, Clone)]
struct RawSettings {
    factory_address: Option<String>,
    monitoring_private_key: Option<String>,
    rpc_url: Option<String>,
    next_core_rpc_url: Option<String>,
    bind_address: Option<String>,
    port: u16,
    sweep_interval_secs: u64,
    contract_delay_ms: u64,
    scan_blocks: u64,
    rpc_timeout_secs: u64,
    receipt_timeout_secs: u64,
    min_gas_reserve_wei: String,
    max_fee_gwei: u64,
    priority_fee_gwei: u64,
    gas_margin_percent: u64,
    status_file: String,
    stale_after_secs: u64,
    balance_cache_capacity: usize,
    worker_health_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub factory_address: Address,
    pub signer: PrivateKeySigner,
    pub rpc_url: String,
    pub bind_address: String,
    pub sweep_interval: Duration,
    pub contract_delay: Duration,
    pub scan_blocks: u64,
    pub rpc_timeout: Duration,
    pub receipt_timeout: Duration,
    pub min_gas_reserve_wei: u128,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_margin_percent: u64,
    pub status_file: PathBuf,
    pub stale_after: Duration,
    pub balance_cache_capacity: usize,
    pub worker_health_url: String,
}

impl Config {
    /// Load configuration from defaults, an optional `monitor.*` file and
    /// the process environment, in that order of precedence.
    pub fn from_env() -> AppResult<Self> {
        let settings = Self::builder()?
            .add_source(config::File::with_name("monitor").required(false))
            .add_source(config::Environment::default())
            .build()?;
        Self::from_settings(settings)
    }

    fn builder() -> AppResult<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("port", 8080_i64)?
            .set_default("sweep_interval_secs", 60_i64)?
            .set_default("contract_delay_ms", 2000_i64)?
            .set_default("scan_blocks", 100_i64)?
            .set_default("rpc_timeout_secs", 15_i64)?
            .set_default("receipt_timeout_secs", 120_i64)?
            .set_default("min_gas_reserve_wei", "10000000000000000")?
            .set_default("max_fee_gwei", 20_i64)?
            .set_default("priority_fee_gwei", 2_i64)?
            .set_default("gas_margin_percent", 20_i64)?
            .set_default("status_file", "monitoring-status.json")?
            .set_default("stale_after_secs", 300_i64)?
            .set_default("balance_cache_capacity", 10_000_i64)?)
    }

    pub fn from_settings(settings: config::Config) -> AppResult<Self> {
        let raw: RawSettings = settings.try_deserialize()?;

        let factory_address = required(raw.factory_address, "FACTORY_ADDRESS")?;
        let factory_address = Address::from_str(factory_address.trim()).map_err(|e| {
            AppError::InvalidInput(format!("FACTORY_ADDRESS is not an address: {}", e))
        })?;

        let private_key = required(raw.monitoring_private_key, "MONITORING_PRIVATE_KEY")?;
        let signer = PrivateKeySigner::from_str(private_key.trim()).map_err(|e| {
            AppError::InvalidInput(format!("MONITORING_PRIVATE_KEY is not a valid key: {}", e))
        })?;

        let rpc_url = required(
            non_empty(raw.rpc_url).or(non_empty(raw.next_core_rpc_url)),
            "RPC_URL",
        )?;

        if raw.sweep_interval_secs == 0 {
            return Err(AppError::InvalidInput(
                "SWEEP_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        if raw.scan_blocks == 0 {
            return Err(AppError::InvalidInput(
                "SCAN_BLOCKS must be greater than zero".to_string(),
            ));
        }

        let min_gas_reserve_wei = raw.min_gas_reserve_wei.trim().parse::<u128>().map_err(|e| {
            AppError::InvalidInput(format!("MIN_GAS_RESERVE_WEI is not an integer: {}", e))
        })?;

        let bind_address = raw
            .bind_address
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("0.0.0.0:{}", raw.port));
        let worker_health_url = raw
            .worker_health_url
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}/status", raw.port));

        Ok(Self {
            factory_address,
            signer,
            rpc_url,
            bind_address,
            sweep_interval: Duration::from_secs(raw.sweep_interval_secs),
            contract_delay: Duration::from_millis(raw.contract_delay_ms),
            scan_blocks: raw.scan_blocks,
            rpc_timeout: Duration::from_secs(raw.rpc_timeout_secs),
            receipt_timeout: Duration::from_secs(raw.receipt_timeout_secs),
            min_gas_reserve_wei,
            max_fee_per_gas: u128::from(raw.max_fee_gwei) * WEI_PER_GWEI,
            max_priority_fee_per_gas: u128::from(raw.priority_fee_gwei) * WEI_PER_GWEI,
            gas_margin_percent: raw.gas_margin_percent,
            status_file: PathBuf::from(raw.status_file),
            stale_after: Duration::from_secs(raw.stale_after_secs),
            balance_cache_capacity: raw.balance_cache_capacity,
            worker_health_url,
        })
    }

    /// Settings needed by the `probe` command only; no signer or RPC required.
    pub fn probe_settings() -> AppResult<(String, PathBuf, Duration)> {
        let settings = Self::builder()?
            .add_source(config::File::with_name("monitor").required(false))
            .add_source(config::Environment::default())
            .build()?;
        let port: u16 = settings.get("port")?;
        let url = settings
            .get_string("worker_health_url")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}/status", port));
        let status_file: String = settings.get("status_file")?;
        let stale_after: u64 = settings.get("stale_after_secs")?;
        Ok((url, PathBuf::from(status_file), Duration::from_secs(stale_after)))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    non_empty(value).ok_or_else(|| AppError::ConfigurationMissing(name.to_string()))
}
