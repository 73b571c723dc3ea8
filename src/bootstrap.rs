use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::{
    api::handler::AppState,
    chain::{
        evm::{EvmChainClient, EvmConfig},
        ChainReader, MonitoringExecutor,
    },
    config::Config,
    error::AppResult,
    monitor::{ActivityDetector, ContractReconciler, GasPolicy, MonitoringService, WorkerSettings},
    status::{file::StatusFile, Health, StatusBoard},
};

pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    // Ledger client: reader and signer share one provider
    let client = Arc::new(EvmChainClient::new(
        EvmConfig {
            rpc_url: config.rpc_url.clone(),
            factory_address: config.factory_address,
            rpc_timeout: config.rpc_timeout,
            receipt_timeout: config.receipt_timeout,
        },
        config.signer.clone(),
    )?);
    let reader: Arc<dyn ChainReader> = client.clone();
    let executor: Arc<dyn MonitoringExecutor> = client;
    info!(
        rpc = %config.rpc_url,
        factory = %config.factory_address,
        signer = %executor.signer_address(),
        "✅ Chain client initialized"
    );

    let detector = Arc::new(ActivityDetector::new(
        reader.clone(),
        config.scan_blocks,
        config.balance_cache_capacity,
    ));
    info!(
        scan_blocks = config.scan_blocks,
        cache_capacity = config.balance_cache_capacity,
        "✅ Activity detector initialized"
    );

    let reconciler = ContractReconciler::new(
        reader.clone(),
        executor.clone(),
        detector,
        GasPolicy {
            margin_percent: config.gas_margin_percent,
            max_fee_per_gas: config.max_fee_per_gas,
            max_priority_fee_per_gas: config.max_priority_fee_per_gas,
        },
        config.factory_address,
    );

    let status_file = Arc::new(StatusFile::new(&config.status_file));
    recover_status_file(&status_file, config).await;
    let status = Arc::new(StatusBoard::new(executor.signer_address()).with_sink(status_file));

    let service = Arc::new(MonitoringService::new(
        reader.clone(),
        executor,
        reconciler,
        status,
        WorkerSettings {
            sweep_interval: config.sweep_interval,
            contract_delay: config.contract_delay,
            min_gas_reserve_wei: config.min_gas_reserve_wei,
        },
    ));
    info!("✅ Monitoring service initialized");

    Ok(AppState {
        service,
        reader,
        stale_after: config.stale_after,
    })
}

/// Report what the previous run left behind; it is overwritten on start.
async fn recover_status_file(file: &StatusFile, config: &Config) {
    match file.load().await {
        Ok(Some(previous)) => {
            let health = Health::classify(
                previous.is_running,
                previous.last_check,
                Utc::now(),
                config.stale_after,
            );
            if previous.is_running && !health.is_healthy() {
                warn!(
                    path = %file.path().display(),
                    last_check = ?previous.last_check,
                    "⚠️ previous run did not shut down cleanly (stale isRunning=true)"
                );
            } else {
                info!(
                    path = %file.path().display(),
                    was_running = previous.is_running,
                    last_check = ?previous.last_check,
                    "📄 found previous status file"
                );
            }
        }
        Ok(None) => info!(path = %file.path().display(), "📄 no previous status file"),
        Err(e) => warn!(
            path = %file.path().display(),
            error = %e,
            "⚠️ previous status file is unreadable, it will be replaced"
        ),
    }
}
