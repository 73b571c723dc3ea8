// Monitoring Service - owns the start/stop lifecycle and the periodic sweep
//
// Stopped -> start() -> Running -> stop() -> Stopped
//
// - First sweep runs immediately on start, then one every `sweep_interval`
// - Contracts are reconciled one at a time with `contract_delay` between
//   them so the signer never has two transactions in flight
// - Sweeps never overlap: a tick that lands while a sweep is still running
//   is dropped
// - stop() only prevents future sweeps; an in-flight sweep runs to the end

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use alloy::primitives::{utils::format_ether, Address, U256};
use chrono::Utc;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    chain::{ChainReader, MonitoringExecutor},
    error::{ChainError, ErrorKind},
    monitor::reconciler::{ContractReconciler, ReconcileOutcome},
    status::StatusBoard,
};

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub sweep_interval: Duration,
    pub contract_delay: Duration,
    /// Signer balance below this is reported on start
    pub min_gas_reserve_wei: u128,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            contract_delay: Duration::from_secs(2),
            min_gas_reserve_wei: 10_000_000_000_000_000,
        }
    }
}

/// Tally of one pass over the active contracts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub contracts: usize,
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub triggered: usize,
    /// At least one submission failed because the signer ran out of gas
    pub signer_unfunded: bool,
    /// Set when the active-contract list could not be read
    pub aborted: Option<ChainError>,
}

impl SweepReport {
    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Skipped(_) => self.skipped += 1,
            ReconcileOutcome::Submitted(report) => {
                self.submitted += 1;
                if report.inheritance_triggered {
                    self.triggered += 1;
                }
            }
            ReconcileOutcome::Failed(_) => self.failed += 1,
        }
        if outcome.error_kind() == Some(ErrorKind::InsufficientFunds) {
            self.signer_unfunded = true;
        }
    }
}

struct LoopHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The single worker instance, constructed once at startup and shared by
/// handle with the HTTP layer and the signal handler.
pub struct MonitoringService {
    reader: Arc<dyn ChainReader>,
    executor: Arc<dyn MonitoringExecutor>,
    reconciler: ContractReconciler,
    status: Arc<StatusBoard>,
    settings: WorkerSettings,
    lifecycle: Mutex<Option<LoopHandle>>,
    sweep_in_progress: AtomicBool,
}

impl MonitoringService {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        executor: Arc<dyn MonitoringExecutor>,
        reconciler: ContractReconciler,
        status: Arc<StatusBoard>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            reader,
            executor,
            reconciler,
            status,
            settings,
            lifecycle: Mutex::new(None),
            sweep_in_progress: AtomicBool::new(false),
        }
    }

    pub fn status(&self) -> &Arc<StatusBoard> {
        &self.status
    }

    pub fn signer_address(&self) -> Address {
        self.executor.signer_address()
    }

    /// Start the periodic sweep. Returns `false` if it was already running.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.is_some() {
            info!("Monitoring service already running");
            return false;
        }

        info!(
            signer = %self.signer_address(),
            interval_secs = self.settings.sweep_interval.as_secs(),
            "🚀 Starting inheritance monitoring service"
        );
        let signer_check = self.check_signer().await;
        if signer_check.below_reserve || signer_check.expected_signer.is_some() {
            warn!(
                balance = ?signer_check.balance.map(format_ether),
                "⚠️ starting with signer problems, submissions may fail"
            );
        }
        self.status.mark_started(Utc::now()).await;

        let (shutdown, rx) = watch::channel(false);
        let service = Arc::clone(self);
        let task = tokio::spawn(async move { service.run_loop(rx).await });
        *lifecycle = Some(LoopHandle { shutdown, task });

        info!("✅ Monitoring service started");
        true
    }

    /// Stop scheduling sweeps. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        self.halt().await.is_some()
    }

    /// Stop, then wait up to `grace` for an in-flight sweep to finish.
    pub async fn shutdown(&self, grace: Duration) {
        let Some(task) = self.halt().await else {
            return;
        };
        if tokio::time::timeout(grace, task).await.is_err() {
            warn!(grace_secs = grace.as_secs(), "in-flight sweep did not finish before shutdown");
        }
    }

    async fn halt(&self) -> Option<JoinHandle<()>> {
        let handle = self.lifecycle.lock().await.take();
        let Some(handle) = handle else {
            info!("Monitoring service is not running");
            return None;
        };

        // Receiver may already be gone if the loop task panicked
        let _ = handle.shutdown.send(true);
        self.status.mark_stopped().await;
        info!("⏹️ Monitoring service stopped");
        Some(handle.task)
    }

    async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.settings.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
        info!("Monitoring loop exited");
    }

    /// One pass over every active contract. Returns `None` without doing
    /// anything if another sweep is still in progress.
    pub async fn sweep(&self) -> Option<SweepReport> {
        if self
            .sweep_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("⏳ previous sweep still in progress, skipping this tick");
            return None;
        }
        let _guard = SweepGuard(&self.sweep_in_progress);

        let sweep_id = Uuid::new_v4();
        let report = self
            .run_sweep()
            .instrument(info_span!("sweep", %sweep_id))
            .await;
        Some(report)
    }

    async fn run_sweep(&self) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport::default();
        self.status.record_check(Utc::now()).await;
        info!("🔍 Checking all active contracts");

        match self.reader.active_contracts().await {
            Ok(contracts) => {
                report.contracts = contracts.len();
                info!(count = contracts.len(), "📋 active contracts found");

                for (index, contract) in contracts.iter().enumerate() {
                    if index > 0 {
                        tokio::time::sleep(self.settings.contract_delay).await;
                    }
                    let outcome = self.reconciler.reconcile(*contract).await;
                    report.record(&outcome);
                }
            }
            Err(e) => {
                error!(error = %e, "❌ failed to list active contracts, ending sweep early");
                report.aborted = Some(e);
            }
        }

        self.status.record_check(Utc::now()).await;
        info!(
            contracts = report.contracts,
            submitted = report.submitted,
            skipped = report.skipped,
            failed = report.failed,
            triggered = report.triggered,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "✓ Sweep completed"
        );
        if report.signer_unfunded {
            error!(
                signer = %self.signer_address(),
                "💸 sweep hit insufficient funds, fund the monitoring signer"
            );
        }
        report
    }

    /// Log the signer's gas balance and warn when it is low or when the
    /// factory expects a different monitoring account. Never blocks start.
    async fn check_signer(&self) -> SignerCheck {
        let signer = self.signer_address();
        let reserve = U256::from(self.settings.min_gas_reserve_wei);
        let mut check = SignerCheck::default();

        match self.reader.balance(signer).await {
            Ok(balance) => {
                info!(%signer, balance = %format_ether(balance), "💰 signer balance");
                check.balance = Some(balance);
                if balance < reserve {
                    check.below_reserve = true;
                    warn!(
                        %signer,
                        balance = %format_ether(balance),
                        reserve = %format_ether(reserve),
                        "⚠️ signer balance is below the gas reserve, submissions may fail"
                    );
                }
            }
            Err(e) => warn!(%signer, error = %e, "⚠️ could not read signer balance"),
        }

        match self.reader.monitoring_service().await {
            Ok(expected) if expected != signer => {
                check.expected_signer = Some(expected);
                warn!(
                    %signer,
                    %expected,
                    "⚠️ factory monitoring service differs from signer, calls will be rejected"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "⚠️ could not read factory monitoring service"),
        }

        check
    }
}

/// What the start-time signer check found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SignerCheck {
    /// `None` when the balance could not be read
    balance: Option<U256>,
    below_reserve: bool,
    /// Set when the factory accepts submissions from another account
    expected_signer: Option<Address>,
}

struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
