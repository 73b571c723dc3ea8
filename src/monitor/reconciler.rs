use std::sync::Arc;

use alloy::{
    primitives::{Address, B256},
    sol_types::SolEvent,
};
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    chain::{
        abi::IInheritanceFactory::MonitoringDeactivated, ChainReader, EmittedLog,
        MonitoringExecutor, SkipReason, SubmissionReceipt, TxParams,
    },
    error::{ChainError, ErrorKind},
    monitor::activity::ActivityDetector,
};

/// Gas limit margin and fixed EIP-1559 fee caps for submissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub margin_percent: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            margin_percent: 20,
            max_fee_per_gas: 20_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
        }
    }
}

impl GasPolicy {
    /// `ceil(estimate * (100 + margin) / 100)`, saturating at `u64::MAX`
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let scaled = u128::from(estimate) * u128::from(100 + self.margin_percent);
        u64::try_from(scaled.div_ceil(100)).unwrap_or(u64::MAX)
    }

    pub fn tx_params(&self, estimate: u64) -> TxParams {
        TxParams {
            gas_limit: self.gas_limit(estimate),
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReport {
    pub wallet_has_activity: bool,
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_limit: u64,
    pub gas_used: u64,
    /// The factory emitted `MonitoringDeactivated` for this contract
    pub inheritance_triggered: bool,
}

/// Result of reconciling one contract in a sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Skipped(SkipReason),
    Submitted(SubmissionReport),
    Failed(ChainError),
}

impl ReconcileOutcome {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ReconcileOutcome::Failed(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Per-contract decision and state-transition submission.
///
/// The worker only supplies the activity observation; the contract
/// compares elapsed time against its own threshold.
pub struct ContractReconciler {
    reader: Arc<dyn ChainReader>,
    executor: Arc<dyn MonitoringExecutor>,
    detector: Arc<ActivityDetector>,
    gas: GasPolicy,
    factory: Address,
}

impl ContractReconciler {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        executor: Arc<dyn MonitoringExecutor>,
        detector: Arc<ActivityDetector>,
        gas: GasPolicy,
        factory: Address,
    ) -> Self {
        Self {
            reader,
            executor,
            detector,
            gas,
            factory,
        }
    }

    /// Reconcile one contract. Never fails: errors are classified, logged
    /// and returned as `ReconcileOutcome::Failed` so the sweep moves on.
    #[instrument(skip(self, contract), fields(contract = %contract))]
    pub async fn reconcile(&self, contract: Address) -> ReconcileOutcome {
        let outcome = match self.try_reconcile(contract).await {
            Ok(outcome) => outcome,
            Err(e) => ReconcileOutcome::Failed(e),
        };

        if let ReconcileOutcome::Failed(e) = &outcome {
            match e.kind() {
                ErrorKind::CallReverted => {
                    warn!(error = %e, "💥 contract rejected monitoring call, skipping")
                }
                ErrorKind::InsufficientFunds => error!(
                    signer = %self.executor.signer_address(),
                    error = %e,
                    "💸 monitoring signer cannot pay for gas; every submission will fail until it is funded"
                ),
                _ => error!(error = ?e, "❌ error monitoring contract, skipping for this sweep"),
            }
        }

        outcome
    }

    async fn try_reconcile(&self, contract: Address) -> Result<ReconcileOutcome, ChainError> {
        let view = self.reader.contract_view(contract).await?;
        let window = view.inactivity_window(Utc::now().timestamp());

        debug!(
            owner = %view.owner,
            needs_monitoring = view.needs_monitoring,
            triggered = view.triggered,
            last_activity = view.last_activity,
            inactivity_time = view.inactivity_time,
            since_activity_secs = window.since_activity_secs,
            threshold_elapsed = window.threshold_elapsed(),
            "📊 contract state"
        );

        if let Some(reason) = view.skip_reason() {
            info!(?reason, "⏭️ contract does not need monitoring, skipping");
            return Ok(ReconcileOutcome::Skipped(reason));
        }

        let wallet_has_activity = self.detector.has_activity(view.owner).await;

        let estimate = self
            .executor
            .estimate_process_monitoring(contract, wallet_has_activity)
            .await?;
        let params = self.gas.tx_params(estimate);
        info!(
            wallet_has_activity,
            estimate,
            gas_limit = params.gas_limit,
            "📞 submitting processContractMonitoring"
        );

        let receipt = self
            .executor
            .submit_process_monitoring(contract, wallet_has_activity, params)
            .await?;

        let inheritance_triggered = self.deactivated(&receipt, contract);
        info!(
            tx_hash = %receipt.tx_hash,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            events = receipt.logs.len(),
            "✅ monitoring transaction confirmed"
        );
        if inheritance_triggered {
            info!("🎯 contract was deactivated, inheritance triggered");
        }

        Ok(ReconcileOutcome::Submitted(SubmissionReport {
            wallet_has_activity,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_limit: params.gas_limit,
            gas_used: receipt.gas_used,
            inheritance_triggered,
        }))
    }

    fn deactivated(&self, receipt: &SubmissionReceipt, contract: Address) -> bool {
        receipt
            .logs
            .iter()
            .any(|log| is_deactivation_of(log, self.factory, contract))
    }
}

fn is_deactivation_of(log: &EmittedLog, factory: Address, contract: Address) -> bool {
    log.address == factory
        && log.topics.first() == Some(&MonitoringDeactivated::SIGNATURE_HASH)
        && log
            .topics
            .get(1)
            .map(|topic| Address::from_word(*topic) == contract)
            .unwrap_or(false)
}
