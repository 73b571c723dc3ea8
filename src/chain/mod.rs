// Ledger access: read-only queries plus the single write the worker performs.
pub mod abi;
pub mod evm;

#[cfg(test)]
pub mod mock;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde::Serialize;

use crate::error::ChainResult;

/// View fields read from an inheritance contract before reconciling it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractView {
    pub needs_monitoring: bool,
    pub owner: Address,
    /// Unix seconds
    pub last_activity: u64,
    /// Seconds of owner inactivity before inheritance may trigger
    pub inactivity_time: u64,
    pub triggered: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotMonitored,
    AlreadyTriggered,
}

impl ContractView {
    /// Only monitored, untriggered contracts are ever reconciled.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        if !self.needs_monitoring {
            Some(SkipReason::NotMonitored)
        } else if self.triggered {
            Some(SkipReason::AlreadyTriggered)
        } else {
            None
        }
    }

    pub fn inactivity_window(&self, now_unix: i64) -> InactivityWindow {
        InactivityWindow::new(self.last_activity, self.inactivity_time, now_unix)
    }
}

/// Time elapsed against a contract's inactivity threshold.
///
/// Purely informational: the contract itself decides whether to trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InactivityWindow {
    pub since_activity_secs: i64,
    pub threshold_secs: u64,
}

impl InactivityWindow {
    pub fn new(last_activity: u64, inactivity_time: u64, now_unix: i64) -> Self {
        let last = i64::try_from(last_activity).unwrap_or(i64::MAX);
        Self {
            since_activity_secs: now_unix.saturating_sub(last),
            threshold_secs: inactivity_time,
        }
    }

    pub fn threshold_elapsed(&self) -> bool {
        self.since_activity_secs >= 0 && self.since_activity_secs as u64 >= self.threshold_secs
    }

    pub fn remaining_secs(&self) -> u64 {
        let elapsed = self.since_activity_secs.max(0) as u64;
        self.threshold_secs.saturating_sub(elapsed)
    }
}

/// Full on-chain record of an inheritance contract, as the dashboard sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoredContract {
    pub contract_address: Address,
    pub owner: Address,
    pub beneficiary: Address,
    pub amount: U256,
    pub inactivity_time: u64,
    pub last_activity: u64,
    pub triggered: bool,
    pub claimed: bool,
    pub needs_monitoring: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    PendingTrigger,
    Inactive,
    Triggered,
    Claimed,
}

impl MonitoredContract {
    pub fn status(&self, now_unix: i64) -> ContractStatus {
        if self.claimed {
            ContractStatus::Claimed
        } else if self.triggered {
            ContractStatus::Triggered
        } else if !self.needs_monitoring {
            ContractStatus::Inactive
        } else if InactivityWindow::new(self.last_activity, self.inactivity_time, now_unix)
            .threshold_elapsed()
        {
            ContractStatus::PendingTrigger
        } else {
            ContractStatus::Active
        }
    }

    pub fn time_remaining(&self, now_unix: i64) -> u64 {
        InactivityWindow::new(self.last_activity, self.inactivity_time, now_unix).remaining_secs()
    }
}

/// Sender and recipient of a transaction seen in a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionParties {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
}

impl TransactionParties {
    pub fn involves(&self, wallet: Address) -> bool {
        self.from == wallet || self.to == Some(wallet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockTransactions {
    Hashes(Vec<B256>),
    Full(Vec<TransactionParties>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    pub number: u64,
    pub transactions: BlockTransactions,
}

/// Gas and fee settings attached to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxParams {
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedLog {
    pub address: Address,
    pub topics: Vec<B256>,
}

/// Mined result of a `processContractMonitoring` submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub logs: Vec<EmittedLog>,
}

/// Read-only ledger access.
///
/// Every call is an idempotent read; transport failures and timeouts
/// surface as `ChainError::Unavailable`.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Contracts the factory still lists as active
    async fn active_contracts(&self) -> ChainResult<Vec<Address>>;

    /// Address the factory accepts monitoring submissions from
    async fn monitoring_service(&self) -> ChainResult<Address>;

    async fn contract_view(&self, contract: Address) -> ChainResult<ContractView>;

    async fn contract_details(&self, contract: Address) -> ChainResult<MonitoredContract>;

    /// Native balance in wei
    async fn balance(&self, wallet: Address) -> ChainResult<U256>;

    async fn block_number(&self) -> ChainResult<u64>;

    /// Block by height; `full` requests transaction bodies instead of hashes
    async fn block(&self, number: u64, full: bool) -> ChainResult<Option<BlockSummary>>;
}

/// Signs and submits the monitoring transition on the factory
#[async_trait]
pub trait MonitoringExecutor: Send + Sync {
    fn signer_address(&self) -> Address;

    async fn estimate_process_monitoring(
        &self,
        contract: Address,
        wallet_has_activity: bool,
    ) -> ChainResult<u64>;

    /// Submit and wait for the receipt
    async fn submit_process_monitoring(
        &self,
        contract: Address,
        wallet_has_activity: bool,
        params: TxParams,
    ) -> ChainResult<SubmissionReceipt>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(needs_monitoring: bool, triggered: bool) -> ContractView {
        ContractView {
            needs_monitoring,
            owner: Address::repeat_byte(0x11),
            last_activity: 1_000,
            inactivity_time: 600,
            triggered,
        }
    }

    #[test]
    fn test_skip_reason() {
        assert_eq!(view(true, false).skip_reason(), None);
        assert_eq!(view(false, false).skip_reason(), Some(SkipReason::NotMonitored));
        assert_eq!(view(true, true).skip_reason(), Some(SkipReason::AlreadyTriggered));
        assert_eq!(view(false, true).skip_reason(), Some(SkipReason::NotMonitored));
    }

    #[test]
    fn test_inactivity_window() {
        let window = view(true, false).inactivity_window(1_300);
        assert_eq!(window.since_activity_secs, 300);
        assert!(!window.threshold_elapsed());
        assert_eq!(window.remaining_secs(), 300);

        let window = view(true, false).inactivity_window(1_600);
        assert!(window.threshold_elapsed());
        assert_eq!(window.remaining_secs(), 0);

        // Clock skew: last activity in the future
        let window = view(true, false).inactivity_window(900);
        assert!(!window.threshold_elapsed());
        assert_eq!(window.remaining_secs(), 600);
    }

    #[test]
    fn test_contract_status_precedence() {
        let mut contract = MonitoredContract {
            contract_address: Address::repeat_byte(0xaa),
            owner: Address::repeat_byte(0x11),
            beneficiary: Address::repeat_byte(0x22),
            amount: U256::from(5u64),
            inactivity_time: 600,
            last_activity: 1_000,
            triggered: false,
            claimed: false,
            needs_monitoring: true,
        };
        assert_eq!(contract.status(1_100), ContractStatus::Active);
        assert_eq!(contract.time_remaining(1_100), 500);
        assert_eq!(contract.status(1_700), ContractStatus::PendingTrigger);

        contract.needs_monitoring = false;
        assert_eq!(contract.status(1_100), ContractStatus::Inactive);

        contract.triggered = true;
        assert_eq!(contract.status(1_100), ContractStatus::Triggered);

        contract.claimed = true;
        assert_eq!(contract.status(1_100), ContractStatus::Claimed);
    }

    #[test]
    fn test_transaction_parties_involves() {
        let wallet = Address::repeat_byte(0x11);
        let sent = TransactionParties {
            hash: B256::repeat_byte(1),
            from: wallet,
            to: Some(Address::repeat_byte(0x22)),
        };
        let received = TransactionParties {
            hash: B256::repeat_byte(2),
            from: Address::repeat_byte(0x22),
            to: Some(wallet),
        };
        let deploy = TransactionParties {
            hash: B256::repeat_byte(3),
            from: Address::repeat_byte(0x33),
            to: None,
        };
        assert!(sent.involves(wallet));
        assert!(received.involves(wallet));
        assert!(!deploy.involves(wallet));
    }
}
