//! In-memory ledger used by unit tests.

use std::collections::HashMap;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    chain::{
        BlockSummary, BlockTransactions, ChainReader, ContractView, EmittedLog, MonitoredContract,
        MonitoringExecutor, SubmissionReceipt, TransactionParties, TxParams,
    },
    error::{ChainError, ChainResult},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub contract: Address,
    pub wallet_has_activity: bool,
    pub params: TxParams,
}

#[derive(Default)]
struct LedgerState {
    active: Vec<Address>,
    views: HashMap<Address, ContractView>,
    balances: HashMap<Address, U256>,
    tip: u64,
    blocks: HashMap<u64, Vec<TransactionParties>>,
    fail_reads: bool,
    fail_blocks: Vec<u64>,
    gas_estimate: u64,
    submit_errors: HashMap<Address, ChainError>,
    deactivate_on_submit: Vec<Address>,
    submissions: Vec<Submission>,
    block_reads: Vec<u64>,
    estimates: usize,
    monitoring_service: Option<Address>,
}

/// Scriptable `ChainReader` + `MonitoringExecutor`
pub struct MockChain {
    signer: Address,
    factory: Address,
    state: Mutex<LedgerState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            signer: Address::repeat_byte(0x5e),
            factory: Address::repeat_byte(0xfa),
            state: Mutex::new(LedgerState {
                tip: 1_000,
                gas_estimate: 50_000,
                ..Default::default()
            }),
        }
    }

    pub fn factory(&self) -> Address {
        self.factory
    }

    pub fn add_contract(&self, contract: Address, view: ContractView) {
        let mut state = self.state.lock();
        state.active.push(contract);
        state.views.insert(contract, view);
    }

    pub fn set_balance(&self, wallet: Address, wei: u64) {
        self.state.lock().balances.insert(wallet, U256::from(wei));
    }

    pub fn set_tip(&self, tip: u64) {
        self.state.lock().tip = tip;
    }

    pub fn add_transaction(&self, block: u64, from: Address, to: Option<Address>) {
        let mut state = self.state.lock();
        let txs = state.blocks.entry(block).or_default();
        let hash = B256::with_last_byte(txs.len() as u8 + 1);
        txs.push(TransactionParties { hash, from, to });
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    pub fn fail_block(&self, number: u64) {
        self.state.lock().fail_blocks.push(number);
    }

    pub fn set_gas_estimate(&self, gas: u64) {
        self.state.lock().gas_estimate = gas;
    }

    pub fn fail_submission(&self, contract: Address, error: ChainError) {
        self.state.lock().submit_errors.insert(contract, error);
    }

    pub fn deactivate_on_submit(&self, contract: Address) {
        self.state.lock().deactivate_on_submit.push(contract);
    }

    pub fn set_monitoring_service(&self, service: Address) {
        self.state.lock().monitoring_service = Some(service);
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().submissions.clone()
    }

    pub fn estimates(&self) -> usize {
        self.state.lock().estimates
    }

    pub fn block_reads(&self) -> Vec<u64> {
        self.state.lock().block_reads.clone()
    }

    fn check_reads(&self, op: &'static str) -> ChainResult<()> {
        if self.state.lock().fail_reads {
            Err(ChainError::unavailable(op, "connection refused"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn active_contracts(&self) -> ChainResult<Vec<Address>> {
        self.check_reads("getActiveContracts")?;
        Ok(self.state.lock().active.clone())
    }

    async fn monitoring_service(&self) -> ChainResult<Address> {
        self.check_reads("getMonitoringService")?;
        Ok(self.state.lock().monitoring_service.unwrap_or(self.signer))
    }

    async fn contract_view(&self, contract: Address) -> ChainResult<ContractView> {
        self.check_reads("contract_view")?;
        self.state
            .lock()
            .views
            .get(&contract)
            .cloned()
            .ok_or_else(|| ChainError::CallReverted(format!("no contract at {}", contract)))
    }

    async fn contract_details(&self, contract: Address) -> ChainResult<MonitoredContract> {
        let view = self.contract_view(contract).await?;
        Ok(MonitoredContract {
            contract_address: contract,
            owner: view.owner,
            beneficiary: Address::repeat_byte(0xbe),
            amount: U256::from(1_000_000_000_000_000_000u64),
            inactivity_time: view.inactivity_time,
            last_activity: view.last_activity,
            triggered: view.triggered,
            claimed: false,
            needs_monitoring: view.needs_monitoring,
        })
    }

    async fn balance(&self, wallet: Address) -> ChainResult<U256> {
        self.check_reads("get_balance")?;
        Ok(self
            .state
            .lock()
            .balances
            .get(&wallet)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn block_number(&self) -> ChainResult<u64> {
        self.check_reads("get_block_number")?;
        Ok(self.state.lock().tip)
    }

    async fn block(&self, number: u64, full: bool) -> ChainResult<Option<BlockSummary>> {
        self.check_reads("get_block_by_number")?;
        let mut state = self.state.lock();
        state.block_reads.push(number);
        if state.fail_blocks.contains(&number) {
            return Err(ChainError::unavailable("get_block_by_number", "timed out"));
        }
        if number > state.tip {
            return Ok(None);
        }
        let txs = state.blocks.get(&number).cloned().unwrap_or_default();
        let transactions = if full {
            BlockTransactions::Full(txs)
        } else {
            BlockTransactions::Hashes(txs.iter().map(|tx| tx.hash).collect())
        };
        Ok(Some(BlockSummary {
            number,
            transactions,
        }))
    }
}

#[async_trait]
impl MonitoringExecutor for MockChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn estimate_process_monitoring(
        &self,
        contract: Address,
        _wallet_has_activity: bool,
    ) -> ChainResult<u64> {
        let mut state = self.state.lock();
        state.estimates += 1;
        if let Some(err @ ChainError::CallReverted(_)) = state.submit_errors.get(&contract) {
            return Err(err.clone());
        }
        Ok(state.gas_estimate)
    }

    async fn submit_process_monitoring(
        &self,
        contract: Address,
        wallet_has_activity: bool,
        params: TxParams,
    ) -> ChainResult<SubmissionReceipt> {
        let mut state = self.state.lock();
        if let Some(err) = state.submit_errors.get(&contract) {
            return Err(err.clone());
        }
        state.submissions.push(Submission {
            contract,
            wallet_has_activity,
            params,
        });

        let logs = if state.deactivate_on_submit.contains(&contract) {
            vec![EmittedLog {
                address: self.factory,
                topics: vec![
                    <crate::chain::abi::IInheritanceFactory::MonitoringDeactivated as alloy::sol_types::SolEvent>::SIGNATURE_HASH,
                    contract.into_word(),
                ],
            }]
        } else {
            Vec::new()
        };

        Ok(SubmissionReceipt {
            tx_hash: B256::with_last_byte(state.submissions.len() as u8),
            block_number: Some(state.tip + 1),
            gas_used: params.gas_limit / 2,
            logs,
        })
    }
}
