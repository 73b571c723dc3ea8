use std::{future::IntoFuture, time::Duration};

use alloy::{
    consensus::Transaction as _,
    network::{EthereumWallet, TransactionBuilder, TransactionResponse},
    primitives::{Address, Bytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::{BlockNumberOrTag, TransactionRequest},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
    transports::{RpcError, TransportErrorKind},
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::{
    chain::{
        abi::{self, IInheritanceContract, IInheritanceFactory},
        BlockSummary, BlockTransactions, ChainReader, ContractView, EmittedLog,
        MonitoredContract, MonitoringExecutor, SubmissionReceipt, TransactionParties, TxParams,
    },
    error::{AppError, AppResult, ChainError, ChainResult},
};

#[derive(Debug, Clone)]
pub struct EvmConfig {
    pub rpc_url: String,
    pub factory_address: Address,
    /// Upper bound on any single RPC round-trip
    pub rpc_timeout: Duration,
    /// Upper bound on waiting for a submitted transaction to be mined
    pub receipt_timeout: Duration,
}

/// JSON-RPC client for the factory and its inheritance contracts.
///
/// One instance serves both as the `ChainReader` and, through its wallet
/// filler, as the `MonitoringExecutor` for the monitoring signer.
pub struct EvmChainClient {
    config: EvmConfig,
    provider: DynProvider,
    signer: Address,
}

impl EvmChainClient {
    pub fn new(config: EvmConfig, signer: PrivateKeySigner) -> AppResult<Self> {
        let url: reqwest::Url = config
            .rpc_url
            .parse()
            .map_err(|e| AppError::InvalidInput(format!("RPC_URL is not a valid URL: {}", e)))?;
        let signer_address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        Ok(Self {
            config,
            provider,
            signer: signer_address,
        })
    }

    /// Await an RPC future under the per-call timeout and classify its error.
    async fn rpc<F, T>(&self, op: &'static str, call: F) -> ChainResult<T>
    where
        F: IntoFuture<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        match tokio::time::timeout(self.config.rpc_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify_rpc_error(op, &e)),
            Err(_) => Err(ChainError::unavailable(
                op,
                format!("timed out after {:?}", self.config.rpc_timeout),
            )),
        }
    }

    async fn view<C: SolCall>(&self, op: &'static str, to: Address, call: C) -> ChainResult<C::Return> {
        let request = TransactionRequest::default()
            .with_to(to)
            .with_input(call.abi_encode());
        let output: Bytes = self.rpc(op, self.provider.call(request)).await?;
        C::abi_decode_returns(&output).map_err(|e| ChainError::Decode {
            op,
            reason: e.to_string(),
        })
    }

    fn monitoring_request(&self, contract: Address, wallet_has_activity: bool) -> TransactionRequest {
        let call = IInheritanceFactory::processContractMonitoringCall {
            contractAddress: contract,
            walletHasActivity: wallet_has_activity,
        };
        TransactionRequest::default()
            .with_from(self.signer)
            .with_to(self.config.factory_address)
            .with_input(call.abi_encode())
    }
}

fn classify_rpc_error(op: &'static str, error: &RpcError<TransportErrorKind>) -> ChainError {
    match error {
        RpcError::ErrorResp(payload) => {
            let described = payload
                .as_revert_data()
                .and_then(|data| abi::describe_revert(&data));
            match described {
                Some(reason) => ChainError::CallReverted(format!("{} ({})", payload.message, reason)),
                None => ChainError::from_rpc_message(op, &payload.message),
            }
        }
        RpcError::Transport(kind) => ChainError::unavailable(op, kind),
        other => ChainError::Rpc {
            op,
            reason: other.to_string(),
        },
    }
}

fn to_u64(value: U256) -> u64 {
    value.saturating_to::<u64>()
}

#[async_trait]
impl ChainReader for EvmChainClient {
    async fn active_contracts(&self) -> ChainResult<Vec<Address>> {
        self.view(
            "getActiveContracts",
            self.config.factory_address,
            IInheritanceFactory::getActiveContractsCall {},
        )
        .await
    }

    async fn monitoring_service(&self) -> ChainResult<Address> {
        self.view(
            "getMonitoringService",
            self.config.factory_address,
            IInheritanceFactory::getMonitoringServiceCall {},
        )
        .await
    }

    #[instrument(skip(self))]
    async fn contract_view(&self, contract: Address) -> ChainResult<ContractView> {
        let (needs_monitoring, owner, last_activity, inactivity_time, triggered) = futures::try_join!(
            self.view(
                "getIsActiveForMonitoring",
                contract,
                IInheritanceContract::getIsActiveForMonitoringCall {},
            ),
            self.view("getOwner", contract, IInheritanceContract::getOwnerCall {}),
            self.view(
                "getLastActivityTimestamp",
                contract,
                IInheritanceContract::getLastActivityTimestampCall {},
            ),
            self.view(
                "getInactivityTime",
                contract,
                IInheritanceContract::getInactivityTimeCall {},
            ),
            self.view(
                "getIsInheritanceTriggered",
                contract,
                IInheritanceContract::getIsInheritanceTriggeredCall {},
            ),
        )?;

        Ok(ContractView {
            needs_monitoring,
            owner,
            last_activity: to_u64(last_activity),
            inactivity_time: to_u64(inactivity_time),
            triggered,
        })
    }

    async fn contract_details(&self, contract: Address) -> ChainResult<MonitoredContract> {
        let (details, owner) = futures::try_join!(
            self.view(
                "getContractDetails",
                contract,
                IInheritanceContract::getContractDetailsCall {},
            ),
            self.view("getOwner", contract, IInheritanceContract::getOwnerCall {}),
        )?;

        Ok(MonitoredContract {
            contract_address: contract,
            owner,
            beneficiary: details.beneficiary,
            amount: details.amount,
            inactivity_time: to_u64(details.inactivityTime),
            last_activity: to_u64(details.lastActivity),
            triggered: details.triggered,
            claimed: details.claimed,
            needs_monitoring: details.needsMonitoring,
        })
    }

    async fn balance(&self, wallet: Address) -> ChainResult<U256> {
        self.rpc("get_balance", self.provider.get_balance(wallet)).await
    }

    async fn block_number(&self) -> ChainResult<u64> {
        self.rpc("get_block_number", self.provider.get_block_number()).await
    }

    async fn block(&self, number: u64, full: bool) -> ChainResult<Option<BlockSummary>> {
        let request = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number));
        let request = if full { request.full() } else { request.hashes() };
        let Some(block) = self.rpc("get_block_by_number", request).await? else {
            return Ok(None);
        };

        let transactions = match block.transactions {
            alloy::rpc::types::BlockTransactions::Full(txs) => BlockTransactions::Full(
                txs.iter()
                    .map(|tx| TransactionParties {
                        hash: tx.tx_hash(),
                        from: tx.from(),
                        to: tx.to(),
                    })
                    .collect(),
            ),
            alloy::rpc::types::BlockTransactions::Hashes(hashes) => BlockTransactions::Hashes(hashes),
            alloy::rpc::types::BlockTransactions::Uncle => BlockTransactions::Hashes(Vec::new()),
        };

        Ok(Some(BlockSummary {
            number,
            transactions,
        }))
    }
}

#[async_trait]
impl MonitoringExecutor for EvmChainClient {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn estimate_process_monitoring(
        &self,
        contract: Address,
        wallet_has_activity: bool,
    ) -> ChainResult<u64> {
        let request = self.monitoring_request(contract, wallet_has_activity);
        self.rpc("estimate_gas", self.provider.estimate_gas(request)).await
    }

    #[instrument(skip(self, params), fields(gas_limit = params.gas_limit))]
    async fn submit_process_monitoring(
        &self,
        contract: Address,
        wallet_has_activity: bool,
        params: TxParams,
    ) -> ChainResult<SubmissionReceipt> {
        let request = self
            .monitoring_request(contract, wallet_has_activity)
            .with_gas_limit(params.gas_limit)
            .with_max_fee_per_gas(params.max_fee_per_gas)
            .with_max_priority_fee_per_gas(params.max_priority_fee_per_gas);

        let pending = self
            .rpc("send_transaction", self.provider.send_transaction(request))
            .await?;
        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "transaction sent, awaiting receipt");

        let receipt = match tokio::time::timeout(self.config.receipt_timeout, pending.get_receipt()).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => return Err(ChainError::unavailable("get_receipt", e)),
            Err(_) => {
                return Err(ChainError::unavailable(
                    "get_receipt",
                    format!("{} not mined within {:?}", tx_hash, self.config.receipt_timeout),
                ))
            }
        };

        if !receipt.status() {
            return Err(ChainError::CallReverted(format!(
                "transaction {} reverted on-chain",
                tx_hash
            )));
        }

        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| EmittedLog {
                address: log.address(),
                topics: log.topics().to_vec(),
            })
            .collect();

        Ok(SubmissionReceipt {
            tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            logs,
        })
    }
}
