// Activity Detector - decides whether a wallet moved since the last sweep
//
// Detection order:
// 1. Balance differs from the cached value -> active
// 2. Otherwise scan the last N blocks for a tx sent from / to the wallet
// 3. Nothing found -> inactive
//
// Known false negative: funds moved and returned within one sweep interval,
// with both transactions older than the scan window, go unnoticed.

use std::{collections::HashMap, sync::Arc, time::Instant};

use alloy::primitives::{Address, B256, U256};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    chain::{BlockTransactions, ChainReader},
    error::ChainResult,
};

/// Why a wallet was (or was not) considered active
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivitySignal {
    BalanceChanged { previous: U256, current: U256 },
    TransactionFound { block: u64, tx_hash: B256 },
    NoActivity,
}

impl ActivitySignal {
    pub fn is_active(&self) -> bool {
        !matches!(self, ActivitySignal::NoActivity)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedBalance {
    balance: U256,
    observed_at: Instant,
}

/// Last observed balance per wallet, in memory only.
///
/// Bounded: once `capacity` wallets are tracked, recording a new wallet
/// evicts the one observed longest ago.
pub struct BalanceCache {
    entries: Mutex<HashMap<Address, CachedBalance>>,
    capacity: usize,
}

impl BalanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Store `balance` for `wallet`, returning the value it replaced.
    pub fn observe(&self, wallet: Address, balance: U256) -> Option<U256> {
        let mut entries = self.entries.lock();

        if !entries.contains_key(&wallet) && entries.len() >= self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.observed_at)
                .map(|(address, _)| *address);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                debug!(evicted = %oldest, "balance cache full, evicted oldest wallet");
            }
        }

        entries
            .insert(
                wallet,
                CachedBalance {
                    balance,
                    observed_at: Instant::now(),
                },
            )
            .map(|previous| previous.balance)
    }

    pub fn get(&self, wallet: &Address) -> Option<U256> {
        self.entries.lock().get(wallet).map(|entry| entry.balance)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

pub struct ActivityDetector {
    reader: Arc<dyn ChainReader>,
    cache: BalanceCache,
    scan_blocks: u64,
}

impl ActivityDetector {
    pub fn new(reader: Arc<dyn ChainReader>, scan_blocks: u64, cache_capacity: usize) -> Self {
        Self {
            reader,
            cache: BalanceCache::new(cache_capacity),
            scan_blocks,
        }
    }

    pub fn cache(&self) -> &BalanceCache {
        &self.cache
    }

    /// Boolean activity signal for `wallet`.
    ///
    /// Read failures yield `false`: an unreachable ledger never resets the
    /// owner's inactivity clock.
    pub async fn has_activity(&self, wallet: Address) -> bool {
        match self.detect(wallet).await {
            Ok(signal) => {
                info!(%wallet, ?signal, "activity check complete");
                signal.is_active()
            }
            Err(e) => {
                warn!(%wallet, error = %e, "activity check failed, reporting no activity");
                false
            }
        }
    }

    pub async fn detect(&self, wallet: Address) -> ChainResult<ActivitySignal> {
        let current = self.reader.balance(wallet).await?;
        if self.cache.is_empty() {
            debug!("balance cache is empty, every wallet starts from a fresh baseline");
        }
        let previous = self.cache.observe(wallet, current);

        match previous {
            Some(previous) if previous != current => {
                return Ok(ActivitySignal::BalanceChanged { previous, current });
            }
            Some(_) => {}
            None => debug!(
                %wallet,
                %current,
                tracked = self.cache.len(),
                "first observation, stored initial balance"
            ),
        }

        self.scan_recent_blocks(wallet).await
    }

    /// Walk back from the tip over at most `scan_blocks` blocks, stopping at
    /// the first transaction sent from or to `wallet`.
    async fn scan_recent_blocks(&self, wallet: Address) -> ChainResult<ActivitySignal> {
        let tip = self.reader.block_number().await?;
        let floor = tip.saturating_sub(self.scan_blocks);
        debug!(%wallet, from = floor + 1, to = tip, "scanning recent blocks");

        let mut number = tip;
        while number > floor && number > 0 {
            match self.reader.block(number, true).await {
                Ok(Some(block)) => {
                    if let BlockTransactions::Full(transactions) = &block.transactions {
                        if let Some(tx) = transactions.iter().find(|tx| tx.involves(wallet)) {
                            return Ok(ActivitySignal::TransactionFound {
                                block: block.number,
                                tx_hash: tx.hash,
                            });
                        }
                    }
                }
                Ok(None) => debug!(block = number, "block not available"),
                Err(e) => warn!(block = number, error = %e, "skipping unreadable block"),
            }
            number -= 1;
        }

        Ok(ActivitySignal::NoActivity)
    }
}
