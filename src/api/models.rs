use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::blockchain::metrics::MetricsSnapshot;
use crate::blockchain::{Block, Ledger, MiningPool, PerformanceMetrics, PoolError, RewardSchedule};
use crate::config::Config;
use crate::transaction::Transaction;
use crate::wallet::Wallet;

/// Shared application state: the ledger, the local miner wallet, queued
/// transfers and the worker pool that runs mining sessions.
///
/// Lock order when several are held at once: session, ledger, wallet,
/// pending. `session` serialises everything that replaces or extends the
/// chain, so a mining run only needs `ledger` one block at a time.
pub struct AppState {
    pub session: Mutex<()>,
    pub ledger: Mutex<Ledger>,
    pub wallet: Mutex<Wallet>,
    pub rewards: Mutex<RewardSchedule>,
    pub pending: Mutex<Vec<Transaction>>,
    pub metrics: Mutex<PerformanceMetrics>,
    pub pool: MiningPool,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, ledger: Ledger, wallet: Wallet) -> Result<Self, PoolError> {
        let mut rewards = config.reward_schedule();
        rewards.set_height(ledger.len() as u64);
        Ok(Self {
            session: Mutex::new(()),
            ledger: Mutex::new(ledger),
            wallet: Mutex::new(wallet),
            rewards: Mutex::new(rewards),
            pending: Mutex::new(Vec::new()),
            metrics: Mutex::new(PerformanceMetrics::default()),
            pool: MiningPool::new(config.mining_workers)?,
            config,
        })
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct ChainResponse<'a> {
    pub length: usize,
    pub total_difficulty: u64,
    pub chain: &'a [Block],
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub length: usize,
    pub first_invalid: Option<u64>,
    pub restored_blocks: usize,
}

#[derive(Deserialize)]
pub struct DigitsQuery {
    /// Cap on digits echoed back; the audit always covers the full payload.
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct DigitAudit {
    pub plausible: bool,
    pub matches_reference: bool,
    pub proof_hash: u32,
    pub proof_ok: bool,
}

#[derive(Serialize)]
pub struct BlockDetailResponse<'a> {
    #[serde(flatten)]
    pub block: &'a Block,
    pub digit_count: usize,
    pub digits: &'a str,
    pub restored: bool,
    pub audit: Option<DigitAudit>,
}

#[derive(Serialize)]
pub struct BlockSummary {
    pub index: u64,
    pub hash: u32,
    pub digits: usize,
    pub reward: u64,
}

#[derive(Serialize)]
pub struct ChainSummaryResponse {
    pub length: usize,
    pub capacity: usize,
    pub blocks: Vec<BlockSummary>,
    pub total_digits: usize,
    pub total_rewards: u64,
    pub total_rewards_display: String,
}

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub valid: bool,
}

/* ---------- Mining API Models ---------- */

#[derive(Deserialize, Default)]
pub struct MineRequest {
    pub blocks: Option<u32>,
    /// Defaults to the local wallet.
    pub miner_address: Option<String>,
}

#[derive(Serialize)]
pub struct MinedBlock {
    pub index: u64,
    pub hash: u32,
    pub nonce: u64,
    pub difficulty: u64,
    pub digits: usize,
    pub reward: u64,
    pub transactions: usize,
    pub attempts: u64,
    pub exhausted: bool,
    pub mining_time_secs: f64,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub miner_address: String,
    pub mined: Vec<MinedBlock>,
    pub height: usize,
    pub total_difficulty: u64,
    pub wallet_balance: String,
}

/* ---------- Wallet API Models ---------- */

#[derive(Serialize)]
pub struct WalletResponse {
    pub address: String,
    pub public_key: String,
    pub balance: u64,
    pub balance_display: String,
    pub transactions: usize,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub last: Option<usize>,
}

#[derive(Deserialize, Default)]
pub struct NewWalletRequest {
    /// Make the new wallet the node's mining wallet.
    #[serde(default)]
    pub replace: bool,
}

#[derive(Serialize)]
pub struct NewWalletResponse {
    pub private_key: String,
    pub public_key: String,
    pub address: String,
    pub active: bool,
}

/// Either `secret_key` or `path` (defaults to the configured wallet file).
#[derive(Deserialize, Default)]
pub struct LoadWalletRequest {
    pub secret_key: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub replace: bool,
}

#[derive(Serialize)]
pub struct LoadWalletResponse {
    pub address: String,
    pub public_key: String,
    pub balance: String,
    pub transactions: usize,
    pub active: bool,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub to: String,
    /// Decimal coin amount, e.g. `"1.5"`.
    pub amount: String,
}

#[derive(Serialize)]
pub struct TransferResponse {
    pub transaction: Transaction,
    pub balance: String,
    pub pending: usize,
}

/* ---------- Stats ---------- */

#[derive(Serialize)]
pub struct StatsResponse {
    pub height: usize,
    pub total_difficulty: u64,
    pub next_difficulty: u64,
    pub next_reward: u64,
    pub next_halving_height: Option<u64>,
    pub rewards: RewardSchedule,
    pub pending_transfers: usize,
    pub restored_blocks: usize,
    pub mining_workers: usize,
    pub metrics: MetricsSnapshot,
}
