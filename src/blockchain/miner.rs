use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};

use super::block::Block;
use super::metrics::MiningReport;
use super::reward::RewardSchedule;
use super::{
    DIFFICULTY_CAP_EXPONENT, DIGIT_CAP_FROM_INDEX, DIGIT_STORE_CAP, MAX_NONCE_ATTEMPTS,
    MiningError, digits,
};
use crate::transaction::{Transaction, truncate_address};

/// `2^min(index + 1, 25)`.
pub fn difficulty_for(index: u64) -> u64 {
    1 << index.saturating_add(1).min(DIFFICULTY_CAP_EXPONENT)
}

/// Digits actually kept on the block. Past index 10 the payload stops
/// tracking nominal difficulty once it exceeds the store cap.
pub fn digits_to_store(index: u64, difficulty: u64) -> usize {
    let stored = if index > DIGIT_CAP_FROM_INDEX {
        difficulty.min(DIGIT_STORE_CAP)
    } else {
        difficulty
    };
    stored as usize
}

/// Everything the producer needs to assemble block `index`.
#[derive(Debug, Clone)]
pub struct MiningJob<'a> {
    pub index: u64,
    pub prev_hash: u32,
    pub prev_block: Option<&'a Block>,
    pub miner_address: Option<&'a str>,
    pub reward_schedule: Option<&'a RewardSchedule>,
    pub pending: &'a [Transaction],
    pub timestamp: i64,
}

impl<'a> MiningJob<'a> {
    pub fn new(index: u64, prev_hash: u32, prev_block: Option<&'a Block>) -> Self {
        Self {
            index,
            prev_hash,
            prev_block,
            miner_address: None,
            reward_schedule: None,
            pending: &[],
            timestamp: Utc::now().timestamp(),
        }
    }

    /// Job for the successor of `tip`, or for genesis when there is none.
    pub fn after(tip: Option<&'a Block>) -> Self {
        match tip {
            Some(prev) => Self::new(prev.index + 1, prev.hash, Some(prev)),
            None => Self::new(0, 0, None),
        }
    }

    pub fn miner(mut self, address: &'a str) -> Self {
        self.miner_address = Some(address);
        self
    }

    pub fn rewards(mut self, schedule: &'a RewardSchedule) -> Self {
        self.reward_schedule = Some(schedule);
        self
    }

    pub fn with_pending(mut self, pending: &'a [Transaction]) -> Self {
        self.pending = pending;
        self
    }
}

/// Assemble and seal a block.
///
/// Pays the reward as a coinbase transaction when both a schedule and a
/// non-empty miner address are present, queues as many pending transfers as
/// fit, generates the digit payload seeded from the predecessor, then searches
/// nonces from 0 until `hash mod (difficulty / 1000 + 1) == 0`. The search
/// stops after `MAX_NONCE_ATTEMPTS`; the block then carries whatever nonce and
/// hash were computed last and will not pass validation.
///
/// Only digit-buffer allocation failure aborts; nothing is produced then.
pub fn mine_block(job: MiningJob<'_>) -> Result<(Block, MiningReport), MiningError> {
    mine_block_capped(job, MAX_NONCE_ATTEMPTS)
}

fn mine_block_capped(
    job: MiningJob<'_>,
    max_attempts: u64,
) -> Result<(Block, MiningReport), MiningError> {
    let difficulty = difficulty_for(job.index);
    let mut block = Block::new(job.index, job.timestamp, difficulty, job.prev_hash);
    block.total_difficulty = match job.prev_block {
        Some(prev) => prev.total_difficulty.saturating_add(difficulty),
        None => difficulty,
    };

    let miner = job.miner_address.filter(|a| !a.trim().is_empty());
    if let Some(address) = miner {
        block.miner_address = truncate_address(address);
    }

    if let Some(schedule) = job.reward_schedule {
        block.mining_reward = schedule.reward_for(job.index);
        if block.mining_reward > 0 {
            if let Some(address) = miner {
                let coinbase = Transaction::coinbase(address, block.mining_reward, job.timestamp);
                // An empty block always has room.
                let _ = block.add_transaction(coinbase);
            }
        }
    }

    let mut pending_consumed = 0;
    for tx in job.pending {
        if tx.is_coinbase || !tx.is_well_formed() {
            warn!("MINER - dropping queued tx {} (coinbase-flagged or tampered)", tx.hash);
        } else if block.add_transaction(tx.clone()).is_err() {
            break;
        }
        pending_consumed += 1;
    }

    let length = digits_to_store(job.index, difficulty);
    let started = Instant::now();
    block.digit_sequence = digits::for_block(job.prev_block.map(Block::as_parent), length)?;
    block.digit_count = block.digit_sequence.len();
    let digit_time = started.elapsed();
    debug!(
        "MINER - block #{} generated {} digits in {:?}",
        block.index, block.digit_count, digit_time
    );

    let started = Instant::now();
    let (attempts, exhausted) = search_nonce(&mut block, max_attempts);
    let search_time = started.elapsed();

    info!(
        "MINER - sealed block #{} (hash={}, nonce={}, difficulty={}, digits={})",
        block.index, block.hash, block.nonce, block.difficulty, block.digit_count
    );

    let report = MiningReport {
        index: block.index,
        digits: block.digit_count,
        attempts,
        exhausted,
        pending_consumed,
        digit_time,
        search_time,
    };
    Ok((block, report))
}

/// Walk nonces from 0 until the proof-of-work predicate holds or the nonce
/// reaches `max_attempts`. Returns the number of hashes computed and whether
/// the search gave up.
fn search_nonce(block: &mut Block, max_attempts: u64) -> (u64, bool) {
    let midstate = block.header_hasher();
    block.nonce = 0;
    block.hash = block.hash_from(&midstate);
    let mut attempts = 1;
    while !block.meets_proof_of_work() {
        if block.nonce >= max_attempts {
            warn!(
                "MINER - block #{} proof of work exceeded {} attempts, keeping nonce {}",
                block.index, max_attempts, block.nonce
            );
            return (attempts, true);
        }
        block.nonce += 1;
        block.hash = block.hash_from(&midstate);
        attempts += 1;
    }
    (attempts, false)
}
