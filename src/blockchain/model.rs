use super::block::{Block, validate_block, validate_linkage};
use super::metrics::MiningReport;
use super::miner::{MiningJob, mine_block};
use super::reward::RewardSchedule;
use super::{INITIAL_LEDGER_CAPACITY, LedgerError, MiningError};
use crate::transaction::Transaction;

/// Append-only, in-memory sequence of blocks. Sole owner of every block it
/// holds; stored blocks are only ever handed out by shared reference.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            chain: Vec::with_capacity(INITIAL_LEDGER_CAPACITY),
        }
    }

    /// Rebuild a ledger from restored blocks. Digit payloads are cleared
    /// regardless of what the caller passed in.
    pub fn restore(blocks: Vec<Block>) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for mut block in blocks {
            block.digit_sequence = String::new();
            block.digit_count = 0;
            ledger.append(block)?;
        }
        Ok(ledger)
    }

    /// Append a fully built block. Storage doubles when full; on failure
    /// nothing is stored.
    pub fn append(&mut self, block: Block) -> Result<&Block, LedgerError> {
        let expected = self.chain.len() as u64;
        if block.index != expected {
            return Err(LedgerError::UnexpectedIndex {
                expected,
                got: block.index,
            });
        }
        if self.chain.len() == self.chain.capacity() {
            let additional = self.chain.capacity().max(1);
            self.chain
                .try_reserve_exact(additional)
                .map_err(|_| LedgerError::CapacityExhausted)?;
        }
        self.chain.push(block);
        Ok(&self.chain[self.chain.len() - 1])
    }

    /// Mine the successor of the current tip and append it.
    pub fn mine_next(
        &mut self,
        miner_address: Option<&str>,
        reward_schedule: Option<&RewardSchedule>,
        pending: &[Transaction],
    ) -> Result<MiningReport, LedgerError> {
        let mut job = MiningJob::after(self.tip()).with_pending(pending);
        if let Some(address) = miner_address {
            job = job.miner(address);
        }
        if let Some(schedule) = reward_schedule {
            job = job.rewards(schedule);
        }
        let mined = mine_block(job);
        self.append_mined(mined)
    }

    /// Store the outcome of a mining call; a failed call stores nothing.
    fn append_mined(
        &mut self,
        mined: Result<(Block, MiningReport), MiningError>,
    ) -> Result<MiningReport, LedgerError> {
        let (block, report) = mined?;
        self.append(block)?;
        Ok(report)
    }

    pub fn at(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.chain.get(i))
    }

    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.chain.capacity()
    }

    pub fn total_difficulty(&self) -> u64 {
        self.tip().map_or(0, |b| b.total_difficulty)
    }

    /// First block whose stored hash equals `hash`.
    pub fn find_by_hash(&self, hash: u32) -> Option<&Block> {
        self.chain.iter().find(|b| b.hash == hash)
    }

    /// Sum of the rewards paid across the chain.
    pub fn total_rewards(&self) -> u64 {
        self.chain
            .iter()
            .fold(0u64, |acc, b| acc.saturating_add(b.mining_reward))
    }

    /// Digits held in memory. Restored blocks count for nothing.
    pub fn total_digits(&self) -> usize {
        self.chain.iter().map(|b| b.digit_count).sum()
    }

    /// Index of the first block that fails validation, if any.
    ///
    /// Blocks carrying their digits get the full check. Restored blocks can
    /// no longer reproduce their hash, so they are held to linkage and the
    /// proof-of-work predicate on the stored hash. Cumulative difficulty is
    /// checked for every block.
    pub fn first_invalid(&self) -> Option<u64> {
        let mut prev: Option<&Block> = None;
        for block in &self.chain {
            let ok = if block.has_digits() {
                validate_block(block, prev)
            } else {
                validate_linkage(block, prev) && block.meets_proof_of_work()
            };
            let expected_total = prev.map_or(block.difficulty, |p| {
                p.total_difficulty.saturating_add(block.difficulty)
            });
            let genesis_ok = prev.is_some() || (block.index == 0 && block.prev_hash == 0);

            if !ok || !genesis_ok || block.total_difficulty != expected_total {
                return Some(block.index);
            }
            prev = Some(block);
        }
        None
    }

    /// Validate the entire chain: linkage, hashes and PoW.
    pub fn is_valid_chain(&self) -> bool {
        self.first_invalid().is_none()
    }

    /// Number of blocks whose digit payload is absent.
    pub fn restored_blocks(&self) -> usize {
        self.chain.iter().filter(|b| !b.has_digits()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mined(n: usize) -> Ledger {
        let rs = RewardSchedule::default();
        let mut ledger = Ledger::new();
        for _ in 0..n {
            ledger.mine_next(Some("ARC_TEST"), Some(&rs), &[]).unwrap();
        }
        ledger
    }

    #[test]
    fn starts_empty_and_valid() {
        let ledger = Ledger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.total_difficulty(), 0);
        assert!(ledger.is_valid_chain());
        assert!(ledger.capacity() >= INITIAL_LEDGER_CAPACITY);
    }

    #[test]
    fn mined_chain_is_valid() {
        let ledger = mined(7);
        assert_eq!(ledger.len(), 7);
        assert!(ledger.is_valid_chain());

        let blocks = ledger.blocks();
        for i in 1..blocks.len() {
            assert!(validate_block(&blocks[i], Some(&blocks[i - 1])));
            assert_eq!(
                blocks[i].total_difficulty,
                blocks[i - 1].total_difficulty + blocks[i].difficulty
            );
        }
        // 2 + 4 + ... + 128
        assert_eq!(ledger.total_difficulty(), 254);
    }

    #[test]
    fn at_reads_by_index() {
        let ledger = mined(3);
        assert_eq!(ledger.at(1).map(|b| b.index), Some(1));
        assert!(ledger.at(3).is_none());
        assert!(ledger.at(u64::MAX).is_none());
    }

    #[test]
    fn append_rejects_out_of_order_blocks() {
        let mut ledger = mined(2);
        let stray = ledger.at(0).cloned().unwrap();
        let err = ledger.append(stray).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::UnexpectedIndex {
                expected: 2,
                got: 0
            }
        ));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn storage_doubles_past_initial_capacity() {
        let mut ledger = Ledger::new();
        let start = ledger.capacity();
        for i in 0..=start as u64 {
            let mut b = Block::new(i, 0, 2, 0);
            b.hash = b.compute_hash();
            ledger.append(b).unwrap();
        }
        assert_eq!(ledger.len(), start + 1);
        assert!(ledger.capacity() >= start * 2);
    }

    #[test]
    fn tampered_block_is_reported() {
        let ledger = mined(5);
        let mut blocks = ledger.blocks().to_vec();
        blocks[3].mining_reward += 1;

        let mut tampered = Ledger::new();
        for b in blocks {
            tampered.chain.push(b);
        }
        assert_eq!(tampered.first_invalid(), Some(3));
        assert!(!tampered.is_valid_chain());
    }

    #[test]
    fn wrong_total_difficulty_is_reported() {
        let ledger = mined(3);
        let mut blocks = ledger.blocks().to_vec();
        blocks[2].total_difficulty += 1;

        let mut broken = Ledger::new();
        broken.chain.extend(blocks);
        assert_eq!(broken.first_invalid(), Some(2));
    }

    #[test]
    fn restored_chain_drops_digits_but_stays_linked() {
        let ledger = mined(4);
        let restored = Ledger::restore(ledger.blocks().to_vec()).unwrap();

        assert_eq!(restored.len(), 4);
        assert_eq!(restored.restored_blocks(), 4);
        assert!(restored.blocks().iter().all(|b| b.digit_sequence.is_empty()));
        assert!(restored.is_valid_chain());
        assert_eq!(restored.total_difficulty(), ledger.total_difficulty());
    }

    #[test]
    fn mining_continues_after_restore() {
        let ledger = mined(3);
        let mut restored = Ledger::restore(ledger.blocks().to_vec()).unwrap();
        let report = restored.mine_next(Some("ARC_TEST"), None, &[]).unwrap();

        assert_eq!(report.index, 3);
        assert_eq!(restored.restored_blocks(), 3);
        assert!(restored.is_valid_chain());
    }

    #[test]
    fn failed_mining_stores_nothing() {
        let mut ledger = mined(2);
        let err = crate::blockchain::digits::generate(0, usize::MAX, None).unwrap_err();

        let result = ledger.append_mined(Err(MiningError::from(err)));
        assert!(matches!(result, Err(LedgerError::Mining(_))));
        assert_eq!(ledger.len(), 2);
        assert!(ledger.is_valid_chain());

        let report = ledger.mine_next(Some("ARC_TEST"), None, &[]).unwrap();
        assert_eq!(report.index, 2);
    }

    #[test]
    fn finds_blocks_by_hash() {
        let ledger = mined(4);
        let target = ledger.at(2).unwrap();
        let found = ledger.find_by_hash(target.hash).unwrap();
        // Small hashes can collide; the first match wins.
        assert!(found.index <= 2);
        assert_eq!(found.hash, target.hash);

        let missing = (0..=u32::MAX)
            .find(|h| ledger.blocks().iter().all(|b| b.hash != *h))
            .unwrap();
        assert!(ledger.find_by_hash(missing).is_none());
    }

    #[test]
    fn totals_cover_rewards_and_digits() {
        let rs = RewardSchedule::default();
        let ledger = mined(3);
        assert_eq!(ledger.total_rewards(), 3 * rs.reward_for(0));
        assert_eq!(ledger.total_digits(), 2 + 4 + 8);

        let restored = Ledger::restore(ledger.blocks().to_vec()).unwrap();
        assert_eq!(restored.total_rewards(), ledger.total_rewards());
        assert_eq!(restored.total_digits(), 0);
    }
}
