use serde::{Deserialize, Serialize};

use super::digits::Parent;
use super::hash::Djb2;
use super::{BlockError, MAX_TRANSACTIONS_PER_BLOCK};
use crate::transaction::Transaction;

/// A single block in the ledger.
///
/// The digit payload is never persisted: a block loaded from a snapshot
/// comes back with an empty `digit_sequence` and a `digit_count` of 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: i64, // Unix timestamp (UTC)
    pub difficulty: u64,
    #[serde(skip)]
    pub digit_sequence: String,
    #[serde(skip)]
    pub digit_count: usize,
    pub prev_hash: u32, // 0 at genesis
    pub hash: u32,
    pub nonce: u64,
    pub miner_address: String,
    pub mining_reward: u64,
    pub transactions: Vec<Transaction>,
    pub total_difficulty: u64,
}

impl Block {
    /// An unsealed block with no digits, transactions, or proof yet.
    pub fn new(index: u64, timestamp: i64, difficulty: u64, prev_hash: u32) -> Self {
        Self {
            index,
            timestamp,
            difficulty,
            digit_sequence: String::new(),
            digit_count: 0,
            prev_hash,
            hash: 0,
            nonce: 0,
            miner_address: String::new(),
            mining_reward: 0,
            transactions: Vec::new(),
            total_difficulty: difficulty,
        }
    }

    /// Hasher state after every field that precedes the nonce in the
    /// preimage. Nonce search resumes from here instead of rehashing the
    /// digit payload on every attempt.
    pub(crate) fn header_hasher(&self) -> Djb2 {
        let mut hasher = Djb2::new();
        hasher.update_display(self.index);
        hasher.update_display(self.timestamp);
        hasher.update_display(self.difficulty);
        hasher.update(&self.digit_sequence);
        hasher.update_display(self.prev_hash);
        hasher
    }

    /// Finish the preimage from a header midstate.
    pub(crate) fn hash_from(&self, midstate: &Djb2) -> u32 {
        let mut hasher = *midstate;
        hasher.update_display(self.nonce);
        hasher.update(&self.miner_address);
        hasher.update_display(self.mining_reward);
        for tx in &self.transactions {
            hasher.update(&tx.from);
            hasher.update(&tx.to);
            hasher.update_display(tx.amount);
            hasher.update_display(tx.hash);
        }
        hasher.finalize()
    }

    /// Hash of every field except `hash` and `total_difficulty`.
    pub fn compute_hash(&self) -> u32 {
        self.hash_from(&self.header_hasher())
    }

    /// `hash mod (difficulty / 1000 + 1) == 0`.
    pub fn meets_proof_of_work(&self) -> bool {
        u64::from(self.hash) % proof_divisor(self.difficulty) == 0
    }

    /// Append a transaction, refusing once the block is full.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<(), BlockError> {
        if self.transactions.len() >= MAX_TRANSACTIONS_PER_BLOCK {
            return Err(BlockError::TransactionsFull {
                max: MAX_TRANSACTIONS_PER_BLOCK,
            });
        }
        self.transactions.push(tx);
        Ok(())
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.iter().find(|tx| tx.is_coinbase)
    }

    /// False for blocks restored from a snapshot.
    pub fn has_digits(&self) -> bool {
        self.digit_count > 0
    }

    /// The view a successor's digit generation is seeded from.
    pub fn as_parent(&self) -> Parent<'_> {
        Parent {
            index: self.index,
            nonce: self.nonce,
            digits: &self.digit_sequence,
        }
    }
}

/// Modulus of the proof-of-work predicate for a given difficulty.
pub const fn proof_divisor(difficulty: u64) -> u64 {
    difficulty / 1000 + 1
}

/// Accept or reject `block` as the successor of `prev`.
///
/// Checks, stopping at the first failure: index follows the predecessor,
/// `prev_hash` links to it, the stored hash re-derives from the block's
/// fields, and the hash satisfies the proof-of-work predicate. Without a
/// predecessor only the last two apply.
pub fn validate_block(block: &Block, prev: Option<&Block>) -> bool {
    if !validate_linkage(block, prev) {
        return false;
    }
    if block.hash != block.compute_hash() {
        return false;
    }
    block.meets_proof_of_work()
}

/// Index and hash linkage only. Used for blocks whose digit payload was
/// dropped on restore and whose hash can no longer be re-derived.
pub fn validate_linkage(block: &Block, prev: Option<&Block>) -> bool {
    if let Some(prev) = prev {
        if prev.index.checked_add(1) != Some(block.index) {
            return false;
        }
        if block.prev_hash != prev.hash {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hash::hash_bytes;

    fn sample_block() -> Block {
        let mut b = Block::new(3, 1_700_000_000, 16, 777);
        b.digit_sequence = "1415926535897932".into();
        b.digit_count = 16;
        b.miner_address = "ARC_TEST".into();
        b.mining_reward = 50;
        b.add_transaction(Transaction::coinbase("ARC_TEST", 50, 1_700_000_000))
            .unwrap();
        b.hash = b.compute_hash();
        b
    }

    #[test]
    fn hash_preimage_layout() {
        let b = sample_block();
        let tx = &b.transactions[0];
        let preimage = format!(
            "3170000000016{}7770ARC_TEST50{}{}{}{}",
            b.digit_sequence, tx.from, tx.to, tx.amount, tx.hash
        );
        assert_eq!(b.compute_hash(), hash_bytes(preimage));
    }

    #[test]
    fn midstate_matches_full_hash() {
        let mut b = sample_block();
        let midstate = b.header_hasher();
        for nonce in [0, 1, 99, 123_456] {
            b.nonce = nonce;
            assert_eq!(b.hash_from(&midstate), b.compute_hash());
        }
    }

    #[test]
    fn proof_divisor_scales_with_difficulty() {
        assert_eq!(proof_divisor(2), 1);
        assert_eq!(proof_divisor(999), 1);
        assert_eq!(proof_divisor(1000), 2);
        assert_eq!(proof_divisor(1 << 25), 33_555);
    }

    #[test]
    fn transaction_list_is_bounded() {
        let mut b = Block::new(0, 0, 2, 0);
        for i in 0..MAX_TRANSACTIONS_PER_BLOCK {
            b.add_transaction(Transaction::transfer("a", "b", i as u64, 0))
                .unwrap();
        }
        let err = b
            .add_transaction(Transaction::transfer("a", "b", 1, 0))
            .unwrap_err();
        assert_eq!(
            err,
            BlockError::TransactionsFull {
                max: MAX_TRANSACTIONS_PER_BLOCK
            }
        );
        assert_eq!(b.transactions.len(), MAX_TRANSACTIONS_PER_BLOCK);
    }

    #[test]
    fn genesis_validates_without_predecessor() {
        let b = sample_block(); // divisor 1
        assert!(validate_block(&b, None));
    }

    #[test]
    fn rejects_bad_linkage() {
        let prev = sample_block();
        let mut next = Block::new(4, 1_700_000_100, 32, prev.hash);
        next.hash = next.compute_hash();
        assert!(validate_block(&next, Some(&prev)));

        let mut skipped = next.clone();
        skipped.index = 5;
        skipped.hash = skipped.compute_hash();
        assert!(!validate_block(&skipped, Some(&prev)));

        let mut unlinked = next.clone();
        unlinked.prev_hash = prev.hash.wrapping_add(1);
        unlinked.hash = unlinked.compute_hash();
        assert!(!validate_block(&unlinked, Some(&prev)));
    }

    #[test]
    fn invalid_when_mutated() {
        let mut b = sample_block();
        assert!(validate_block(&b, None));

        b.transactions
            .push(Transaction::transfer("x", "y", 1, 0));
        assert_ne!(b.hash, b.compute_hash());
        assert!(!validate_block(&b, None));
    }

    #[test]
    fn rejects_unmet_proof_of_work() {
        let mut b = Block::new(0, 0, 4096, 0); // divisor 5
        b.hash = b.compute_hash();
        while b.meets_proof_of_work() {
            b.nonce += 1;
            b.hash = b.compute_hash();
        }
        assert!(!validate_block(&b, None));
    }

    #[test]
    fn validation_leaves_block_untouched() {
        let b = sample_block();
        let before = b.clone();
        let _ = validate_block(&b, None);
        assert_eq!(b, before);
    }

    #[test]
    fn parent_view_exposes_seed_fields() {
        let mut b = sample_block();
        b.nonce = 9;
        let p = b.as_parent();
        assert_eq!(p.index, 3);
        assert_eq!(p.seed(), 12);
        assert_eq!(p.digits, "1415926535897932");
        assert!(b.has_digits());
    }
}
