use serde::{Deserialize, Serialize};

use crate::blockchain::hash::Djb2;

/// Reserved sender of the reward-payout transaction.
pub const COINBASE_SENDER: &str = "COINBASE";

/// Width of an address field, including the terminator slot of the
/// fixed-layout record; stored addresses keep at most `ADDRESS_WIDTH - 1` bytes.
pub const ADDRESS_WIDTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: String,
    pub to: String,
    pub amount: u64, // smallest units
    pub timestamp: i64,
    pub hash: u32,
    pub is_coinbase: bool,
}

impl Transaction {
    /// A regular value transfer between two addresses.
    pub fn transfer(from: &str, to: &str, amount: u64, timestamp: i64) -> Self {
        let mut tx = Self {
            from: truncate_address(from),
            to: truncate_address(to),
            amount,
            timestamp,
            hash: 0,
            is_coinbase: false,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// The reward payout for a mined block.
    pub fn coinbase(to: &str, amount: u64, timestamp: i64) -> Self {
        let mut tx = Self {
            from: COINBASE_SENDER.to_string(),
            to: truncate_address(to),
            amount,
            timestamp,
            hash: 0,
            is_coinbase: true,
        };
        tx.hash = tx.compute_hash();
        tx
    }

    /// Fingerprint over `from`, `to`, `amount` and `timestamp`.
    pub fn compute_hash(&self) -> u32 {
        let mut hasher = Djb2::new();
        hasher.update(&self.from);
        hasher.update(&self.to);
        hasher.update_display(self.amount);
        hasher.update_display(self.timestamp);
        hasher.finalize()
    }

    /// Hash matches content and the coinbase flag agrees with the sender.
    pub fn is_well_formed(&self) -> bool {
        self.hash == self.compute_hash() && self.is_coinbase == (self.from == COINBASE_SENDER)
    }
}

/// Clip an address to the fixed field width without splitting a character.
pub fn truncate_address(address: &str) -> String {
    let max = ADDRESS_WIDTH - 1;
    if address.len() <= max {
        return address.to_string();
    }
    let mut end = max;
    while !address.is_char_boundary(end) {
        end -= 1;
    }
    address[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::hash::hash_bytes;

    #[test]
    fn transfer_hash_covers_fields() {
        let tx = Transaction::transfer("ARCA", "ARCB", 150, 1_700_000_000);
        assert_eq!(tx.hash, hash_bytes("ARCAARCB1501700000000"));
        assert!(!tx.is_coinbase);
        assert!(tx.is_well_formed());
    }

    #[test]
    fn coinbase_uses_reserved_sender() {
        let tx = Transaction::coinbase("ARCMINER", 5_000, 42);
        assert_eq!(tx.from, COINBASE_SENDER);
        assert_eq!(tx.hash, hash_bytes("COINBASEARCMINER500042"));
        assert!(tx.is_coinbase);
        assert!(tx.is_well_formed());
    }

    #[test]
    fn tampering_breaks_well_formedness() {
        let mut tx = Transaction::transfer("a", "b", 1, 0);
        tx.amount = 2;
        assert!(!tx.is_well_formed());

        let mut forged = Transaction::transfer("a", "b", 1, 0);
        forged.is_coinbase = true;
        assert!(!forged.is_well_formed());
    }

    #[test]
    fn long_addresses_are_truncated() {
        let long = "X".repeat(100);
        assert_eq!(truncate_address(&long).len(), 63);
        assert_eq!(truncate_address("ARC_TEST"), "ARC_TEST");

        let wide = "é".repeat(40); // 80 bytes
        let clipped = truncate_address(&wide);
        assert!(clipped.len() <= 63);
        assert!(clipped.chars().all(|c| c == 'é'));
    }
}
