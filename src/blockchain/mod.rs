pub mod block;
pub mod digits;
pub mod error;
pub mod hash;
pub mod metrics;
pub mod miner;
pub mod model;
pub mod pool;
pub mod reward;

pub use block::Block;
pub use error::{BlockError, LedgerError, MiningError, PoolError};
pub use metrics::PerformanceMetrics;
pub use model::Ledger;
pub use pool::MiningPool;
pub use reward::RewardSchedule;

/// Difficulty is `2^min(index + 1, DIFFICULTY_CAP_EXPONENT)`.
pub const DIFFICULTY_CAP_EXPONENT: u64 = 25;

/// Upper bound on digits stored per block once past `DIGIT_CAP_FROM_INDEX`.
pub const DIGIT_STORE_CAP: u64 = 10_000;

/// Blocks up to and including this index store their full difficulty in digits.
pub const DIGIT_CAP_FROM_INDEX: u64 = 10;

/// Hard cutoff on nonce search; past it the last computed state is kept.
pub const MAX_NONCE_ATTEMPTS: u64 = 1_000_000;

pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 100;

/// Ledger storage reserved up front; grows by doubling after that.
pub const INITIAL_LEDGER_CAPACITY: usize = 100;
