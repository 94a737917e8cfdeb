use std::collections::TryReserveError;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block already holds the maximum of {max} transactions")]
    TransactionsFull { max: usize },
}

/// Failures that abort a single mining call. No block is produced.
#[derive(Debug, Error)]
pub enum MiningError {
    #[error("could not allocate digit buffer: {0}")]
    DigitBuffer(#[from] TryReserveError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("unexpected block index: expected {expected}, got {got}")]
    UnexpectedIndex { expected: u64, got: u64 },

    #[error("could not grow ledger storage")]
    CapacityExhausted,

    #[error(transparent)]
    Mining(#[from] MiningError),
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be between 1 and {max}, got {got}")]
    InvalidSize { got: usize, max: usize },

    #[error("mining pool has been shut down")]
    ShutDown,

    #[error("worker dropped the job before producing a result")]
    WorkerLost,

    #[error("could not spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
