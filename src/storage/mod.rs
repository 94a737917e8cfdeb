use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::blockchain::{Block, Ledger, LedgerError};
use crate::wallet::Wallet;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    Version(u32),
    #[error("snapshot rejected: {0}")]
    Ledger(#[from] LedgerError),
    #[error("wallet keys do not match its address")]
    WalletKeys,
}

/// On-disk form of the ledger. Digit payloads are skipped by `Block`'s
/// serde attributes, so they never reach the file.
#[derive(Debug, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub version: u32,
    pub saved_at: i64,
    pub blocks: Vec<Block>,
}

impl ChainSnapshot {
    pub fn of(ledger: &Ledger) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now().timestamp(),
            blocks: ledger.blocks().to_vec(),
        }
    }

    /// Rebuild a ledger. Fails unless indices run contiguously from 0.
    pub fn into_ledger(self) -> Result<Ledger, StorageError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(StorageError::Version(self.version));
        }
        Ok(Ledger::restore(self.blocks)?)
    }
}

pub fn save_chain(ledger: &Ledger, path: &Path) -> Result<(), StorageError> {
    let started = Instant::now();
    let bytes = write_json_atomic(path, &ChainSnapshot::of(ledger))?;
    info!(
        "STORAGE - saved {} blocks to {} ({} bytes, {:?})",
        ledger.len(),
        path.display(),
        bytes,
        started.elapsed()
    );
    Ok(())
}

pub fn load_chain(path: &Path) -> Result<Ledger, StorageError> {
    let snapshot: ChainSnapshot = serde_json::from_slice(&fs::read(path)?)?;
    let ledger = snapshot.into_ledger()?;
    info!(
        "STORAGE - loaded {} blocks from {}",
        ledger.len(),
        path.display()
    );
    Ok(ledger)
}

pub fn save_wallet(wallet: &Wallet, path: &Path) -> Result<(), StorageError> {
    write_json_atomic(path, wallet)?;
    info!("STORAGE - saved wallet {} to {}", wallet.address, path.display());
    Ok(())
}

pub fn load_wallet(path: &Path) -> Result<Wallet, StorageError> {
    let wallet: Wallet = serde_json::from_slice(&fs::read(path)?)?;
    if !wallet.keys_match() {
        return Err(StorageError::WalletKeys);
    }
    info!(
        "STORAGE - loaded wallet {} ({} transactions)",
        wallet.address,
        wallet.history().len()
    );
    Ok(wallet)
}

/// Write to a sibling `.tmp` file, then rename over `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<usize, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(value)?;

    let tmp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(&json)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(json.len())
}
