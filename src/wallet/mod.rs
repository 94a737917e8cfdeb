pub mod amount;

use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::transaction::Transaction;

pub use amount::{format_amount, parse_amount};

/// History entries a wallet keeps before refusing new ones.
pub const MAX_WALLET_TRANSACTIONS: usize = 1000;

pub const ADDRESS_PREFIX: &str = "ARC";
/// Hex characters of the pubkey digest kept after the prefix.
const ADDRESS_DIGEST_CHARS: usize = 24;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },
    #[error("transaction history is full ({max} entries)")]
    HistoryFull { max: usize },
    #[error("invalid address: {0:?}")]
    InvalidAddress(String),
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),
}

/// A single-owner wallet: one secp256k1 key pair, a balance in smallest
/// units and a bounded transaction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub address: String,
    pub public_key: String,
    secret_key: String,
    balance: u64,
    transactions: Vec<Transaction>,
}

impl Wallet {
    /// Fresh key pair, zero balance, empty history.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (sk, pk) = secp.generate_keypair(&mut OsRng);
        Self::from_keys(&sk, &pk)
    }

    /// Rebuild a wallet around an existing hex secret key.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|_| WalletError::InvalidKey("invalid secret key hex"))?;
        let sk = SecretKey::from_slice(&bytes)
            .map_err(|_| WalletError::InvalidKey("invalid secret key bytes"))?;
        let pk = PublicKey::from_secret_key(&Secp256k1::new(), &sk);
        Ok(Self::from_keys(&sk, &pk))
    }

    fn from_keys(sk: &SecretKey, pk: &PublicKey) -> Self {
        Self {
            address: address_for(pk),
            public_key: hex::encode(pk.serialize()),
            secret_key: hex::encode(sk.secret_bytes()),
            balance: 0,
            transactions: Vec::new(),
        }
    }

    pub fn secret_key_hex(&self) -> &str {
        &self.secret_key
    }

    /// True when the stored address and public key both derive from the
    /// stored secret key.
    pub fn keys_match(&self) -> bool {
        match Self::from_secret_hex(&self.secret_key) {
            Ok(w) => w.address == self.address && w.public_key == self.public_key,
            Err(_) => false,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn history(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The last `n` history entries, oldest first.
    pub fn recent(&self, n: usize) -> &[Transaction] {
        let start = self.transactions.len().saturating_sub(n);
        &self.transactions[start..]
    }

    /// Add `tx` to the history and apply it to the balance: credit when it
    /// pays this wallet, debit when this wallet sent it. Coinbase payouts
    /// are never debited. Nothing changes on error.
    pub fn record(&mut self, tx: &Transaction) -> Result<(), WalletError> {
        if self.transactions.len() >= MAX_WALLET_TRANSACTIONS {
            return Err(WalletError::HistoryFull {
                max: MAX_WALLET_TRANSACTIONS,
            });
        }

        let mut balance = self.balance;
        if tx.to == self.address {
            balance = balance.saturating_add(tx.amount);
        }
        if tx.from == self.address && !tx.is_coinbase {
            balance = balance
                .checked_sub(tx.amount)
                .ok_or(WalletError::InsufficientFunds {
                    balance: self.balance,
                    requested: tx.amount,
                })?;
        }

        self.balance = balance;
        self.transactions.push(tx.clone());
        Ok(())
    }

    /// Build a transfer from this wallet, record it, and return it so the
    /// caller can queue it for the next block.
    pub fn transfer(
        &mut self,
        to: &str,
        amount: u64,
        timestamp: i64,
    ) -> Result<Transaction, WalletError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(WalletError::InvalidAddress(to.to_string()));
        }
        if amount == 0 {
            return Err(WalletError::InvalidAmount("0".to_string()));
        }
        if amount > self.balance {
            return Err(WalletError::InsufficientFunds {
                balance: self.balance,
                requested: amount,
            });
        }

        let tx = Transaction::transfer(&self.address, to, amount, timestamp);
        self.record(&tx)?;
        Ok(tx)
    }
}

/// `"ARC"` followed by the first 24 upper-hex characters of
/// `sha256(compressed pubkey)`.
pub fn address_for(pk: &PublicKey) -> String {
    let digest = Sha256::digest(pk.serialize());
    let hex = hex::encode_upper(digest);
    format!("{ADDRESS_PREFIX}{}", &hex[..ADDRESS_DIGEST_CHARS])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funded(amount: u64) -> Wallet {
        let mut w = Wallet::generate();
        w.record(&Transaction::coinbase(&w.address.clone(), amount, 1))
            .unwrap();
        w
    }

    #[test]
    fn generated_address_shape() {
        let w = Wallet::generate();
        assert_eq!(w.address.len(), 27);
        assert!(w.address.starts_with("ARC"));
        assert!(w.address[3..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(w.public_key.len(), 66);
        assert_eq!(w.balance(), 0);
        assert!(w.history().is_empty());
        assert!(w.keys_match());
    }

    #[test]
    fn secret_key_restores_same_identity() {
        let w = Wallet::generate();
        let again = Wallet::from_secret_hex(w.secret_key_hex()).unwrap();
        assert_eq!(again.address, w.address);
        assert_eq!(again.public_key, w.public_key);
        assert!(Wallet::from_secret_hex("00").is_err());
    }

    #[test]
    fn tampered_address_fails_key_check() {
        let mut w = Wallet::generate();
        w.address = "ARC000000000000000000000000".into();
        assert!(!w.keys_match());
    }

    #[test]
    fn coinbase_credits_without_debit() {
        let w = funded(500);
        assert_eq!(w.balance(), 500);
        assert_eq!(w.history().len(), 1);
    }

    #[test]
    fn records_incoming_and_outgoing() {
        let mut w = funded(1_000);
        let incoming = Transaction::transfer("ARC_OTHER", &w.address, 250, 2);
        w.record(&incoming).unwrap();
        assert_eq!(w.balance(), 1_250);

        let outgoing = Transaction::transfer(&w.address, "ARC_OTHER", 1_000, 3);
        w.record(&outgoing).unwrap();
        assert_eq!(w.balance(), 250);

        let unrelated = Transaction::transfer("ARC_A", "ARC_B", 9, 4);
        w.record(&unrelated).unwrap();
        assert_eq!(w.balance(), 250);
        assert_eq!(w.history().len(), 4);
    }

    #[test]
    fn overdraft_is_rejected_without_side_effects() {
        let mut w = funded(10);
        let tx = Transaction::transfer(&w.address, "ARC_OTHER", 11, 2);
        assert_eq!(
            w.record(&tx),
            Err(WalletError::InsufficientFunds {
                balance: 10,
                requested: 11
            })
        );
        assert_eq!(w.balance(), 10);
        assert_eq!(w.history().len(), 1);
    }

    #[test]
    fn transfer_debits_and_returns_tx() {
        let mut w = funded(1_000);
        let tx = w.transfer("ARC_OTHER", 400, 5).unwrap();
        assert_eq!(tx.from, w.address);
        assert_eq!(tx.to, "ARC_OTHER");
        assert!(!tx.is_coinbase);
        assert!(tx.is_well_formed());
        assert_eq!(w.balance(), 600);
        assert_eq!(w.recent(1), std::slice::from_ref(&tx));
    }

    #[test]
    fn transfer_validation() {
        let mut w = funded(100);
        assert!(matches!(
            w.transfer("ARC_OTHER", 0, 1),
            Err(WalletError::InvalidAmount(_))
        ));
        assert!(matches!(
            w.transfer("   ", 1, 1),
            Err(WalletError::InvalidAddress(_))
        ));
        assert!(matches!(
            w.transfer("ARC_OTHER", 101, 1),
            Err(WalletError::InsufficientFunds { .. })
        ));
        assert_eq!(w.balance(), 100);
    }

    #[test]
    fn history_is_bounded() {
        let mut w = Wallet::generate();
        for i in 0..MAX_WALLET_TRANSACTIONS {
            w.record(&Transaction::coinbase(&w.address.clone(), 1, i as i64))
                .unwrap();
        }
        let err = w
            .record(&Transaction::coinbase(&w.address.clone(), 1, 0))
            .unwrap_err();
        assert_eq!(
            err,
            WalletError::HistoryFull {
                max: MAX_WALLET_TRANSACTIONS
            }
        );
        assert_eq!(w.balance(), MAX_WALLET_TRANSACTIONS as u64);
        assert_eq!(w.recent(3).len(), 3);
        assert_eq!(w.recent(5_000).len(), MAX_WALLET_TRANSACTIONS);
    }
}
