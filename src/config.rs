use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::blockchain::RewardSchedule;
use crate::blockchain::pool::MAX_WORKERS;
use crate::blockchain::reward::{DEFAULT_BASE_REWARD, DEFAULT_HALVING_INTERVAL, DEFAULT_MAX_SUPPLY};

pub const DEFAULT_MINING_WORKERS: usize = 2;

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub chain_file: PathBuf,
    pub wallet_file: PathBuf,
    pub base_reward: u64,
    pub halving_interval: u64,
    pub max_supply: u64,
    pub mining_workers: usize,
    pub autosave: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            chain_file: PathBuf::from("archimedes_chain.json"),
            wallet_file: PathBuf::from("archimedes_wallet.json"),
            base_reward: DEFAULT_BASE_REWARD,
            halving_interval: DEFAULT_HALVING_INTERVAL,
            max_supply: DEFAULT_MAX_SUPPLY,
            mining_workers: DEFAULT_MINING_WORKERS,
            autosave: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Missing or unparseable values keep their
    /// defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(d.host),
            port: parsed(&lookup, "PORT").unwrap_or(d.port),
            chain_file: lookup("CHAIN_FILE").map(PathBuf::from).unwrap_or(d.chain_file),
            wallet_file: lookup("WALLET_FILE")
                .map(PathBuf::from)
                .unwrap_or(d.wallet_file),
            base_reward: parsed(&lookup, "BASE_REWARD").unwrap_or(d.base_reward),
            halving_interval: parsed(&lookup, "HALVING_INTERVAL").unwrap_or(d.halving_interval),
            max_supply: parsed(&lookup, "MAX_SUPPLY").unwrap_or(d.max_supply),
            mining_workers: parsed(&lookup, "MINING_WORKERS")
                .filter(|n: &usize| (1..=MAX_WORKERS).contains(n))
                .unwrap_or(d.mining_workers),
            autosave: lookup("AUTOSAVE")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(d.autosave),
        }
    }

    pub fn reward_schedule(&self) -> RewardSchedule {
        RewardSchedule::new(self.base_reward, self.halving_interval, self.max_supply)
    }
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
