use serde::{Deserialize, Serialize};

/// 1000 coins in smallest units.
pub const DEFAULT_BASE_REWARD: u64 = 100_000_000_000;
pub const DEFAULT_HALVING_INTERVAL: u64 = 210_000;
/// 21 million coins in smallest units.
pub const DEFAULT_MAX_SUPPLY: u64 = 2_100_000_000_000_000;

/// Halvings after which the payout is zero.
const EXHAUSTED_AFTER: u64 = 64;

/// Block payout schedule with periodic halving.
///
/// `total_supply` and `max_supply` are carried for display only; nothing
/// increments or enforces them when rewards are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub base_reward: u64,
    pub halving_interval: u64,
    pub current_height: u64,
    pub total_supply: u64,
    pub max_supply: u64,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self::new(
            DEFAULT_BASE_REWARD,
            DEFAULT_HALVING_INTERVAL,
            DEFAULT_MAX_SUPPLY,
        )
    }
}

impl RewardSchedule {
    pub const fn new(base_reward: u64, halving_interval: u64, max_supply: u64) -> Self {
        Self {
            base_reward,
            halving_interval,
            current_height: 0,
            total_supply: 0,
            max_supply,
        }
    }

    /// Number of halvings that have happened by `height`. A zero interval
    /// never halves.
    pub fn halvings_at(&self, height: u64) -> u64 {
        height.checked_div(self.halving_interval).unwrap_or(0)
    }

    /// Payout for a block at `height`: `base_reward >> halvings`, or 0 once
    /// 64 halvings have passed.
    pub fn reward_for(&self, height: u64) -> u64 {
        let halvings = self.halvings_at(height);
        if halvings >= EXHAUSTED_AFTER {
            return 0;
        }
        self.base_reward >> halvings
    }

    /// First height of the next halving period.
    pub fn next_halving_height(&self, height: u64) -> Option<u64> {
        if self.halving_interval == 0 {
            return None;
        }
        (self.halvings_at(height) + 1).checked_mul(self.halving_interval)
    }

    pub fn set_height(&mut self, height: u64) {
        self.current_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEIGHTS: [u64; 6] = [0, 1, 209_999, 210_000, 1_000_000, 13_229_999];

    #[test]
    fn defaults() {
        let rs = RewardSchedule::default();
        assert_eq!(rs.reward_for(0), 100_000_000_000);
        assert_eq!(rs.reward_for(209_999), 100_000_000_000);
        assert_eq!(rs.reward_for(210_000), 50_000_000_000);
        assert_eq!(rs.max_supply, DEFAULT_MAX_SUPPLY);
        assert_eq!(rs.total_supply, 0);
    }

    #[test]
    fn each_interval_halves_the_reward() {
        let rs = RewardSchedule::default();
        for h in HEIGHTS {
            assert_eq!(rs.reward_for(h + rs.halving_interval), rs.reward_for(h) >> 1);
        }
    }

    #[test]
    fn power_of_two_base_doubles_back_exactly() {
        let rs = RewardSchedule::new(1 << 63, 10, 0);
        for h in (0..630).step_by(7) {
            assert!(h / rs.halving_interval < 63);
            assert_eq!(rs.reward_for(h), rs.reward_for(h + rs.halving_interval) * 2);
        }
    }

    #[test]
    fn exhausted_after_64_halvings() {
        let rs = RewardSchedule::new(u64::MAX, 10, 0);
        assert_eq!(rs.reward_for(639), 1);
        assert_eq!(rs.reward_for(640), 0);
        assert_eq!(rs.reward_for(u64::MAX), 0);
    }

    #[test]
    fn monotonically_non_increasing() {
        let rs = RewardSchedule::new(1_000, 3, 0);
        let rewards: Vec<u64> = (0..60).map(|h| rs.reward_for(h)).collect();
        assert!(rewards.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn zero_interval_never_halves() {
        let rs = RewardSchedule::new(800, 0, 0);
        assert_eq!(rs.reward_for(5_000_000), 800);
        assert_eq!(rs.next_halving_height(5), None);
    }

    #[test]
    fn next_halving() {
        let rs = RewardSchedule::default();
        assert_eq!(rs.next_halving_height(0), Some(210_000));
        assert_eq!(rs.next_halving_height(210_000), Some(420_000));
    }
}
