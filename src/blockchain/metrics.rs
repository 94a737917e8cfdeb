use std::time::Duration;

use serde::Serialize;

/// Outcome of mining one block.
#[derive(Debug, Clone, PartialEq)]
pub struct MiningReport {
    pub index: u64,
    pub digits: usize,
    /// Hash evaluations during nonce search, including the initial one.
    pub attempts: u64,
    /// Nonce search hit the attempt cap and kept its last state.
    pub exhausted: bool,
    /// Leading entries of the pending queue consumed by this block.
    pub pending_consumed: usize,
    pub digit_time: Duration,
    pub search_time: Duration,
}

impl MiningReport {
    pub fn total_time(&self) -> Duration {
        self.digit_time + self.search_time
    }

    pub fn digits_per_second(&self) -> f64 {
        per_second(self.digits as u64, self.total_time())
    }

    pub fn hashes_per_second(&self) -> f64 {
        per_second(self.attempts, self.search_time)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

/// Running totals across a mining session.
#[derive(Debug, Default)]
pub struct PerformanceMetrics {
    blocks_mined: u64,
    exhausted_searches: u64,
    total_attempts: u64,
    total_digits: u64,
    total_time: Duration,
    last: Option<MiningReport>,
}

#[derive(Debug, Serialize)]
pub struct LastBlockMetrics {
    pub index: u64,
    pub mining_time_secs: f64,
    pub digit_time_secs: f64,
    pub hash_time_secs: f64,
    pub digits_per_sec: f64,
    pub hashes_per_sec: f64,
    pub attempts: u64,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub blocks_mined: u64,
    pub exhausted_searches: u64,
    pub total_attempts: u64,
    pub total_digits: u64,
    pub total_mining_time_secs: f64,
    pub last_block: Option<LastBlockMetrics>,
}

impl PerformanceMetrics {
    pub fn record(&mut self, report: &MiningReport) {
        self.blocks_mined += 1;
        if report.exhausted {
            self.exhausted_searches += 1;
        }
        self.total_attempts += report.attempts;
        self.total_digits += report.digits as u64;
        self.total_time += report.total_time();
        self.last = Some(report.clone());
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            blocks_mined: self.blocks_mined,
            exhausted_searches: self.exhausted_searches,
            total_attempts: self.total_attempts,
            total_digits: self.total_digits,
            total_mining_time_secs: self.total_time.as_secs_f64(),
            last_block: self.last.as_ref().map(|r| LastBlockMetrics {
                index: r.index,
                mining_time_secs: r.total_time().as_secs_f64(),
                digit_time_secs: r.digit_time.as_secs_f64(),
                hash_time_secs: r.search_time.as_secs_f64(),
                digits_per_sec: r.digits_per_second(),
                hashes_per_sec: r.hashes_per_second(),
                attempts: r.attempts,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: u64, attempts: u64, exhausted: bool) -> MiningReport {
        MiningReport {
            index,
            digits: 1000,
            attempts,
            exhausted,
            pending_consumed: 0,
            digit_time: Duration::from_millis(250),
            search_time: Duration::from_millis(250),
        }
    }

    #[test]
    fn rates() {
        let r = report(1, 500, false);
        assert_eq!(r.total_time(), Duration::from_millis(500));
        assert!((r.digits_per_second() - 2000.0).abs() < 1e-9);
        assert!((r.hashes_per_second() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_elapsed_reports_zero_rate() {
        let mut r = report(1, 10, false);
        r.digit_time = Duration::ZERO;
        r.search_time = Duration::ZERO;
        assert_eq!(r.digits_per_second(), 0.0);
        assert_eq!(r.hashes_per_second(), 0.0);
    }

    #[test]
    fn accumulates_totals() {
        let mut m = PerformanceMetrics::default();
        assert!(m.snapshot().last_block.is_none());

        m.record(&report(0, 1, false));
        m.record(&report(1, 40, true));

        let s = m.snapshot();
        assert_eq!(s.blocks_mined, 2);
        assert_eq!(s.exhausted_searches, 1);
        assert_eq!(s.total_attempts, 41);
        assert_eq!(s.total_digits, 2000);
        assert!((s.total_mining_time_secs - 1.0).abs() < 1e-9);
        assert_eq!(s.last_block.map(|l| l.index), Some(1));
    }
}
