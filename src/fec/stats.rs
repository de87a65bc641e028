//! Repair statistics

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters updated by every repair call.
#[derive(Debug, Default)]
pub struct FecStats {
    /// Repair calls
    pub repairs_total: AtomicU64,

    /// Blocks returned verified
    pub repairs_succeeded: AtomicU64,

    /// Blocks that stayed uncorrectable
    pub repairs_failed: AtomicU64,

    /// Repairs that needed the erasure-aware second attempt
    pub erasure_retries: AtomicU64,

    /// Symbols corrected across all codewords
    pub symbols_corrected: AtomicU64,

    /// Contributing block reads that failed
    pub read_failures: AtomicU64,

    /// Decoding passes over contributing blocks
    pub passes: AtomicU64,
}

impl FecStats {
    pub fn record_attempt(&self) {
        self.repairs_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a verified block.
    pub fn record_success(&self, corrected: usize, used_erasures: bool) {
        self.repairs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.symbols_corrected
            .fetch_add(corrected as u64, Ordering::Relaxed);
        if used_erasures {
            self.erasure_retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a block that could not be repaired.
    pub fn record_failure(&self, used_erasures: bool) {
        self.repairs_failed.fetch_add(1, Ordering::Relaxed);
        if used_erasures {
            self.erasure_retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_read_failure(&self) {
        self.read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pass(&self) {
        self.passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            repairs_total: self.repairs_total.load(Ordering::Relaxed),
            repairs_succeeded: self.repairs_succeeded.load(Ordering::Relaxed),
            repairs_failed: self.repairs_failed.load(Ordering::Relaxed),
            erasure_retries: self.erasure_retries.load(Ordering::Relaxed),
            symbols_corrected: self.symbols_corrected.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            log_suppressed: 0,
        }
    }
}

/// Point-in-time copy of [`FecStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub repairs_total: u64,
    pub repairs_succeeded: u64,
    pub repairs_failed: u64,
    pub erasure_retries: u64,
    pub symbols_corrected: u64,
    pub read_failures: u64,
    pub passes: u64,
    /// Repair log messages dropped by rate limiting; set by `FecEngine::stats`
    #[serde(default)]
    pub log_suppressed: u64,
}

impl StatsSnapshot {
    /// Share of repair calls that ended with a verified block.
    pub fn success_rate(&self) -> f64 {
        if self.repairs_total == 0 {
            0.0
        } else {
            (self.repairs_succeeded as f64 / self.repairs_total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let stats = FecStats::default();
        stats.record_attempt();
        stats.record_success(12, false);
        stats.record_attempt();
        stats.record_failure(true);
        stats.record_read_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.repairs_total, 2);
        assert_eq!(snap.repairs_succeeded, 1);
        assert_eq!(snap.repairs_failed, 1);
        assert_eq!(snap.erasure_retries, 1);
        assert_eq!(snap.symbols_corrected, 12);
        assert_eq!(snap.read_failures, 1);
        assert!((snap.success_rate() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_snapshot() {
        assert_eq!(FecStats::default().snapshot().success_rate(), 0.0);
    }
}
