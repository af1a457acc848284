// src/models/stats.rs

//! Aggregate counters reported by the store and the batch coordinator.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Row totals for one language at one level of the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LangCounts {
    pub total: usize,
    pub processed: usize,
}

impl LangCounts {
    pub fn pending(&self) -> usize {
        self.total.saturating_sub(self.processed)
    }
}

/// Snapshot of the state store, keyed by language code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub conferences: BTreeMap<String, LangCounts>,
    pub documents: BTreeMap<String, LangCounts>,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, map) in [("conferences", &self.conferences), ("documents", &self.documents)] {
            writeln!(f, "{level}:")?;
            if map.is_empty() {
                writeln!(f, "  (none)")?;
            }
            for (lang, c) in map {
                writeln!(
                    f,
                    "  {lang}: {} total, {} processed, {} pending",
                    c.total,
                    c.processed,
                    c.pending()
                )?;
            }
        }
        Ok(())
    }
}

/// Result of one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Documents that reached a terminal state
    pub total: usize,
    pub successful: usize,
    pub failed: usize,

    /// Records accepted by the output sink
    pub saved: usize,

    /// Work items never dispatched because of cancellation
    pub skipped: usize,
}

impl BatchStats {
    /// Percentage of terminal documents that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successful as f64 * 100.0 / self.total as f64
        }
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} successful={} failed={} saved={} skipped={} success_rate={:.1}%",
            self.total,
            self.successful,
            self.failed,
            self.saved,
            self.skipped,
            self.success_rate()
        )
    }
}

/// Result of one discovery or enumeration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageStats {
    /// Pages fetched successfully
    pub pages: usize,
    /// Pages that could not be fetched or were rejected
    pub errors: usize,
    /// Newly stored rows
    pub inserted: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let stats = BatchStats {
            total: 4,
            successful: 3,
            failed: 1,
            saved: 3,
            skipped: 0,
        };
        assert!((stats.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(BatchStats::default().success_rate(), 0.0);
    }

    #[test]
    fn test_pending() {
        let counts = LangCounts {
            total: 5,
            processed: 2,
        };
        assert_eq!(counts.pending(), 3);
    }
}
