//! Point-in-time copies of pipeline counters.

use std::fmt;

use serde::Serialize;

/// Immutable copy of [`PipelineMetrics`](super::PipelineMetrics) counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub cache_hits: usize,
    pub layers_downloaded: usize,
    pub bytes_downloaded: u64,
    pub layers_failed: usize,
    pub tiles_fetched: usize,
    pub tiles_failed: usize,
    pub tiles_stacked: usize,
    pub stack_failures: usize,
}

impl TelemetrySnapshot {
    /// Fraction of layer artifact reads served from cache, in `[0, 1]`.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.layers_downloaded;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} tiles fetched ({} failed), {} stacked ({} failed), \
             {} layers downloaded ({} bytes, {:.0}% cache hits)",
            self.tiles_fetched,
            self.tiles_failed,
            self.tiles_stacked,
            self.stack_failures,
            self.layers_downloaded,
            self.bytes_downloaded,
            self.cache_hit_rate() * 100.0
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_rate_handles_zero_total() {
        assert_eq!(TelemetrySnapshot::default().cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_cache_hit_rate() {
        let snapshot = TelemetrySnapshot {
            cache_hits: 3,
            layers_downloaded: 1,
            ..Default::default()
        };
        assert_eq!(snapshot.cache_hit_rate(), 0.75);
    }

    #[test]
    fn test_display_summarizes_run() {
        let snapshot = TelemetrySnapshot {
            cache_hits: 1,
            layers_downloaded: 3,
            bytes_downloaded: 4_096,
            tiles_fetched: 2,
            tiles_stacked: 2,
            ..Default::default()
        };
        let text = snapshot.to_string();
        assert!(text.contains("2 tiles fetched"));
        assert!(text.contains("4096 bytes"));
        assert!(text.contains("25% cache hits"));
    }
}
