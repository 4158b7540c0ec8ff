//! Atomic counters for pipeline instrumentation.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::TelemetrySnapshot;

/// Shared pipeline counters.
///
/// Cheap to update from any worker; wrap in an `Arc` and hand clones to
/// the fetch and stack stages.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Layer artifacts served from the local cache without a request.
    cache_hits: AtomicUsize,
    /// Layer artifacts downloaded over the network.
    layers_downloaded: AtomicUsize,
    /// Bytes received for downloaded layer artifacts.
    bytes_downloaded: AtomicU64,
    /// Layer artifact fetches that failed.
    layers_failed: AtomicUsize,
    /// Tiles with at least one layer available after fetch.
    tiles_fetched: AtomicUsize,
    /// Tiles dropped at the fetch stage.
    tiles_failed: AtomicUsize,
    /// Tiles successfully stacked.
    tiles_stacked: AtomicUsize,
    /// Tiles dropped at the stack stage.
    stack_failures: AtomicUsize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn layer_downloaded(&self, bytes: u64) {
        self.layers_downloaded.fetch_add(1, Ordering::Relaxed);
        self.bytes_downloaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn layer_failed(&self) {
        self.layers_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_fetched(&self) {
        self.tiles_fetched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_failed(&self) {
        self.tiles_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn tile_stacked(&self) {
        self.tiles_stacked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stack_failed(&self) {
        self.stack_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies all counters into an immutable snapshot.
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            layers_downloaded: self.layers_downloaded.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
            layers_failed: self.layers_failed.load(Ordering::Relaxed),
            tiles_fetched: self.tiles_fetched.load(Ordering::Relaxed),
            tiles_failed: self.tiles_failed.load(Ordering::Relaxed),
            tiles_stacked: self.tiles_stacked.load(Ordering::Relaxed),
            stack_failures: self.stack_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_counters_start_at_zero() {
        let snapshot = PipelineMetrics::new().snapshot();
        assert_eq!(snapshot.cache_hits, 0);
        assert_eq!(snapshot.layers_downloaded, 0);
        assert_eq!(snapshot.bytes_downloaded, 0);
        assert_eq!(snapshot.tiles_stacked, 0);
    }

    #[test]
    fn test_layer_download_records_bytes() {
        let metrics = PipelineMetrics::new();
        metrics.layer_downloaded(1_000);
        metrics.layer_downloaded(500);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.layers_downloaded, 2);
        assert_eq!(snapshot.bytes_downloaded, 1_500);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let metrics = Arc::new(PipelineMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.cache_hit();
                        metrics.tile_fetched();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 800);
        assert_eq!(snapshot.tiles_fetched, 800);
    }
}
