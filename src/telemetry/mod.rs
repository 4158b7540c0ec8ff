//! Pipeline telemetry.
//!
//! Lock-free atomic counters record fetch and stack activity with minimal
//! overhead; a point-in-time [`TelemetrySnapshot`] copies them out for
//! logging at the end of a run.
//!
//! ```text
//! Pipeline stages ─────► PipelineMetrics ─────► TelemetrySnapshot
//!                        (atomic counters)      (point-in-time copy)
//! ```

mod metrics;
mod snapshot;

pub use metrics::PipelineMetrics;
pub use snapshot::TelemetrySnapshot;
