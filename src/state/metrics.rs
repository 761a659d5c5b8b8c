// Run metrics

use serde::Serialize;

/// Timing and delivery figures for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunMetrics {
    pub started_at: String,
    pub finished_at: String,
    pub total_duration_seconds: f64,
    pub records_fed: u64,
    pub events_published: u64,
}
