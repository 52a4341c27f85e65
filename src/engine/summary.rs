// src/engine/summary.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::exec::ExitResult;

/// Aggregate outcome of a batch of runs.
///
/// `results` are in submission order, regardless of completion order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary<M> {
    pub total_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub all_success: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: i64,
    pub results: Vec<ExitResult<M>>,
}

impl<M> RunSummary<M> {
    pub fn new(
        results: Vec<ExitResult<M>>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        let failure_count = results.len() - success_count;

        Self {
            total_count: results.len(),
            success_count,
            failure_count,
            all_success: failure_count == 0,
            start_time,
            end_time,
            duration_ms: (end_time - start_time).num_milliseconds().max(0),
            results,
        }
    }

    /// Results that did not succeed, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = &ExitResult<M>> {
        self.results.iter().filter(|r| !r.success)
    }
}
