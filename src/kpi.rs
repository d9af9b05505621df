//! Whole-dataset KPI reduction.
//!
//! Unlike grouped aggregation, values that do not coerce to a number are
//! skipped here rather than counted as `1`.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::{
    chunked::{ChunkedJob, KPI_CHUNK_SIZE, Progress, Step, chunk_bounds},
    config::KpiAggregation,
    row::RowSet,
    value::{format_number, to_number},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiResult {
    pub measure: String,
    pub aggregation: KpiAggregation,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<f64>,
    /// `value / target * 100`, only when a positive target is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_progress: Option<f64>,
}

impl KpiResult {
    pub fn new(
        measure: impl Into<String>,
        aggregation: KpiAggregation,
        value: f64,
        target: Option<f64>,
    ) -> Self {
        let target_progress = target
            .filter(|t| *t > 0.0)
            .map(|t| value / t * 100.0);
        Self {
            measure: measure.into(),
            aggregation,
            value,
            target,
            target_progress,
        }
    }

    /// Display value rounded to two decimals, as shown on the card.
    pub fn formatted_value(&self) -> String {
        format_number((self.value * 100.0).round() / 100.0)
    }
}

#[derive(Debug, Default)]
struct RollingStats {
    sum: f64,
    count: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl RollingStats {
    fn add_value(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
    }

    fn resolve(&self, aggregation: KpiAggregation, row_count: usize) -> f64 {
        match aggregation {
            KpiAggregation::Sum => self.sum,
            KpiAggregation::Average => {
                if self.count > 0 {
                    self.sum / self.count as f64
                } else {
                    0.0
                }
            }
            KpiAggregation::Count => row_count as f64,
            KpiAggregation::Min => self.min.unwrap_or(0.0),
            KpiAggregation::Max => self.max.unwrap_or(0.0),
        }
    }
}

pub struct KpiJob {
    rows: Arc<RowSet>,
    measure: String,
    aggregation: KpiAggregation,
    target: Option<f64>,
    chunk_size: usize,
    cursor: usize,
    stats: RollingStats,
}

impl KpiJob {
    pub fn new(
        rows: Arc<RowSet>,
        measure: impl Into<String>,
        aggregation: KpiAggregation,
        target: Option<f64>,
    ) -> Self {
        Self {
            rows,
            measure: measure.into(),
            aggregation,
            target,
            chunk_size: KPI_CHUNK_SIZE,
            cursor: 0,
            stats: RollingStats::default(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn finish(&self) -> KpiResult {
        let value = self.stats.resolve(self.aggregation, self.rows.len());
        debug!(
            "KPI {} of '{}' over {} row(s) ({} numeric) = {}",
            self.aggregation,
            self.measure,
            self.rows.len(),
            self.stats.count,
            value
        );
        KpiResult::new(self.measure.clone(), self.aggregation, value, self.target)
    }
}

impl ChunkedJob for KpiJob {
    type Output = KpiResult;

    fn step(&mut self) -> Step<KpiResult> {
        let total = self.rows.len();
        // count never looks at the measure
        if self.aggregation == KpiAggregation::Count || self.cursor >= total {
            return Step::Done(self.finish());
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, total);
        for row in &self.rows.rows[start..end] {
            if let Some(value) = to_number(row.get(&self.measure)) {
                self.stats.add_value(value);
            }
        }
        self.cursor = end;
        Step::Pending(Progress::new(end, total))
    }
}
