//! Chunked group-by aggregation for bar, line, area, radar, pie, funnel and
//! treemap charts.
//!
//! Rows are grouped by the display string of the dimension column. Blank text
//! groups under [`NA_GROUP`]; an absent dimension skips the row. Each measure
//! adds its numeric value, and a value that does not coerce to a number adds
//! `1` instead so that categorical measures still produce counts.

use std::{collections::HashMap, sync::Arc};

use log::debug;
use serde::Serialize;

use crate::{
    chunked::{CALC_CHUNK_SIZE, ChunkedJob, Progress, Step, chunk_bounds},
    row::{Row, RowSet},
    value::{Scalar, is_blank, to_number},
};

pub const NA_GROUP: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub key: String,
    /// One accumulated value per measure, in measure order.
    pub values: Vec<f64>,
}

impl GroupedRow {
    fn zeroed(key: String, measures: usize) -> Self {
        Self {
            key,
            values: vec![0.0; measures],
        }
    }

    pub fn value(&self, measure_index: usize) -> f64 {
        self.values.get(measure_index).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameValue {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedResult {
    pub dimension: String,
    pub measures: Vec<String>,
    pub groups: Vec<GroupedRow>,
}

impl GroupedResult {
    /// Reduces each group to `{name, value}` using the first measure.
    pub fn into_name_values(self) -> Vec<NameValue> {
        self.groups
            .into_iter()
            .map(|group| NameValue {
                value: group.value(0),
                name: group.key,
            })
            .collect()
    }

    pub fn measure_total(&self, measure_index: usize) -> f64 {
        self.groups.iter().map(|g| g.value(measure_index)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Group key for a dimension cell, or `None` when the row is skipped.
pub fn group_key(value: &Scalar) -> Option<String> {
    match value {
        Scalar::Absent => None,
        other if is_blank(other) => Some(NA_GROUP.to_string()),
        other => Some(other.as_display()),
    }
}

/// Contribution of one measure cell to its group total.
pub fn measure_contribution(value: &Scalar) -> f64 {
    to_number(value).unwrap_or(1.0)
}

#[derive(Debug)]
struct GroupAccumulator {
    measures: usize,
    index: HashMap<String, usize>,
    groups: Vec<GroupedRow>,
}

impl GroupAccumulator {
    fn new(measures: usize) -> Self {
        Self {
            measures,
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn ingest(&mut self, row: &Row, dimension: &str, measures: &[String]) {
        let Some(key) = group_key(row.get(dimension)) else {
            return;
        };
        let slot = match self.index.get(&key) {
            Some(slot) => *slot,
            None => {
                let slot = self.groups.len();
                self.index.insert(key.clone(), slot);
                self.groups.push(GroupedRow::zeroed(key, self.measures));
                slot
            }
        };
        let group = &mut self.groups[slot];
        for (idx, measure) in measures.iter().enumerate() {
            group.values[idx] += measure_contribution(row.get(measure));
        }
    }
}

pub struct GroupAggregation {
    rows: Arc<RowSet>,
    dimension: String,
    measures: Vec<String>,
    chunk_size: usize,
    cursor: usize,
    accumulator: GroupAccumulator,
}

impl GroupAggregation {
    pub fn new(rows: Arc<RowSet>, dimension: impl Into<String>, measures: Vec<String>) -> Self {
        let accumulator = GroupAccumulator::new(measures.len());
        Self {
            rows,
            dimension: dimension.into(),
            measures,
            chunk_size: CALC_CHUNK_SIZE,
            cursor: 0,
            accumulator,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl ChunkedJob for GroupAggregation {
    type Output = GroupedResult;

    fn step(&mut self) -> Step<GroupedResult> {
        let total = self.rows.len();
        if self.cursor >= total {
            debug!(
                "Grouped {} row(s) by '{}' into {} group(s)",
                total,
                self.dimension,
                self.accumulator.groups.len()
            );
            let accumulator =
                std::mem::replace(&mut self.accumulator, GroupAccumulator::new(0));
            return Step::Done(GroupedResult {
                dimension: self.dimension.clone(),
                measures: self.measures.clone(),
                groups: accumulator.groups,
            });
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, total);
        for row in &self.rows.rows[start..end] {
            self.accumulator
                .ingest(row, &self.dimension, &self.measures);
        }
        self.cursor = end;
        Step::Pending(Progress::new(end, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunked::run_to_completion;

    fn sales_rows() -> Arc<RowSet> {
        RowSet::from_rows(vec![
            Row::new().with("Region", "East").with("Sales", 100),
            Row::new().with("Region", "East").with("Sales", "bad"),
            Row::new().with("Region", "West").with("Sales", 50),
        ])
        .shared()
    }

    #[test]
    fn non_numeric_measures_count_as_one() {
        let job = GroupAggregation::new(sales_rows(), "Region", vec!["Sales".into()]);
        let result = run_to_completion(job, |_| {});
        assert_eq!(
            result.groups,
            vec![
                GroupedRow {
                    key: "East".into(),
                    values: vec![101.0]
                },
                GroupedRow {
                    key: "West".into(),
                    values: vec![50.0]
                },
            ]
        );
    }

    #[test]
    fn blank_text_groups_under_na_and_absent_is_skipped() {
        let rows = RowSet::from_rows(vec![
            Row::new().with("Region", "  ").with("Sales", 5),
            Row::new().with("Sales", 7),
            Row::new().with("Region", "East").with("Sales", 1),
        ])
        .shared();
        let result = run_to_completion(
            GroupAggregation::new(rows, "Region", vec!["Sales".into()]),
            |_| {},
        );
        let keys: Vec<_> = result.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec![NA_GROUP, "East"]);
        assert_eq!(result.measure_total(0), 6.0);
    }

    #[test]
    fn absent_measure_counts_as_one_and_empty_text_as_zero() {
        let rows = RowSet::from_rows(vec![
            Row::new().with("Region", "East"),
            Row::new().with("Region", "East").with("Sales", ""),
        ])
        .shared();
        let result = run_to_completion(
            GroupAggregation::new(rows, "Region", vec!["Sales".into()]),
            |_| {},
        );
        assert_eq!(result.groups[0].values, vec![1.0]);
    }

    #[test]
    fn multiple_measures_accumulate_independently() {
        let rows = RowSet::from_rows(vec![
            Row::new().with("Day", 1).with("a", 1).with("b", 10),
            Row::new().with("Day", 1).with("a", 2).with("b", "x"),
            Row::new().with("Day", 2).with("a", 3).with("b", 30),
        ])
        .shared();
        let result = run_to_completion(
            GroupAggregation::new(rows, "Day", vec!["a".into(), "b".into()]),
            |_| {},
        );
        assert_eq!(result.groups[0].key, "1");
        assert_eq!(result.groups[0].values, vec![3.0, 11.0]);
        assert_eq!(result.groups[1].values, vec![3.0, 30.0]);
    }

    #[test]
    fn progress_is_reported_per_chunk() {
        let rows = RowSet::from_rows(
            (0..5)
                .map(|i| Row::new().with("k", "a").with("v", i))
                .collect(),
        )
        .shared();
        let job = GroupAggregation::new(rows, "k", vec!["v".into()]).with_chunk_size(2);
        let mut seen = Vec::new();
        let result = run_to_completion(job, |p| seen.push(p));
        assert_eq!(seen, vec![40, 80, 100, 100]);
        assert_eq!(result.groups[0].values, vec![10.0]);
    }

    #[test]
    fn name_values_use_first_measure() {
        let result = run_to_completion(
            GroupAggregation::new(sales_rows(), "Region", vec!["Sales".into()]),
            |_| {},
        );
        let pairs = result.into_name_values();
        assert_eq!(pairs[0].name, "East");
        assert_eq!(pairs[0].value, 101.0);
        assert_eq!(pairs[1].value, 50.0);
    }
}
