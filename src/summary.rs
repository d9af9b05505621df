//! Distinct-value tabulation and column completeness.
//!
//! [`ValueSummaryJob`] counts the display strings of one column in
//! first-appearance order. Blank cells are counted in a separate bucket shown
//! as [`BLANK_LABEL`], which stays last whenever entries are sorted by value.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    chunked::{CALC_CHUNK_SIZE, ChunkedJob, Progress, Step, chunk_bounds},
    row::RowSet,
    value::{Scalar, is_blank},
};

pub const BLANK_LABEL: &str = "(Blank)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub value: String,
    pub count: usize,
    /// Set only on the bucket that collects blank cells.
    #[serde(skip_serializing_if = "is_false")]
    pub blank: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl SummaryEntry {
    pub fn new(value: impl Into<String>, count: usize) -> Self {
        Self {
            value: value.into(),
            count,
            blank: false,
        }
    }

    pub fn blank_bucket(count: usize) -> Self {
        Self {
            value: BLANK_LABEL.to_string(),
            count,
            blank: true,
        }
    }

    pub fn is_blank_bucket(&self) -> bool {
        self.blank
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Value,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarySort {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SummarySort {
    fn default() -> Self {
        Self {
            key: SortKey::Count,
            direction: SortDirection::Descending,
        }
    }
}

impl SummarySort {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Next sort after a header click on `key`.
    pub fn toggle(self, key: SortKey) -> Self {
        let direction = if key == SortKey::Count && self.key != SortKey::Count {
            SortDirection::Descending
        } else if self.key == key && self.direction == SortDirection::Ascending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        Self { key, direction }
    }

    fn compare(&self, a: &SummaryEntry, b: &SummaryEntry) -> Ordering {
        let ordering = match self.key {
            SortKey::Value => match (a.is_blank_bucket(), b.is_blank_bucket()) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                (false, false) => a.value.cmp(&b.value),
            },
            SortKey::Count => a.count.cmp(&b.count),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValueSummary {
    pub column: String,
    /// Distinct values in first-appearance order, then the blank bucket.
    pub entries: Vec<SummaryEntry>,
}

impl ValueSummary {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    pub fn blank_count(&self) -> usize {
        self.entries
            .iter()
            .find(|e| e.is_blank_bucket())
            .map_or(0, |e| e.count)
    }

    /// Entries ordered by `sort`. Ties keep their first-appearance order.
    pub fn sorted(&self, sort: SummarySort) -> Vec<SummaryEntry> {
        let mut items = self.entries.clone();
        items.sort_by(|a, b| sort.compare(a, b));
        items
    }

    pub fn render_rows(&self, sort: SummarySort, top: usize) -> Vec<Vec<String>> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        let mut items = self.sorted(sort);
        if top > 0 && items.len() > top {
            items.truncate(top);
        }
        items
            .into_iter()
            .map(|entry| {
                let percent = (entry.count as f64 / total as f64) * 100.0;
                vec![entry.value, entry.count.to_string(), format!("{percent:.2}%")]
            })
            .collect()
    }
}

struct FrequencyAccumulator {
    order: Vec<String>,
    counts: HashMap<String, usize>,
    blanks: usize,
}

impl FrequencyAccumulator {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            counts: HashMap::new(),
            blanks: 0,
        }
    }

    fn ingest(&mut self, value: &Scalar) {
        if is_blank(value) {
            self.blanks += 1;
            return;
        }
        let key = value.as_display();
        match self.counts.get_mut(&key) {
            Some(count) => *count += 1,
            None => {
                self.order.push(key.clone());
                self.counts.insert(key, 1);
            }
        }
    }

    fn into_entries(mut self) -> Vec<SummaryEntry> {
        let mut entries = self
            .order
            .into_iter()
            .map(|value| {
                let count = self.counts.remove(&value).unwrap_or_default();
                SummaryEntry::new(value, count)
            })
            .collect::<Vec<_>>();
        if self.blanks > 0 {
            entries.push(SummaryEntry::blank_bucket(self.blanks));
        }
        entries
    }
}

pub struct ValueSummaryJob {
    rows: Arc<RowSet>,
    column: String,
    chunk_size: usize,
    cursor: usize,
    accumulator: FrequencyAccumulator,
}

impl ValueSummaryJob {
    pub fn new(rows: Arc<RowSet>, column: impl Into<String>) -> Self {
        Self {
            rows,
            column: column.into(),
            chunk_size: CALC_CHUNK_SIZE,
            cursor: 0,
            accumulator: FrequencyAccumulator::new(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl ChunkedJob for ValueSummaryJob {
    type Output = ValueSummary;

    fn step(&mut self) -> Step<ValueSummary> {
        let total = self.rows.len();
        if self.cursor >= total {
            let entries =
                std::mem::replace(&mut self.accumulator, FrequencyAccumulator::new())
                    .into_entries();
            debug!(
                "Summarized '{}' into {} distinct value(s)",
                self.column,
                entries.len()
            );
            return Step::Done(ValueSummary {
                column: self.column.clone(),
                entries,
            });
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, total);
        for row in &self.rows.rows[start..end] {
            self.accumulator.ingest(row.get(&self.column));
        }
        self.cursor = end;
        Step::Pending(Progress::new(end, total))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completeness {
    pub total_rows: usize,
    pub non_empty_rows: usize,
    pub blank_rows: usize,
}

impl Completeness {
    pub fn non_empty_percent(&self) -> f64 {
        percent_of(self.non_empty_rows, self.total_rows)
    }

    pub fn blank_percent(&self) -> f64 {
        percent_of(self.blank_rows, self.total_rows)
    }
}

fn percent_of(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Filled versus blank cells of one column.
pub fn column_completeness(rows: &RowSet, column: &str) -> Completeness {
    let non_empty_rows = rows
        .rows
        .iter()
        .filter(|row| !is_blank(row.get(column)))
        .count();
    Completeness {
        total_rows: rows.len(),
        non_empty_rows,
        blank_rows: rows.len() - non_empty_rows,
    }
}
