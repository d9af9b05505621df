//! Heatmap, gantt and scatter transforms.
//!
//! These shapes are not plain group-bys. Each is still a [`ChunkedJob`] so the
//! host drives them the same way as the aggregator.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{NaiveDateTime, TimeDelta};
use itertools::{Itertools, MinMaxResult};
use log::debug;
use serde::{Serialize, Serializer};

use crate::{
    aggregate::NA_GROUP,
    chunked::{CALC_CHUNK_SIZE, ChunkedJob, Progress, Step, chunk_bounds},
    row::RowSet,
    value::{Scalar, is_blank, to_date, to_number},
};

fn heat_label(value: &Scalar) -> String {
    if is_blank(value) {
        NA_GROUP.to_string()
    } else {
        value.as_display()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapResult {
    pub measure: String,
    /// Sorted distinct values of the first dimension (matrix rows).
    pub row_labels: Vec<String>,
    /// Sorted distinct values of the second dimension (matrix columns).
    pub column_labels: Vec<String>,
    /// `matrix[row][column]`; cells without matching rows hold 0.
    pub matrix: Vec<Vec<f64>>,
    pub min: f64,
    pub max: f64,
}

impl HeatmapResult {
    pub fn cell(&self, row_label: &str, column_label: &str) -> Option<f64> {
        let row = self.row_labels.iter().position(|l| l == row_label)?;
        let column = self.column_labels.iter().position(|l| l == column_label)?;
        Some(self.matrix[row][column])
    }

    /// Position of `value` between `min` and `max`, for color scales.
    pub fn intensity(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty() || self.column_labels.is_empty()
    }
}

/// Sums one measure over every `(dimension, dimension2)` pair in a single pass.
pub struct HeatmapJob {
    rows: Arc<RowSet>,
    dimension: String,
    dimension2: String,
    measure: String,
    chunk_size: usize,
    cursor: usize,
    row_labels: BTreeSet<String>,
    column_labels: BTreeSet<String>,
    sums: HashMap<(String, String), f64>,
}

impl HeatmapJob {
    pub fn new(
        rows: Arc<RowSet>,
        dimension: impl Into<String>,
        dimension2: impl Into<String>,
        measure: impl Into<String>,
    ) -> Self {
        Self {
            rows,
            dimension: dimension.into(),
            dimension2: dimension2.into(),
            measure: measure.into(),
            chunk_size: CALC_CHUNK_SIZE,
            cursor: 0,
            row_labels: BTreeSet::new(),
            column_labels: BTreeSet::new(),
            sums: HashMap::new(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn finish(&mut self) -> HeatmapResult {
        let row_labels: Vec<String> = std::mem::take(&mut self.row_labels).into_iter().collect();
        let column_labels: Vec<String> =
            std::mem::take(&mut self.column_labels).into_iter().collect();
        let matrix = row_labels
            .iter()
            .map(|row_label| {
                column_labels
                    .iter()
                    .map(|column_label| {
                        self.sums
                            .get(&(row_label.clone(), column_label.clone()))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect_vec()
            })
            .collect_vec();
        let (min, max) = match matrix.iter().flatten().minmax_by(|a, b| a.total_cmp(b)) {
            MinMaxResult::NoElements => (0.0, 0.0),
            MinMaxResult::OneElement(value) => (*value, *value),
            MinMaxResult::MinMax(min, max) => (*min, *max),
        };
        debug!(
            "Heatmap '{}' x '{}' produced {}x{} cells",
            self.dimension,
            self.dimension2,
            row_labels.len(),
            column_labels.len()
        );
        HeatmapResult {
            measure: self.measure.clone(),
            row_labels,
            column_labels,
            matrix,
            min,
            max,
        }
    }
}

impl ChunkedJob for HeatmapJob {
    type Output = HeatmapResult;

    fn step(&mut self) -> Step<HeatmapResult> {
        let total = self.rows.len();
        if self.cursor >= total {
            return Step::Done(self.finish());
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, total);
        for row in &self.rows.rows[start..end] {
            let row_label = heat_label(row.get(&self.dimension));
            let column_label = heat_label(row.get(&self.dimension2));
            let value = to_number(row.get(&self.measure)).unwrap_or(0.0);
            self.row_labels.insert(row_label.clone());
            self.column_labels.insert(column_label.clone());
            *self.sums.entry((row_label, column_label)).or_insert(0.0) += value;
        }
        self.cursor = end;
        Step::Pending(Progress::new(end, total))
    }
}

fn serialize_millis<S: Serializer>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(delta.num_milliseconds())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GanttEntry {
    pub task: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Lead-in from the earliest start in the chart.
    #[serde(rename = "startOffsetMs", serialize_with = "serialize_millis")]
    pub start_offset: TimeDelta,
    #[serde(rename = "durationMs", serialize_with = "serialize_millis")]
    pub duration: TimeDelta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GanttResult {
    pub anchor: Option<NaiveDateTime>,
    pub entries: Vec<GanttEntry>,
}

impl GanttResult {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Calendar date at `offset` from the anchor, for axis ticks.
    pub fn date_at(&self, offset: TimeDelta) -> Option<NaiveDateTime> {
        self.anchor.and_then(|anchor| anchor.checked_add_signed(offset))
    }
}

pub struct GanttJob {
    rows: Arc<RowSet>,
    task: String,
    start: String,
    end: String,
    chunk_size: usize,
    cursor: usize,
    tasks: Vec<(String, NaiveDateTime, NaiveDateTime)>,
}

impl GanttJob {
    pub fn new(
        rows: Arc<RowSet>,
        task: impl Into<String>,
        start: impl Into<String>,
        end: impl Into<String>,
    ) -> Self {
        Self {
            rows,
            task: task.into(),
            start: start.into(),
            end: end.into(),
            chunk_size: CALC_CHUNK_SIZE,
            cursor: 0,
            tasks: Vec::new(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn finish(&mut self) -> GanttResult {
        let tasks = std::mem::take(&mut self.tasks);
        let Some(anchor) = tasks.iter().map(|(_, start, _)| *start).min() else {
            return GanttResult::default();
        };
        let entries = tasks
            .into_iter()
            .map(|(task, start, end)| GanttEntry {
                task,
                start,
                end,
                start_offset: start - anchor,
                duration: end - start,
            })
            .collect();
        GanttResult {
            anchor: Some(anchor),
            entries,
        }
    }
}

impl ChunkedJob for GanttJob {
    type Output = GanttResult;

    fn step(&mut self) -> Step<GanttResult> {
        let total = self.rows.len();
        if self.cursor >= total {
            return Step::Done(self.finish());
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, total);
        for row in &self.rows.rows[start..end] {
            let task = row.get(&self.task);
            if is_blank(task) {
                continue;
            }
            let (Some(begin), Some(finish)) =
                (to_date(row.get(&self.start)), to_date(row.get(&self.end)))
            else {
                continue;
            };
            if finish < begin {
                continue;
            }
            self.tasks.push((task.as_display(), begin, finish));
        }
        self.cursor = end;
        Step::Pending(Progress::new(end, total))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScatterResult {
    pub x_measure: String,
    pub y_measure: String,
    pub points: Vec<ScatterPoint>,
}

pub struct ScatterJob {
    rows: Arc<RowSet>,
    label: Option<String>,
    x: String,
    y: String,
    chunk_size: usize,
    cursor: usize,
    points: Vec<ScatterPoint>,
}

impl ScatterJob {
    pub fn new(rows: Arc<RowSet>, x: impl Into<String>, y: impl Into<String>) -> Self {
        let capacity = rows.len();
        Self {
            rows,
            label: None,
            x: x.into(),
            y: y.into(),
            chunk_size: CALC_CHUNK_SIZE,
            cursor: 0,
            points: Vec::with_capacity(capacity),
        }
    }

    /// Attaches the display string of `column` to every point.
    pub fn labelled_by(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.label = (!column.trim().is_empty()).then_some(column);
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl ChunkedJob for ScatterJob {
    type Output = ScatterResult;

    fn step(&mut self) -> Step<ScatterResult> {
        let total = self.rows.len();
        if self.cursor >= total {
            return Step::Done(ScatterResult {
                x_measure: self.x.clone(),
                y_measure: self.y.clone(),
                points: std::mem::take(&mut self.points),
            });
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, total);
        for row in &self.rows.rows[start..end] {
            self.points.push(ScatterPoint {
                label: self.label.as_deref().map(|c| row.get(c).as_display()),
                x: to_number(row.get(&self.x)).unwrap_or(0.0),
                y: to_number(row.get(&self.y)).unwrap_or(0.0),
            });
        }
        self.cursor = end;
        Step::Pending(Progress::new(end, total))
    }
}
