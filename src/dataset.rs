//! Loading a delimited file into a [`RowSet`], visualization sampling and
//! heuristic column-kind inference.

use std::{fmt, path::Path, sync::Arc};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    io_utils,
    row::{Row, RowSet},
    value::{Scalar, is_blank, to_date},
};

/// Regular charts use at most this many leading rows unless full-data mode is on.
pub const MAX_ROWS_FOR_VIZ: usize = 10_000;
/// Datasets above this size are flagged as large.
pub const DATA_WARNING_THRESHOLD: usize = 10_000;

const DATE_SHARE_PERCENT: usize = 90;

pub fn load_rows(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<RowSet> {
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let columns = io_utils::dedupe_headers(io_utils::reader_headers(&mut reader, encoding)?);
    let mut rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let decoded = io_utils::decode_record(&record, encoding)
            .with_context(|| format!("Decoding row {}", row_idx + 2))?;
        rows.push(build_row(&columns, decoded));
    }
    let headers = columns.into_iter().flatten().collect::<Vec<_>>();
    debug!(
        "Loaded {} row(s) x {} column(s) from {:?}",
        rows.len(),
        headers.len(),
        path
    );
    Ok(RowSet::new(headers, rows))
}

/// Fields past the end of a short record stay absent; `None` columns are
/// dropped.
fn build_row(columns: &[Option<String>], decoded: Vec<String>) -> Row {
    let mut row = Row::new();
    for (column, raw) in columns.iter().zip(decoded) {
        if let Some(header) = column {
            row.insert(header.clone(), Scalar::infer(&raw));
        }
    }
    row
}

/// Rows that regular charts should read.
pub fn viz_rows(rows: &Arc<RowSet>, full_data: bool) -> Arc<RowSet> {
    if full_data || rows.len() <= MAX_ROWS_FOR_VIZ {
        return Arc::clone(rows);
    }
    warn!(
        "Visualizations are using the first {} of {} rows; enable full-data mode to use all rows",
        MAX_ROWS_FOR_VIZ,
        rows.len()
    );
    Arc::new(RowSet::new(
        rows.headers.clone(),
        rows.rows[..MAX_ROWS_FOR_VIZ].to_vec(),
    ))
}

pub fn is_large(rows: &RowSet) -> bool {
    rows.len() > DATA_WARNING_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Boolean,
    Date,
    Categorical,
    Empty,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Date => "date",
            ColumnKind::Categorical => "categorical",
            ColumnKind::Empty => "empty",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Default)]
struct KindVotes {
    filled: usize,
    numbers: usize,
    booleans: usize,
    dates: usize,
}

impl KindVotes {
    fn observe(&mut self, value: &Scalar) {
        if is_blank(value) {
            return;
        }
        self.filled += 1;
        match value {
            Scalar::Number(_) => self.numbers += 1,
            Scalar::Boolean(_) => self.booleans += 1,
            Scalar::Text(_) if to_date(value).is_some() => self.dates += 1,
            _ => {}
        }
    }

    fn decide(&self) -> ColumnKind {
        if self.filled == 0 {
            ColumnKind::Empty
        } else if self.numbers == self.filled {
            ColumnKind::Numeric
        } else if self.booleans == self.filled {
            ColumnKind::Boolean
        } else if self.dates * 100 >= self.filled * DATE_SHARE_PERCENT {
            ColumnKind::Date
        } else {
            ColumnKind::Categorical
        }
    }
}

/// Majority vote over the non-blank cells of the first `sample` rows
/// (`0` scans every row).
pub fn infer_column_kind(rows: &RowSet, column: &str, sample: usize) -> ColumnKind {
    let take = if sample == 0 { rows.len() } else { sample };
    let mut votes = KindVotes::default();
    for row in rows.rows.iter().take(take) {
        votes.observe(row.get(column));
    }
    votes.decide()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> RowSet {
        RowSet::from_rows(vec![
            Row::new()
                .with("amount", 1.5)
                .with("when", "2024-01-02")
                .with("ok", true)
                .with("name", "a"),
            Row::new()
                .with("amount", 2.0)
                .with("when", "2024-01-03")
                .with("ok", false)
                .with("name", "2024-01-03"),
            Row::new().with("amount", " ").with("name", "b"),
        ])
    }

    #[test]
    fn infers_kinds_from_non_blank_cells() {
        let rows = rows();
        assert_eq!(infer_column_kind(&rows, "amount", 0), ColumnKind::Numeric);
        assert_eq!(infer_column_kind(&rows, "when", 0), ColumnKind::Date);
        assert_eq!(infer_column_kind(&rows, "ok", 0), ColumnKind::Boolean);
        assert_eq!(infer_column_kind(&rows, "name", 0), ColumnKind::Categorical);
        assert_eq!(infer_column_kind(&rows, "missing", 0), ColumnKind::Empty);
    }

    #[test]
    fn sample_limits_rows_considered() {
        let rows = rows();
        assert_eq!(infer_column_kind(&rows, "name", 1), ColumnKind::Categorical);
        assert_eq!(infer_column_kind(&rows, "ok", 1), ColumnKind::Boolean);
    }

    #[test]
    fn viz_rows_samples_only_large_sets() {
        let small = RowSet::from_rows(vec![Row::new().with("a", 1)]).shared();
        assert!(Arc::ptr_eq(&viz_rows(&small, false), &small));

        let large = RowSet::from_rows(
            (0..MAX_ROWS_FOR_VIZ + 5)
                .map(|i| Row::new().with("a", i as f64))
                .collect(),
        )
        .shared();
        assert!(is_large(&large));
        assert_eq!(viz_rows(&large, false).len(), MAX_ROWS_FOR_VIZ);
        assert_eq!(viz_rows(&large, true).len(), MAX_ROWS_FOR_VIZ + 5);
    }
}
