//! Row model shared by every job.
//!
//! A [`Row`] maps column names to [`Scalar`] cells; a missing key reads as
//! [`Scalar::Absent`]. A [`RowSet`] keeps the ordered rows together with the
//! header list and is shared read-only behind an `Arc`.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::value::Scalar;

static ABSENT: Scalar = Scalar::Absent;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: BTreeMap<String, Scalar>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Scalar>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn get(&self, column: &str) -> &Scalar {
        self.cells.get(column).unwrap_or(&ABSENT)
    }

    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.cells.values()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl RowSet {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    /// Builds a row set whose headers are the union of the row keys, in
    /// first-seen order.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let mut headers: Vec<String> = Vec::new();
        for row in &rows {
            for column in row.cells.keys() {
                if !headers.iter().any(|h| h == column) {
                    headers.push(column.clone());
                }
            }
        }
        Self { headers, rows }
    }

    pub fn shared(self) -> Arc<RowSet> {
        Arc::new(self)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Cell values of `row` in header order.
    pub fn display_row(&self, row: &Row) -> Vec<String> {
        self.headers
            .iter()
            .map(|header| row.get(header).as_display())
            .collect()
    }
}
