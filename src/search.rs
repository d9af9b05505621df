//! Resumable full-text row scan.
//!
//! Each [`RowScanner::scan_chunk`] call examines one chunk starting at the
//! cursor and appends matching row indices. Changing the query resets the
//! cursor and the accumulated matches.

use std::sync::Arc;

use log::debug;

use crate::{
    chunked::{ChunkedJob, Progress, SEARCH_CHUNK_SIZE, Step, chunk_bounds},
    row::{Row, RowSet},
};

pub const DEFAULT_PAGE_SIZE: usize = 50;

pub fn row_matches(row: &Row, lowered_query: &str) -> bool {
    row.values()
        .filter(|value| !value.is_absent())
        .any(|value| value.as_display().to_lowercase().contains(lowered_query))
}

pub struct RowScanner {
    rows: Arc<RowSet>,
    query: String,
    lowered: String,
    chunk_size: usize,
    cursor: usize,
    matches: Vec<usize>,
}

impl RowScanner {
    pub fn new(rows: Arc<RowSet>) -> Self {
        Self {
            rows,
            query: String::new(),
            lowered: String::new(),
            chunk_size: SEARCH_CHUNK_SIZE,
            cursor: 0,
            matches: Vec::new(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.set_query(query);
        self
    }

    /// Replaces the query. A different query restarts the scan from row 0.
    pub fn set_query(&mut self, query: impl Into<String>) {
        let query = query.into();
        if query == self.query {
            return;
        }
        self.lowered = query.to_lowercase();
        self.query = query;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
        self.matches.clear();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    pub fn matched_rows(&self) -> impl Iterator<Item = &Row> {
        self.matches.iter().map(|idx| &self.rows.rows[*idx])
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.rows.len()
    }

    pub fn progress(&self) -> Progress {
        Progress::new(self.cursor, self.rows.len())
    }

    /// Scans one chunk. Returns the number of new matches. Does nothing when
    /// the query is empty or the scan is complete.
    pub fn scan_chunk(&mut self) -> usize {
        if self.query.is_empty() || self.is_complete() {
            return 0;
        }
        let (start, end) = chunk_bounds(self.cursor, self.chunk_size, self.rows.len());
        let before = self.matches.len();
        for (offset, row) in self.rows.rows[start..end].iter().enumerate() {
            if row_matches(row, &self.lowered) {
                self.matches.push(start + offset);
            }
        }
        self.cursor = end;
        let found = self.matches.len() - before;
        debug!(
            "Scanned rows {}..{} for '{}': {} new match(es)",
            start, end, self.query, found
        );
        found
    }

    pub fn page(&self, page_size: usize) -> Page {
        Page::new(self.matches.len(), page_size)
    }
}

/// Drives a scanner to completion and yields its matched row indices.
impl ChunkedJob for RowScanner {
    type Output = Vec<usize>;

    fn step(&mut self) -> Step<Vec<usize>> {
        if self.query.is_empty() || self.is_complete() {
            return Step::Done(std::mem::take(&mut self.matches));
        }
        self.scan_chunk();
        Step::Pending(self.progress())
    }
}

/// Display pagination over a result count. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub total_results: usize,
    pub page_size: usize,
}

impl Page {
    pub fn new(total_results: usize, page_size: usize) -> Self {
        Self {
            total_results,
            page_size: page_size.max(1),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_results.div_ceil(self.page_size)
    }

    /// Index range of `page`, empty when out of range.
    pub fn bounds(&self, page: usize) -> (usize, usize) {
        let page = page.max(1);
        let start = (page - 1)
            .saturating_mul(self.page_size)
            .min(self.total_results);
        let end = start.saturating_add(self.page_size).min(self.total_results);
        (start, end)
    }

    pub fn slice<'a, T>(&self, items: &'a [T], page: usize) -> &'a [T] {
        let (start, end) = self.bounds(page);
        &items[start.min(items.len())..end.min(items.len())]
    }
}
