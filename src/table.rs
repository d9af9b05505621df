//! Elastic text tables for terminal output.
//!
//! Columns whose non-empty cells all look numeric (including percentages such
//! as `12.50%`) are right-aligned; everything else is left-aligned. Control
//! characters inside cells are flattened to spaces and ANSI colour sequences
//! do not count toward column width.

use std::{borrow::Cow, fmt::Write as _};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let alignments = (0..headers.len())
        .map(|idx| detect_alignment(rows, idx))
        .collect::<Vec<_>>();
    render_table_aligned(headers, rows, &alignments)
}

pub fn render_table_aligned(headers: &[String], rows: &[Vec<String>], alignments: &[Align]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &[]));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &[]));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, alignments));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Two-column `label  value` listing used for single-record results.
pub fn render_pairs(pairs: &[(String, String)]) -> String {
    let width = pairs
        .iter()
        .map(|(label, _)| display_width(label))
        .max()
        .unwrap_or(0);
    let mut output = String::new();
    for (label, value) in pairs {
        let padding = width.saturating_sub(display_width(label));
        let _ = writeln!(
            output,
            "{}{}  {}",
            sanitize_cell(label),
            " ".repeat(padding),
            sanitize_cell(value)
        );
    }
    output
}

fn detect_alignment(rows: &[Vec<String>], column: usize) -> Align {
    let mut cells = rows
        .iter()
        .filter_map(|row| row.get(column))
        .map(|cell| cell.trim())
        .filter(|cell| !cell.is_empty())
        .peekable();
    if cells.peek().is_none() {
        return Align::Left;
    }
    if cells.all(looks_numeric) {
        Align::Right
    } else {
        Align::Left
    }
}

fn looks_numeric(cell: &str) -> bool {
    let body = cell.strip_suffix('%').unwrap_or(cell);
    matches!(body, "Infinity" | "-Infinity") || body.parse::<f64>().is_ok_and(f64::is_finite)
}

fn format_row(values: &[String], widths: &[usize], alignments: &[Align]) -> String {
    let mut cells = Vec::with_capacity(widths.len());
    for (idx, (value, width)) in values.iter().zip(widths).enumerate() {
        let sanitized = sanitize_cell(value);
        let padding = " ".repeat(width.saturating_sub(display_width(&sanitized)));
        let cell = match alignments.get(idx).copied().unwrap_or(Align::Left) {
            Align::Left => format!("{sanitized}{padding}"),
            Align::Right => format!("{padding}{sanitized}"),
        };
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

pub fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
