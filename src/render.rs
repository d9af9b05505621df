//! Turns chart results into printable tables or JSON.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;

use crate::{
    chart::ChartResult,
    kpi::KpiResult,
    summary::{SummarySort, ValueSummary},
    table,
    value::format_number,
};

const DATE_DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

/// Header row and body rows for one result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn render(&self) -> String {
        table::render_table(&self.headers, &self.rows)
    }
}

pub fn chart_view(result: &ChartResult, sort: SummarySort) -> TableView {
    match result {
        ChartResult::Grouped(grouped) => {
            let mut view = TableView {
                headers: std::iter::once(grouped.dimension.clone())
                    .chain(grouped.measures.iter().cloned())
                    .collect(),
                rows: Vec::with_capacity(grouped.groups.len()),
            };
            for group in &grouped.groups {
                let mut row = vec![group.key.clone()];
                row.extend(group.values.iter().map(|v| format_number(*v)));
                view.rows.push(row);
            }
            view
        }
        ChartResult::NameValues(pairs) => {
            let mut view = TableView::new(&["name", "value"]);
            view.rows = pairs
                .iter()
                .map(|pair| vec![pair.name.clone(), format_number(pair.value)])
                .collect();
            view
        }
        ChartResult::Heatmap(heatmap) => {
            let mut view = TableView {
                headers: std::iter::once(String::new())
                    .chain(heatmap.column_labels.iter().cloned())
                    .collect(),
                rows: Vec::with_capacity(heatmap.row_labels.len()),
            };
            for (label, cells) in heatmap.row_labels.iter().zip(&heatmap.matrix) {
                let mut row = vec![label.clone()];
                row.extend(cells.iter().map(|v| format_number(*v)));
                view.rows.push(row);
            }
            view
        }
        ChartResult::Gantt(gantt) => {
            let mut view = TableView::new(&["task", "start", "end", "offset_ms", "duration_ms"]);
            view.rows = gantt
                .entries
                .iter()
                .map(|entry| {
                    vec![
                        entry.task.clone(),
                        format_date(&entry.start),
                        format_date(&entry.end),
                        entry.start_offset.num_milliseconds().to_string(),
                        entry.duration.num_milliseconds().to_string(),
                    ]
                })
                .collect();
            view
        }
        ChartResult::Scatter(scatter) => {
            let labelled = scatter.points.iter().any(|p| p.label.is_some());
            let mut headers = Vec::with_capacity(3);
            if labelled {
                headers.push("label".to_string());
            }
            headers.push(scatter.x_measure.clone());
            headers.push(scatter.y_measure.clone());
            let rows = scatter
                .points
                .iter()
                .map(|point| {
                    let mut row = Vec::with_capacity(3);
                    if labelled {
                        row.push(point.label.clone().unwrap_or_default());
                    }
                    row.push(format_number(point.x));
                    row.push(format_number(point.y));
                    row
                })
                .collect();
            TableView { headers, rows }
        }
        ChartResult::Kpi(kpi) => kpi_view(kpi),
        ChartResult::ValueSummary(summary) => summary_view(summary, sort, 0),
        ChartResult::Placeholder(issue) => {
            let mut view = TableView::new(&["status"]);
            view.rows.push(vec![format!("incomplete: {issue}")]);
            view
        }
    }
}

pub fn kpi_view(kpi: &KpiResult) -> TableView {
    let mut view = TableView::new(&["measure", "aggregation", "value", "target", "progress"]);
    view.rows.push(vec![
        kpi.measure.clone(),
        kpi.aggregation.to_string(),
        kpi.formatted_value(),
        kpi.target.map(format_number).unwrap_or_default(),
        kpi.target_progress
            .map(|p| format!("{p:.1}%"))
            .unwrap_or_default(),
    ]);
    view
}

/// Label/value listing of a KPI card.
pub fn kpi_pairs(kpi: &KpiResult) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("measure".to_string(), kpi.measure.clone()),
        ("aggregation".to_string(), kpi.aggregation.to_string()),
        ("value".to_string(), kpi.formatted_value()),
    ];
    if let Some(target) = kpi.target {
        pairs.push(("target".to_string(), format_number(target)));
    }
    if let Some(progress) = kpi.target_progress {
        pairs.push(("progress".to_string(), format!("{progress:.1}%")));
    }
    pairs
}

pub fn summary_view(summary: &ValueSummary, sort: SummarySort, top: usize) -> TableView {
    let mut view = TableView::new(&[summary.column.as_str(), "count", "percent"]);
    view.rows = summary.render_rows(sort, top);
    view
}

fn format_date(value: &NaiveDateTime) -> String {
    value.format(DATE_DISPLAY).to_string()
}

/// Prints `title`, then the result as a table or a "no data" line.
pub fn print_chart(title: &str, result: &ChartResult, sort: SummarySort) {
    println!("{title}");
    if let Some(total) = result.donut_total() {
        println!("total: {}", format_number(total));
    }
    match result {
        ChartResult::Placeholder(_) => print!("{}", chart_view(result, sort).render()),
        _ if result.is_empty() => println!("(no data)"),
        _ => print!("{}", chart_view(result, sort).render()),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Serializing result to JSON")?;
    println!("{text}");
    Ok(())
}
