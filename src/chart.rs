//! Dispatch from a [`ChartConfig`] to the job that computes it.
//!
//! [`ChartJob::plan`] validates the configuration first; an incomplete one
//! becomes a placeholder that finishes on its first step without touching the
//! rows.

use std::sync::Arc;

use log::debug;
use serde::Serialize;

use crate::{
    aggregate::{GroupAggregation, GroupedResult, NameValue},
    chunked::{ChunkedJob, Step},
    config::{ChartConfig, ChartKind, ConfigIssue},
    dataset,
    kpi::{KpiJob, KpiResult},
    row::RowSet,
    shapes::{GanttJob, GanttResult, HeatmapJob, HeatmapResult, ScatterJob, ScatterResult},
    summary::{ValueSummary, ValueSummaryJob},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "data", rename_all = "kebab-case")]
pub enum ChartResult {
    Grouped(GroupedResult),
    NameValues(Vec<NameValue>),
    Heatmap(HeatmapResult),
    Gantt(GanttResult),
    Scatter(ScatterResult),
    Kpi(KpiResult),
    ValueSummary(ValueSummary),
    #[serde(serialize_with = "serialize_issue")]
    Placeholder(ConfigIssue),
}

fn serialize_issue<S>(issue: &ConfigIssue, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_str(issue)
}

impl ChartResult {
    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        match self {
            ChartResult::Grouped(result) => result.is_empty(),
            ChartResult::NameValues(pairs) => pairs.is_empty(),
            ChartResult::Heatmap(result) => result.is_empty(),
            ChartResult::Gantt(result) => result.is_empty(),
            ChartResult::Scatter(result) => result.points.is_empty(),
            ChartResult::Kpi(_) => false,
            ChartResult::ValueSummary(summary) => summary.entries.is_empty(),
            ChartResult::Placeholder(_) => true,
        }
    }

    /// Sum of the values of a pie chart, shown in the middle of a donut.
    pub fn donut_total(&self) -> Option<f64> {
        match self {
            ChartResult::NameValues(pairs) => Some(pairs.iter().map(|p| p.value).sum()),
            _ => None,
        }
    }
}

impl From<KpiResult> for ChartResult {
    fn from(value: KpiResult) -> Self {
        ChartResult::Kpi(value)
    }
}

impl From<ValueSummary> for ChartResult {
    fn from(value: ValueSummary) -> Self {
        ChartResult::ValueSummary(value)
    }
}

pub enum ChartJob {
    Grouped { job: GroupAggregation, name_values: bool },
    Heatmap(HeatmapJob),
    Gantt(GanttJob),
    Scatter(ScatterJob),
    Kpi(KpiJob),
    ValueSummary(ValueSummaryJob),
    Placeholder(ConfigIssue),
}

impl ChartJob {
    /// Builds the job for `chart`. `rows` is the full row set; regular charts
    /// read the visualization sample unless `full_data` is set.
    pub fn plan(rows: &Arc<RowSet>, chart: &ChartConfig, full_data: bool) -> ChartJob {
        if let Err(issue) = chart.validate() {
            debug!("Chart '{}' is incomplete: {issue}", chart.display_title());
            return ChartJob::Placeholder(issue);
        }
        let source = if chart.kind.uses_viz_rows() {
            dataset::viz_rows(rows, full_data)
        } else {
            Arc::clone(rows)
        };
        let measures = chart.measures.clone();
        match chart.kind {
            ChartKind::Bar
            | ChartKind::Line
            | ChartKind::Area
            | ChartKind::Radar
            | ChartKind::Pie
            | ChartKind::Funnel
            | ChartKind::Treemap => ChartJob::Grouped {
                job: GroupAggregation::new(source, chart.dimension.clone(), measures),
                name_values: chart.kind.uses_name_values(),
            },
            ChartKind::Heatmap => ChartJob::Heatmap(HeatmapJob::new(
                source,
                chart.dimension.clone(),
                chart.dimension2.clone().unwrap_or_default(),
                measures[0].clone(),
            )),
            ChartKind::Gantt => ChartJob::Gantt(GanttJob::new(
                source,
                chart.dimension.clone(),
                measures[0].clone(),
                measures[1].clone(),
            )),
            ChartKind::Scatter => ChartJob::Scatter(
                ScatterJob::new(source, measures[0].clone(), measures[1].clone())
                    .labelled_by(chart.dimension.clone()),
            ),
            ChartKind::Kpi => ChartJob::Kpi(KpiJob::new(
                source,
                measures[0].clone(),
                chart.kpi_aggregation,
                chart.kpi_target,
            )),
            ChartKind::ValueSummary => {
                ChartJob::ValueSummary(ValueSummaryJob::new(source, chart.dimension.clone()))
            }
        }
    }

    pub fn with_chunk_size(self, chunk_size: usize) -> ChartJob {
        match self {
            ChartJob::Grouped { job, name_values } => ChartJob::Grouped {
                job: job.with_chunk_size(chunk_size),
                name_values,
            },
            ChartJob::Heatmap(job) => ChartJob::Heatmap(job.with_chunk_size(chunk_size)),
            ChartJob::Gantt(job) => ChartJob::Gantt(job.with_chunk_size(chunk_size)),
            ChartJob::Scatter(job) => ChartJob::Scatter(job.with_chunk_size(chunk_size)),
            ChartJob::Kpi(job) => ChartJob::Kpi(job.with_chunk_size(chunk_size)),
            ChartJob::ValueSummary(job) => {
                ChartJob::ValueSummary(job.with_chunk_size(chunk_size))
            }
            placeholder @ ChartJob::Placeholder(_) => placeholder,
        }
    }
}

fn map_step<T>(step: Step<T>, wrap: impl FnOnce(T) -> ChartResult) -> Step<ChartResult> {
    match step {
        Step::Pending(progress) => Step::Pending(progress),
        Step::Done(output) => Step::Done(wrap(output)),
    }
}

impl ChunkedJob for ChartJob {
    type Output = ChartResult;

    fn step(&mut self) -> Step<ChartResult> {
        match self {
            ChartJob::Grouped { job, name_values } => {
                let name_values = *name_values;
                map_step(job.step(), |grouped| {
                    if name_values {
                        ChartResult::NameValues(grouped.into_name_values())
                    } else {
                        ChartResult::Grouped(grouped)
                    }
                })
            }
            ChartJob::Heatmap(job) => map_step(job.step(), ChartResult::Heatmap),
            ChartJob::Gantt(job) => map_step(job.step(), ChartResult::Gantt),
            ChartJob::Scatter(job) => map_step(job.step(), ChartResult::Scatter),
            ChartJob::Kpi(job) => map_step(job.step(), ChartResult::Kpi),
            ChartJob::ValueSummary(job) => map_step(job.step(), ChartResult::ValueSummary),
            ChartJob::Placeholder(issue) => Step::Done(ChartResult::Placeholder(issue.clone())),
        }
    }
}

/// Computes `chart` synchronously, reporting progress percentages.
pub fn compute<F>(
    rows: &Arc<RowSet>,
    chart: &ChartConfig,
    full_data: bool,
    on_progress: F,
) -> ChartResult
where
    F: FnMut(u8),
{
    crate::chunked::run_to_completion(ChartJob::plan(rows, chart, full_data), on_progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::KpiAggregation, row::Row};

    fn rows() -> Arc<RowSet> {
        RowSet::from_rows(vec![
            Row::new().with("Region", "East").with("Sales", 100),
            Row::new().with("Region", "East").with("Sales", "bad"),
            Row::new().with("Region", "West").with("Sales", 50),
        ])
        .shared()
    }

    #[test]
    fn incomplete_config_yields_placeholder() {
        let chart = ChartConfig::new(ChartKind::Bar).measure("Sales");
        let result = compute(&rows(), &chart, false, |_| {});
        assert!(matches!(
            result,
            ChartResult::Placeholder(ConfigIssue::MissingDimension { .. })
        ));
        assert!(result.is_empty());
    }

    #[test]
    fn pie_produces_name_values_with_donut_total() {
        let chart = ChartConfig::new(ChartKind::Pie)
            .dimension("Region")
            .measure("Sales");
        let result = compute(&rows(), &chart, false, |_| {});
        assert_eq!(result.donut_total(), Some(151.0));
        match result {
            ChartResult::NameValues(pairs) => assert_eq!(pairs.len(), 2),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn kpi_chart_dispatches_to_reducer() {
        let chart = ChartConfig::new(ChartKind::Kpi)
            .measure("Sales")
            .aggregation(KpiAggregation::Average);
        match compute(&rows(), &chart, false, |_| {}) {
            ChartResult::Kpi(kpi) => assert_eq!(kpi.value, 75.0),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn bar_keeps_grouped_shape() {
        let chart = ChartConfig::new(ChartKind::Bar)
            .dimension("Region")
            .measure("Sales");
        match compute(&rows(), &chart, false, |_| {}) {
            ChartResult::Grouped(grouped) => {
                assert_eq!(grouped.groups[0].values, vec![101.0]);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn placeholder_serializes_reason() {
        let chart = ChartConfig::new(ChartKind::Heatmap)
            .dimension("Region")
            .measure("Sales");
        let json = serde_json::to_value(compute(&rows(), &chart, false, |_| {})).unwrap();
        assert_eq!(json["shape"], "placeholder");
        assert_eq!(json["data"], "heatmap requires a second dimension column");
    }
}
