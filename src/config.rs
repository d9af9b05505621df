//! Chart, KPI and value-summary configuration.
//!
//! A [`ChartConfig`] names the columns a chart reads. Each [`ChartKind`] has a
//! fixed arity for dimensions and measures; [`ChartConfig::validate`] reports
//! the first unfilled slot as a [`ConfigIssue`], which callers turn into a
//! placeholder result rather than running a job. [`DashboardConfig`] is the
//! persisted form of a whole dashboard, stored as YAML or JSON.

use std::{fmt, fs::File, io::BufReader, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::templates::{ColumnMapping, Template};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
#[value(rename_all = "kebab-case")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Area,
    Scatter,
    Radar,
    Funnel,
    Treemap,
    Heatmap,
    Gantt,
    Kpi,
    ValueSummary,
}

/// How many measure columns a chart kind accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureArity {
    None,
    Exactly(usize),
    AtLeast(usize),
}

impl MeasureArity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            MeasureArity::None => true,
            MeasureArity::Exactly(n) => count == n,
            MeasureArity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for MeasureArity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureArity::None => write!(f, "no"),
            MeasureArity::Exactly(n) => write!(f, "exactly {n}"),
            MeasureArity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

impl ChartKind {
    pub const ALL: [ChartKind; 12] = [
        ChartKind::Bar,
        ChartKind::Line,
        ChartKind::Pie,
        ChartKind::Area,
        ChartKind::Scatter,
        ChartKind::Radar,
        ChartKind::Funnel,
        ChartKind::Treemap,
        ChartKind::Heatmap,
        ChartKind::Gantt,
        ChartKind::Kpi,
        ChartKind::ValueSummary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Area => "area",
            ChartKind::Scatter => "scatter",
            ChartKind::Radar => "radar",
            ChartKind::Funnel => "funnel",
            ChartKind::Treemap => "treemap",
            ChartKind::Heatmap => "heatmap",
            ChartKind::Gantt => "gantt",
            ChartKind::Kpi => "kpi",
            ChartKind::ValueSummary => "value-summary",
        }
    }

    pub fn dimension_count(self) -> usize {
        match self {
            ChartKind::Scatter | ChartKind::Kpi => 0,
            ChartKind::Heatmap => 2,
            _ => 1,
        }
    }

    pub fn measure_arity(self) -> MeasureArity {
        match self {
            ChartKind::Bar | ChartKind::Line | ChartKind::Area | ChartKind::Radar => {
                MeasureArity::AtLeast(1)
            }
            ChartKind::Pie
            | ChartKind::Funnel
            | ChartKind::Treemap
            | ChartKind::Heatmap
            | ChartKind::Kpi => MeasureArity::Exactly(1),
            ChartKind::Gantt | ChartKind::Scatter => MeasureArity::Exactly(2),
            ChartKind::ValueSummary => MeasureArity::None,
        }
    }

    /// Kinds whose grouped output is reduced to `{name, value}` pairs.
    pub fn uses_name_values(self) -> bool {
        matches!(self, ChartKind::Pie | ChartKind::Funnel | ChartKind::Treemap)
    }

    /// Kinds that read the sampled visualization rows rather than the full set.
    pub fn uses_viz_rows(self) -> bool {
        !matches!(self, ChartKind::Kpi | ChartKind::ValueSummary)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let lowered = value.trim().to_ascii_lowercase();
        ChartKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| anyhow!("Unknown chart kind '{value}'"))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum KpiAggregation {
    #[default]
    Sum,
    Average,
    Count,
    Min,
    Max,
}

impl fmt::Display for KpiAggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            KpiAggregation::Sum => "sum",
            KpiAggregation::Average => "average",
            KpiAggregation::Count => "count",
            KpiAggregation::Min => "min",
            KpiAggregation::Max => "max",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("{kind} requires a dimension column")]
    MissingDimension { kind: ChartKind },
    #[error("{kind} requires a second dimension column")]
    MissingSecondDimension { kind: ChartKind },
    #[error("{kind} requires {expected} measure column(s), found {found}")]
    MeasureArity {
        kind: ChartKind,
        expected: MeasureArity,
        found: usize,
    },
    #[error("{kind} has an unselected measure at position {position}")]
    BlankMeasure { kind: ChartKind, position: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    #[serde(default)]
    pub title: String,
    #[serde(rename = "chartType")]
    pub kind: ChartKind,
    #[serde(default)]
    pub dimension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension2: Option<String>,
    #[serde(default)]
    pub measures: Vec<String>,
    #[serde(default, rename = "isStacked")]
    pub stacked: bool,
    #[serde(default, rename = "isDonut")]
    pub donut: bool,
    #[serde(default)]
    pub kpi_aggregation: KpiAggregation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kpi_target: Option<f64>,
}

impl ChartConfig {
    pub fn new(kind: ChartKind) -> Self {
        Self {
            title: String::new(),
            kind,
            dimension: String::new(),
            dimension2: None,
            measures: Vec::new(),
            stacked: false,
            donut: false,
            kpi_aggregation: KpiAggregation::default(),
            kpi_target: None,
        }
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn dimension(mut self, column: impl Into<String>) -> Self {
        self.dimension = column.into();
        self
    }

    pub fn dimension2(mut self, column: impl Into<String>) -> Self {
        self.dimension2 = Some(column.into());
        self
    }

    pub fn measure(mut self, column: impl Into<String>) -> Self {
        self.measures.push(column.into());
        self
    }

    pub fn aggregation(mut self, aggregation: KpiAggregation) -> Self {
        self.kpi_aggregation = aggregation;
        self
    }

    pub fn target(mut self, target: f64) -> Self {
        self.kpi_target = Some(target);
        self
    }

    /// Checks that every slot the kind requires is filled.
    pub fn validate(&self) -> Result<(), ConfigIssue> {
        let kind = self.kind;
        let dimensions = kind.dimension_count();
        if dimensions >= 1 && self.dimension.trim().is_empty() {
            return Err(ConfigIssue::MissingDimension { kind });
        }
        if dimensions >= 2
            && self
                .dimension2
                .as_deref()
                .is_none_or(|d| d.trim().is_empty())
        {
            return Err(ConfigIssue::MissingSecondDimension { kind });
        }
        let arity = kind.measure_arity();
        if arity == MeasureArity::None {
            return Ok(());
        }
        if !arity.accepts(self.measures.len()) {
            return Err(ConfigIssue::MeasureArity {
                kind,
                expected: arity,
                found: self.measures.len(),
            });
        }
        if let Some(position) = self.measures.iter().position(|m| m.trim().is_empty()) {
            return Err(ConfigIssue::BlankMeasure { kind, position });
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            self.kind.to_string()
        } else {
            self.title.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub charts: Vec<ChartConfig>,
    /// Run regular charts over every row instead of the visualization sample.
    #[serde(default)]
    pub full_data: bool,
}

impl DashboardConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening dashboard config {path:?}"))?;
        let reader = BufReader::new(file);
        let config: DashboardConfig = if is_yaml_path(path) {
            serde_yaml::from_reader(reader)
                .with_context(|| format!("Parsing YAML dashboard config {path:?}"))?
        } else {
            serde_json::from_reader(reader)
                .with_context(|| format!("Parsing JSON dashboard config {path:?}"))?
        };
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating dashboard config {path:?}"))?;
        if is_yaml_path(path) {
            serde_yaml::to_writer(file, self)
                .with_context(|| format!("Writing YAML dashboard config {path:?}"))?;
        } else {
            serde_json::to_writer_pretty(file, self)
                .with_context(|| format!("Writing JSON dashboard config {path:?}"))?;
        }
        Ok(())
    }

    /// Dashboard generated from `template`, with the template's fields
    /// replaced by the mapped columns.
    pub fn from_template(template: &Template, mapping: &ColumnMapping) -> Self {
        Self {
            name: template.name.to_string(),
            charts: template.charts_for(mapping),
            full_data: false,
        }
    }

    /// Titles of charts that would render as placeholders, with the reason.
    pub fn incomplete_charts(&self) -> Vec<(String, ConfigIssue)> {
        self.charts
            .iter()
            .filter_map(|chart| {
                chart
                    .validate()
                    .err()
                    .map(|issue| (chart.display_title(), issue))
            })
            .collect()
    }
}

fn is_yaml_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml")
    )
}
