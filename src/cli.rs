use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{
    config::{ChartKind, KpiAggregation},
    search::DEFAULT_PAGE_SIZE,
    summary::SortKey,
    templates::parse_assignment,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Aggregate tabular data into dashboard charts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List columns with their inferred kind and completeness
    Columns(ColumnsArgs),
    /// Compute a single chart from a CSV file
    Chart(ChartArgs),
    /// Reduce one measure column to a KPI value
    Kpi(KpiArgs),
    /// Count distinct values of a column
    Summary(SummaryArgs),
    /// Full-text search across every cell
    Search(SearchArgs),
    /// Compute every chart of a dashboard configuration file
    Dashboard(DashboardArgs),
    /// Report filled versus blank cells of a column
    Completeness(CompletenessArgs),
    /// List the built-in dashboard templates and their fields
    Templates(TemplatesArgs),
}

/// Options shared by every subcommand that reads a data file.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV file (`-` reads stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ColumnsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Number of rows to sample when inferring kinds (0 means full scan)
    #[arg(long, default_value_t = 2000)]
    pub sample_rows: usize,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ChartArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Chart kind
    #[arg(long, value_enum)]
    pub kind: ChartKind,
    /// Optional chart title
    #[arg(long)]
    pub title: Option<String>,
    /// Dimension (grouping) column
    #[arg(long)]
    pub dimension: Option<String>,
    /// Second dimension column (heatmap)
    #[arg(long)]
    pub dimension2: Option<String>,
    /// Measure column; repeat for several measures
    #[arg(short = 'M', long = "measure", action = clap::ArgAction::Append)]
    pub measures: Vec<String>,
    /// Aggregation for kpi charts
    #[arg(long, value_enum, default_value_t = KpiAggregation::Sum)]
    pub aggregation: KpiAggregation,
    /// Target value for kpi charts
    #[arg(long)]
    pub target: Option<f64>,
    /// Use every row instead of the visualization sample
    #[arg(long = "full-data")]
    pub full_data: bool,
    /// Rows processed per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct KpiArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Measure column to reduce
    #[arg(short = 'M', long = "measure")]
    pub measure: String,
    /// Aggregation (sum, average, count, min, max)
    #[arg(long, value_enum, default_value_t = KpiAggregation::Sum)]
    pub aggregation: KpiAggregation,
    /// Target value; progress is reported when positive
    #[arg(long)]
    pub target: Option<f64>,
    /// Rows processed per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Column to summarize
    #[arg(short = 'C', long = "column")]
    pub column: String,
    /// Sort by value or count
    #[arg(long, value_enum, default_value = "count")]
    pub sort: SortKey,
    /// Sort descending (default for count)
    #[arg(long, conflicts_with = "ascending")]
    pub descending: bool,
    /// Sort ascending (default for value)
    #[arg(long)]
    pub ascending: bool,
    /// Maximum distinct values to display (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top: usize,
    /// Rows processed per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Case-insensitive text to look for
    #[arg(short = 'q', long = "query")]
    pub query: String,
    /// 1-based result page
    #[arg(long, default_value_t = 1)]
    pub page: usize,
    /// Rows per result page
    #[arg(long = "page-size", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,
    /// Rows scanned per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Dashboard configuration file (.yml/.yaml or .json)
    #[arg(long = "config", required_unless_present = "template", conflicts_with = "template")]
    pub config: Option<PathBuf>,
    /// Build the dashboard from a built-in template instead of a file
    #[arg(long = "template")]
    pub template: Option<String>,
    /// Template field assignment as field=Column; repeat for each field
    #[arg(
        long = "map",
        value_parser = parse_assignment,
        action = clap::ArgAction::Append,
        requires = "template"
    )]
    pub mappings: Vec<(String, String)>,
    /// Write the resolved dashboard configuration to this file
    #[arg(long = "save")]
    pub save: Option<PathBuf>,
    /// Use every row instead of the visualization sample
    #[arg(long = "full-data")]
    pub full_data: bool,
    /// Rows processed per chunk
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Emit JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CompletenessArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Columns to report; repeat or comma-separate (defaults to all)
    #[arg(short = 'C', long = "column", value_delimiter = ',', action = clap::ArgAction::Append)]
    pub columns: Vec<String>,
}

#[derive(Debug, Args)]
pub struct TemplatesArgs {
    /// Emit JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
