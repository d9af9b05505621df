pub mod aggregate;
pub mod chart;
pub mod chunked;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod io_utils;
pub mod kpi;
pub mod render;
pub mod row;
pub mod search;
pub mod shapes;
pub mod summary;
pub mod table;
pub mod templates;
pub mod value;

use std::{env, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;

use crate::{
    chart::{ChartJob, ChartResult},
    chunked::{Scheduler, run_to_completion},
    cli::{Cli, Commands, InputArgs},
    config::{ChartConfig, DashboardConfig},
    dataset::ColumnKind,
    kpi::KpiJob,
    render::TableView,
    row::RowSet,
    search::{Page, RowScanner},
    summary::{SortDirection, SortKey, SummarySort, ValueSummaryJob},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("sheetdash", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Columns(args) => handle_columns(&args),
        Commands::Chart(args) => handle_chart(&args),
        Commands::Kpi(args) => handle_kpi(&args),
        Commands::Summary(args) => handle_summary(&args),
        Commands::Search(args) => handle_search(&args),
        Commands::Dashboard(args) => handle_dashboard(&args),
        Commands::Completeness(args) => handle_completeness(&args),
        Commands::Templates(args) => handle_templates(&args),
    }
}

fn load_input(args: &InputArgs) -> Result<Arc<RowSet>> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Loading '{}' with delimiter '{}' and encoding {}",
        args.input.display(),
        printable_delimiter(delimiter),
        encoding.name()
    );
    let rows = dataset::load_rows(&args.input, delimiter, encoding)
        .with_context(|| format!("Loading rows from {:?}", args.input))?;
    info!(
        "Loaded {} row(s) across {} column(s)",
        rows.len(),
        rows.headers.len()
    );
    if dataset::is_large(&rows) {
        warn!(
            "Dataset has {} rows; calculations run in chunks and may take a moment",
            rows.len()
        );
    }
    Ok(rows.shared())
}

fn require_columns<'a, I>(rows: &RowSet, columns: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for column in columns {
        if !column.trim().is_empty() && !rows.has_column(column) {
            bail!(
                "Column '{column}' not found in input (available: {})",
                rows.headers.join(", ")
            );
        }
    }
    Ok(())
}

fn chart_columns(chart: &ChartConfig) -> impl Iterator<Item = &str> {
    std::iter::once(chart.dimension.as_str())
        .chain(chart.dimension2.as_deref())
        .chain(chart.measures.iter().map(String::as_str))
}

fn log_progress(label: &str) -> impl FnMut(u8) + '_ {
    move |percent| debug!("{label}: {percent}%")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ColumnReport {
    column: String,
    kind: ColumnKind,
    non_empty_rows: usize,
    blank_rows: usize,
}

fn handle_columns(args: &cli::ColumnsArgs) -> Result<()> {
    let rows = load_input(&args.input)?;
    let reports = rows
        .headers
        .iter()
        .map(|column| {
            let completeness = summary::column_completeness(&rows, column);
            ColumnReport {
                column: column.clone(),
                kind: dataset::infer_column_kind(&rows, column, args.sample_rows),
                non_empty_rows: completeness.non_empty_rows,
                blank_rows: completeness.blank_rows,
            }
        })
        .collect::<Vec<_>>();
    if args.json {
        return render::print_json(&reports);
    }
    let headers = ["column", "kind", "non_empty", "blank"]
        .map(String::from)
        .to_vec();
    let body = reports
        .iter()
        .map(|r| {
            vec![
                r.column.clone(),
                r.kind.to_string(),
                r.non_empty_rows.to_string(),
                r.blank_rows.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &body);
    Ok(())
}

fn handle_chart(args: &cli::ChartArgs) -> Result<()> {
    let rows = load_input(&args.input)?;
    let mut chart = ChartConfig::new(args.kind)
        .dimension(args.dimension.clone().unwrap_or_default())
        .aggregation(args.aggregation);
    chart.title = args.title.clone().unwrap_or_default();
    chart.dimension2 = args.dimension2.clone();
    chart.measures = args.measures.clone();
    chart.kpi_target = args.target;
    require_columns(&rows, chart_columns(&chart))?;

    let title = chart.display_title();
    info!("Computing {} chart '{}'", chart.kind, title);
    let mut job = ChartJob::plan(&rows, &chart, args.full_data);
    if let Some(size) = args.chunk_size {
        job = job.with_chunk_size(size);
    }
    let result = run_to_completion(job, log_progress(&title));
    if let ChartResult::Placeholder(issue) = &result {
        warn!("Chart '{title}' is incomplete: {issue}");
    }
    if args.json {
        return render::print_json(&result);
    }
    render::print_chart(&title, &result, SummarySort::default());
    Ok(())
}

fn handle_kpi(args: &cli::KpiArgs) -> Result<()> {
    let rows = load_input(&args.input)?;
    require_columns(&rows, [args.measure.as_str()])?;
    info!("Computing {} of '{}'", args.aggregation, args.measure);
    let mut job = KpiJob::new(
        Arc::clone(&rows),
        args.measure.clone(),
        args.aggregation,
        args.target,
    );
    if let Some(size) = args.chunk_size {
        job = job.with_chunk_size(size);
    }
    let kpi = run_to_completion(job, log_progress(&args.measure));
    if args.json {
        return render::print_json(&kpi);
    }
    print!("{}", table::render_pairs(&render::kpi_pairs(&kpi)));
    Ok(())
}

fn summary_sort(key: SortKey, ascending: bool, descending: bool) -> SummarySort {
    let direction = if ascending {
        SortDirection::Ascending
    } else if descending {
        SortDirection::Descending
    } else {
        match key {
            SortKey::Count => SortDirection::Descending,
            SortKey::Value => SortDirection::Ascending,
        }
    };
    SummarySort::new(key, direction)
}

fn handle_summary(args: &cli::SummaryArgs) -> Result<()> {
    let rows = load_input(&args.input)?;
    require_columns(&rows, [args.column.as_str()])?;
    let mut job = ValueSummaryJob::new(Arc::clone(&rows), args.column.clone());
    if let Some(size) = args.chunk_size {
        job = job.with_chunk_size(size);
    }
    let summary = run_to_completion(job, log_progress(&args.column));
    info!(
        "'{}' has {} distinct value(s) over {} row(s)",
        args.column,
        summary.entries.len(),
        summary.total()
    );
    let sort = summary_sort(args.sort, args.ascending, args.descending);
    if args.json {
        return render::print_json(&summary.sorted(sort));
    }
    print!("{}", render::summary_view(&summary, sort, args.top).render());
    Ok(())
}

fn handle_search(args: &cli::SearchArgs) -> Result<()> {
    let rows = load_input(&args.input)?;
    let mut scanner = RowScanner::new(Arc::clone(&rows)).with_query(args.query.clone());
    if let Some(size) = args.chunk_size {
        scanner = scanner.with_chunk_size(size);
    }
    while !scanner.query().is_empty() && !scanner.is_complete() {
        scanner.scan_chunk();
        debug!("Search progress: {}%", scanner.progress().percent());
    }
    let page = scanner.page(args.page_size);
    info!(
        "Found {} matching row(s) for '{}' ({} page(s))",
        scanner.matches().len(),
        args.query,
        page.total_pages()
    );
    print_search_page(&rows, scanner.matches(), page, args.page);
    Ok(())
}

fn print_search_page(rows: &RowSet, matches: &[usize], page: Page, number: usize) {
    let headers = std::iter::once("row".to_string())
        .chain(rows.headers.iter().cloned())
        .collect::<Vec<_>>();
    let body = page
        .slice(matches, number)
        .iter()
        .map(|idx| {
            let mut line = vec![(idx + 1).to_string()];
            line.extend(rows.display_row(&rows.rows[*idx]));
            line
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &body);
    println!(
        "page {} of {} ({} result(s))",
        number.max(1),
        page.total_pages(),
        page.total_results
    );
}

#[derive(Debug, Serialize)]
struct DashboardEntry<'a> {
    title: String,
    kind: config::ChartKind,
    result: &'a ChartResult,
}

fn resolve_dashboard(args: &cli::DashboardArgs) -> Result<DashboardConfig> {
    if let Some(id) = &args.template {
        let template = templates::lookup(id)?;
        let mapping = template.mapping(args.mappings.iter().cloned())?;
        let unmapped = template.unmapped_fields(&mapping);
        if !unmapped.is_empty() {
            warn!(
                "Template '{}' fields without a column: {}",
                template.id,
                unmapped.iter().map(|f| f.key).collect::<Vec<_>>().join(", ")
            );
        }
        let dashboard = DashboardConfig::from_template(template, &mapping);
        info!(
            "Template '{}' produced {} of {} chart(s)",
            template.id,
            dashboard.charts.len(),
            template.charts.len()
        );
        return Ok(dashboard);
    }
    let Some(path) = &args.config else {
        bail!("Either --config or --template is required");
    };
    DashboardConfig::load(path).with_context(|| format!("Loading dashboard from {path:?}"))
}

fn handle_dashboard(args: &cli::DashboardArgs) -> Result<()> {
    let dashboard = resolve_dashboard(args)?;
    if let Some(path) = &args.save {
        dashboard
            .save(path)
            .with_context(|| format!("Saving dashboard to {path:?}"))?;
        info!("Saved dashboard configuration to {path:?}");
    }
    let rows = load_input(&args.input)?;
    for chart in &dashboard.charts {
        require_columns(&rows, chart_columns(chart))
            .with_context(|| format!("Chart '{}'", chart.display_title()))?;
    }
    let full_data = args.full_data || dashboard.full_data;
    info!(
        "Computing {} chart(s) for dashboard '{}'",
        dashboard.charts.len(),
        dashboard.name
    );

    let mut scheduler: Scheduler<ChartResult> = Scheduler::new();
    let slots = dashboard
        .charts
        .iter()
        .enumerate()
        .map(|(idx, chart)| {
            let slot = format!("{}. {}", idx + 1, chart.display_title());
            let mut job = ChartJob::plan(&rows, chart, full_data);
            if let Some(size) = args.chunk_size {
                job = job.with_chunk_size(size);
            }
            scheduler.submit(&slot, job);
            slot
        })
        .collect::<Vec<_>>();
    scheduler.run_until_idle(|slot, percent| {
        if percent == 100 {
            info!("{slot}: done");
        } else {
            debug!("{slot}: {percent}%");
        }
    });

    let results = slots
        .iter()
        .map(|slot| {
            scheduler
                .take(slot)
                .with_context(|| format!("No result published for '{slot}'"))
        })
        .collect::<Result<Vec<_>>>()?;
    if args.json {
        let entries = dashboard
            .charts
            .iter()
            .zip(&results)
            .map(|(chart, result)| DashboardEntry {
                title: chart.display_title(),
                kind: chart.kind,
                result,
            })
            .collect::<Vec<_>>();
        return render::print_json(&entries);
    }
    for (slot, result) in slots.iter().zip(&results) {
        render::print_chart(slot, result, SummarySort::default());
        println!();
    }
    Ok(())
}

fn handle_completeness(args: &cli::CompletenessArgs) -> Result<()> {
    let rows = load_input(&args.input)?;
    let columns = if args.columns.is_empty() {
        rows.headers.clone()
    } else {
        args.columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    };
    require_columns(&rows, columns.iter().map(String::as_str))?;
    let view = TableView {
        headers: ["column", "non_empty", "blank", "filled"]
            .map(String::from)
            .to_vec(),
        rows: columns
            .iter()
            .map(|column| {
                let stats = summary::column_completeness(&rows, column);
                vec![
                    column.clone(),
                    stats.non_empty_rows.to_string(),
                    stats.blank_rows.to_string(),
                    format!("{:.1}%", stats.non_empty_percent()),
                ]
            })
            .collect(),
    };
    print!("{}", view.render());
    Ok(())
}

fn handle_templates(args: &cli::TemplatesArgs) -> Result<()> {
    if args.json {
        return render::print_json(templates::TEMPLATES);
    }
    for template in templates::TEMPLATES {
        println!("{} ({})", template.name, template.id);
        let mut view = TableView {
            headers: ["field", "role", "label"].map(String::from).to_vec(),
            rows: Vec::with_capacity(template.fields.len()),
        };
        for field in template.fields {
            view.rows.push(vec![
                field.key.to_string(),
                field.role.to_string(),
                field.label.to_string(),
            ]);
        }
        print!("{}", view.render());
        println!();
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
