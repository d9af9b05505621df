mod common;

use std::{collections::HashMap, sync::Arc};

use chrono::{NaiveDate, TimeDelta};
use encoding_rs::UTF_8;
use proptest::prelude::*;
use sheetdash::{
    aggregate::{GroupAggregation, NA_GROUP},
    chart::{self, ChartResult},
    chunked::{ChunkedJob, Step, run_to_completion},
    config::{ChartConfig, ChartKind, KpiAggregation},
    dataset::load_rows,
    kpi::KpiJob,
    row::{Row, RowSet},
    shapes::{GanttJob, HeatmapJob, ScatterJob},
    summary::{BLANK_LABEL, ValueSummaryJob},
    value::Scalar,
};

use common::{TestWorkspace, generated_rows, sales_rows};

fn day(d: u32) -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, d)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

#[test]
fn bad_measure_values_count_as_one_in_groups() {
    let rows = RowSet::from_rows(vec![
        Row::new().with("Region", "East").with("Sales", 100),
        Row::new().with("Region", "East").with("Sales", "bad"),
        Row::new().with("Region", "West").with("Sales", 50),
    ])
    .shared();
    let result = run_to_completion(
        GroupAggregation::new(rows, "Region", vec!["Sales".into()]),
        |_| {},
    );
    let groups: Vec<_> = result
        .groups
        .iter()
        .map(|g| (g.key.as_str(), g.value(0)))
        .collect();
    assert_eq!(groups, vec![("East", 101.0), ("West", 50.0)]);
}

#[test]
fn loaded_csv_groups_blank_and_empty_dimensions_as_na() {
    let result = run_to_completion(
        GroupAggregation::new(sales_rows(), "Region", vec!["Sales".into(), "Units".into()])
            .with_chunk_size(2),
        |_| {},
    );
    let groups: Vec<_> = result
        .groups
        .iter()
        .map(|g| (g.key.as_str(), g.values.clone()))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("East", vec![101.0, 4.0]),
            ("West", vec![50.0, 2.0]),
            (NA_GROUP, vec![32.0, 1.0]),
            ("North", vec![10.0, 4.0]),
        ]
    );
}

#[test]
fn empty_csv_cells_group_as_na_and_sum_as_zero() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("gaps.csv", "Region,Sales\nEast,10\n,20\nEast,\nWest,30\n");
    let rows = load_rows(&path, b',', UTF_8).expect("load rows").shared();

    let grouped = run_to_completion(
        GroupAggregation::new(Arc::clone(&rows), "Region", vec!["Sales".into()]),
        |_| {},
    );
    let groups: Vec<_> = grouped
        .groups
        .iter()
        .map(|g| (g.key.as_str(), g.value(0)))
        .collect();
    assert_eq!(groups, vec![("East", 10.0), (NA_GROUP, 20.0), ("West", 30.0)]);

    let kpi = run_to_completion(
        KpiJob::new(rows, "Sales", KpiAggregation::Average, None),
        |_| {},
    );
    assert_eq!(kpi.value, 15.0);
}

#[test]
fn progress_is_reported_between_chunks() {
    let mut job = GroupAggregation::new(generated_rows(10), "Region", vec!["Sales".into()])
        .with_chunk_size(4);
    let mut percents = Vec::new();
    loop {
        match job.step() {
            Step::Pending(progress) => percents.push(progress.percent()),
            Step::Done(_) => break,
        }
    }
    assert_eq!(percents, vec![40, 80, 100]);
}

#[test]
fn kpi_average_skips_non_numeric_values() {
    let rows = RowSet::from_rows(vec![
        Row::new().with("Sales", 100),
        Row::new().with("Sales", "bad"),
        Row::new().with("Sales", 50),
    ])
    .shared();
    let kpi = run_to_completion(
        KpiJob::new(rows, "Sales", KpiAggregation::Average, None),
        |_| {},
    );
    assert_eq!(kpi.value, 75.0);
}

#[test]
fn kpi_reductions_over_loaded_csv() {
    let rows = sales_rows();
    let value = |aggregation| {
        run_to_completion(
            KpiJob::new(Arc::clone(&rows), "Sales", aggregation, Some(400.0)).with_chunk_size(4),
            |_| {},
        )
    };
    assert_eq!(value(KpiAggregation::Sum).value, 192.0);
    assert_eq!(value(KpiAggregation::Sum).target_progress, Some(48.0));
    assert_eq!(value(KpiAggregation::Count).value, 6.0);
    assert_eq!(value(KpiAggregation::Average).value, 38.4);
    assert_eq!(value(KpiAggregation::Min).value, 7.0);
    assert_eq!(value(KpiAggregation::Max).value, 100.0);

    let units = |aggregation| {
        run_to_completion(KpiJob::new(Arc::clone(&rows), "Units", aggregation, None), |_| {})
            .value
    };
    // the empty Units cell counts as 0
    assert!((units(KpiAggregation::Average) - 11.0 / 6.0).abs() < 1e-12);
    assert_eq!(units(KpiAggregation::Min), 0.0);
}

#[test]
fn kpi_average_is_zero_without_numeric_contributors() {
    let rows = RowSet::from_rows(vec![Row::new().with("Sales", "n/a")]).shared();
    let kpi = run_to_completion(
        KpiJob::new(rows, "Sales", KpiAggregation::Average, None),
        |_| {},
    );
    assert_eq!(kpi.value, 0.0);
}

#[test]
fn value_summary_counts_blank_bucket() {
    let rows = RowSet::from_rows(vec![
        Row::new().with("Region", "East"),
        Row::new().with("Region", "East"),
        Row::new().with("Region", "West"),
        Row::new().with("Region", ""),
    ])
    .shared();
    let summary = run_to_completion(ValueSummaryJob::new(rows, "Region"), |_| {});
    let pairs: Vec<_> = summary
        .entries
        .iter()
        .map(|e| (e.value.as_str(), e.count))
        .collect();
    assert_eq!(pairs, vec![("East", 2), ("West", 1), (BLANK_LABEL, 1)]);
    assert_eq!(summary.total(), 4);
}

#[test]
fn value_summary_treats_missing_cells_as_blank() {
    let summary = run_to_completion(ValueSummaryJob::new(sales_rows(), "Region"), |_| {});
    assert_eq!(summary.blank_count(), 2);
    assert_eq!(summary.total(), 6);
}

#[test]
fn gantt_drops_inverted_range_and_anchors_remaining_bar() {
    let rows = RowSet::from_rows(vec![
        Row::new()
            .with("Task", "Build")
            .with("Start", "2024-01-05")
            .with("End", "2024-01-02"),
        Row::new()
            .with("Task", "Ship")
            .with("Start", "2024-01-03")
            .with("End", "2024-01-06"),
    ])
    .shared();
    let gantt = run_to_completion(GanttJob::new(rows, "Task", "Start", "End"), |_| {});
    assert_eq!(gantt.entries.len(), 1);
    let entry = &gantt.entries[0];
    assert_eq!(entry.task, "Ship");
    assert_eq!(entry.start_offset, TimeDelta::zero());
    assert_eq!(entry.duration, TimeDelta::days(3));
    assert_eq!(gantt.anchor, Some(day(3)));
}

#[test]
fn gantt_over_loaded_csv_excludes_invalid_rows() {
    let gantt = run_to_completion(GanttJob::new(sales_rows(), "Owner", "Start", "End"), |_| {});
    let entries: Vec<_> = gantt
        .entries
        .iter()
        .map(|e| (e.task.as_str(), e.start_offset.num_days(), e.duration.num_days()))
        .collect();
    assert_eq!(
        entries,
        vec![("Ann", 0, 2), ("Bob", 1, 3), ("Ann", 3, 0), ("Dee", 1, 1)]
    );
    assert_eq!(gantt.anchor, Some(day(1)));
}

#[test]
fn heatmap_fills_missing_cells_with_zero() {
    let heatmap = run_to_completion(
        HeatmapJob::new(sales_rows(), "Region", "Product", "Sales").with_chunk_size(3),
        |_| {},
    );
    assert_eq!(heatmap.row_labels, vec!["East", NA_GROUP, "North", "West"]);
    assert_eq!(heatmap.column_labels, vec!["Gadget", "Widget"]);
    assert_eq!(heatmap.cell("East", "Widget"), Some(100.0));
    assert_eq!(heatmap.cell("East", "Gadget"), Some(0.0));
    assert_eq!(heatmap.cell(NA_GROUP, "Gadget"), Some(25.0));
    assert_eq!(heatmap.cell(NA_GROUP, "Widget"), Some(7.0));
    assert_eq!(heatmap.cell("West", "Gadget"), Some(0.0));
    assert_eq!((heatmap.min, heatmap.max), (0.0, 100.0));
}

#[test]
fn scatter_keeps_every_row_and_zeroes_failures() {
    let scatter = run_to_completion(ScatterJob::new(sales_rows(), "Sales", "Units"), |_| {});
    assert_eq!(scatter.points.len(), 6);
    assert_eq!((scatter.points[1].x, scatter.points[1].y), (0.0, 1.0));
    assert_eq!((scatter.points[3].x, scatter.points[3].y), (25.0, 0.0));
}

#[test]
fn repeated_runs_are_identical() {
    let rows = sales_rows();
    let charts = [
        ChartConfig::new(ChartKind::Bar)
            .dimension("Region")
            .measure("Sales"),
        ChartConfig::new(ChartKind::Heatmap)
            .dimension("Region")
            .dimension2("Product")
            .measure("Sales"),
        ChartConfig::new(ChartKind::Kpi)
            .measure("Sales")
            .aggregation(KpiAggregation::Average),
        ChartConfig::new(ChartKind::ValueSummary).dimension("Product"),
    ];
    for config in &charts {
        let first = chart::compute(&rows, config, false, |_| {});
        let second = chart::compute(&rows, config, false, |_| {});
        assert_eq!(first, second, "{} differs between runs", config.kind);
        assert!(!matches!(first, ChartResult::Placeholder(_)));
    }
}

fn cell_strategy() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        (-1_000i32..1_000).prop_map(Scalar::from),
        Just(Scalar::from("bad")),
        Just(Scalar::from("12.5")),
        Just(Scalar::from(" -3 ")),
        Just(Scalar::from("")),
        Just(Scalar::from("  ")),
        any::<bool>().prop_map(Scalar::from),
        Just(Scalar::Absent),
    ]
}

fn dimension_strategy() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        Just(Scalar::from("East")),
        Just(Scalar::from("West")),
        Just(Scalar::from(" ")),
        Just(Scalar::Absent),
        (0i32..3).prop_map(Scalar::from),
    ]
}

fn oracle_key(cell: &Scalar) -> Option<String> {
    match cell {
        Scalar::Absent => None,
        Scalar::Text(text) if text.trim().is_empty() => Some("N/A".to_string()),
        Scalar::Text(text) => Some(text.clone()),
        Scalar::Number(n) => Some(n.to_string()),
        Scalar::Boolean(b) => Some(b.to_string()),
    }
}

fn oracle_contribution(cell: &Scalar) -> f64 {
    match cell {
        Scalar::Number(n) => *n,
        Scalar::Boolean(true) => 1.0,
        Scalar::Boolean(false) => 0.0,
        Scalar::Text(text) if text.trim().is_empty() => 0.0,
        Scalar::Text(text) => text.trim().parse().unwrap_or(1.0),
        Scalar::Absent => 1.0,
    }
}

fn rows_strategy() -> impl Strategy<Value = Arc<RowSet>> {
    proptest::collection::vec((dimension_strategy(), cell_strategy()), 0..60).prop_map(|cells| {
        RowSet::new(
            vec!["Region".into(), "Sales".into()],
            cells
                .into_iter()
                .map(|(region, sales)| {
                    let mut row = Row::new();
                    if !region.is_absent() {
                        row.insert("Region", region);
                    }
                    if !sales.is_absent() {
                        row.insert("Sales", sales);
                    }
                    row
                })
                .collect(),
        )
        .shared()
    })
}

proptest! {
    #[test]
    fn group_totals_match_independent_oracle(rows in rows_strategy(), chunk in 1usize..8) {
        let mut expected: HashMap<String, f64> = HashMap::new();
        for row in &rows.rows {
            if let Some(key) = oracle_key(row.get("Region")) {
                *expected.entry(key).or_insert(0.0) += oracle_contribution(row.get("Sales"));
            }
        }
        let result = run_to_completion(
            GroupAggregation::new(Arc::clone(&rows), "Region", vec!["Sales".into()])
                .with_chunk_size(chunk),
            |_| {},
        );
        prop_assert_eq!(result.groups.len(), expected.len());
        let actual: HashMap<String, f64> = result
            .groups
            .iter()
            .map(|group| (group.key.clone(), group.value(0)))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn summary_counts_total_row_count(rows in rows_strategy(), chunk in 1usize..8) {
        let summary = run_to_completion(
            ValueSummaryJob::new(Arc::clone(&rows), "Sales").with_chunk_size(chunk),
            |_| {},
        );
        prop_assert_eq!(summary.total(), rows.len());
    }

    #[test]
    fn kpi_count_is_row_count(rows in rows_strategy()) {
        let kpi = run_to_completion(
            KpiJob::new(Arc::clone(&rows), "Sales", KpiAggregation::Count, None),
            |_| {},
        );
        prop_assert_eq!(kpi.value, rows.len() as f64);
    }

    #[test]
    fn kpi_average_matches_numeric_contributors(rows in rows_strategy(), chunk in 1usize..8) {
        let numbers: Vec<f64> = rows
            .rows
            .iter()
            .filter_map(|row| sheetdash::value::to_number(row.get("Sales")))
            .collect();
        let expected = if numbers.is_empty() {
            0.0
        } else {
            numbers.iter().sum::<f64>() / numbers.len() as f64
        };
        let kpi = run_to_completion(
            KpiJob::new(Arc::clone(&rows), "Sales", KpiAggregation::Average, None)
                .with_chunk_size(chunk),
            |_| {},
        );
        prop_assert!((kpi.value - expected).abs() < 1e-9);
    }
}
