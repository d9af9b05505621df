mod common;

use std::sync::Arc;

use sheetdash::{
    aggregate::{GroupAggregation, GroupedResult},
    chart::{ChartJob, ChartResult},
    chunked::{ChunkedJob, ResultSlot, Scheduler, Step},
    config::{ChartConfig, ChartKind},
    search::RowScanner,
};

use common::{generated_rows, sales_rows};

fn drive<J: ChunkedJob>(job: &mut J) -> J::Output {
    loop {
        if let Step::Done(output) = job.step() {
            return output;
        }
    }
}

#[test]
fn stale_run_cannot_overwrite_newer_result() {
    let rows = generated_rows(100);
    let slot: ResultSlot<GroupedResult> = ResultSlot::new();

    let old_id = slot.begin();
    let mut old_job =
        GroupAggregation::new(Arc::clone(&rows), "Region", vec!["Sales".into()]).with_chunk_size(10);
    assert!(matches!(old_job.step(), Step::Pending(_)));

    let new_id = slot.begin();
    let mut new_job = GroupAggregation::new(Arc::clone(&rows), "Region", Vec::new());
    let newer = drive(&mut new_job);
    assert!(slot.publish(new_id, newer.clone()));

    let late = drive(&mut old_job);
    assert!(!slot.publish(old_id, late));
    assert_eq!(slot.get(), Some(newer));
    assert!(!slot.is_current(old_id));
}

#[test]
fn scheduler_resubmission_keeps_only_latest_configuration() {
    let rows = sales_rows();
    let mut scheduler: Scheduler<ChartResult> = Scheduler::new();
    let by_region = ChartConfig::new(ChartKind::Pie)
        .dimension("Region")
        .measure("Sales");
    let by_product = ChartConfig::new(ChartKind::Pie)
        .dimension("Product")
        .measure("Sales");

    scheduler.submit(
        "sales",
        ChartJob::plan(&rows, &by_region, false).with_chunk_size(1),
    );
    assert!(scheduler.tick(|_, _| {}));
    scheduler.submit(
        "sales",
        ChartJob::plan(&rows, &by_product, false).with_chunk_size(1),
    );
    scheduler.run_until_idle(|_, _| {});

    let Some(ChartResult::NameValues(pairs)) = scheduler.take("sales") else {
        panic!("expected name/value result");
    };
    let names: Vec<_> = pairs.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Widget", "Gadget"]);
}

#[test]
fn scheduler_interleaves_slots_round_robin() {
    let rows = generated_rows(8);
    let mut scheduler: Scheduler<ChartResult> = Scheduler::new();
    let bar = ChartConfig::new(ChartKind::Bar)
        .dimension("Region")
        .measure("Sales");
    let kpi = ChartConfig::new(ChartKind::Kpi).measure("Sales");
    scheduler.submit("bar", ChartJob::plan(&rows, &bar, false).with_chunk_size(4));
    scheduler.submit("kpi", ChartJob::plan(&rows, &kpi, false).with_chunk_size(4));

    let mut order = Vec::new();
    scheduler.run_until_idle(|slot, percent| order.push((slot.to_string(), percent)));
    assert_eq!(
        order,
        vec![
            ("bar".to_string(), 50),
            ("kpi".to_string(), 50),
            ("bar".to_string(), 100),
            ("kpi".to_string(), 100),
            ("bar".to_string(), 100),
            ("kpi".to_string(), 100),
        ]
    );
    assert!(scheduler.is_idle());
    assert!(matches!(scheduler.take("bar"), Some(ChartResult::Grouped(_))));
    assert!(matches!(scheduler.take("kpi"), Some(ChartResult::Kpi(_))));
}

#[test]
fn chunked_scan_matches_single_pass() {
    let rows = sales_rows();
    for query in ["ann", "widget", "2024-01-0", "zzz"] {
        let mut chunked = RowScanner::new(Arc::clone(&rows))
            .with_chunk_size(2)
            .with_query(query);
        while !chunked.is_complete() {
            chunked.scan_chunk();
        }
        let mut single = RowScanner::new(Arc::clone(&rows))
            .with_chunk_size(rows.len())
            .with_query(query);
        single.scan_chunk();
        assert_eq!(chunked.matches(), single.matches(), "query {query}");
    }
}

#[test]
fn scan_of_five_rows_in_chunks_of_two() {
    let rows = sheetdash::row::RowSet::from_rows(
        ["match", "other", "other", "match", "other"]
            .iter()
            .map(|name| sheetdash::row::Row::new().with("name", *name))
            .collect(),
    )
    .shared();
    let mut scanner = RowScanner::new(rows).with_chunk_size(2).with_query("MATCH");
    scanner.scan_chunk();
    scanner.scan_chunk();
    assert!(!scanner.is_complete());
    scanner.scan_chunk();
    assert_eq!(scanner.matches(), &[0, 3]);
    assert_eq!(scanner.cursor(), 5);
    assert!(scanner.is_complete());
}
