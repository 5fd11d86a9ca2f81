//! End-to-end orchestrator runs against a scripted session.

mod common;

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::Ordering;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use common::*;
use zipcrawl::crawl::{CrawlOrchestrator, FinalState, Pause, RecoveryPolicy, RunReport};
use zipcrawl::models::{Coverage, Target};
use zipcrawl::storage::OutputWriter;
use zipcrawl::CrawlError;

fn targets(keys: &[&str]) -> Vec<Target> {
    keys.iter().map(|k| Target::from(*k)).collect()
}

async fn run(session: FakeSession, timeline: &Timeline, keys: &[&str]) -> RunReport {
    CrawlOrchestrator::new(session, crawler(), pacer(timeline, CancellationToken::new()))
        .run(&targets(keys))
        .await
        .unwrap()
}

fn per_target(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn ids(report: &RunReport) -> Vec<String> {
    report
        .listings
        .iter()
        .map(|l| l.key().to_string())
        .collect()
}

#[tokio::test]
async fn test_two_targets_merge_all_listings() {
    let timeline = Timeline::default();
    let dir = tempfile::tempdir().unwrap();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![results_page(&[1, 2], 1)]])
        .target("22222", vec![vec![results_page(&[3, 4], 1)]]);
    let closed = session.closed_flag();

    let report = CrawlOrchestrator::new(
        session,
        crawler(),
        pacer(&timeline, CancellationToken::new()),
    )
    .with_region_label("test")
    .with_output(OutputWriter::new(dir.path()))
    .run(&targets(&["11111", "22222"]))
    .await
    .unwrap();

    assert_eq!(report.final_state, FinalState::Done);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.total_listings(), 4);
    assert_eq!(report.per_target(), per_target(&[("11111", 2), ("22222", 2)]));
    assert!(closed.load(Ordering::SeqCst));

    // Warm-up first, then targets in order with a short delay between them.
    assert_eq!(
        timeline.visits()[0],
        "https://www.zillow.com/".to_string()
    );
    assert_eq!(timeline.target_visits(), vec!["11111", "22222"]);
    assert_eq!(timeline.count(Pause::Warmup), 1);
    assert_eq!(timeline.count(Pause::InterTarget), 1);
    assert_eq!(timeline.count(Pause::Cooldown), 0);

    // Snapshots per successful target plus the merged file.
    assert!(dir.path().join("listings_11111.json").exists());
    assert!(dir.path().join("listings_22222.json").exists());
    let merged: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("test_listings.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(merged["total_listings"], 4);
    assert_eq!(merged["listings"].as_array().unwrap().len(), 4);
    assert_eq!(merged["per_target"]["22222"], 2);
    assert_eq!(merged["listings"][0]["price"], 301000);
    assert_eq!(merged["listings"][0]["priceRaw"], "$301,000");
    assert_eq!(merged["listings"][0]["streetAddress"], "1 Main St");
    assert_eq!(merged["listings"][0]["homeType"], "SINGLE_FAMILY");
}

#[tokio::test]
async fn test_repeated_second_page_yields_listings_once() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target(
            "33333",
            vec![
                vec![results_page(&[1, 2], 5)],
                vec![results_page(&[1, 2], 5)],
            ],
        );

    let report = run(session, &timeline, &["33333"]).await;

    assert_eq!(report.total_listings(), 2);
    assert_eq!(report.outcomes[0].pages_fetched, 2);
    assert_eq!(report.outcomes[0].coverage, Coverage::Complete);
    assert_eq!(timeline.visits().len(), 3);
}

#[tokio::test]
async fn test_third_zero_yield_target_is_retried_after_recovery() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![blocked_page()]])
        .target("22222", vec![vec![empty_results_page()]])
        .target(
            "44444",
            vec![vec![blocked_page(), results_page(&[7, 8], 1)]],
        )
        .target("55555", vec![vec![results_page(&[9], 1)]]);

    let report = run(session, &timeline, &["11111", "22222", "44444", "55555"]).await;

    assert_eq!(report.final_state, FinalState::Done);
    assert_eq!(
        timeline.target_visits(),
        vec!["11111", "22222", "44444", "44444", "55555"]
    );
    assert_eq!(timeline.count(Pause::Recovery), 1);
    assert_eq!(timeline.count(Pause::Cooldown), 2);

    // The recovery pause sits directly before the retry of the same target.
    let steps = timeline.steps();
    let recovery = steps
        .iter()
        .position(|s| *s == Step::Wait(Pause::Recovery))
        .unwrap();
    assert_eq!(
        steps[recovery + 1],
        Step::Visit("https://www.zillow.com/homes/44444_rb/".into())
    );

    assert_eq!(
        report.per_target(),
        per_target(&[("11111", 0), ("22222", 0), ("44444", 2), ("55555", 1)])
    );
    assert_eq!(report.outcomes[0].coverage, Coverage::Blocked);
    assert_eq!(report.outcomes[1].coverage, Coverage::Empty);
    assert_eq!(report.recovery_attempts, 0);
}

#[tokio::test]
async fn test_duplicates_across_targets_collapse_to_first_sighting() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![results_page(&[1, 2, 3], 1)]])
        .target("22222", vec![vec![results_page(&[3, 4, 1], 1)]]);

    let report = run(session, &timeline, &["11111", "22222"]).await;

    let keys = ids(&report);
    let unique: HashSet<&String> = keys.iter().collect();
    assert_eq!(keys.len(), unique.len());
    assert_eq!(keys, vec!["1", "2", "3", "4"]);
    assert_eq!(report.per_target(), per_target(&[("11111", 3), ("22222", 1)]));
}

#[tokio::test]
async fn test_same_input_same_order() {
    let script = |timeline: &Timeline| {
        FakeSession::new(timeline.clone())
            .with_entry(vec![entry_page()])
            .target(
                "11111",
                vec![
                    vec![results_page(&[5, 3], 2)],
                    vec![results_page(&[9, 1], 2)],
                ],
            )
            .target("22222", vec![vec![results_page(&[1, 7, 2], 1)]])
    };

    let first_timeline = Timeline::default();
    let first = run(script(&first_timeline), &first_timeline, &["11111", "22222"]).await;
    let second_timeline = Timeline::default();
    let second = run(script(&second_timeline), &second_timeline, &["11111", "22222"]).await;

    assert_eq!(ids(&first), vec!["5", "3", "9", "1", "7", "2"]);
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_never_more_than_three_zero_yield_targets_between_recoveries() {
    let timeline = Timeline::default();
    // Nothing is scripted: every target fails to load.
    let session = FakeSession::new(timeline.clone()).with_entry(vec![entry_page()]);

    let report = CrawlOrchestrator::new(
        session,
        crawler(),
        pacer(&timeline, CancellationToken::new()),
    )
    .with_recovery(RecoveryPolicy {
        failure_threshold: 3,
        max_recoveries: 10,
    })
    .run(&targets(&["t1", "t2", "t3", "t4", "t5"]))
    .await
    .unwrap();

    assert_eq!(
        timeline.target_visits(),
        vec!["t1", "t2", "t3", "t3", "t4", "t5", "t5"]
    );

    let mut streak = 0;
    for step in timeline.steps() {
        match step {
            Step::Wait(Pause::Recovery) => streak = 0,
            Step::Visit(url) if url.contains("_rb/") => {
                streak += 1;
                assert!(streak <= 3, "fourth zero-yield target before recovery");
            }
            _ => {}
        }
    }
    assert_eq!(report.final_state, FinalState::Done);
    assert_eq!(report.total_listings(), 0);
}

#[tokio::test]
async fn test_recovery_bound_aborts_and_reports_unprocessed() {
    let timeline = Timeline::default();
    let dir = tempfile::tempdir().unwrap();
    let keys = ["t1", "t2", "t3", "t4", "t5", "t6", "t7", "t8", "t9", "t10"];
    let mut session = FakeSession::new(timeline.clone()).with_entry(vec![entry_page()]);
    for key in &keys[..9] {
        session = session.target(key, vec![vec![blocked_page()]]);
    }

    let report = CrawlOrchestrator::new(
        session,
        crawler(),
        pacer(&timeline, CancellationToken::new()),
    )
    .with_region_label("dfw")
    .with_output(OutputWriter::new(dir.path()))
    .run(&targets(&keys))
    .await
    .unwrap();

    assert_eq!(report.final_state, FinalState::Aborted);
    assert_eq!(report.exit_code(), 2);
    assert_eq!(report.recovery_attempts, 3);
    assert_eq!(timeline.count(Pause::Recovery), 3);
    assert_eq!(report.unprocessed(), vec![&Target::from("t10")]);
    assert_eq!(report.per_target()["t10"], 0);
    assert!(report.error().is_some());

    let merged: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("dfw_listings.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(merged["final_state"], "aborted");
    assert_eq!(merged["total_listings"], 0);
    assert_eq!(merged["coverage"]["t10"], "unprocessed");
    assert_eq!(merged["coverage"]["t1"], "blocked");
}

#[tokio::test]
async fn test_blocked_warmup_aborts_after_one_recovery() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![blocked_page()])
        .target("11111", vec![vec![results_page(&[1], 1)]]);

    let report = run(session, &timeline, &["11111", "22222"]).await;

    assert_eq!(report.final_state, FinalState::Aborted);
    assert_eq!(timeline.count(Pause::Recovery), 1);
    assert!(timeline.target_visits().is_empty());
    assert_eq!(report.unprocessed().len(), 2);
}

#[tokio::test]
async fn test_warmup_block_that_clears_continues() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![blocked_page(), entry_page()])
        .target("11111", vec![vec![results_page(&[1], 1)]]);

    let report = run(session, &timeline, &["11111"]).await;

    assert_eq!(report.final_state, FinalState::Done);
    assert_eq!(timeline.count(Pause::Recovery), 1);
    assert_eq!(report.total_listings(), 1);
    assert_eq!(report.recovery_attempts, 0);
}

#[tokio::test]
async fn test_cancel_stops_cleanly_and_writes_output() {
    let timeline = Timeline::default();
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![results_page(&[1, 2], 1)]])
        .target("22222", vec![vec![results_page(&[3], 1)]])
        .target("33333", vec![vec![results_page(&[4], 1)]])
        .cancel_on("https://www.zillow.com/homes/22222_rb/", cancel.clone());
    let closed = session.closed_flag();

    let report = CrawlOrchestrator::new(session, crawler(), pacer(&timeline, cancel))
        .with_region_label("dfw")
        .with_output(OutputWriter::new(dir.path()))
        .run(&targets(&["11111", "22222", "33333"]))
        .await
        .unwrap();

    assert_eq!(report.final_state, FinalState::Cancelled);
    assert_eq!(report.exit_code(), 130);
    assert_eq!(ids(&report), vec!["1", "2"]);
    assert_eq!(report.unprocessed(), vec![&Target::from("33333")]);
    assert_eq!(timeline.target_visits(), vec!["11111", "22222"]);
    assert!(closed.load(Ordering::SeqCst));
    assert!(dir.path().join("dfw_listings.json").exists());
}

#[tokio::test]
async fn test_block_after_first_page_counts_as_success() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![blocked_page()]])
        .target("22222", vec![vec![empty_results_page()]])
        .target(
            "33333",
            vec![vec![results_page(&[1, 2], 3)], vec![blocked_page()]],
        )
        .target("44444", vec![vec![blocked_page()]])
        .target("55555", vec![vec![empty_results_page()]]);

    let report = run(
        session,
        &timeline,
        &["11111", "22222", "33333", "44444", "55555"],
    )
    .await;

    let partial = &report.outcomes[2];
    assert_eq!(partial.accepted_count, 2);
    assert_eq!(partial.pages_fetched, 2);
    assert!(partial.blocked);
    assert_eq!(partial.coverage, Coverage::Partial);
    assert!(report.flagged().any(|o| o.target == Target::from("33333")));

    // The partial target broke the zero-yield streak, so the two that
    // follow it stay below the recovery threshold.
    assert_eq!(report.final_state, FinalState::Done);
    assert_eq!(report.total_listings(), 2);
    assert_eq!(timeline.count(Pause::Recovery), 0);
    assert_eq!(timeline.count(Pause::Cooldown), 3);
    assert_eq!(timeline.count(Pause::InterTarget), 1);
    assert_eq!(
        timeline.target_visits(),
        vec!["11111", "22222", "33333", "44444", "55555"]
    );
}

#[tokio::test]
async fn test_zero_page_bound_is_rejected() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![results_page(&[1], 1)]]);
    let closed = session.closed_flag();

    let result = CrawlOrchestrator::new(
        session,
        crawler(),
        pacer(&timeline, CancellationToken::new()),
    )
    .with_max_pages(0)
    .run(&targets(&["11111"]))
    .await;

    assert!(matches!(result, Err(CrawlError::Config(_))));
    assert!(timeline.steps().is_empty());
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_repeated_target_crawled_once() {
    let timeline = Timeline::default();
    let session = FakeSession::new(timeline.clone())
        .with_entry(vec![entry_page()])
        .target("11111", vec![vec![results_page(&[1, 2], 1)]])
        .target("22222", vec![vec![results_page(&[3], 1)]]);

    let report = run(session, &timeline, &["11111", "22222", "11111"]).await;

    assert_eq!(report.targets, targets(&["11111", "22222"]));
    assert_eq!(timeline.target_visits(), vec!["11111", "22222"]);
    assert_eq!(report.per_target(), per_target(&[("11111", 2), ("22222", 1)]));
    assert_eq!(
        report.per_target().values().sum::<usize>(),
        report.total_listings()
    );
}
