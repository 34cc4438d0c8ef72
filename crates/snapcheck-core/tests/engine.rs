//! Classification behaviour of the diff engine.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use snapcheck_core::fakes::FakeChecker;
use snapcheck_core::{
    Category, EngineConfig, FuzzTolerance, SnapshotDiffEngine, SnapshotSet,
};

fn set(name: &str, ids: &[&str]) -> SnapshotSet {
    SnapshotSet::from_listing(
        name,
        ids.iter()
            .map(|id| (id.to_string(), PathBuf::from(format!("{name}/{id}")))),
    )
    .unwrap()
}

fn engine(checker: FakeChecker) -> SnapshotDiffEngine {
    SnapshotDiffEngine::new(Arc::new(checker), EngineConfig::default())
}

#[tokio::test]
async fn partition_holds_for_generated_pairs() {
    let universe = ["a.jpg", "b.jpg", "c.jpg", "d.jpg", "e.jpg"];
    let checker_engine = engine(FakeChecker::always_pass().changing("c.jpg"));

    // Every (expected, actual) pair of subsets of a five-element universe.
    for e_mask in 0u32..32 {
        for a_mask in 0u32..32 {
            let pick = |mask: u32| -> Vec<&str> {
                universe
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, id)| *id)
                    .collect()
            };
            let e_ids = pick(e_mask);
            let a_ids = pick(a_mask);
            let e = set("expected", &e_ids);
            let a = set("actual", &a_ids);

            let result = checker_engine
                .compare(&e, &a, &FuzzTolerance::default())
                .await;

            let union: BTreeSet<&str> = e_ids.iter().chain(a_ids.iter()).copied().collect();
            assert_eq!(result.total(), union.len(), "e={e_ids:?} a={a_ids:?}");
            for id in &union {
                let expected_category = match (e_ids.contains(id), a_ids.contains(id)) {
                    (false, true) => Category::New,
                    (true, false) => Category::Deleted,
                    _ if *id == "c.jpg" => Category::Changed,
                    _ => Category::Passed,
                };
                assert_eq!(result.category_of(id), Some(expected_category));
            }
        }
    }
}

#[tokio::test]
async fn identical_sets_all_pass() {
    let e = set("expected", &["home.jpg", "login.jpg", "settings.jpg"]);
    let result = engine(FakeChecker::always_pass())
        .compare(&e, &e, &FuzzTolerance::default())
        .await;
    assert_eq!(result.passed_items.len(), 3);
    assert!(result.is_clean());
}

#[tokio::test]
async fn empty_expected_makes_everything_new() {
    let checker = Arc::new(FakeChecker::always_pass());
    let engine = SnapshotDiffEngine::new(checker.clone(), EngineConfig::default());
    let a = set("actual", &["home.jpg", "login.jpg"]);

    let result = engine
        .compare(&SnapshotSet::empty("expected"), &a, &FuzzTolerance::default())
        .await;
    assert_eq!(result.new_items.len(), 2);
    assert_eq!(result.total(), 2);
    assert!(checker.calls().is_empty());
}

#[tokio::test]
async fn empty_actual_makes_everything_deleted() {
    let e = set("expected", &["home.jpg", "login.jpg"]);
    let result = engine(FakeChecker::always_pass())
        .compare(&e, &SnapshotSet::empty("actual"), &FuzzTolerance::default())
        .await;
    assert_eq!(result.deleted_items.len(), 2);
}

#[tokio::test]
async fn one_failing_check_does_not_affect_the_rest() {
    let ids: Vec<String> = (0..12).map(|i| format!("screen-{i:02}.jpg")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let e = set("expected", &id_refs);
    let a = set("actual", &id_refs);

    let checker = FakeChecker::always_pass()
        .failing("screen-03.jpg")
        .changing("screen-07.jpg");
    let result = engine(checker)
        .compare(&e, &a, &FuzzTolerance::default())
        .await;

    assert_eq!(result.passed_items.len(), 10);
    assert_eq!(result.changed_items.len(), 2);
    let failed = &result.changed_items["screen-03.jpg"];
    assert!(failed.diff.is_none());
    assert!(failed.error.as_deref().unwrap().contains("screen-03.jpg"));
    assert!(result.changed_items["screen-07.jpg"].error.is_none());
    assert_eq!(result.failed_checks().count(), 1);
}

#[tokio::test]
async fn panicking_worker_is_recorded_as_changed() {
    let e = set("expected", &["a.jpg", "b.jpg", "c.jpg"]);
    let result = engine(FakeChecker::always_pass().panicking("b.jpg"))
        .compare(&e, &e, &FuzzTolerance::default())
        .await;

    assert_eq!(result.passed_items.len(), 2);
    let detail = &result.changed_items["b.jpg"];
    assert!(detail.diff.is_none());
    assert!(detail.error.as_deref().unwrap().contains("aborted"));
}

#[tokio::test]
async fn fuzz_is_forwarded_verbatim() {
    let checker = Arc::new(FakeChecker::always_pass());
    let engine = SnapshotDiffEngine::new(checker.clone(), EngineConfig::default());
    let e = set("expected", &["a.jpg"]);
    let fuzz = FuzzTolerance::new("12%").unwrap();

    engine.compare(&e, &e, &fuzz).await;
    assert_eq!(checker.calls()[0].fuzz, "12%");
}

#[tokio::test]
async fn changed_without_diff_dir_has_no_artifact() {
    let e = set("expected", &["a.jpg"]);
    let a = set("actual", &["a.jpg"]);
    let result = engine(FakeChecker::always_pass().changing("a.jpg"))
        .compare(&e, &a, &FuzzTolerance::default())
        .await;
    let detail = &result.changed_items["a.jpg"];
    assert!(detail.diff.is_none());
    assert!(detail.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn checks_overlap_up_to_the_concurrency_limit() {
    let ids: Vec<String> = (0..12).map(|i| format!("screen-{i}.jpg")).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
    let checker = Arc::new(FakeChecker::always_pass().with_delay(Duration::from_millis(50)));
    let engine = SnapshotDiffEngine::new(
        checker.clone(),
        EngineConfig {
            max_concurrent: 3,
            diff_dir: None,
        },
    );

    let result = engine
        .compare(&set("expected", &ids), &set("actual", &ids), &FuzzTolerance::default())
        .await;

    assert_eq!(result.passed_items.len(), 12);
    assert_eq!(checker.calls().len(), 12);
    let peak = checker.peak_in_flight();
    assert!(peak <= 3, "{peak} checks ran at once with a limit of 3");
    assert!(peak > 1, "checks never overlapped");
}
