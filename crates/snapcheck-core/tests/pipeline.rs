//! End-to-end compare/upload flow over in-memory collaborators.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use snapcheck_core::fakes::{FakeChecker, FakeHistory, FakeNotifier, MemorySnapshotStore};
use snapcheck_core::{
    CommitHash, CoreError, MarkdownRenderer, PipelineConfig, PipelineOutcome, RelativeLocator,
    ResultArtifact, SnapshotPipeline, SnapshotStoreIndex, REPORT_HEADER,
};

fn sha(n: u32) -> CommitHash {
    CommitHash::parse(&format!("{n:040x}")).unwrap()
}

struct Fixture {
    _tmp: tempfile::TempDir,
    config: PipelineConfig,
}

impl Fixture {
    fn new(screenshots: &[&str]) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let screenshot_dir = tmp.path().join("screenshots");
        fs::create_dir_all(&screenshot_dir).unwrap();
        for name in screenshots {
            fs::write(screenshot_dir.join(name), name.as_bytes()).unwrap();
        }
        let config = PipelineConfig {
            working_dir: tmp.path().join("work"),
            screenshot_dir,
            ..PipelineConfig::default()
        };
        Self { _tmp: tmp, config }
    }
}

fn history() -> FakeHistory {
    FakeHistory::new()
        .with_merge_base("master", "feature", sha(3))
        .with_chain("master", vec![sha(4), sha(3), sha(2), sha(1)])
}

fn pipeline(
    config: PipelineConfig,
    store: Arc<MemorySnapshotStore>,
    checker: FakeChecker,
    notifier: Arc<FakeNotifier>,
) -> SnapshotPipeline {
    SnapshotPipeline::new(
        config,
        Arc::new(history()),
        store,
        Arc::new(checker),
        notifier,
        Arc::new(MarkdownRenderer::default()),
    )
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .collect()
}

#[tokio::test]
async fn compare_classifies_persists_and_notifies() {
    let fx = Fixture::new(&["home.jpg", "onboarding.jpg", "notes.txt"]);
    let store = Arc::new(MemorySnapshotStore::new().with_snapshot(
        &sha(2),
        &[
            ("home.jpg", b"old home".as_slice()),
            ("legacy.jpg", b"legacy".as_slice()),
        ],
    ));
    let notifier = Arc::new(FakeNotifier::new());
    let p = pipeline(
        fx.config.clone(),
        store.clone(),
        FakeChecker::always_pass().changing("home.jpg"),
        notifier.clone(),
    );

    let current = sha(0xfeed);
    let outcome = p
        .compare("feature", &current, &RelativeLocator::default())
        .await
        .unwrap();

    let PipelineOutcome::Compared {
        baseline,
        result,
        report,
        body,
    } = outcome
    else {
        panic!("expected a comparison");
    };
    assert_eq!(baseline, sha(2));
    assert!(result.new_items.contains("onboarding.jpg"));
    assert!(result.deleted_items.contains("legacy.jpg"));
    assert_eq!(
        result.changed_items["home.jpg"].diff,
        Some(fx.config.diff_dir().join("home.jpg"))
    );
    assert_eq!(report.summary.changed, 1);
    assert_eq!(report.baseline, Some(sha(2)));

    let artifact: ResultArtifact =
        serde_json::from_str(&fs::read_to_string(fx.config.result_path()).unwrap()).unwrap();
    assert_eq!(artifact.changed_items, vec!["home.jpg".to_string()]);
    assert_eq!(artifact.deleted_items, vec!["legacy.jpg".to_string()]);

    let stored = names(&store.stored_paths(&current));
    assert!(stored.contains(&"actual/home.jpg".to_string()));
    assert!(stored.contains(&"expected/legacy.jpg".to_string()));
    assert!(stored.contains(&"result.json".to_string()));

    let published = notifier.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0], body);
    assert!(body.starts_with(REPORT_HEADER));
}

#[tokio::test]
async fn missing_baseline_skips_compare_and_upload() {
    let fx = Fixture::new(&["home.jpg"]);
    let store = Arc::new(MemorySnapshotStore::new());
    let notifier = Arc::new(FakeNotifier::new());
    let p = pipeline(
        fx.config.clone(),
        store.clone(),
        FakeChecker::always_pass(),
        notifier.clone(),
    );

    let current = sha(0xfeed);
    let outcome = p
        .compare("feature", &current, &RelativeLocator::default())
        .await
        .unwrap();

    assert!(matches!(outcome, PipelineOutcome::NoBaseline));
    assert!(outcome.baseline().is_none());
    assert!(store.stored_paths(&current).is_empty());
    assert!(notifier.published().is_empty());
    assert!(!fx.config.result_path().exists());
}

#[tokio::test]
async fn upload_stores_screenshots_under_commit() {
    let fx = Fixture::new(&["home.jpg", "login.jpg"]);
    let store = Arc::new(MemorySnapshotStore::new());
    let p = pipeline(
        fx.config.clone(),
        store.clone(),
        FakeChecker::always_pass(),
        Arc::new(FakeNotifier::new()),
    );

    let current = sha(0xbee);
    p.upload(&current).await.unwrap();
    assert_eq!(
        names(&store.stored_paths(&current)),
        vec!["actual/home.jpg".to_string(), "actual/login.jpg".to_string()]
    );

    // Commits outside master's history are never picked as baselines.
    assert_eq!(p.resolve("feature").await.unwrap(), None);
}

#[tokio::test]
async fn stale_working_dir_is_reset_between_runs() {
    let fx = Fixture::new(&["home.jpg"]);
    let stale = fx.config.actual_dir();
    fs::create_dir_all(&stale).unwrap();
    fs::write(stale.join("removed.jpg"), b"stale").unwrap();

    let store = Arc::new(MemorySnapshotStore::new().with_snapshot(&sha(3), &[("home.jpg", b"x".as_slice())]));
    let p = pipeline(
        fx.config.clone(),
        store,
        FakeChecker::always_pass(),
        Arc::new(FakeNotifier::new()),
    );
    let outcome = p
        .compare("feature", &sha(0xfeed), &RelativeLocator::default())
        .await
        .unwrap();

    let PipelineOutcome::Compared { result, .. } = outcome else {
        panic!("expected a comparison");
    };
    assert!(result.is_clean());
    assert!(!stale.join("removed.jpg").exists());
}

#[tokio::test]
async fn screenshot_dir_inside_working_dir_is_rejected() {
    let mut fx = Fixture::new(&[]);
    fx.config.screenshot_dir = fx.config.working_dir.join("shots");
    let p = pipeline(
        fx.config.clone(),
        Arc::new(MemorySnapshotStore::new()),
        FakeChecker::always_pass(),
        Arc::new(FakeNotifier::new()),
    );
    let err = p.upload(&sha(1)).await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedSnapshotSet { .. }));
}

#[tokio::test]
async fn relative_spelling_of_working_dir_does_not_wipe_screenshots() {
    let mut fx = Fixture::new(&[]);
    // Screenshots already sit in <work>/actual, reached through a detour.
    let actual = fx.config.working_dir.join("actual");
    fs::create_dir_all(&actual).unwrap();
    fs::write(actual.join("home.jpg"), b"home").unwrap();
    fx.config.screenshot_dir = fx
        .config
        .screenshot_dir
        .join("..")
        .join("work")
        .join(".")
        .join("actual");

    let store = Arc::new(MemorySnapshotStore::new());
    let p = pipeline(
        fx.config.clone(),
        store.clone(),
        FakeChecker::always_pass(),
        Arc::new(FakeNotifier::new()),
    );
    let err = p.upload(&sha(1)).await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedSnapshotSet { .. }));
    assert!(actual.join("home.jpg").exists());
    assert!(store.stored_entries().await.unwrap().is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_working_dir_is_detected() {
    let mut fx = Fixture::new(&["home.jpg"]);
    let link = fx.config.working_dir.with_file_name("work-link");
    fs::create_dir_all(&fx.config.working_dir).unwrap();
    std::os::unix::fs::symlink(&fx.config.working_dir, &link).unwrap();
    fx.config.screenshot_dir = link.join("actual");

    let p = pipeline(
        fx.config.clone(),
        Arc::new(MemorySnapshotStore::new()),
        FakeChecker::always_pass(),
        Arc::new(FakeNotifier::new()),
    );
    let err = p.upload(&sha(1)).await.unwrap_err();
    assert!(matches!(err, CoreError::MalformedSnapshotSet { .. }));
}
