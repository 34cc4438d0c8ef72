//! Snapcheck CLI
//!
//! The `snapcheck` command runs visual regression checks in CI.
//!
//! ## Commands
//!
//! - `compare`: compare the captured screenshots against the baseline
//!   snapshot, store the result and report it
//! - `upload`: store the captured screenshots as the current commit's snapshot
//! - `resolve`: print the baseline commit for the current branch
//! - `notify-screenshots`: upload per-device screenshots and post them side
//!   by side, without comparing

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, Level};

use snapcheck_adapters::github::DEFAULT_API_BASE;
use snapcheck_adapters::{
    FileNotifier, FirebaseLocator, FsSnapshotStore, GcsSnapshotStore, GitCliHistory,
    GithubNotifier, GithubTarget, ImageMagickChecker, PreviousComments, RetryConfig,
};
use snapcheck_core::{
    BaselineResolver, CommitHash, DeviceGridRenderer, FuzzTolerance, GridOutcome, ImageLocator,
    JsonRenderer, ListingPolicy, MarkdownRenderer, Notifier, PipelineConfig, PipelineOutcome,
    RelativeLocator, ReportRenderer, ScreenLocator, ScreenshotPublisher, SnapshotPipeline,
    SnapshotStore, SnapshotStoreIndex, DEVICE_GRID_HEADER, REPORT_HEADER,
};

#[derive(Parser)]
#[command(name = "snapcheck")]
#[command(author = "Snapcheck Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Visual regression checks for CI screenshots", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare screenshots against the baseline snapshot and report the result
    Compare {
        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        report: ReportArgs,

        #[command(flatten)]
        github: GithubArgs,

        /// ImageMagick `compare` executable
        #[arg(long, env = "IMAGEMAGICK_COMPARE", default_value = "compare")]
        compare_program: String,
    },

    /// Store the screenshots as the snapshot of the current commit
    Upload {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Print the baseline commit for the current branch, or `none`
    Resolve {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Upload per-device screenshots and post them side by side
    NotifyScreenshots {
        #[command(flatten)]
        screens: ScreenshotArgs,

        #[command(flatten)]
        github: GithubArgs,
    },
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// JSON pipeline configuration; flags override its values
    #[arg(long, env = "SNAPCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Git checkout the screenshots were taken from
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,

    /// Remote whose base branch holds the baseline candidates
    #[arg(long, env = "GIT_REMOTE", default_value = "origin")]
    remote: String,

    /// Resolve against the local base branch instead of the remote one
    #[arg(long)]
    local_branches: bool,

    /// Name of the base branch (default: master)
    #[arg(long, env = "BASE_BRANCH")]
    base_branch: Option<String>,

    /// Current branch (default: the checked-out branch)
    #[arg(long, env = "CURRENT_BRANCH")]
    branch: Option<String>,

    /// Current commit (default: HEAD)
    #[arg(long, env = "CURRENT_COMMIT")]
    commit: Option<String>,

    /// Colors within this distance are considered equal (default: 5%)
    #[arg(long, env = "FUZZ")]
    fuzz: Option<String>,

    /// Working directory for actual/expected/diff images
    #[arg(long, env = "WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// Directory the test run wrote its screenshots to
    #[arg(long, env = "SCREENSHOT_DIR")]
    screenshot_dir: Option<PathBuf>,

    /// Image extensions to pick up (default: jpg)
    #[arg(long = "extension", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Maximum number of concurrent image comparisons
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Ignore store entries that are not commit hashes
    #[arg(long)]
    skip_malformed_entries: bool,

    /// Retries for store and notifier calls
    #[arg(long, default_value_t = RetryConfig::default().max_retries)]
    max_retries: u32,

    #[command(flatten)]
    store: StoreArgs,
}

/// Where snapshots are kept; exactly one is required.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct StoreArgs {
    /// Directory holding one snapshot per commit
    #[arg(long, env = "SNAPSHOT_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// GCS bucket that stores snapshots (via gsutil)
    #[arg(long, env = "SNAPSHOT_BUCKET")]
    bucket: Option<String>,
}

/// Options of `notify-screenshots`.
#[derive(Args, Debug, Clone)]
struct ScreenshotArgs {
    /// Directory with one subdirectory of screenshots per device
    #[arg(long, env = "SCREENSHOT_DIR")]
    screenshot_dir: PathBuf,

    /// Git checkout the screenshots were taken from
    #[arg(long, default_value = ".")]
    repo_dir: PathBuf,

    /// Current commit (default: HEAD)
    #[arg(long, env = "CURRENT_COMMIT")]
    commit: Option<String>,

    /// Fold the screenshots table
    #[arg(long, env = "FOLD_RESULT")]
    fold_result: bool,

    /// Length in px of the long side of screenshots in the table
    #[arg(long, env = "IMAGE_LENGTH")]
    image_length: Option<f64>,

    /// Image extensions to pick up (default: jpg)
    #[arg(long = "extension", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Write the table to this file when no pull request is given
    #[arg(long)]
    report_out: Option<PathBuf>,

    /// Retries for store and notifier calls
    #[arg(long, default_value_t = RetryConfig::default().max_retries)]
    max_retries: u32,

    #[command(flatten)]
    store: ScreenshotStoreArgs,
}

/// Where device screenshots are uploaded; exactly one is required.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
struct ScreenshotStoreArgs {
    /// Directory receiving `<commit>/<device>/<screen>`
    #[arg(long = "store-dir", env = "SCREENSHOT_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// GCS bucket receiving `<commit>/<device>/<screen>` (via gsutil)
    #[arg(long = "bucket", env = "SCREENSHOT_BUCKET")]
    bucket: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ReportArgs {
    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Markdown)]
    format: ReportFormat,

    /// Write the report to this file when no pull request is given
    #[arg(long)]
    report_out: Option<PathBuf>,

    /// Length in px of the long side of screenshots in the report
    #[arg(long, env = "IMAGE_LENGTH")]
    image_length: Option<f64>,
}

#[derive(Args, Debug, Clone)]
struct GithubArgs {
    /// Repository owner
    #[arg(long, env = "GITHUB_OWNER")]
    github_owner: Option<String>,

    /// Repository name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    github_repository: Option<String>,

    /// Pull request to comment on; without it the report goes to a file or stdout
    #[arg(long, env = "GITHUB_PR_NUMBER")]
    github_pr_number: Option<u64>,

    /// GitHub API token
    #[arg(long, env = "GITHUB_API_TOKEN", hide_env_values = true)]
    github_api_token: Option<String>,

    /// GitHub API root
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE)]
    github_api_base: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Markdown,
    Json,
}

/// Store adapter chosen on the command line.
#[derive(Debug, Clone)]
enum StoreChoice {
    Fs(FsSnapshotStore),
    Gcs(GcsSnapshotStore),
}

impl StoreChoice {
    fn as_store(&self) -> Arc<dyn SnapshotStore> {
        match self {
            StoreChoice::Fs(store) => Arc::new(store.clone()),
            StoreChoice::Gcs(store) => Arc::new(store.clone()),
        }
    }

    fn as_index(&self) -> Arc<dyn SnapshotStoreIndex> {
        match self {
            StoreChoice::Fs(store) => Arc::new(store.clone()),
            StoreChoice::Gcs(store) => Arc::new(store.clone()),
        }
    }
}

fn store_choice(
    store_dir: Option<&PathBuf>,
    bucket: Option<&String>,
    retry: RetryConfig,
) -> Result<StoreChoice> {
    match (store_dir, bucket) {
        (Some(dir), _) => Ok(StoreChoice::Fs(FsSnapshotStore::new(dir))),
        (None, Some(bucket)) => Ok(StoreChoice::Gcs(
            GcsSnapshotStore::new(bucket.as_str()).with_retry(retry),
        )),
        (None, None) => bail!("either --store-dir or --bucket is required"),
    }
}

impl RunArgs {
    fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::default()
        }
    }

    /// Configuration file (or defaults) with command-line overrides applied.
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config {}", path.display()))?
            }
            None => PipelineConfig::default(),
        };

        if let Some(base_branch) = &self.base_branch {
            config.base_branch = base_branch.clone();
        }
        if let Some(fuzz) = &self.fuzz {
            config.fuzz = FuzzTolerance::new(fuzz.as_str())?;
        }
        if let Some(dir) = &self.working_dir {
            config.working_dir = dir.clone();
        }
        if let Some(dir) = &self.screenshot_dir {
            config.screenshot_dir = dir.clone();
        }
        if !self.extensions.is_empty() {
            config.extensions = self.extensions.clone();
        }
        if let Some(n) = self.max_concurrent {
            if n == 0 {
                bail!("--max-concurrent must be at least 1");
            }
            config.max_concurrent = n;
        }
        if self.skip_malformed_entries {
            config.listing_policy = ListingPolicy::Skip;
        }
        Ok(config)
    }

    fn history(&self) -> GitCliHistory {
        let remote = (!self.local_branches).then(|| self.remote.clone());
        GitCliHistory::new(&self.repo_dir).with_remote(remote)
    }

    fn store(&self) -> Result<StoreChoice> {
        store_choice(
            self.store.store_dir.as_ref(),
            self.store.bucket.as_ref(),
            self.retry(),
        )
    }

    async fn current_branch(&self, history: &GitCliHistory) -> Result<String> {
        match &self.branch {
            Some(branch) => Ok(branch.clone()),
            None => history
                .current_branch()
                .await
                .context("Failed to determine the current branch (pass --branch)"),
        }
    }

    async fn current_commit(&self, history: &GitCliHistory) -> Result<CommitHash> {
        match &self.commit {
            Some(raw) => Ok(CommitHash::parse(raw)?),
            None => history
                .current_commit()
                .await
                .context("Failed to determine the current commit (pass --commit)"),
        }
    }
}

impl ScreenshotArgs {
    fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            ..RetryConfig::default()
        }
    }

    fn store(&self) -> Result<StoreChoice> {
        store_choice(
            self.store.store_dir.as_ref(),
            self.store.bucket.as_ref(),
            self.retry(),
        )
    }

    async fn current_commit(&self) -> Result<CommitHash> {
        match &self.commit {
            Some(raw) => Ok(CommitHash::parse(raw)?),
            None => GitCliHistory::new(&self.repo_dir)
                .current_commit()
                .await
                .context("Failed to determine the current commit (pass --commit)"),
        }
    }
}

impl GithubArgs {
    /// Target pull request, when a PR number is given.
    fn target(&self) -> Result<Option<GithubTarget>> {
        let Some(pr_number) = self.github_pr_number else {
            return Ok(None);
        };
        let (Some(owner), Some(repository), Some(token)) = (
            &self.github_owner,
            &self.github_repository,
            &self.github_api_token,
        ) else {
            bail!(
                "--github-pr-number requires --github-owner, --github-repository and --github-api-token"
            );
        };
        Ok(Some(GithubTarget {
            owner: owner.clone(),
            repository: repository.clone(),
            pr_number,
            token: token.clone(),
        }))
    }
}

/// Pull request comments when a PR is given, else `report_out` or stdout.
///
/// Earlier PR comments starting with `header` are handled per `previous`.
fn build_notifier(
    github: &GithubArgs,
    report_out: Option<&Path>,
    retry: RetryConfig,
    header: &str,
    previous: PreviousComments,
) -> Result<Arc<dyn Notifier>> {
    if let Some(target) = github.target()? {
        let notifier = GithubNotifier::new(target)
            .context("Failed to create GitHub client")?
            .with_api_base(github.github_api_base.as_str())
            .with_retry(retry)
            .with_previous_comments(header, previous);
        return Ok(Arc::new(notifier));
    }
    Ok(match report_out {
        Some(path) => Arc::new(FileNotifier::to_path(path)),
        None => Arc::new(FileNotifier::stdout()),
    })
}

fn build_renderer(format: ReportFormat) -> Arc<dyn ReportRenderer> {
    match format {
        ReportFormat::Markdown => Arc::new(MarkdownRenderer::default()),
        ReportFormat::Json => Arc::new(JsonRenderer),
    }
}

fn build_locator(
    store: &StoreChoice,
    commit: &CommitHash,
    config: &PipelineConfig,
    image_length: Option<f64>,
) -> Box<dyn ImageLocator> {
    match store {
        StoreChoice::Gcs(gcs) => Box::new(
            FirebaseLocator::new(gcs.bucket(), commit.clone(), config.actual_dir())
                .with_long_side(image_length),
        ),
        StoreChoice::Fs(fs) => Box::new(RelativeLocator::new(
            fs.root().join(commit.as_str()).display().to_string(),
        )),
    }
}

fn build_screen_locator(
    store: &StoreChoice,
    commit: &CommitHash,
    screenshot_dir: &Path,
    image_length: Option<f64>,
) -> Box<dyn ScreenLocator> {
    match store {
        StoreChoice::Gcs(gcs) => Box::new(
            FirebaseLocator::new(gcs.bucket(), commit.clone(), screenshot_dir)
                .with_long_side(image_length),
        ),
        StoreChoice::Fs(fs) => Box::new(RelativeLocator::new(
            fs.root().join(commit.as_str()).display().to_string(),
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    snapcheck_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Compare {
            run,
            report,
            github,
            compare_program,
        } => cmd_compare(&run, &report, &github, &compare_program).await,
        Commands::Upload { run } => cmd_upload(&run).await,
        Commands::Resolve { run } => cmd_resolve(&run).await,
        Commands::NotifyScreenshots { screens, github } => {
            cmd_notify_screenshots(&screens, &github).await
        }
    }
}

async fn cmd_compare(
    run: &RunArgs,
    report: &ReportArgs,
    github: &GithubArgs,
    compare_program: &str,
) -> Result<()> {
    let config = run.pipeline_config()?;
    let history = run.history();
    let branch = run.current_branch(&history).await?;
    let commit = run.current_commit(&history).await?;
    let store = run.store()?;

    let notifier = build_notifier(
        github,
        report.report_out.as_deref(),
        run.retry(),
        REPORT_HEADER,
        PreviousComments::Fold,
    )?;
    let locator = build_locator(&store, &commit, &config, report.image_length);
    let pipeline = SnapshotPipeline::new(
        config,
        Arc::new(history),
        store.as_store(),
        Arc::new(ImageMagickChecker::with_program(compare_program)),
        notifier,
        build_renderer(report.format),
    );

    let outcome = pipeline
        .compare(&branch, &commit, locator.as_ref())
        .await
        .with_context(|| format!("Snapshot comparison failed for {} on {}", commit, branch))?;

    match outcome {
        PipelineOutcome::NoBaseline => {
            info!(commit = %commit.short(), "No baseline snapshot; comparison skipped");
        }
        PipelineOutcome::Compared {
            baseline, result, ..
        } => {
            info!(
                commit = %commit.short(),
                baseline = %baseline.short(),
                new = result.new_items.len(),
                deleted = result.deleted_items.len(),
                changed = result.changed_items.len(),
                passed = result.passed_items.len(),
                "Comparison finished"
            );
        }
    }
    Ok(())
}

async fn cmd_upload(run: &RunArgs) -> Result<()> {
    let config = run.pipeline_config()?;
    let history = run.history();
    let commit = run.current_commit(&history).await?;

    let pipeline = SnapshotPipeline::new(
        config,
        Arc::new(history),
        run.store()?.as_store(),
        Arc::new(ImageMagickChecker::default()),
        Arc::new(FileNotifier::stdout()),
        build_renderer(ReportFormat::Markdown),
    );
    pipeline
        .upload(&commit)
        .await
        .with_context(|| format!("Failed to upload snapshot for {}", commit))?;

    println!("Uploaded snapshot for {}", commit);
    Ok(())
}

async fn cmd_resolve(run: &RunArgs) -> Result<()> {
    let config = run.pipeline_config()?;
    let history = run.history();
    let branch = run.current_branch(&history).await?;

    let resolver = BaselineResolver::new(Arc::new(history), run.store()?.as_index())
        .with_listing_policy(config.listing_policy);
    let baseline = resolver
        .resolve(&config.base_branch, &branch)
        .await
        .with_context(|| {
            format!(
                "Failed to resolve baseline for {} against {}",
                branch, config.base_branch
            )
        })?;

    match baseline {
        Some(commit) => println!("{}", commit),
        None => println!("none"),
    }
    Ok(())
}

async fn cmd_notify_screenshots(screens: &ScreenshotArgs, github: &GithubArgs) -> Result<()> {
    let commit = screens.current_commit().await?;
    let store = screens.store()?;
    let notifier = build_notifier(
        github,
        screens.report_out.as_deref(),
        screens.retry(),
        DEVICE_GRID_HEADER,
        PreviousComments::Delete,
    )?;
    let locator = build_screen_locator(
        &store,
        &commit,
        &screens.screenshot_dir,
        screens.image_length,
    );

    let publisher = ScreenshotPublisher::new(store.as_store(), notifier)
        .with_renderer(DeviceGridRenderer {
            fold: screens.fold_result,
        })
        .with_extensions(screens.extensions.clone());
    let outcome = publisher
        .publish(&screens.screenshot_dir, &commit, locator.as_ref())
        .await
        .with_context(|| format!("Failed to post device screenshots for {}", commit))?;

    match outcome {
        GridOutcome::Empty => {
            info!(
                dir = %screens.screenshot_dir.display(),
                "Screenshot dir is empty; nothing posted"
            );
        }
        GridOutcome::Published { grid, .. } => {
            info!(
                commit = %commit.short(),
                devices = grid.devices.len(),
                screens = grid.rows.len(),
                "Device screenshots posted"
            );
        }
    }
    Ok(())
}
