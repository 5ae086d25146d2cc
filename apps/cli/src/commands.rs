//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::Result;
use feedmill_core::{
    BranchOutcome, FileRunLog, Notifier, RunLog, RunProgress, RunSummary, notifier_for,
    report_fatal, run_ingest,
};
use feedmill_shared::{
    AppConfig, FeedmillError, IngestConfig, catalog_api_key, init_config, load_config,
    load_config_from,
};
use feedmill_storage::{ContentStore, MemoryStore, Storage};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// feedmill — scheduled content ingestion.
#[derive(Parser)]
#[command(
    name = "feedmill",
    version,
    about = "Pull catalog items, feeds and generated topics into one linked content store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.feedmill/feedmill.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run every source once.
    Run(RunArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Overrides for a single run. Each one wins over the config file.
#[derive(Args, Default)]
pub(crate) struct RunArgs {
    /// Use an in-memory store instead of the database.
    #[arg(long)]
    pub dry_run: bool,

    /// Database file.
    #[arg(long)]
    pub database: Option<String>,

    /// Webhook notified when a run does not fully succeed.
    #[arg(long, env = "NOTIFY_WEBHOOK_URL")]
    pub notify_webhook: Option<String>,

    /// Syndication feed URL (repeatable).
    #[arg(long = "feed", env = "RSS_FEEDS", value_delimiter = ',')]
    pub feeds: Vec<String>,

    /// Directory for run log files.
    #[arg(long)]
    pub log_dir: Option<String>,
}

impl RunArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(database) = &self.database {
            config.storage.database_path = database.clone();
        }
        if let Some(webhook) = &self.notify_webhook {
            config.notify.webhook_url = Some(webhook.clone());
        }
        let feeds: Vec<String> = self
            .feeds
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if !feeds.is_empty() {
            config.syndication.feeds = feeds;
        }
        if let Some(dir) = &self.log_dir {
            config.run_log.dir = dir.clone();
        }
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "feedmill=info",
        1 => "feedmill=debug",
        _ => "feedmill=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command and map its outcome to a process exit code.
pub(crate) async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(read_config(config_path)?, &args).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&read_config(config_path)?),
        },
    }
}

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(mut config: AppConfig, args: &RunArgs) -> Result<ExitCode> {
    args.apply(&mut config);
    let ingest = IngestConfig::resolve(&config, chrono::Local::now().date_naive())
        .with_catalog_api_key(catalog_api_key(&config));

    // Without a run log there is nowhere to record a fatal error, so these
    // two fail the usual way.
    let run_log: Arc<dyn RunLog> = Arc::new(FileRunLog::new(&ingest.log_dir)?);
    let notifier = notifier_for(ingest.notify_webhook.as_deref())?;

    info!(
        dry_run = args.dry_run,
        database = %ingest.database_path.display(),
        feeds = ingest.syndication.feeds.len(),
        "starting ingest"
    );

    match execute(&ingest, args.dry_run, run_log.clone(), notifier.clone()).await {
        Ok(summary) => {
            print_summary(&summary);
            Ok(ExitCode::from(summary.exit_code()))
        }
        Err(e) => {
            report_fatal(&e, run_log.as_ref(), notifier.as_ref()).await;
            eprintln!("Fatal error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn execute(
    ingest: &IngestConfig,
    dry_run: bool,
    run_log: Arc<dyn RunLog>,
    notifier: Arc<dyn Notifier>,
) -> std::result::Result<RunSummary, FeedmillError> {
    let store: Arc<dyn ContentStore> = if dry_run {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(Storage::open(&ingest.database_path).await?)
    };

    let progress = CliProgress::new();
    run_ingest(ingest, store, run_log, notifier, &progress).await
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("  Ingest finished: {}", summary.state);
    for outcome in &summary.outcomes {
        match &outcome.result {
            Ok(report) => println!(
                "  {:<12} ok      fetched={} upserted={} skipped={}",
                outcome.name, report.fetched, report.upserted, report.skipped
            ),
            Err(reason) => println!("  {:<12} failed  {reason}", outcome.name),
        }
    }
    println!(
        "  Success: {}/{} in {:.1}s",
        summary.success_count(),
        summary.total(),
        summary.duration.as_secs_f64()
    );
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Spinner showing which branches are still running.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl RunProgress for CliProgress {
    fn branch_started(&self, name: &str) {
        self.spinner.set_message(format!("Running {name}"));
    }

    fn branch_settled(&self, outcome: &BranchOutcome) {
        let mark = if outcome.succeeded() { "✓" } else { "✗" };
        self.spinner.println(format!("{mark} {}", outcome.name));
    }

    fn finished(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

fn cmd_config_init() -> Result<ExitCode> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(config: &AppConfig) -> Result<ExitCode> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::try_parse_from([
            "feedmill",
            "-v",
            "run",
            "--dry-run",
            "--feed",
            "https://a.example.com/feed.xml,https://b.example.com/atom.xml",
            "--log-dir",
            "/tmp/feedmill-logs",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(args.dry_run);
        assert_eq!(args.feeds.len(), 2);
        assert_eq!(args.log_dir.as_deref(), Some("/tmp/feedmill-logs"));
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = AppConfig::default();
        config.syndication.feeds = vec!["https://file.example.com/feed.xml".into()];

        let args = RunArgs {
            database: Some("/tmp/other.db".into()),
            notify_webhook: Some("https://hooks.example.com/x".into()),
            feeds: vec![" https://cli.example.com/feed.xml ".into(), String::new()],
            ..RunArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(config.storage.database_path, "/tmp/other.db");
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
        assert_eq!(config.syndication.feeds, ["https://cli.example.com/feed.xml"]);
        assert_eq!(config.run_log.dir, "logs");
    }

    #[test]
    fn empty_feed_flag_keeps_file_feeds() {
        let mut config = AppConfig::default();
        config.syndication.feeds = vec!["https://file.example.com/feed.xml".into()];
        RunArgs::default().apply(&mut config);
        assert_eq!(config.syndication.feeds.len(), 1);
    }
}
