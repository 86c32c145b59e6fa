//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use newsdesk_browser::{BrowserManager, BrowserSession};
use newsdesk_core::{
    Analyzer, ChatClient, Classifier, Collector, CycleReport, CycleRunner, LlmClient, LogNotifier,
    Notifier, ProgressReporter, Scheduler,
};
use newsdesk_extract::Extractor;
use newsdesk_feeds::FeedRouter;
use newsdesk_shared::time::WIB_OFFSET_SECS;
use newsdesk_shared::{
    AppConfig, NewsRecord, NewsStatus, PipelineSettings, init_config, load_config,
    load_config_from, truncate_chars, validate_api_key,
};
use newsdesk_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// newsdesk: market news collection with LLM filtering.
#[derive(Parser)]
#[command(
    name = "newsdesk",
    version,
    about = "Collect, filter and analyze Indonesian market news and disclosures.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.newsdesk/newsdesk.toml).
    #[arg(long, global = true, env = "NEWSDESK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Record status filter for `list`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum StatusArg {
    Raw,
    Analyzed,
}

impl From<StatusArg> for NewsStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Raw => NewsStatus::Raw,
            StatusArg::Analyzed => NewsStatus::Analyzed,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one collection cycle now.
    Collect,

    /// List stored records, newest first.
    List {
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Deep-analyze one record (by id or unique id prefix) or all raw records.
    Analyze {
        /// Record id, id prefix, or `all`.
        target: String,

        /// Maximum records when analyzing `all`.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Re-analyze a record that already has an analysis.
        #[arg(long)]
        force: bool,
    },

    /// Show store statistics.
    Stats,

    /// Search titles and teasers.
    Search {
        keyword: String,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete records older than the retention window.
    Prune {
        /// Age in days (defaults to pipeline.retention_days).
        #[arg(long)]
        days: Option<u32>,
    },

    /// List configured sources.
    Sources,

    /// Run the periodic collection scheduler until Ctrl-C.
    Run,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
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
        0 => "newsdesk=info",
        1 => "newsdesk=debug",
        _ => "newsdesk=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(cli.config.as_deref()),
        };
    }

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };

    match cli.command {
        Command::Collect => cmd_collect(&config).await,
        Command::List { status, limit } => cmd_list(&config, status, limit).await,
        Command::Analyze {
            target,
            limit,
            force,
        } => cmd_analyze(&config, &target, limit, force).await,
        Command::Stats => cmd_stats(&config).await,
        Command::Search { keyword, limit } => cmd_search(&config, &keyword, limit).await,
        Command::Prune { days } => cmd_prune(&config, days).await,
        Command::Sources => cmd_sources(&config),
        Command::Run => cmd_run(&config).await,
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

async fn open_storage(config: &AppConfig) -> Result<Arc<Storage>> {
    let path = config.storage.resolved_db_path()?;
    let storage =
        Storage::open(&path).await?.with_similarity_threshold(config.pipeline.similarity_threshold);
    Ok(Arc::new(storage))
}

/// Read-only handle for the reporting commands.
async fn open_report_storage(config: &AppConfig) -> Result<Storage> {
    let path = config.storage.resolved_db_path()?;
    Ok(Storage::open_readonly(&path).await?)
}

/// Everything a collection or analysis run needs, sharing one browser.
struct Pipeline {
    storage: Arc<Storage>,
    browser: Arc<BrowserManager>,
    llm: Arc<dyn LlmClient>,
    notifier: Arc<dyn Notifier>,
    settings: PipelineSettings,
}

impl Pipeline {
    async fn build(config: &AppConfig) -> Result<Self> {
        let api_key = validate_api_key(config)?;
        let llm: Arc<dyn LlmClient> = Arc::new(ChatClient::new(&config.llm, &api_key)?);
        let browser = Arc::new(BrowserManager::new(
            config.browser.clone(),
            config.http.user_agent.clone(),
        )?);

        Ok(Self {
            storage: open_storage(config).await?,
            browser,
            llm,
            notifier: Arc::new(LogNotifier),
            settings: PipelineSettings::from(config),
        })
    }

    fn session(&self) -> Arc<dyn BrowserSession> {
        self.browser.clone()
    }

    fn runner(&self, config: &AppConfig) -> Result<CycleRunner> {
        let fetcher = Arc::new(FeedRouter::new(&config.http, self.session())?);
        let collector = Collector::new(
            fetcher,
            Classifier::new(self.llm.clone(), config.llm.filter_max_tokens),
            self.storage.clone(),
            self.notifier.clone(),
            self.settings.clone(),
        );
        Ok(CycleRunner::new(collector, config.active_sources()))
    }

    fn analyzer(&self, config: &AppConfig) -> Result<Analyzer> {
        let extractor = Extractor::new(
            &config.http,
            self.settings.min_content_length,
            self.session(),
        )?;
        Ok(Analyzer::new(
            Arc::new(extractor),
            self.llm.clone(),
            config.llm.analysis_max_tokens,
            &self.settings,
        ))
    }

    async fn shutdown(&self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser shutdown failed");
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_collect(config: &AppConfig) -> Result<()> {
    let pipeline = Pipeline::build(config).await?;
    let runner = pipeline.runner(config)?;
    if runner.sources().is_empty() {
        return Err(eyre!(
            "no active sources configured; add [[sources]] entries to the config file"
        ));
    }

    info!(sources = runner.sources().len(), "starting collection");
    let reporter = CliProgress::new();
    let outcome = runner.try_run(&reporter).await;
    pipeline.shutdown().await;

    match outcome? {
        Some(report) => print_cycle_report(&report),
        None => println!("A collection cycle is already running."),
    }
    Ok(())
}

async fn cmd_list(config: &AppConfig, status: Option<StatusArg>, limit: usize) -> Result<()> {
    let storage = open_report_storage(config).await?;
    let records = match status {
        Some(status) => storage.get_by_status(status.into(), Some(limit)).await?,
        None => storage.get_all().await?.into_iter().take(limit).collect(),
    };

    if records.is_empty() {
        println!("No records.");
        return Ok(());
    }
    for record in &records {
        print_record_line(record);
    }
    println!("\n  {} record(s)", records.len());
    Ok(())
}

async fn cmd_analyze(
    config: &AppConfig,
    target: &str,
    limit: Option<usize>,
    force: bool,
) -> Result<()> {
    let pipeline = Pipeline::build(config).await?;
    let analyzer = pipeline.analyzer(config)?;

    if target.eq_ignore_ascii_case("all") {
        let reporter = CliProgress::new();
        let report = analyzer
            .analyze_pending(&pipeline.storage, pipeline.notifier.as_ref(), limit, &reporter)
            .await?;
        reporter.finish();
        println!();
        println!("  Analyzed: {}", report.analyzed);
        println!("  Failed:   {}", report.failed);
        println!();
        return Ok(());
    }

    let record = pipeline
        .storage
        .get_by_id(target)
        .await?
        .ok_or_else(|| eyre!("no record matches '{target}' (or the prefix is ambiguous)"))?;

    if record.status == NewsStatus::Analyzed && !force {
        println!("Already analyzed (use --force to redo).");
        print_analysis(&record);
        return Ok(());
    }

    let reporter = CliProgress::new();
    reporter.phase(&format!("Analyzing {}", truncate_chars(&record.title, 60)));
    let outcome = analyzer
        .analyze_and_store(&pipeline.storage, pipeline.notifier.as_ref(), record)
        .await;
    reporter.finish();
    analyzer.close_browser().await;

    print_analysis(&outcome?);
    Ok(())
}

async fn cmd_stats(config: &AppConfig) -> Result<()> {
    let storage = open_report_storage(config).await?;
    let stats = storage.stats().await?;

    println!();
    println!("  Total:    {}", stats.total);
    println!("  Raw:      {}", stats.raw);
    println!("  Analyzed: {}", stats.analyzed);
    for (heading, rows) in [
        ("Category", &stats.by_category),
        ("Sub-category", &stats.by_sub_category),
        ("Sentiment", &stats.by_sentiment),
    ] {
        if rows.is_empty() {
            continue;
        }
        println!();
        println!("  {heading}:");
        for (label, count) in rows {
            println!("    {label:<24} {count}");
        }
    }
    println!();
    Ok(())
}

async fn cmd_search(config: &AppConfig, keyword: &str, limit: usize) -> Result<()> {
    let storage = open_report_storage(config).await?;
    let records = storage.search(keyword, limit).await?;
    if records.is_empty() {
        println!("No records match '{keyword}'.");
        return Ok(());
    }
    for record in &records {
        print_record_line(record);
    }
    Ok(())
}

async fn cmd_prune(config: &AppConfig, days: Option<u32>) -> Result<()> {
    let days = days.unwrap_or(config.pipeline.retention_days);
    let storage = open_storage(config).await?;
    let removed = storage.delete_older_than(days).await?;
    println!("Removed {removed} record(s) older than {days} day(s).");
    Ok(())
}

fn cmd_sources(config: &AppConfig) -> Result<()> {
    if config.sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }
    for source in &config.sources {
        let state = if source.active { "active" } else { "paused" };
        println!(
            "  {:<8} {:<16} {:<7} {:<18} {}",
            source.id,
            source.source_type.as_str(),
            state,
            source.category.as_str(),
            source.name
        );
        println!("           {}", source.endpoint);
    }
    Ok(())
}

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let pipeline = Pipeline::build(config).await?;
    let runner = Arc::new(pipeline.runner(config)?);
    let scheduler = Scheduler::new(runner, &config.scheduler);

    println!(
        "Scheduler running every {}s (Ctrl-C to stop).",
        config.scheduler.interval_secs
    );
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    pipeline.shutdown().await;
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&std::path::Path>) -> Result<()> {
    let config: AppConfig = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn wib(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(WIB_OFFSET_SECS) {
        Some(offset) => at.with_timezone(&offset).format("%d %b %H:%M WIB").to_string(),
        None => at.format("%d %b %H:%M UTC").to_string(),
    }
}

fn print_record_line(record: &NewsRecord) {
    println!(
        "  {}  {:<15} {:<8} {:<9} {:<16} {}",
        record.id,
        wib(record.published_at),
        record.status.as_str(),
        record.sentiment.as_str(),
        record.category.as_str(),
        truncate_chars(&record.title, 80)
    );
}

fn print_analysis(record: &NewsRecord) {
    println!();
    println!("  {}", record.title);
    println!("  {}", record.url);
    println!(
        "  {} · {} · {}",
        record.category,
        record.sentiment,
        record.ticker.as_deref().unwrap_or("-")
    );
    let Some(analysis) = &record.analysis else {
        println!();
        return;
    };
    if !analysis.summary.is_empty() {
        println!();
        for paragraph in analysis.summary.split("\n\n") {
            println!("  {}", paragraph.trim());
            println!();
        }
    }
    if !analysis.sentiment_reasoning.is_empty() {
        println!("  Sentiment: {}", analysis.sentiment_reasoning);
    }
    if !analysis.key_data.is_empty() {
        println!("  Key data:  {}", analysis.key_data.join(" | "));
    }
    if !analysis.tags.is_empty() {
        println!("  Tags:      {}", analysis.tags.join(", "));
    }
    println!();
}

fn print_cycle_report(report: &CycleReport) {
    println!();
    println!(
        "  Sources:     {} scanned, {} failed, {} up to date",
        report.sources_scanned, report.sources_failed, report.sources_up_to_date
    );
    println!("  New entries: {}", report.entries_new);
    println!("  Relevant:    {} ({} filtered out)", report.relevant, report.filtered_out);
    println!("  Stored:      {} ({} duplicates)", report.inserted.len(), report.rejected);
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());
    if !report.inserted.is_empty() {
        println!();
        for record in &report.inserted {
            print_record_line(record);
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
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

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_scanned(&self, source: &str, new_entries: usize) {
        self.spinner
            .set_message(format!("{source}: {new_entries} new"));
    }

    fn done(&self, _report: &CycleReport) {
        self.finish();
    }
}
