//! GeneLink - LLM-assisted gene/disease correlation analysis
//!
//! A CLI tool that resolves a gene and a disease, gathers public evidence
//! and asks an LLM for a structured correlation verdict.
//!
//! Exit codes:
//!   0 - Analysis completed
//!   1 - Analysis failed, or a runtime error (config, output file, etc.)

use anyhow::{Context, Result};
use genelink::cli::Args;
use genelink::config::{Config, CONFIG_FILE};
use genelink::models::{AnalysisResult, PipelineStatus, ProgressEvent, SourceStatus};
use genelink::pipeline::{CancelHandle, LogSink, Pipeline, ProgressSink};
use genelink::report;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("GeneLink v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run_analysis(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .genelink.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize provider endpoints, retries, deadlines and the LLM.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Spinner that mirrors pipeline transitions.
struct SpinnerSink {
    bar: ProgressBar,
}

impl SpinnerSink {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressSink for SpinnerSink {
    fn on_progress(&self, event: ProgressEvent) {
        debug!("Progress: {} - {}", event.status, event.message);
        if event.status.is_terminal() {
            self.bar.finish_and_clear();
        } else {
            self.bar.set_message(event.message);
        }
    }
}

/// Run one analysis. Returns the exit code (0 or 1).
async fn run_analysis(args: Args) -> Result<i32> {
    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let request = config.request(args.gene(), args.disease(), !args.no_llm);
    let pipeline = Pipeline::from_config(&config)?;

    eprintln!("🧬 Analyzing {} / {}", request.gene, request.disease);
    match request.llm {
        Some(ref llm) => {
            eprintln!("   LLM: {} ({})", llm.provider, llm.model);
            if !pipeline.available_providers().contains(&llm.provider) {
                warn!(
                    "No API key for {}; set it in {} or the environment",
                    llm.provider, CONFIG_FILE
                );
            }
        }
        None => eprintln!("   LLM: skipped (--no-llm)"),
    }
    eprintln!("   Timeout: {}s", config.pipeline.overall_timeout_secs);

    // Ctrl-C stops the analysis after the running phase
    let cancel = CancelHandle::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current phase");
            interrupt.cancel();
        }
    });

    // Quiet runs keep transitions in the log only
    let sink: Box<dyn ProgressSink> = if args.quiet {
        Box::new(LogSink)
    } else {
        Box::new(SpinnerSink::new())
    };
    let result = pipeline.run(request, sink.as_ref(), &cancel).await;

    let output = report::render(&result, config.general.format)?;
    match args.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            print_summary(&result);
            eprintln!("\n📝 Report saved to: {}", path.display());
        }
        None => {
            println!("{}", output);
            print_summary(&result);
        }
    }

    Ok(if result.status == PipelineStatus::Completed { 0 } else { 1 })
}

fn print_summary(result: &AnalysisResult) {
    let evidence = &result.evidence;

    eprintln!("\n📊 Analysis Summary:");
    eprintln!(
        "   Sources: {} ok | {} partial | {} unavailable",
        evidence.count(SourceStatus::Ok),
        evidence.count(SourceStatus::Partial),
        evidence.count(SourceStatus::Unavailable)
    );
    if let Some(ref verdict) = result.verdict {
        eprintln!(
            "   Verdict: {} (confidence {:.2})",
            verdict.verdict, verdict.confidence
        );
    }
    eprintln!("   Duration: {:.1}s", result.duration_seconds());

    match result.status {
        PipelineStatus::Completed => eprintln!("\n✅ Analysis complete!"),
        _ => eprintln!(
            "\n❌ Analysis failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
