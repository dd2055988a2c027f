// tubecast - poll YouTube sources and republish them as podcast feeds

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use tubecast::config::{capitalize, ConfigManager, Source, SourceKind, Subscription, DEFAULT_CATEGORY, DEFAULT_CONFIG_FILE};
use tubecast::downloader::traits::AcquisitionBackend;
use tubecast::downloader::YtDlpAcquisition;
use tubecast::metadata::{MetadataBackend, YtDlpMetadata};
use tubecast::netcheck;
use tubecast::orchestrator::{Orchestrator, RunOptions};

/// Out-of-band kill-switch: set to skip all downloads while still running
/// the rest of the pipeline.
const SKIP_DOWNLOADS_ENV: &str = "TUBECAST_SKIP_DOWNLOADS";

#[derive(Parser)]
#[command(name = "tubecast", version, about = "YouTube channels and playlists as podcast RSS feeds")]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Process all enabled subscriptions (the default command)
    Run {
        /// Keep polling on the configured interval instead of exiting
        #[arg(long = "loop")]
        continuous: bool,

        /// Analyze what would happen without downloading or writing anything
        #[arg(long)]
        dry_run: bool,

        /// Only process the named subscription
        #[arg(long)]
        subscription: Option<String>,

        /// Only process the named source
        #[arg(long)]
        source: Option<String>,
    },

    /// Show all sources
    List,

    /// Show all subscriptions
    ListSubscriptions,

    /// Add a source to the first enabled subscription
    AddSource {
        name: String,
        url: String,
        /// channel or playlist
        kind: String,
        /// Feed title override
        #[arg(long)]
        title: Option<String>,
        /// Feed description override
        #[arg(long)]
        description: Option<String>,
        /// Poll interval in minutes
        #[arg(long, default_value_t = 10)]
        interval: u64,
        /// How many newest candidates to probe for availability
        #[arg(long, default_value_t = 5)]
        look_back: usize,
    },

    /// Remove a source from every subscription
    RemoveSource { name: String },

    /// Enable a source
    EnableSource { name: String },

    /// Disable a source
    DisableSource { name: String },

    /// Add a subscription
    AddSubscription {
        name: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },

    /// Remove a subscription and its sources
    RemoveSubscription { name: String },

    /// Enable a subscription
    EnableSubscription { name: String },

    /// Disable a subscription
    DisableSubscription { name: String },

    /// Check network and tooling health
    Diagnose,
}

fn init_logging(level: &str) {
    let filter = match level.to_ascii_uppercase().as_str() {
        "DEBUG" => log::LevelFilter::Debug,
        "WARNING" | "WARN" => log::LevelFilter::Warn,
        "ERROR" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    let mut clog = colog::default_builder();
    clog.filter(None, filter);
    clog.init();
}

fn downloads_disabled() -> bool {
    std::env::var(SKIP_DOWNLOADS_ENV)
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false)
}

fn print_sources(config: &ConfigManager) {
    println!(
        "{:<20} {:<16} {:<10} {:<9} {:>9} {:>10}  URL",
        "NAME", "SUBSCRIPTION", "TYPE", "STATUS", "INTERVAL", "LOOK-BACK"
    );
    for subscription in config.subscriptions() {
        for source in &subscription.sources {
            let status = if source.enabled && subscription.enabled {
                "enabled"
            } else {
                "disabled"
            };
            println!(
                "{:<20} {:<16} {:<10} {:<9} {:>9} {:>10}  {}",
                source.name,
                subscription.name,
                source.kind,
                status,
                source.poll_interval_minutes,
                source.look_back_count,
                source.url
            );
        }
    }
}

fn print_subscriptions(config: &ConfigManager) {
    println!(
        "{:<20} {:<28} {:<9} {:<18} {:>8}",
        "NAME", "TITLE", "STATUS", "CATEGORY", "SOURCES"
    );
    for subscription in config.subscriptions() {
        let status = if subscription.enabled { "enabled" } else { "disabled" };
        let sources = format!(
            "{}/{}",
            subscription.enabled_sources().len(),
            subscription.sources.len()
        );
        println!(
            "{:<20} {:<28} {:<9} {:<18} {:>8}",
            subscription.name, subscription.title, status, subscription.category, sources
        );
    }
}

async fn run(
    config: &ConfigManager,
    continuous: bool,
    options: RunOptions,
) -> ExitCode {
    let metadata: Arc<dyn MetadataBackend> = Arc::new(YtDlpMetadata::default());
    let acquisition: Arc<dyn AcquisitionBackend> = Arc::new(YtDlpAcquisition::new());

    if !metadata.is_available() {
        warn!("yt-dlp was not found; install it before expecting any downloads");
    }
    let disabled = downloads_disabled();
    if disabled {
        info!("{} is set: acquisition is bypassed this run", SKIP_DOWNLOADS_ENV);
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Termination signal received, finishing the current step");
            flag.store(true, Ordering::SeqCst);
        }
    });

    if config.diagnostics_enabled() && !options.dry_run {
        netcheck::run_diagnostics(metadata.as_ref()).await;
    }

    let orchestrator = Orchestrator::new(
        config,
        metadata,
        acquisition,
        disabled,
        shutdown.clone(),
    );

    if continuous {
        orchestrator.run_loop(config, &options).await;
    } else {
        orchestrator.run_once(config, &options).await;
    }

    if shutdown.load(Ordering::SeqCst) {
        ExitCode::from(130)
    } else {
        ExitCode::SUCCESS
    }
}

fn manage(config: &mut ConfigManager, command: Command) -> ExitCode {
    let result = match command {
        Command::AddSource {
            name,
            url,
            kind,
            title,
            description,
            interval,
            look_back,
        } => {
            let Some(kind) = SourceKind::parse(&kind) else {
                error!("Unknown source type '{}' (expected channel or playlist)", kind);
                return ExitCode::FAILURE;
            };
            config
                .add_source(Source {
                    name: name.clone(),
                    url,
                    kind,
                    enabled: true,
                    poll_interval_minutes: interval,
                    look_back_count: look_back,
                    custom_title: title,
                    custom_description: description,
                    category: DEFAULT_CATEGORY.to_string(),
                    author: None,
                })
                .map(|()| format!("Source '{}' added", name))
        }
        Command::RemoveSource { name } => config
            .remove_source(&name)
            .map(|()| format!("Source '{}' removed", name)),
        Command::EnableSource { name } => config
            .set_source_enabled(&name, true)
            .map(|()| format!("Source '{}' enabled", name)),
        Command::DisableSource { name } => config
            .set_source_enabled(&name, false)
            .map(|()| format!("Source '{}' disabled", name)),
        Command::AddSubscription {
            name,
            title,
            description,
            category,
            author,
        } => config
            .add_subscription(Subscription {
                title: title.unwrap_or_else(|| capitalize(&name)),
                description: description.unwrap_or_default(),
                enabled: true,
                category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
                author,
                sources: Vec::new(),
                name: name.clone(),
            })
            .map(|()| format!("Subscription '{}' added", name)),
        Command::RemoveSubscription { name } => config
            .remove_subscription(&name)
            .map(|()| format!("Subscription '{}' removed", name)),
        Command::EnableSubscription { name } => config
            .set_subscription_enabled(&name, true)
            .map(|()| format!("Subscription '{}' enabled", name)),
        Command::DisableSubscription { name } => config
            .set_subscription_enabled(&name, false)
            .map(|()| format!("Subscription '{}' disabled", name)),
        _ => unreachable!("non-management command routed to manage()"),
    };

    match result {
        Ok(message) => {
            info!("{}", message);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ConfigManager::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            init_logging("INFO");
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.log_level());

    match cli.command {
        None => {
            run(&config, false, RunOptions::default()).await
        }
        Some(Command::Run {
            continuous,
            dry_run,
            subscription,
            source,
        }) => {
            let options = RunOptions {
                dry_run,
                subscription_filter: subscription,
                source_filter: source,
            };
            run(&config, continuous, options).await
        }
        Some(Command::List) => {
            print_sources(&config);
            ExitCode::SUCCESS
        }
        Some(Command::ListSubscriptions) => {
            print_subscriptions(&config);
            ExitCode::SUCCESS
        }
        Some(Command::Diagnose) => {
            let metadata = YtDlpMetadata::default();
            netcheck::run_diagnostics(&metadata).await;
            ExitCode::SUCCESS
        }
        Some(command) => manage(&mut config, command),
    }
}
