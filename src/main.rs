use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use festival_status::app::Config;
use festival_status::catalog::{CatalogClient, TrackLookup};
use festival_status::process::ProcessWatcher;
use festival_status::session::SessionMachine;
use festival_status::status::{self, StatusPublisher, StatusRecord};
use festival_status::supervisor::{forward_interrupts, Supervisor, SupervisorSettings};

/// Festival Status - publishes the song you are playing for stream overlays
#[derive(Parser)]
#[command(name = "festival-status")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Config file (defaults to ~/.config/festival-status/config.toml)
    #[arg(short, long, env = "FESTIVAL_STATUS_CONFIG")]
    config: Option<PathBuf>,

    /// Game log file to watch
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Status file to publish
    #[arg(long)]
    status_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the game and publish status (default)
    Run,
    /// Look up one song in the catalog
    Lookup {
        /// Song id as it appears in the game log
        song_id: String,
    },
    /// Print the current status file
    Status,
    /// Overwrite the status file with an empty record
    Reset,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 設定を読み込み、コマンドライン引数で上書き
    let (mut config, config_error) = match &cli.config {
        Some(path) => (Config::load_from(path)?, None),
        None => Config::load_or_default(),
    };
    if let Some(log_file) = cli.log_file {
        config.log_file = log_file;
    }
    if let Some(status_file) = cli.status_file {
        config.status_file = status_file;
    }

    // ログ初期化
    let level = cli.log_level.unwrap_or_else(|| config.log_level.clone());
    init_logging(&level);
    if let Some(e) = config_error {
        warn!("Failed to load config, using defaults: {:#}", e);
    }

    match cli.command {
        Some(Commands::Lookup { song_id }) => lookup(&config, &song_id),
        Some(Commands::Status) => show_status(&config),
        Some(Commands::Reset) => reset_status(&config),
        Some(Commands::Run) | None => run(config),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;

    runtime.block_on(async move {
        info!("Festival Status starting");

        let publisher = StatusPublisher::new(&config.status_file);
        publisher
            .ensure_initialized()
            .context("Failed to initialize status file")?;
        info!("Publishing status to {}", publisher.path().display());

        if !config.log_file.is_file() {
            warn!(
                "Log file {} does not exist yet; will retry once the game is running",
                config.log_file.display()
            );
        }

        let catalog = CatalogClient::new(&config.catalog)?;
        let (publish_handle, publish_task) = status::queue::spawn(publisher);
        let machine = SessionMachine::new(catalog, publish_handle, config.watch.song_state_delay());
        let watcher = ProcessWatcher::new(&config.process_name);
        let mut supervisor =
            Supervisor::new(SupervisorSettings::from_config(&config), watcher, machine);

        // Ctrl-C で終了（再生中の曲は終了扱いにしてから）。2回目は即終了
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(async move {
            forward_interrupts(tokio::signal::ctrl_c, shutdown_tx).await;
            warn!("Second interrupt received, exiting without flushing status");
            std::process::exit(130);
        });

        supervisor.run(shutdown_rx).await;

        // Dropping the machine closes the queue; wait for pending writes
        drop(supervisor);
        publish_task.await.context("Publish queue panicked")?;

        info!("Exiting...");
        Ok(())
    })
}

fn lookup(config: &Config, song_id: &str) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    let catalog = CatalogClient::new(&config.catalog)?;
    let song_id = song_id.trim().to_lowercase();

    info!("Requesting {}", catalog.track_url(&song_id));
    match runtime.block_on(catalog.lookup(&song_id)) {
        Some(metadata) => {
            println!("{}", serde_json::to_string_pretty(&metadata)?);
            Ok(())
        }
        None => anyhow::bail!("Song ID '{}' not found in catalog", song_id),
    }
}

fn show_status(config: &Config) -> Result<()> {
    let publisher = StatusPublisher::new(&config.status_file);
    let record = publisher.read()?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn reset_status(config: &Config) -> Result<()> {
    let publisher = StatusPublisher::new(&config.status_file);
    publisher.publish(&StatusRecord::cleared())?;
    info!("Status reset at {}", publisher.path().display());
    Ok(())
}
