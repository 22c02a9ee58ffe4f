use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{ArgAction, Parser};
use log::LevelFilter;
use radiola_backend::config::{default_config_path, load_config_from};
use radiola_backend::stations::StationDirectory;
use radiola_bridge::StatusChannels;
use radiola_bridge::config::LogLevel;

/// Stream live internet radio stations from the terminal.
#[derive(Debug, Parser)]
#[command(name = "radiola", version, about)]
struct Cli {
    /// Code of the station to play. Lists the stations when omitted.
    station: Option<String>,

    /// List the available stations and exit.
    #[arg(short, long)]
    list: bool,

    /// List the audio output devices and exit.
    #[arg(long)]
    devices: bool,

    /// Read the configuration from PATH instead of the default location.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn level_filter(verbose: u8, configured: LogLevel) -> LevelFilter {
    match verbose {
        0 => match configured {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        },
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// The `--config` path when given, otherwise the per-user default.
fn config_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    match &cli.config {
        Some(path) => Ok(path.clone()),
        None => Ok(default_config_path()?),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = config_path(&cli)?;
    let config = load_config_from(&config_path).context("failed to load configuration")?;

    simple_logger::SimpleLogger::new()
        .with_colors(true)
        .with_threads(true)
        .with_local_timestamps()
        .with_level(level_filter(cli.verbose, config.log_level))
        .env()
        .init()
        .context("failed to build logger instance")?;
    log::info!("Configuration loaded from {config_path:?}");

    if cli.devices {
        for device in radiola_backend::list_output_devices()? {
            println!("{device}");
        }
        return Ok(());
    }

    let directory = StationDirectory::with_extra(&config.stations)
        .context("invalid station in configuration")?;
    let code = match cli.station {
        Some(code) if !cli.list => code,
        _ => return radiola_frontend::list_stations(directory.all()),
    };
    let station = directory.by_code(&code)?.clone();
    log::info!("Tuning in to {} at {}", station.name, station.url);

    let channels = StatusChannels::default();
    let backend = radiola_backend::run(config, station, channels.backend_tx);
    let rendered = radiola_frontend::run(channels.frontend_rx);

    backend
        .join()
        .map_err(|_| anyhow!("backend thread panicked"))??;
    rendered
}
