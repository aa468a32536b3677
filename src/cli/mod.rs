pub mod console;
pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::Console;
use report::format_report;
use tokio::io::{stdin, AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;
use tracing::{error, level_filters::LevelFilter};

use crate::{
    capture::GenericScreenCapturer,
    session::{create_session, shutdown::detect_shutdown},
    settings::{prompt::load_or_prompt, PartialSettings, Settings, SettingsStore},
    storage::{
        compute_total_elapsed,
        work_log::{CsvWorkLog, WorkLog},
    },
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "punchclock", version, long_about = None)]
#[command(about = "Tracks working time into a CSV table and takes periodic screenshots", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Print logs to the console as well")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default uses $XDG_STATE_HOME/punchclock or $HOME/.local/state/punchclock"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the interactive tracker")]
    Track,
    #[command(about = "Print the total working time of the current profile")]
    Total,
    #[command(about = "Print every tracked session and the total")]
    Report,
    #[command(about = "Show or change settings")]
    Settings {
        #[arg(long, help = "Base path of the profile, without extension")]
        file_path: Option<PathBuf>,
        #[arg(
            long,
            help = "Minutes between screenshots",
            value_parser = clap::value_parser!(u32).range(1..=60)
        )]
        screenshot_interval: Option<u32>,
        #[arg(
            long,
            help = "Minutes between updates of the running session",
            value_parser = clap::value_parser!(u32).range(1..=60)
        )]
        tracking_interval: Option<u32>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let application_dir = args
        .dir
        .map_or_else(create_application_default_path, Ok)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(&application_dir, logging_level, args.log)?;

    let store = SettingsStore::new(&application_dir);
    let defaults = Settings::defaults(&application_dir, DefaultClock.now());
    let mut lines = BufReader::new(stdin()).lines();

    match args.commands {
        Commands::Track => track(store, defaults, lines).await,
        Commands::Total => {
            let log = open_profile(&store, &defaults, &mut lines).await?;
            println!("{}", compute_total_elapsed(&log.read_all().await?));
            Ok(())
        }
        Commands::Report => {
            let log = open_profile(&store, &defaults, &mut lines).await?;
            for line in format_report(&log.read_all().await?) {
                println!("{line}");
            }
            Ok(())
        }
        Commands::Settings {
            file_path,
            screenshot_interval,
            tracking_interval,
        } => {
            let stored = store.load().await?;
            let settings = PartialSettings {
                file_path: file_path.or(stored.file_path),
                screenshot_interval: screenshot_interval.or(stored.screenshot_interval),
                tracking_interval: tracking_interval.or(stored.tracking_interval),
            }
            .or_defaults(&defaults);
            store.save(&settings).await?;
            println!("FilePath={}", settings.file_path.display());
            println!("ScreenShotInterval={}", settings.screenshot_interval);
            println!("TrackingInterval={}", settings.tracking_interval);
            Ok(())
        }
    }
}

async fn open_profile<R: AsyncBufRead + Unpin>(
    store: &SettingsStore,
    defaults: &Settings,
    lines: &mut Lines<R>,
) -> Result<CsvWorkLog> {
    let settings = load_or_prompt(store, defaults, lines).await?;
    let log = CsvWorkLog::new(settings.file_path);
    log.ensure_exists().await?;
    Ok(log)
}

/// Runs the tracker with the console as its user interface until the user quits, input ends or
/// the process is interrupted.
async fn track<R: AsyncBufRead + Unpin>(
    store: SettingsStore,
    defaults: Settings,
    mut lines: Lines<R>,
) -> Result<()> {
    let settings = load_or_prompt(&store, &defaults, &mut lines).await?;

    let shutdown = CancellationToken::new();
    let (service, handle) = create_session(
        &settings,
        GenericScreenCapturer::new(),
        DefaultClock,
        &shutdown,
    )
    .await?;
    let console = Console::new(lines, handle, store, defaults, settings, shutdown.clone());

    let console = async {
        let result = console.run().await;
        if result.is_err() {
            shutdown.cancel();
        }
        result
    };

    let (_, service_result, console_result) =
        tokio::join!(detect_shutdown(shutdown.clone()), service.run(), console);

    if let Err(e) = &service_result {
        error!("Session got an error {e:?}");
    }
    if let Err(e) = &console_result {
        error!("Console got an error {e:?}");
    }
    service_result?;
    console_result
}
