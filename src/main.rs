use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use vidwatch::{
    AnalysisMode, App, Command, Coordinator, KeyboardInputHandler, TerminalSurface,
    VidwatchConfig,
};

#[derive(Parser, Debug)]
#[command(name = "vidwatch")]
#[command(about = "Threaded video analysis with motion detection and object recognition")]
#[command(version)]
#[command(long_about = "Vidwatch reads frames from a video file, an image directory or a live \
camera and analyzes them on worker threads. Motion detection runs inline with capture while \
object recognition runs on a separate worker whose latest results are drawn over the display.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "vidwatch.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without starting analysis")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Dry run mode - open the source but don't start analysis
    #[arg(long, help = "Perform dry run - configure the source but don't start analysis")]
    dry_run: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Write logs to a file instead of stderr
    #[arg(long, value_name = "PATH", help = "Write logs to this file (keeps the terminal free for key input)")]
    log_file: Option<PathBuf>,

    /// Video file, image directory or stub:// source to analyze
    #[arg(long, value_name = "PATH", conflicts_with = "camera")]
    file: Option<PathBuf>,

    /// Use the configured camera as input
    #[arg(long)]
    camera: bool,

    /// Initial analysis mode (motion, object, both)
    #[arg(long, value_name = "MODE")]
    mode: Option<AnalysisMode>,

    /// Start analysis as soon as the source is open
    #[arg(long)]
    autostart: bool,

    /// Don't read keys from the terminal
    #[arg(long)]
    no_keyboard: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        return print_default_config();
    }

    // Held until exit so buffered log lines are flushed
    let _log_guard = init_logging(&args)?;

    info!("Starting Vidwatch v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match VidwatchConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        info!("Configuration validation successful");
        println!("✓ Configuration is valid");
        return Ok(());
    }

    let load_path = args
        .file
        .clone()
        .or_else(|| config.source.file.as_ref().map(PathBuf::from));

    let surface = Arc::new(TerminalSurface::new(&config.display));
    let mut coordinator = Coordinator::new(config, surface);

    task::block_in_place(|| prepare(&mut coordinator, &args, load_path.as_ref()));

    if args.dry_run {
        info!("Dry run mode - source configured but analysis not started");
        println!(
            "✓ Dry run completed - source open: {}",
            coordinator.has_open_source()
        );
        task::block_in_place(|| coordinator.shutdown());
        return Ok(());
    }

    if args.autostart && coordinator.has_open_source() {
        task::block_in_place(|| coordinator.handle(Command::ToggleStartStop));
    }

    let mut app = App::new(coordinator);

    let keyboard = if args.no_keyboard {
        None
    } else {
        let handler = KeyboardInputHandler::new(app.sender(), load_path);
        match handler.start().await {
            Ok(()) => Some(handler),
            Err(e) => {
                warn!("Keyboard input unavailable: {}", e);
                None
            }
        }
    };

    let reason = app.run().await;

    if let Some(handler) = keyboard {
        handler.stop().await?;
    }

    if let Some(stats) = app.coordinator().session_stats() {
        info!("Last session: {:?}", stats);
    }
    info!("Vidwatch exited: {:?}", reason);

    Ok(())
}

/// Apply the command-line mode and source before the control loop starts
fn prepare(coordinator: &mut Coordinator, args: &Args, load_path: Option<&PathBuf>) {
    if let Some(mode) = args.mode {
        if let Err(e) = coordinator.change_mode(mode) {
            warn!("Could not switch to {} mode: {}", mode, e);
        }
    }

    if args.camera {
        coordinator.handle(Command::UseCamera);
    } else if let Some(path) = load_path {
        coordinator.handle(Command::LoadSource(path.clone()));
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vidwatch={}", log_level)));

    let (writer, guard) = match &args.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (fmt::writer::BoxMakeWriter::new(writer), Some(guard))
        }
        None => (fmt::writer::BoxMakeWriter::new(std::io::stderr), None),
    };
    let ansi = args.log_file.is_none();

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_thread_names(true)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_names(true)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .with_thread_names(true)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(guard)
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    let default_config = VidwatchConfig::default().to_toml()?;

    println!("# Vidwatch Configuration File");
    println!("# This is the default configuration with all available options");
    println!("# Optional keys: source.file (startup source), display.preview_path (JPEG preview)");
    println!("# Any value can also be set through VIDWATCH_<SECTION>__<KEY> environment variables,");
    println!("# e.g. VIDWATCH_PIPELINE__DETECTION_SKIP=2");
    println!();
    println!("{}", default_config);

    Ok(())
}
