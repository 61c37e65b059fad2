//! watch-backend
//!
//! Runs the background worker host, or (as a child of the host) a single
//! background worker.
//!
//! # Architecture Overview
//!
//! ```text
//!   watch-backend supervise                      watch-backend worker
//!  ┌──────────────────────────────┐            ┌─────────────────────────────┐
//!  │ config → logging → metrics   │            │ block signals → latch       │
//!  │ preload libraries            │   spawn    │ resolve library.function    │
//!  │   └→ register workers ───────┼───────────▶│ install SIGTERM/SIGHUP      │
//!  │ start phases → launch        │            │ unblock → busy-poll loop    │
//!  │ reap / restart policy        │◀───────────┼─ exit status 1              │
//!  │ SIGTERM/SIGHUP → forward ────┼──signal───▶│                             │
//!  └──────────────────────────────┘            └─────────────────────────────┘
//! ```

use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use watch_backend::bgworker::{run_entry_point, Catalog};
use watch_backend::config::{load_or_default, WatchConfig};
use watch_backend::lifecycle::{BlockedSignals, ControlHandle, SignalListener};
use watch_backend::observability::{logging, metrics};
use watch_backend::supervisor::{ProcessLauncher, Supervisor, WorkerRegistry};

#[derive(Parser)]
#[command(name = "watch-backend")]
#[command(about = "Background worker host and the watch_backend worker", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load preload libraries and supervise their workers (default)
    Supervise,
    /// Run one worker entry point in this process
    Worker {
        #[arg(long)]
        library: String,
        #[arg(long)]
        function: String,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        main_arg: i64,
    },
    /// Print the workers the preload libraries register, as JSON
    Describe,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Supervise) {
        Commands::Worker {
            library,
            function,
            main_arg,
        } => worker(cli.config.as_deref(), &library, &function, main_arg),
        Commands::Supervise => {
            let config = load_or_default(cli.config.as_deref())?;
            logging::init_logging(&config.observability);
            supervise(config, cli.config)
        }
        Commands::Describe => {
            let config = load_or_default(cli.config.as_deref())?;
            logging::init_logging(&config.observability);
            describe(&config)
        }
    }
}

/// Run one worker entry point and exit with its status.
///
/// No runtime threads here: the signal mask is per thread.
fn worker(
    config_path: Option<&Path>,
    library: &str,
    function: &str,
    main_arg: i64,
) -> Result<(), Box<dyn Error>> {
    // Nothing may run with SIGTERM at its default action.
    let signals = BlockedSignals::block()?;

    let config = load_or_default(config_path)?;
    logging::init_logging(&config.observability);

    let code = match run_entry_point(&Catalog::builtin(), signals, library, function, main_arg) {
        Ok(exit) => exit.code(),
        Err(e) => {
            tracing::error!(library, function, error = %e, "Background worker failed to start");
            1
        }
    };
    std::process::exit(code);
}

fn supervise(config: WatchConfig, config_path: Option<PathBuf>) -> Result<(), Box<dyn Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            max_worker_processes = config.supervisor.max_worker_processes,
            "watch-backend supervisor starting"
        );

        if config.observability.metrics_enabled {
            let addr: SocketAddr = config.observability.metrics_address.parse()?;
            metrics::init_metrics(addr)?;
        }

        let launcher = ProcessLauncher::current_exe(config_path)?;
        let mut supervisor = Supervisor::new(config.supervisor.clone(), launcher);
        supervisor.load_libraries(&Catalog::builtin(), &config.supervisor.preload_libraries)?;

        let control = ControlHandle::new();
        let events = control.subscribe();
        let listener = SignalListener::new()?;
        tokio::spawn(listener.run(control.clone()));

        let report = supervisor.run(events).await;

        tracing::info!(exits = report.exits.len(), "Shutdown complete");
        Ok::<(), Box<dyn Error>>(())
    })
}

fn describe(config: &WatchConfig) -> Result<(), Box<dyn Error>> {
    let mut registry = WorkerRegistry::new(config.supervisor.max_worker_processes);
    let catalog = Catalog::builtin();
    for library in &config.supervisor.preload_libraries {
        catalog.load(library, &mut registry)?;
    }

    let workers: Vec<_> = registry.iter().map(|(_, worker)| worker).collect();
    println!("{}", serde_json::to_string_pretty(&workers)?);
    Ok(())
}
