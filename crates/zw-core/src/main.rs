//! zombie-watch CLI entry point.
//!
//! Resolves configuration (flags over config file over defaults), optionally
//! takes the singleton lock port, then drives the chosen reconciler until
//! interrupted.

use std::path::PathBuf;

use clap::Parser;
use zw_common::{
    load_config, ConfigError, ConfigOptions, KillStrategy, ProcessFilter, ResolvedConfig, RunId,
    WatchMode, WatcherConfig,
};
use zw_core::action::{SignalKiller, Terminator};
use zw_core::collect::SystemProvider;
use zw_core::daemon::{InstanceLock, Scheduler, ShutdownHandle};
use zw_core::exit_codes::ExitCode;
use zw_core::log_event;
use zw_core::logging::{
    event_names, get_host_id, init_logging, LogConfig, LogContext, LogFormat, LogLevel, Stage,
};
use zw_core::reconcile::{PortReconciler, ProcessReconciler, Reconciler};

/// Kill superseded dev-server instances as new ones appear.
#[derive(Parser, Debug)]
#[command(name = "zw")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// What to watch
    #[arg(long, value_enum)]
    mode: Option<WatchMode>,

    /// Base port; repeat or comma-separate for several windows
    #[arg(long = "port", short = 'p', value_delimiter = ',', value_name = "PORT")]
    ports: Vec<u16>,

    /// Ports scanned above each base (inclusive)
    #[arg(long, value_name = "N")]
    range: Option<u16>,

    /// Polling interval in milliseconds
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Port-mode trigger: chain | kill-base
    #[arg(long, value_parser = parse_strategy)]
    strategy: Option<KillStrategy>,

    /// Semicolon-separated process name allowlist, e.g. "node;vite"
    #[arg(long, value_name = "LIST")]
    filter: Option<String>,

    /// Log intended kills without signalling
    #[arg(long)]
    dry_run: bool,

    /// Process mode: terminate instances older than this many minutes
    #[arg(long, value_name = "MIN")]
    max_age: Option<u64>,

    /// Hold this loopback port to prevent a second watcher
    #[arg(long, value_name = "PORT")]
    lock_port: Option<u16>,

    /// Abandon a snapshot after this many milliseconds
    #[arg(long, value_name = "MS")]
    snapshot_timeout: Option<u64>,

    /// Config file (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run the first pass, print its report as JSON, and exit
    #[arg(long)]
    once: bool,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn parse_strategy(s: &str) -> Result<KillStrategy, String> {
    s.parse::<KillStrategy>().map_err(|e| e.to_string())
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::ArgsError
            } else {
                ExitCode::Clean
            };
            let _ = e.print();
            std::process::exit(code.as_i32());
        }
    };

    let cli_level = LogLevel::from_verbosity(cli.verbose, cli.quiet);
    let log_config = LogConfig::from_env(cli_level, cli.log_format);
    init_logging(&log_config);

    let ctx = LogContext::new(RunId::new().to_string(), get_host_id());
    let exit_code = run(&cli, &ctx);
    std::process::exit(exit_code.as_i32());
}

/// Layer CLI flags over a loaded config.
fn apply_overrides(config: &mut WatcherConfig, cli: &Cli) {
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if !cli.ports.is_empty() {
        config.base_ports = cli.ports.clone();
    }
    if let Some(range) = cli.range {
        config.range = range;
    }
    if let Some(interval) = cli.interval {
        config.interval_ms = interval;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    if let Some(filter) = &cli.filter {
        config.filter = ProcessFilter::parse(filter);
    }
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(max_age) = cli.max_age {
        config.max_age_minutes = max_age;
    }
    if let Some(port) = cli.lock_port {
        config.lock_port = Some(port);
    }
    if let Some(timeout) = cli.snapshot_timeout {
        config.snapshot_timeout_ms = timeout;
    }
}

fn resolve_config(cli: &Cli) -> Result<ResolvedConfig, ConfigError> {
    let options = ConfigOptions {
        config_path: cli.config.clone(),
        ..ConfigOptions::default()
    };
    let mut resolved = load_config(&options)?;
    apply_overrides(&mut resolved.config, cli);
    resolved.config.validate()?;
    Ok(resolved)
}

fn run(cli: &Cli, ctx: &LogContext) -> ExitCode {
    let resolved = match resolve_config(cli) {
        Ok(resolved) => resolved,
        Err(e) => {
            let detail = e.to_string();
            log_event!(ctx, ERROR, event_names::CONFIG_ERROR, Stage::Init, "invalid configuration",
                error = detail.as_str(), code = e.code());
            eprintln!("zw: {}", detail);
            return ExitCode::ArgsError;
        }
    };
    let config = resolved.config;

    if cli.print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::Clean
            }
            Err(e) => {
                eprintln!("zw: {}", e);
                ExitCode::InternalError
            }
        };
    }

    let source = resolved.source.to_string();
    let mode = config.mode.to_string();
    let filter = config.filter.to_string();
    log_event!(ctx, INFO, event_names::CONFIG_LOADED, Stage::Init, "configuration loaded",
        source = source.as_str(), mode = mode.as_str(), filter = filter.as_str(),
        dry_run = config.dry_run);

    let _lock = match config.lock_port {
        Some(port) => match InstanceLock::acquire(port) {
            Ok(lock) => {
                log_event!(ctx, INFO, event_names::LOCK_ACQUIRED, Stage::Init, "lock acquired",
                    port = lock.port());
                Some(lock)
            }
            Err(e) => {
                let detail = e.to_string();
                log_event!(ctx, ERROR, event_names::LOCK_CONTENDED, Stage::Init,
                    "another watcher is running", port = port, error = detail.as_str());
                eprintln!("zw: {}", detail);
                return ExitCode::for_error(&e.into());
            }
        },
        None => None,
    };

    let provider = SystemProvider::new(config.snapshot_timeout());
    let killer = SignalKiller::new();
    let terminator = Terminator::new(config.filter.clone(), config.dry_run, &killer);
    let mut reconciler: Box<dyn Reconciler + '_> = match config.mode {
        WatchMode::Ports => Box::new(PortReconciler::new(&provider, terminator, &config)),
        WatchMode::Processes => Box::new(ProcessReconciler::new(&provider, terminator, &config)),
    };

    let shutdown = ShutdownHandle::new();
    let mut scheduler =
        Scheduler::new(config.interval(), ctx.clone()).with_shutdown(shutdown.clone());

    if cli.once {
        let report = scheduler.run_tick(reconciler.as_mut());
        return match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::Clean
            }
            Err(e) => {
                eprintln!("zw: {}", e);
                ExitCode::InternalError
            }
        };
    }

    let on_interrupt = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.request_stop()) {
        tracing::warn!(error = %e, "could not install interrupt handler");
    }

    scheduler.run(reconciler.as_mut());
    ExitCode::Clean
}
