//! tierstack entry point.
//!
//! ## CLI Subcommands
//!
//! - `tierstack demo` - Run a mixed-tier workload and print stats
//! - `tierstack config show|defaults|validate` - Inspect configuration
//! - `tierstack help` / `tierstack version`

use std::process::ExitCode;
use std::time::Duration;

use tierstack::cli::{self, config_cmd, DemoOptions};
use tierstack::config::Config;
use tierstack::scheduler::clamp_concurrency;
use tierstack::telemetry;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "demo" => {
            let cfg = match load_config(&args) {
                Ok(cfg) => cfg,
                Err(code) => return code,
            };
            if let Err(e) = telemetry::init_logging(&cfg.log) {
                eprintln!("Logging disabled: {e}");
            }
            run_demo(&args, cfg)
        }
        "config" => {
            let cfg = match load_config(&args) {
                Ok(cfg) => cfg,
                Err(code) => return code,
            };
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let json = args.iter().any(|a| a == "--json");
                    config_cmd::run_show(&cfg, json);
                    ExitCode::SUCCESS
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate(&cfg) as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {subcommand}");
                    print_usage();
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            print_usage();
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("tierstack {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn load_config(args: &[String]) -> Result<Config, ExitCode> {
    config_cmd::resolve(cli::flag_value(args, "--config")).map_err(|e| {
        eprintln!("{e}");
        ExitCode::from(2u8)
    })
}

fn run_demo(args: &[String], cfg: Config) -> ExitCode {
    let mut options = DemoOptions { pool: cfg.pool, ..Default::default() };

    if let Some(raw) = cli::flag_value(args, "--workers") {
        match raw.parse::<usize>() {
            Ok(n) => options.pool.worker_threads = clamp_concurrency(n),
            Err(_) => {
                eprintln!("--workers expects a number, got {raw:?}");
                return ExitCode::from(2u8);
            }
        }
    }
    if let Some(raw) = cli::flag_value(args, "--ops") {
        match raw.parse::<usize>() {
            Ok(n) => options.operations = n,
            Err(_) => {
                eprintln!("--ops expects a number, got {raw:?}");
                return ExitCode::from(2u8);
            }
        }
    }
    if let Some(raw) = cli::flag_value(args, "--work-ms") {
        match raw.parse::<u64>() {
            Ok(ms) => options.work = Duration::from_millis(ms),
            Err(_) => {
                eprintln!("--work-ms expects a number, got {raw:?}");
                return ExitCode::from(2u8);
            }
        }
    }

    match cli::run_demo(&options) {
        Ok(report) => {
            eprintln!(
                "completed {} operations, {} skipped after cancellation",
                report.completed, report.skipped_cancelled
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Demo failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "tierstack v{version} - tiered LIFO operation scheduler

USAGE:
    tierstack [COMMAND] [OPTIONS]

COMMANDS:
    demo         Run a mixed-tier workload through a pool and print stats
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    --config FILE    Load configuration from a TOML file
    --workers N      demo: worker threads (overrides config)
    --ops N          demo: operations in the main batch (default: 100)
    --work-ms N      demo: simulated work per operation (default: 1)
    --json           config show: print JSON

ENVIRONMENT:
    TIERSTACK_CONCURRENCY    Initial worker count, or \"auto\" (default: 1)
    TIERSTACK_THREAD_PREFIX  Worker thread name prefix (default: tierstack-worker)
    TIERSTACK_STACK_SIZE     Worker stack size in bytes (default: platform)
    TIERSTACK_LOG            Log filter (default: info)
    TIERSTACK_LOG_FORMAT     json or pretty (default: pretty)

EXIT CODES:
    0  Success
    1  Failure / validation warnings
    2  Configuration or usage error
"
    );
}
