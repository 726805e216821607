//! Config subcommands: show, defaults, validate.
//!
//! These read configuration from the environment (and an optional file)
//! without starting a pool.

use std::path::Path;

use tracing_subscriber::EnvFilter;

use crate::config::{self, Config, EffectiveConfig, ENV_CONCURRENCY};

/// Resolve config from `--config <path>` if given, else the environment.
pub fn resolve(path: Option<&str>) -> Result<Config, config::ConfigError> {
    match path {
        Some(path) => config::load_file(Path::new(path)),
        None => Ok(config::load()),
    }
}

/// Print effective config, as `KEY=value` lines or JSON.
pub fn run_show(cfg: &Config, json: bool) {
    let eff = cfg.effective_config();
    if json {
        match serde_json::to_string_pretty(&eff) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Failed to serialize config: {e}"),
        }
    } else {
        print_config(&eff);
    }
}

/// Print default config values (no env overrides).
pub fn run_defaults() {
    print_config(&Config::default().effective_config());
}

/// Count obvious misconfigurations, printing one warning per finding.
pub fn validate(cfg: &Config) -> usize {
    let mut warnings = 0;
    let eff = cfg.effective_config();

    if let Ok(raw) = std::env::var(ENV_CONCURRENCY) {
        if config::parse_concurrency(&raw).is_none() {
            eprintln!("WARNING: {ENV_CONCURRENCY}={raw:?} is not a number or \"auto\"; using {}", eff.concurrency);
            warnings += 1;
        }
    }

    let cpus = num_cpus::get().max(1);
    if eff.concurrency > cpus * 4 {
        eprintln!(
            "WARNING: concurrency {} is more than 4x the {} available CPUs",
            eff.concurrency, cpus
        );
        warnings += 1;
    }

    if eff.stack_size != 0 && eff.stack_size < 64 * 1024 {
        eprintln!("WARNING: worker stack size {} bytes is below 64 KiB", eff.stack_size);
        warnings += 1;
    }

    if let Err(e) = EnvFilter::try_new(&eff.log_level) {
        eprintln!("WARNING: log filter {:?} is invalid: {e}", eff.log_level);
        warnings += 1;
    }

    warnings
}

/// Validate configuration. Returns 0 if valid, 1 if any warnings are found.
pub fn run_validate(cfg: &Config) -> i32 {
    if validate(cfg) == 0 {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn print_config(cfg: &EffectiveConfig) {
    println!("TIERSTACK_CONCURRENCY={}", cfg.concurrency);
    println!("TIERSTACK_THREAD_PREFIX={}", cfg.thread_prefix);
    println!("TIERSTACK_STACK_SIZE={}", cfg.stack_size);
    println!("TIERSTACK_LOG={}", cfg.log_level);
    println!("TIERSTACK_LOG_FORMAT={}", cfg.log_format);
}
