//! Configuration loading from environment variables and TOML files.
//!
//! Values come from defaults, then an optional TOML file, then `TIERSTACK_*`
//! environment variables. Invalid values fall back to the previous layer
//! without failing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `TIERSTACK_CONCURRENCY` | 1 | Initial worker count (`auto` = one per CPU) |
//! | `TIERSTACK_THREAD_PREFIX` | tierstack-worker | Worker thread name prefix |
//! | `TIERSTACK_STACK_SIZE` | 0 | Worker stack size in bytes (0 = default) |
//! | `TIERSTACK_LOG` | info | Log filter directive |
//! | `TIERSTACK_LOG_FORMAT` | pretty | `json` or `pretty` |

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::{clamp_concurrency, PoolConfig};
use crate::telemetry::{LogConfig, LogFormat};

pub const ENV_CONCURRENCY: &str = "TIERSTACK_CONCURRENCY";
pub const ENV_THREAD_PREFIX: &str = "TIERSTACK_THREAD_PREFIX";
pub const ENV_STACK_SIZE: &str = "TIERSTACK_STACK_SIZE";
pub const ENV_LOG: &str = "TIERSTACK_LOG";
pub const ENV_LOG_FORMAT: &str = "TIERSTACK_LOG_FORMAT";

/// Keyword accepted in place of a worker count.
const AUTO: &str = "auto";

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub pool: PoolConfig,
    pub log: LogConfig,
}

/// Flat summary of effective values, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub concurrency: usize,
    pub thread_prefix: String,
    pub stack_size: usize,
    pub log_level: String,
    pub log_format: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Worker count as written in a file: a number or `"auto"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ConcurrencyValue {
    Count(i64),
    Keyword(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLogConfig {
    level: Option<String>,
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    concurrency: Option<ConcurrencyValue>,
    thread_prefix: Option<String>,
    stack_size: Option<usize>,
    log: Option<FileLogConfig>,
}

/// Parse a worker count: `auto`, or an integer clamped to at least 1.
pub fn parse_concurrency(value: &str) -> Option<usize> {
    let value = value.trim();
    if value.eq_ignore_ascii_case(AUTO) {
        return Some(PoolConfig::per_cpu().worker_threads.get());
    }
    value
        .parse::<i64>()
        .ok()
        .map(|n| clamp_concurrency(usize::try_from(n).unwrap_or(0)).get())
}

/// Parse a `usize` env var, returning `default` on missing or invalid.
fn parse_usize(key: &str, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => default,
    }
}

fn apply_file(config: &mut Config, file: FileConfig) {
    match file.concurrency {
        Some(ConcurrencyValue::Count(n)) => {
            config.pool.worker_threads = clamp_concurrency(usize::try_from(n).unwrap_or(0));
        }
        Some(ConcurrencyValue::Keyword(word)) => {
            if let Some(n) = parse_concurrency(&word) {
                config.pool.worker_threads = clamp_concurrency(n);
            }
        }
        None => {}
    }
    if let Some(prefix) = file.thread_prefix.filter(|p| !p.trim().is_empty()) {
        config.pool.thread_name_prefix = prefix;
    }
    if let Some(stack_size) = file.stack_size {
        config.pool.stack_size = stack_size;
    }
    if let Some(log) = file.log {
        if let Some(level) = log.level.filter(|l| !l.trim().is_empty()) {
            config.log.level = level;
        }
        if let Some(format) = log.format.and_then(|f| f.parse::<LogFormat>().ok()) {
            config.log.format = format;
        }
    }
}

fn apply_env(config: &mut Config) {
    if let Some(n) = std::env::var(ENV_CONCURRENCY).ok().and_then(|v| parse_concurrency(&v)) {
        config.pool.worker_threads = clamp_concurrency(n);
    }
    if let Ok(prefix) = std::env::var(ENV_THREAD_PREFIX) {
        if !prefix.trim().is_empty() {
            config.pool.thread_name_prefix = prefix;
        }
    }
    config.pool.stack_size = parse_usize(ENV_STACK_SIZE, config.pool.stack_size);
    if let Ok(level) = std::env::var(ENV_LOG) {
        if !level.trim().is_empty() {
            config.log.level = level;
        }
    }
    if let Some(format) = std::env::var(ENV_LOG_FORMAT).ok().and_then(|f| f.parse().ok()) {
        config.log.format = format;
    }
}

/// Load configuration from defaults and environment variables.
pub fn load() -> Config {
    let mut config = Config::default();
    apply_env(&mut config);
    config
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// ```toml
/// concurrency = "auto"
/// thread_prefix = "render"
/// stack_size = 4194304
///
/// [log]
/// level = "tierstack=debug"
/// format = "json"
/// ```
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: display.clone(), source })?;
    let file: FileConfig =
        toml::from_str(&text).map_err(|source| ConfigError::Parse { path: display, source })?;

    let mut config = Config::default();
    apply_file(&mut config, file);
    apply_env(&mut config);
    Ok(config)
}

impl Config {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            concurrency: self.pool.worker_threads.get(),
            thread_prefix: self.pool.thread_name_prefix.clone(),
            stack_size: self.pool.stack_size,
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str().to_string(),
        }
    }
}

/// Serializes tests that mutate process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> std::sync::MutexGuard<'static, ()> {
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
