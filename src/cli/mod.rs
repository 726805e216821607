//! CLI subcommands for the `tierstack` binary.
//!
//! ```bash
//! tierstack demo --workers 4 --ops 200   # Run a mixed-tier workload
//! tierstack config show                   # Effective configuration
//! tierstack config defaults               # Built-in defaults
//! tierstack config validate               # Warn on misconfiguration
//! ```

pub mod config_cmd;
pub mod demo;

pub use demo::{run_demo, DemoOptions, DemoReport};

/// Value following `flag` in `args`, if present.
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
