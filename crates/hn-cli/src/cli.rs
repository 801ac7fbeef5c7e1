//! Command-line surface (spec §6) and config loading, grounded in
//! `gateway/src/cli/mod.rs`'s `Cli`/`Command`/`load_config` shape.

use clap::{Parser, Subcommand};
use hn_domain::config::Config;

use crate::hook::HookEvent;
use crate::paths;

#[derive(Debug, Parser)]
#[command(name = "hook-notify", version, about = "Hook-driven notifier for an AI coding assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Handle one hook event, reading its JSON payload from stdin.
    HandleHook {
        /// Which hook fired.
        event: HookEvent,
    },
    /// Print version information.
    Version,
}

/// Load the configuration from `<plugin_root>/config/config.json`,
/// tolerating a missing file by falling back to defaults (spec §4.6 step
/// 2). Returns the parsed config and the plugin root it was resolved
/// against.
pub fn load_config() -> (Config, std::path::PathBuf) {
    let root = paths::plugin_root();
    let config_path = paths::config_path(&root);

    let config = if config_path.exists() {
        match std::fs::read_to_string(&config_path) {
            Ok(raw) => Config::from_json(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %config_path.display(), error = %e, "invalid config, using defaults");
                Config::default()
            }),
            Err(e) => {
                tracing::warn!(path = %config_path.display(), error = %e, "could not read config, using defaults");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    (config, root)
}
