//! Plugin root resolution and the derived state-directory layout (spec
//! §6: "Persisted state layout"). Grounded in `gateway/src/cli/chat.rs`'s
//! `dirs::home_dir().join(".serialagent")` pattern for a per-user default
//! with an env-var override, mirrored here as `PLUGIN_ROOT`.

use std::path::PathBuf;

const PLUGIN_ROOT_ENV: &str = "PLUGIN_ROOT";
const DEFAULT_DIR_NAME: &str = ".hook-notify";

/// Root directory holding `config/`, `state/`, `lock/`, `registry.jsonl`,
/// and `log/`. `PLUGIN_ROOT` overrides detection entirely; otherwise falls
/// back to `~/.hook-notify`.
pub fn plugin_root() -> PathBuf {
    if let Ok(root) = std::env::var(PLUGIN_ROOT_ENV) {
        if !root.is_empty() {
            return PathBuf::from(root);
        }
    }
    dirs::home_dir().unwrap_or_default().join(DEFAULT_DIR_NAME)
}

pub fn config_path(root: &std::path::Path) -> PathBuf {
    root.join("config").join("config.json")
}

pub fn log_dir(root: &std::path::Path) -> PathBuf {
    root.join("log")
}

/// Shared base directory for [`hn_dedup::DedupManager`] and
/// [`hn_sessionstate::SessionStateManager`] — each owns its own
/// subdirectory (`lock/`, `state/`) underneath it.
pub fn state_base_dir(root: &std::path::Path) -> PathBuf {
    root.to_path_buf()
}
