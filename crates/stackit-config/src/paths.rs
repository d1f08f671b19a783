//! Config directory discovery.

use std::path::PathBuf;

/// Application directory name under the platform config dir.
const APP_NAME: &str = "stackit";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "STACKIT_CONFIG_DIR";

/// Get the XDG config directory for stackit.
///
/// Checks `STACKIT_CONFIG_DIR` env var first, then falls back to platform default.
pub fn xdg_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Expand `~/` to the home directory.
pub(crate) fn expand_path(path: &std::path::Path) -> PathBuf {
    if let Some(s) = path.to_str()
        && let Some(rest) = s.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}
