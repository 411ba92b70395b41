//! Global configuration loader for Chorus.
//!
//! Reads `config.toml` from the data directory (`~/.chorus/` by default) and
//! deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use chorus_types::config::GlobalConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "CHORUS_DATA_DIR";

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => {
            tracing::debug!(
                services = config.services.len(),
                characters = config.characters.len(),
                "loaded {}",
                config_path.display()
            );
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Resolve the data directory.
///
/// Priority:
/// 1. Explicit `--data-dir` argument
/// 2. `CHORUS_DATA_DIR` environment variable
/// 3. `~/.chorus`
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    resolve_data_dir_from(explicit, std::env::var_os(DATA_DIR_ENV))
}

fn resolve_data_dir_from(explicit: Option<PathBuf>, env: Option<OsString>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if let Some(dir) = env.filter(|dir| !dir.is_empty()) {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".chorus"),
        // Last resort: current directory
        None => PathBuf::from(".chorus"),
    }
}
