pub mod error;
pub mod settings;

pub use error::*;
pub use settings::{JobSettings, OrderSettings, PollSettings, RetrySettings, Settings};

use std::path::{Path, PathBuf};

/// Environment variable that points directly at a settings file
pub const CONFIG_PATH_ENV: &str = "STRATUS_CONFIG_PATH";

const LOCAL_CANDIDATES: [&str; 2] = ["stratus.yaml", ".stratus.yaml"];

/// Global settings directory (`~/.config/stratus` on Linux)
pub fn get_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stratus"))
}

/// Locate the settings file
///
/// Search order:
/// 1. `STRATUS_CONFIG_PATH` (direct path)
/// 2. current directory: stratus.yaml, .stratus.yaml
/// 3. ~/.config/stratus/config.yaml
///
/// `None` means no file exists and defaults apply.
pub fn find_settings_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(
            "{} points at {}, which does not exist; continuing search",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    let current_dir = std::env::current_dir()?;
    for filename in &LOCAL_CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(Some(path));
        }
    }

    if let Some(config_dir) = get_config_dir() {
        let global = config_dir.join("config.yaml");
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

/// Read and validate a settings file
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let settings = Settings::from_yaml_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    settings.validate()?;
    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Discover and load settings, falling back to defaults when no file exists
pub fn load_settings() -> Result<Settings> {
    match find_settings_file()? {
        Some(path) => load_settings_from(&path),
        None => {
            tracing::debug!("No settings file found, using defaults");
            Ok(Settings::default())
        }
    }
}
