//! Loading and persisting `songdeck.toml`.

use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::{sanitize_config, Config};

const CONFIG_FILE_NAME: &str = "songdeck.toml";

/// Location of the config file inside the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Reads the config at `path`, creating it with defaults when missing.
///
/// Unreadable or invalid files fall back to defaults; the file on disk is left
/// as-is in that case so the user can fix it.
pub fn load_config_file(path: &Path) -> Config {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        let config = Config::default();
        persist_config_file(&config, path);
        return config;
    }

    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) => {
            warn!(
                "Failed to read config {} ({}). Using defaults.",
                path.display(),
                err
            );
            return Config::default();
        }
    };

    match toml::from_str::<Config>(&text) {
        Ok(config) => sanitize_config(config),
        Err(err) => {
            warn!(
                "Failed to parse config {} ({}). Using defaults.",
                path.display(),
                err
            );
            Config::default()
        }
    }
}

pub fn persist_config_file(config: &Config, path: &Path) {
    let config_text = match toml::to_string(config) {
        Ok(text) => text,
        Err(err) => {
            log::error!("Failed to serialize config for {}: {}", path.display(), err);
            return;
        }
    };

    if let Some(parent) = path.parent() {
        if let Err(err) = std::fs::create_dir_all(parent) {
            log::error!(
                "Failed to create config directory {}: {}",
                parent.display(),
                err
            );
            return;
        }
    }

    if let Err(err) = std::fs::write(path, config_text) {
        log::error!("Failed to persist config to {}: {}", path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{load_config_file, persist_config_file};
    use crate::config::Config;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("songdeck-test-{}", uuid::Uuid::new_v4()))
            .join("songdeck.toml")
    }

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let path = scratch_path();
        let config = load_config_file(&path);
        assert_eq!(config, Config::default());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(path.parent().expect("scratch dir"));
    }

    #[test]
    fn test_persisted_values_round_trip_through_sanitize() {
        let path = scratch_path();
        let mut config = Config::default();
        config.ui.show_artist = false;
        config.engine.command_timeout_ms = 999_999;
        persist_config_file(&config, &path);

        let loaded = load_config_file(&path);
        assert!(!loaded.ui.show_artist);
        assert_eq!(loaded.engine.command_timeout_ms, 120_000);
        let _ = std::fs::remove_dir_all(path.parent().expect("scratch dir"));
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().expect("scratch dir")).expect("create scratch dir");
        std::fs::write(&path, "engine = [not valid").expect("write scratch config");
        assert_eq!(load_config_file(&path), Config::default());
        let _ = std::fs::remove_dir_all(path.parent().expect("scratch dir"));
    }
}
