use std::fs::{OpenOptions, create_dir_all, read_to_string};
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use radiola_bridge::config::Config;

/// Errors that can occur while loading or resolving application configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to determine the user's configuration directory. This usually
    /// occurs when required environment variables are missing (e.g., `$HOME`
    /// on Unix or `%APPDATA%` on Windows).
    #[error("failed to obtain user's directories")]
    DirectoriesNotFound,
    /// An I/O error occurred while reading or writing the configuration file.
    #[error("failed to read config: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid TOML or does not match the
    /// expected structure.
    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] toml::de::Error),
    /// Failed to serialize the default configuration to TOML.
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
}

/// Location of `config.toml` in the user's configuration directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    ProjectDirs::from("dev", "radiola", "radiola")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .ok_or(ConfigError::DirectoriesNotFound)
}

/// Loads the configuration from `config_path`. When the file does not exist
/// it is created with the default configuration, which is then returned.
pub fn load_config_from(config_path: &Path) -> Result<Config, ConfigError> {
    if config_path.exists() {
        let contents = read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)?;
        return Ok(config);
    }

    let config = Config::default();
    if let Some(parent) = config_path.parent() {
        create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(&config)?;
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(config_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use radiola_bridge::config::LogLevel;

    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.decoder.program, "ffmpeg");
        assert!(path.exists());

        // the written file loads back to the same values
        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded.decoder.kill_timeout_ms, config.decoder.kill_timeout_ms);
        assert_eq!(reloaded.audio.sample_rate, config.audio.sample_rate);
    }

    #[test]
    fn existing_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "log_level = \"debug\"\n[audio]\noutput_device_id = \"alsa:hw:1\"\n",
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.audio.output_device_id.as_deref(), Some("alsa:hw:1"));
        assert_eq!(config.audio.channels, 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "decoder = 12").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::DeserializeError(_))
        ));
    }
}
