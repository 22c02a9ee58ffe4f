use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::station::Station;

/// Verbosity of the application log. `RUST_LOG` still takes precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    /// Default value; the terminal is interactive while playing.
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration of the external decoder used to turn a stream URL into PCM.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Executable name looked up in `PATH` when `path` is not set.
    pub program: String,
    /// Explicit path to the decoder executable.
    pub path: Option<PathBuf>,
    /// Extra arguments inserted before the input URL.
    pub extra_args: Vec<String>,
    /// How long to wait for a killed decoder to exit before escalating, in
    /// milliseconds.
    pub kill_timeout_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            path: None,
            extra_args: Vec::new(),
            kill_timeout_ms: 2000,
        }
    }
}

/// Configuration for the audio output device and the PCM format.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Identifier of the preferred output device. The host default is used
    /// when absent.
    pub output_device_id: Option<String>,
    /// Sample rate requested from both the decoder and the device.
    pub sample_rate: u32,
    /// Channel count requested from both the decoder and the device.
    pub channels: u16,
    /// Amount of audio buffered in front of the device, in milliseconds.
    pub queue_milliseconds: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_device_id: None,
            sample_rate: 44_100,
            channels: 2,
            queue_milliseconds: 250,
        }
    }
}

/// Global application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Log verbosity when no `-v` flag is given.
    pub log_level: LogLevel,
    /// External decoder settings.
    pub decoder: DecoderConfig,
    /// Output device settings.
    pub audio: AudioConfig,
    /// Extra stations. A station reusing a built-in code replaces it.
    pub stations: Vec<Station>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            log_level = "info"

            [decoder]
            kill_timeout_ms = 500

            [[stations]]
            name = "local"
            url = "http://localhost:8000/live"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.decoder.program, "ffmpeg");
        assert_eq!(config.decoder.kill_timeout_ms, 500);
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.stations.len(), 1);
        assert_eq!(config.stations[0].description, "");
    }

    #[test]
    fn empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);
        assert!(config.audio.output_device_id.is_none());
        assert!(config.stations.is_empty());
    }
}
