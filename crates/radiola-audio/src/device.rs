use std::str::FromStr;

use cpal::{
    Device, Host, SampleFormat, SupportedStreamConfig,
    traits::{DeviceTrait, HostTrait},
};

use crate::PcmFormat;

/// Errors that can occur while opening or driving an audio output device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The host reports no default output device.
    #[error("no audio output device is available")]
    NoOutputDevice,
    /// A device was requested by id but the host does not know it.
    #[error("audio output device {0} was not found")]
    DeviceNotFound(String),
    /// Failed to enumerate audio output devices.
    #[error("failed to read device's information: {0}")]
    ReadDevices(#[from] cpal::DevicesError),
    /// Failed to parse the provided device ID. You should refer to CPAL's
    /// error for more information.
    #[error("failed to parse device id: {0}")]
    ReadDeviceId(#[from] cpal::DeviceIdError),
    /// Failed to query the output configurations supported by the device.
    #[error("failed to read supported output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),
    /// None of the device's configurations can play the requested format.
    #[error("device cannot play {channels} channel(-s) at {sample_rate} Hz")]
    UnsupportedFormat { sample_rate: u32, channels: u16 },
    /// The audio backend rejected the stream configuration.
    #[error("failed to build device output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    /// The stream was built but could not be started.
    #[error("failed to start device output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    /// The thread that owns the device stream failed or went away.
    #[error("audio thread failed: {0}")]
    AudioThread(String),
}

/// Represents an output audio device belonging to a specific host.
#[derive(Clone)]
pub struct HostOutputDevice {
    /// Unique identifier of the device within the host, when the backend
    /// exposes one.
    pub id: Option<String>,
    /// Human-readable device description.
    pub description: String,

    device: Device,
}

impl std::fmt::Display for HostOutputDevice {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(formatter, "{} ({id})", self.description),
            None => write!(formatter, "{}", self.description),
        }
    }
}

impl From<Device> for HostOutputDevice {
    fn from(device: Device) -> Self {
        let description = device
            .description()
            .map(|description| description.to_string())
            .unwrap_or_else(|_| "unknown device".to_string());
        Self {
            id: device.id().ok().map(|id| id.to_string()),
            description,
            device,
        }
    }
}

impl HostOutputDevice {
    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    /// Picks a stream configuration able to play `format`.
    ///
    /// Only configurations with the exact channel count whose sample rate range
    /// covers the requested rate are considered. Among those, `i16` output is
    /// preferred since it needs no conversion, then `f32`, then `u16`.
    pub fn output_config_for(&self, format: PcmFormat) -> Result<SupportedStreamConfig, DeviceError> {
        let mut best: Option<(u8, SupportedStreamConfig)> = None;
        for range in self.device.supported_output_configs()? {
            if range.channels() != format.channels
                || range.min_sample_rate() > format.sample_rate
                || range.max_sample_rate() < format.sample_rate
            {
                continue;
            }

            let Some(rank) = sample_format_rank(range.sample_format()) else {
                continue;
            };
            if best.as_ref().is_none_or(|(best_rank, _)| rank < *best_rank) {
                best = Some((rank, range.with_sample_rate(format.sample_rate)));
            }
        }

        best.map(|(_, config)| config)
            .ok_or(DeviceError::UnsupportedFormat {
                sample_rate: format.sample_rate,
                channels: format.channels,
            })
    }
}

fn sample_format_rank(format: SampleFormat) -> Option<u8> {
    match format {
        SampleFormat::I16 => Some(0),
        SampleFormat::F32 => Some(1),
        SampleFormat::U16 => Some(2),
        _ => None,
    }
}

/// Returns a list of all output audio devices available on the given host.
pub fn list_host_output_devices(host: &Host) -> Result<Vec<HostOutputDevice>, DeviceError> {
    Ok(host.output_devices()?.map(HostOutputDevice::from).collect())
}

/// Output devices of the platform's default host.
pub fn list_output_devices() -> Result<Vec<HostOutputDevice>, DeviceError> {
    list_host_output_devices(&cpal::default_host())
}

/// Retrieves a specific audio device by its unique identifier within a given
/// host.
///
/// Attempts to look up an input or output device using a string
/// representation of its [`cpal::DeviceId`].
pub fn get_device_by_id(host: &Host, device_id: &str) -> Result<Option<Device>, DeviceError> {
    let device_id = cpal::DeviceId::from_str(device_id)?;
    Ok(host.device_by_id(&device_id))
}

/// Resolves the device to play on: the one named by `device_id`, or the host
/// default when no id is configured.
pub fn select_output_device(
    host: &Host,
    device_id: Option<&str>,
) -> Result<HostOutputDevice, DeviceError> {
    match device_id {
        Some(id) => get_device_by_id(host, id)?
            .map(HostOutputDevice::from)
            .ok_or_else(|| DeviceError::DeviceNotFound(id.to_string())),
        None => host
            .default_output_device()
            .map(HostOutputDevice::from)
            .ok_or(DeviceError::NoOutputDevice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_integer_samples() {
        assert!(sample_format_rank(SampleFormat::I16) < sample_format_rank(SampleFormat::F32));
        assert!(sample_format_rank(SampleFormat::F32) < sample_format_rank(SampleFormat::U16));
        assert_eq!(sample_format_rank(SampleFormat::F64), None);
    }
}
