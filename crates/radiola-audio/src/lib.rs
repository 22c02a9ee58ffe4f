//! Audio output for raw PCM streams produced by an external decoder.
//!
//! This crate wraps the output side of `cpal` into a small device model that
//! fits live radio playback:
//! - An [`AudioBackend`] opens an [`OutputContext`] for a fixed [`PcmFormat`].
//!   The context owns the device stream and stays open across pause/resume.
//! - An [`OutputContext`] binds any byte source (usually a decoder's stdout)
//!   to a fresh [`OutputPlayer`].
//! - Players can be paused and played; pausing discards whatever is queued.
//!
//! # Real-time constraints
//! The device callback runs on a real-time thread. It only pops samples from a
//! lock-free ring buffer; reading the byte source happens on a feeder thread.

pub mod device;
pub mod output;
pub mod pcm;

use std::io::Read;

pub use device::DeviceError;
pub use output::{CpalBackend, CpalContext, CpalPlayer};

/// Sample rate requested from the decoder and the device, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Number of interleaved channels requested from the decoder and the device.
pub const DEFAULT_CHANNELS: u16 = 2;

/// How much audio, in milliseconds, is queued between the feeder thread and
/// the device callback.
pub const DEFAULT_QUEUE_MILLISECONDS: u32 = 250;

/// Raw PCM layout of the byte stream handed to a player.
///
/// Samples are always signed 16-bit little-endian and interleaved; only the
/// rate and channel count vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channels per frame.
    pub channels: u16,
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
        }
    }
}

impl PcmFormat {
    /// Size of one sample in bytes.
    pub const BYTES_PER_SAMPLE: usize = 2;

    /// The raw format name understood by ffmpeg's `-f` flag.
    pub fn decoder_format_name(&self) -> &'static str {
        "s16le"
    }

    /// Number of samples (not frames) that cover `milliseconds` of audio.
    pub fn samples_for(&self, milliseconds: u32) -> usize {
        ((self.sample_rate as u64 * self.channels as u64 * milliseconds as u64) / 1000) as usize
    }
}

/// Opens audio output sessions.
pub trait AudioBackend: Send + Sync {
    type Context: OutputContext;

    /// Opens the output device for `format` and blocks until it is ready to
    /// accept samples.
    fn open(&self, format: PcmFormat) -> Result<Self::Context, DeviceError>;
}

/// An open output session. It outlives the players created from it.
pub trait OutputContext: Send {
    type Player: OutputPlayer;

    /// Binds `source` to a new player. The player is created paused.
    fn new_player(&mut self, source: Box<dyn Read + Send>) -> Result<Self::Player, DeviceError>;

    /// Releases the device. Consumes the context so it can only happen once.
    fn suspend(self);
}

/// Plays one byte source through its parent context.
pub trait OutputPlayer: Send {
    fn play(&mut self);

    /// Stops output and drops queued audio. The player is not resumed
    /// afterwards; a new one is created instead.
    fn pause(&mut self);
}
