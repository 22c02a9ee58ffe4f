//! Communication bridge between the playback backend and the terminal
//! frontend.
//!
//! This crate defines the plain data exchanged by the two halves:
//! - Stations and the persisted configuration.
//! - Control events produced by the keyboard and the OS.
//! - Status updates pushed by the backend for the frontend to render.
//!
//! Status updates travel over a bounded [`tokio::sync::mpsc`] channel wrapped
//! in [`StatusChannels`]; the backend never writes to the terminal itself.

pub mod config;
pub mod notification;
pub mod station;

use tokio::sync::mpsc::{self, Receiver, Sender};

pub use station::{Station, StationError};

/// Where a request to end the session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitSource {
    /// SIGINT/SIGTERM (or Ctrl+C outside raw mode).
    Signal,
    /// The quit key combination read from the keyboard.
    Keyboard,
}

/// Input events the coordinator turns into controller calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Pause if playing, resume live if paused.
    TogglePause,
    /// End the session.
    Exit(ExitSource),
}

/// Messages emitted by the backend to inform the frontend of state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Playback of a station is about to start.
    Tuning(Station),
    /// Interactive controls are available.
    ControlsReady,
    /// Keyboard input could not be enabled; only signals stop playback.
    KeyboardUnavailable(String),
    /// The stream was paused.
    Paused,
    /// The stream resumed from the live position.
    Resumed,
    /// Teardown has started.
    Stopping,
    /// Teardown finished; nothing else will be sent.
    Stopped,
    /// Generic message for failures and warnings during the session.
    Notification(notification::NotificationMessage),
}

/// Paired channel carrying [`StatusUpdate`]s from backend to frontend.
pub struct StatusChannels {
    /// Sender used by the backend.
    pub backend_tx: Sender<StatusUpdate>,
    /// Receiver used by the frontend.
    pub frontend_rx: Receiver<StatusUpdate>,
}

impl StatusChannels {
    /// Creates a new channel pair with the given buffer capacity.
    pub fn new(buffer: usize) -> Self {
        let (backend_tx, frontend_rx) = mpsc::channel(buffer);
        Self {
            backend_tx,
            frontend_rx,
        }
    }
}

impl Default for StatusChannels {
    fn default() -> Self {
        Self::new(64)
    }
}
