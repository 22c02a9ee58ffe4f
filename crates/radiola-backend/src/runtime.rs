//! Backend runtime setup and orchestration.
//!
//! This module wires the real audio backend, the decoder command, and the
//! control sources together for one playback session.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use radiola_audio::{CpalBackend, DeviceError, PcmFormat};
use radiola_bridge::config::Config;
use radiola_bridge::{Station, StatusUpdate};
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use crate::controller::{PlaybackController, PlaybackError};
use crate::coordinator::{EventCoordinator, EventSources};
use crate::decoder::DecoderCommand;
use crate::keyboard::KeyboardListener;
use crate::signals::forward_termination_signals;

/// Errors that end a backend session before it could run.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The async runtime could not be created.
    #[error("failed to build the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    /// Playback could not be started.
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    /// Audio devices could not be listed.
    #[error(transparent)]
    Device(#[from] DeviceError),
    /// A blocking backend task panicked or was cancelled.
    #[error("backend task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Plays `station` until a termination signal or the quit key.
async fn play_station(
    config: Config,
    station: Station,
    tx: Sender<StatusUpdate>,
) -> Result<(), BackendError> {
    let format = PcmFormat {
        sample_rate: config.audio.sample_rate,
        channels: config.audio.channels,
    };
    let backend = CpalBackend::new(
        config.audio.output_device_id.clone(),
        config.audio.queue_milliseconds,
    );
    let decoder = DecoderCommand::from_config(&config.decoder, format);
    let controller = Arc::new(PlaybackController::new(backend, decoder));

    send(&tx, StatusUpdate::Tuning(station.clone())).await;
    let starter = controller.clone();
    let url = station.url.clone();
    tokio::task::spawn_blocking(move || starter.start(&url)).await??;

    let cancel = CancellationToken::new();
    let termination = forward_termination_signals(cancel.clone());
    let (keyboard, sources) = match KeyboardListener::spawn(cancel.clone()) {
        Ok((listener, events)) => {
            send(&tx, StatusUpdate::ControlsReady).await;
            let sources = EventSources {
                termination,
                keys: Some(events.keys),
                exit: Some(events.exit),
            };
            (Some(listener), sources)
        }
        Err(err) => {
            log::warn!("Keyboard input unavailable: {err}");
            send(&tx, StatusUpdate::KeyboardUnavailable(err.to_string())).await;
            (None, EventSources::signals_only(termination))
        }
    };

    let source = EventCoordinator::new(controller, tx).run(sources).await;
    log::info!("Session ended by {source:?}");

    cancel.cancel();
    if let Some(keyboard) = keyboard {
        tokio::task::spawn_blocking(move || keyboard.shutdown()).await?;
    }
    Ok(())
}

async fn send(tx: &Sender<StatusUpdate>, update: StatusUpdate) {
    if tx.send(update).await.is_err() {
        log::debug!("Status receiver is gone");
    }
}

/// Spawn the backend runtime and play `station` on it.
///
/// The returned handle resolves once playback has been torn down, or with
/// the error that prevented it from starting.
pub fn run(
    config: Config,
    station: Station,
    tx: Sender<StatusUpdate>,
) -> JoinHandle<Result<(), BackendError>> {
    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(play_station(config, station, tx))
    })
}

/// Descriptions of the output devices the default host offers, for picking
/// an `output_device_id`.
pub fn list_output_devices() -> Result<Vec<String>, BackendError> {
    Ok(radiola_audio::device::list_output_devices()?
        .iter()
        .map(ToString::to_string)
        .collect())
}
