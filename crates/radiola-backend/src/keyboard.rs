//! Raw-mode keyboard listener producing control events.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use radiola_bridge::ControlEvent;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// How long a single keyboard poll waits before re-checking cancellation.
const KEY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Toggle events buffered between the listener and the coordinator.
const KEY_EVENT_BUFFER: usize = 16;

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    Exit,
}

/// Maps a key event to an action. Space and `p`/`P` toggle pause, Ctrl+C
/// exits, everything else is ignored.
pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c' | 'C') if control => Some(KeyAction::Exit),
        KeyCode::Char(' ' | 'p' | 'P') if !control => Some(KeyAction::TogglePause),
        _ => None,
    }
}

/// Puts the terminal in raw mode for as long as it is alive.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(err) = disable_raw_mode() {
            log::warn!("Failed to restore the terminal mode: {err}");
        }
    }
}

/// Event receivers handed to the coordinator.
pub struct KeyboardEvents {
    /// Toggle requests, in the order the keys were pressed.
    pub keys: mpsc::Receiver<ControlEvent>,
    /// Fires once when the quit key combination is pressed.
    pub exit: oneshot::Receiver<()>,
}

/// A background thread reading key presses in raw mode.
pub struct KeyboardListener {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
    _raw_mode: RawModeGuard,
}

impl KeyboardListener {
    /// Enables raw mode and starts reading keys. Fails when there is no
    /// usable terminal, in which case nothing is started.
    pub fn spawn(cancel: CancellationToken) -> io::Result<(Self, KeyboardEvents)> {
        let raw_mode = RawModeGuard::enable()?;
        let (key_tx, key_rx) = mpsc::channel(KEY_EVENT_BUFFER);
        let (exit_tx, exit_rx) = oneshot::channel();

        let thread_cancel = cancel.clone();
        let thread = thread::Builder::new()
            .name("radiola-keyboard".to_string())
            .spawn(move || read_keys(&thread_cancel, &key_tx, exit_tx))?;

        Ok((
            Self {
                cancel,
                thread: Some(thread),
                _raw_mode: raw_mode,
            },
            KeyboardEvents {
                keys: key_rx,
                exit: exit_rx,
            },
        ))
    }

    /// Stops the reader thread and restores the terminal. Blocks for at most
    /// one poll interval.
    pub fn shutdown(mut self) {
        self.stop_thread();
    }

    fn stop_thread(&mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Keyboard thread panicked");
            }
        }
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop_thread();
    }
}

fn read_keys(
    cancel: &CancellationToken,
    keys: &mpsc::Sender<ControlEvent>,
    exit: oneshot::Sender<()>,
) {
    while !cancel.is_cancelled() {
        match event::poll(KEY_POLL_INTERVAL) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                log::warn!("Failed to poll the keyboard: {err}");
                return;
            }
        }

        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(err) => {
                log::warn!("Failed to read from the keyboard: {err}");
                return;
            }
        };

        match map_key(&key) {
            Some(KeyAction::Exit) => {
                log::debug!("Quit key pressed");
                let _ = exit.send(());
                return;
            }
            Some(KeyAction::TogglePause) => {
                if keys.blocking_send(ControlEvent::TogglePause).is_err() {
                    return;
                }
            }
            None => {}
        }
    }
}
