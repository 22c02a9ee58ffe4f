//! Waits on every control source at once and drives the playback controller.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use radiola_audio::AudioBackend;
use radiola_bridge::notification::{NotificationMessage, NotificationType};
use radiola_bridge::{ControlEvent, ExitSource, StatusUpdate};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use crate::controller::{PlaybackController, PlaybackError};

/// How often the decoder is checked for having exited on its own.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(1);

/// Where control events come from. Keyboard sources are absent when the
/// terminal cannot be put in raw mode.
pub struct EventSources {
    pub termination: mpsc::Receiver<()>,
    pub keys: Option<mpsc::Receiver<ControlEvent>>,
    pub exit: Option<oneshot::Receiver<()>>,
}

impl EventSources {
    /// Signals only, no keyboard.
    pub fn signals_only(termination: mpsc::Receiver<()>) -> Self {
        Self {
            termination,
            keys: None,
            exit: None,
        }
    }
}

pub struct EventCoordinator<B: AudioBackend> {
    controller: Arc<PlaybackController<B>>,
    status: mpsc::Sender<StatusUpdate>,
    health_interval: Duration,
}

impl<B: AudioBackend + 'static> EventCoordinator<B> {
    pub fn new(controller: Arc<PlaybackController<B>>, status: mpsc::Sender<StatusUpdate>) -> Self {
        Self {
            controller,
            status,
            health_interval: DEFAULT_HEALTH_INTERVAL,
        }
    }

    pub fn with_health_interval(mut self, health_interval: Duration) -> Self {
        self.health_interval = health_interval;
        self
    }

    /// Handles events until a termination signal or the quit key arrives,
    /// then stops the controller and reports what ended the session.
    ///
    /// A toggle is fully handled before the next event is looked at. Errors
    /// from pause and unpause are reported and the loop keeps going.
    pub async fn run(self, sources: EventSources) -> ExitSource {
        let EventSources {
            termination,
            mut keys,
            mut exit,
        } = sources;
        let mut termination = Some(termination);

        let mut health = tokio::time::interval(self.health_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        health.tick().await;

        let source = loop {
            let event = tokio::select! {
                signal = recv_or_pending(&mut termination) => match signal {
                    Some(()) => ControlEvent::Exit(ExitSource::Signal),
                    None => {
                        log::warn!("Signal forwarding stopped");
                        termination = None;
                        continue;
                    }
                },
                request = exit_or_pending(&mut exit) => {
                    exit = None;
                    match request {
                        Ok(()) => ControlEvent::Exit(ExitSource::Keyboard),
                        Err(_) => continue,
                    }
                },
                key = recv_or_pending(&mut keys) => match key {
                    Some(event) => event,
                    None => {
                        log::info!("Keyboard input ended");
                        keys = None;
                        continue;
                    }
                },
                _ = health.tick() => {
                    self.check_stream().await;
                    continue;
                }
            };

            match event {
                ControlEvent::Exit(source) => break source,
                ControlEvent::TogglePause => self.toggle_pause().await,
            }
        };

        log::info!("Exit requested by {source:?}");
        self.shutdown().await;
        source
    }

    async fn toggle_pause(&self) {
        let controller = self.controller.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            if controller.is_paused() {
                (true, controller.unpause())
            } else {
                (false, controller.pause())
            }
        })
        .await;

        let update = match outcome {
            Ok((true, Ok(()))) => StatusUpdate::Resumed,
            Ok((false, Ok(()))) => StatusUpdate::Paused,
            Ok((true, Err(err))) => error_notification(format!("Error resuming: {err}")),
            Ok((false, Err(err))) => error_notification(format!("Error pausing: {err}")),
            Err(err) => {
                log::error!("Toggle task failed: {err}");
                error_notification(format!("Error toggling playback: {err}"))
            }
        };
        self.send(update).await;
    }

    async fn check_stream(&self) {
        let controller = self.controller.clone();
        match tokio::task::spawn_blocking(move || controller.poll_stream()).await {
            Ok(Ok(())) => {}
            Ok(Err(PlaybackError::StreamInterrupted(status))) => {
                self.send(StatusUpdate::Notification(NotificationMessage::new(
                    NotificationType::Warning,
                    format!("Stream interrupted ({status}). Press Space or P to reconnect."),
                )))
                .await;
            }
            Ok(Err(err)) => log::warn!("Stream check failed: {err}"),
            Err(err) => log::error!("Stream check task failed: {err}"),
        }
    }

    async fn shutdown(&self) {
        self.send(StatusUpdate::Stopping).await;
        let controller = self.controller.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || controller.stop()).await {
            log::error!("Stop task failed: {err}");
        }
        self.send(StatusUpdate::Stopped).await;
    }

    async fn send(&self, update: StatusUpdate) {
        if self.status.send(update).await.is_err() {
            log::debug!("Status receiver is gone");
        }
    }
}

fn error_notification(message: String) -> StatusUpdate {
    StatusUpdate::Notification(NotificationMessage::new(NotificationType::Error, message))
}

async fn recv_or_pending<T>(receiver: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match receiver {
        Some(receiver) => receiver.recv().await,
        None => pending().await,
    }
}

async fn exit_or_pending(
    exit: &mut Option<oneshot::Receiver<()>>,
) -> Result<(), oneshot::error::RecvError> {
    match exit {
        Some(exit) => exit.await,
        None => pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::atomic::Ordering;

    use tokio::task::JoinHandle;

    use super::*;
    use crate::controller::PlaybackState;
    use crate::test_support::{FakeBackend, failing_decoder, process_alive, sleeping_decoder};

    const URL: &str = "https://example/stream";

    struct Harness {
        controller: Arc<PlaybackController<FakeBackend>>,
        termination: mpsc::Sender<()>,
        keys: mpsc::Sender<ControlEvent>,
        exit: Option<oneshot::Sender<()>>,
        status: mpsc::Receiver<StatusUpdate>,
        task: JoinHandle<ExitSource>,
    }

    fn start(backend: FakeBackend, decoder: crate::decoder::DecoderCommand) -> Harness {
        start_with_interval(backend, decoder, Duration::from_secs(60))
    }

    fn start_with_interval(
        backend: FakeBackend,
        decoder: crate::decoder::DecoderCommand,
        health_interval: Duration,
    ) -> Harness {
        let controller = Arc::new(PlaybackController::new(backend, decoder));
        controller.start(URL).unwrap();

        let (termination_tx, termination_rx) = mpsc::channel(1);
        let (keys_tx, keys_rx) = mpsc::channel(16);
        let (exit_tx, exit_rx) = oneshot::channel();
        let (status_tx, status_rx) = mpsc::channel(16);

        let coordinator = EventCoordinator::new(controller.clone(), status_tx)
            .with_health_interval(health_interval);
        let task = tokio::spawn(coordinator.run(EventSources {
            termination: termination_rx,
            keys: Some(keys_rx),
            exit: Some(exit_rx),
        }));

        Harness {
            controller,
            termination: termination_tx,
            keys: keys_tx,
            exit: Some(exit_tx),
            status: status_rx,
            task,
        }
    }

    async fn next_status(status: &mut mpsc::Receiver<StatusUpdate>) -> StatusUpdate {
        tokio::time::timeout(Duration::from_secs(5), status.recv())
            .await
            .expect("status update timed out")
            .expect("status channel closed")
    }

    async fn expect_shutdown(harness: &mut Harness) {
        assert!(matches!(
            next_status(&mut harness.status).await,
            StatusUpdate::Stopping
        ));
        assert!(matches!(
            next_status(&mut harness.status).await,
            StatusUpdate::Stopped
        ));
    }

    #[tokio::test]
    async fn toggles_then_signal_stops_everything() {
        let backend = FakeBackend::new();
        let log = backend.log.clone();
        let mut harness = start(backend, sleeping_decoder());
        let first = harness.controller.decoder_pid().unwrap();

        harness.keys.send(ControlEvent::TogglePause).await.unwrap();
        assert!(matches!(
            next_status(&mut harness.status).await,
            StatusUpdate::Paused
        ));
        assert!(harness.controller.is_paused());
        assert!(!process_alive(first));

        harness.keys.send(ControlEvent::TogglePause).await.unwrap();
        assert!(matches!(
            next_status(&mut harness.status).await,
            StatusUpdate::Resumed
        ));
        let second = harness.controller.decoder_pid().unwrap();

        harness.termination.send(()).await.unwrap();
        expect_shutdown(&mut harness).await;
        assert_eq!(harness.task.await.unwrap(), ExitSource::Signal);

        assert_eq!(harness.controller.state(), PlaybackState::Stopped);
        assert!(!process_alive(second));
        assert_eq!(log.opens(), 1);
        assert_eq!(log.releases(), 1);
    }

    #[tokio::test]
    async fn quit_key_stops_everything() {
        let backend = FakeBackend::new();
        let log = backend.log.clone();
        let mut harness = start(backend, sleeping_decoder());
        let pid = harness.controller.decoder_pid().unwrap();

        harness.exit.take().unwrap().send(()).unwrap();
        expect_shutdown(&mut harness).await;
        assert_eq!(harness.task.await.unwrap(), ExitSource::Keyboard);
        assert!(!process_alive(pid));
        assert_eq!(log.releases(), 1);
    }

    #[tokio::test]
    async fn failed_resume_is_reported_and_loop_continues() {
        let backend = FakeBackend::new();
        let fail_players = backend.fail_players.clone();
        let mut harness = start(backend, sleeping_decoder());

        harness.keys.send(ControlEvent::TogglePause).await.unwrap();
        assert!(matches!(
            next_status(&mut harness.status).await,
            StatusUpdate::Paused
        ));

        fail_players.store(true, Ordering::SeqCst);
        harness.keys.send(ControlEvent::TogglePause).await.unwrap();
        match next_status(&mut harness.status).await {
            StatusUpdate::Notification(notification) => {
                assert_eq!(notification.notification_type, NotificationType::Error);
                assert!(notification.message.starts_with("Error resuming"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert!(harness.controller.is_paused());

        fail_players.store(false, Ordering::SeqCst);
        harness.keys.send(ControlEvent::TogglePause).await.unwrap();
        assert!(matches!(
            next_status(&mut harness.status).await,
            StatusUpdate::Resumed
        ));

        harness.termination.send(()).await.unwrap();
        expect_shutdown(&mut harness).await;
        assert_eq!(harness.task.await.unwrap(), ExitSource::Signal);
    }

    #[tokio::test]
    async fn decoder_exit_is_reported() {
        let mut harness =
            start_with_interval(FakeBackend::new(), failing_decoder(), Duration::from_millis(20));

        match next_status(&mut harness.status).await {
            StatusUpdate::Notification(notification) => {
                assert_eq!(notification.notification_type, NotificationType::Warning);
                assert!(notification.message.contains("Stream interrupted"));
            }
            other => panic!("unexpected update: {other:?}"),
        }
        assert_eq!(harness.controller.state(), PlaybackState::Paused);

        harness.termination.send(()).await.unwrap();
        expect_shutdown(&mut harness).await;
        harness.task.await.unwrap();
        assert_eq!(harness.controller.state(), PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn closed_keyboard_leaves_signals_working() {
        let mut harness = start(FakeBackend::new(), sleeping_decoder());

        drop(harness.exit.take());
        let (closed_keys, _) = mpsc::channel(1);
        drop(std::mem::replace(&mut harness.keys, closed_keys));

        harness.termination.send(()).await.unwrap();
        expect_shutdown(&mut harness).await;
        assert_eq!(harness.task.await.unwrap(), ExitSource::Signal);
    }

    #[tokio::test]
    async fn signals_only_mode() {
        let controller = Arc::new(PlaybackController::new(
            FakeBackend::new(),
            sleeping_decoder(),
        ));
        controller.start(URL).unwrap();
        let (termination_tx, termination_rx) = mpsc::channel(1);
        let (status_tx, mut status_rx) = mpsc::channel(16);

        let task = tokio::spawn(
            EventCoordinator::new(controller.clone(), status_tx)
                .run(EventSources::signals_only(termination_rx)),
        );
        termination_tx.send(()).await.unwrap();

        assert_eq!(task.await.unwrap(), ExitSource::Signal);
        assert!(matches!(
            next_status(&mut status_rx).await,
            StatusUpdate::Stopping
        ));
        assert!(matches!(
            next_status(&mut status_rx).await,
            StatusUpdate::Stopped
        ));
        assert_eq!(controller.state(), PlaybackState::Stopped);
    }
}
