//! The playback state machine: one decoder process, one player bound to its
//! output, and one audio context that stays open across pause/resume.
//!
//! All transitions take the session lock for their full duration, including
//! the blocking wait for a killed decoder, so they never interleave.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use parking_lot::Mutex;
use radiola_audio::{AudioBackend, DeviceError, OutputContext, OutputPlayer};

use crate::decoder::{DecodeProcess, DecoderCommand, DecoderError};

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    /// The decoder executable could not be found.
    #[error(transparent)]
    PrereqMissing(DecoderError),
    /// The audio device could not be opened, or refused a new player.
    #[error("failed to initialize audio output: {0}")]
    DeviceInitFailed(#[from] DeviceError),
    /// The decoder could not be launched or its output attached.
    #[error(transparent)]
    ProcessSpawnFailed(DecoderError),
    /// `start` was called while a session is live.
    #[error("playback has already been started")]
    AlreadyStarted,
    /// The decoder exited on its own while playing.
    #[error("stream interrupted, decoder exited with {0}")]
    StreamInterrupted(ExitStatus),
}

impl From<DecoderError> for PlaybackError {
    fn from(err: DecoderError) -> Self {
        match err {
            DecoderError::NotFound { .. } => PlaybackError::PrereqMissing(err),
            _ => PlaybackError::ProcessSpawnFailed(err),
        }
    }
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// A decoder together with the player consuming its output. They are created
/// and torn down as one.
struct Pipeline<P> {
    decoder: DecodeProcess,
    player: P,
}

impl<P: OutputPlayer> Pipeline<P> {
    fn teardown(self) {
        let Pipeline {
            decoder,
            mut player,
        } = self;
        player.pause();
        decoder.terminate();
    }
}

struct Session<C: OutputContext> {
    source_url: Option<String>,
    executable: Option<PathBuf>,
    context: Option<C>,
    pipeline: Option<Pipeline<C::Player>>,
    paused: bool,
}

impl<C: OutputContext> Session<C> {
    fn empty() -> Self {
        Self {
            source_url: None,
            executable: None,
            context: None,
            pipeline: None,
            paused: false,
        }
    }
}

/// Owns the decoder process and the audio output for one live stream.
pub struct PlaybackController<B: AudioBackend> {
    backend: B,
    decoder: DecoderCommand,
    session: Mutex<Session<B::Context>>,
}

impl<B: AudioBackend> PlaybackController<B> {
    pub fn new(backend: B, decoder: DecoderCommand) -> Self {
        Self {
            backend,
            decoder,
            session: Mutex::new(Session::empty()),
        }
    }

    /// Opens the device and starts decoding `url`.
    ///
    /// The decoder is located before anything is opened, so a missing decoder
    /// leaves no device or process behind. Any later failure releases what
    /// was already acquired.
    pub fn start(&self, url: &str) -> Result<(), PlaybackError> {
        let mut session = self.session.lock();
        if session.context.is_some() {
            return Err(PlaybackError::AlreadyStarted);
        }

        let executable = self.decoder.locate()?;
        let mut context = self.backend.open(self.decoder.format())?;
        let pipeline = match self.launch(&executable, url, &mut context) {
            Ok(pipeline) => pipeline,
            Err(err) => {
                context.suspend();
                return Err(err);
            }
        };

        session.source_url = Some(url.to_string());
        session.executable = Some(executable);
        session.context = Some(context);
        session.pipeline = Some(pipeline);
        session.paused = false;
        log::info!("Playback started for {url}");
        Ok(())
    }

    /// Kills the decoder and stops the player, keeping the device open.
    /// Does nothing when already paused or when nothing is playing.
    pub fn pause(&self) -> Result<(), PlaybackError> {
        let mut session = self.session.lock();
        if session.paused {
            log::debug!("pause() ignored, already paused");
            return Ok(());
        }
        let Some(pipeline) = session.pipeline.take() else {
            log::debug!("pause() ignored, nothing is playing");
            return Ok(());
        };

        pipeline.teardown();
        session.paused = true;
        log::info!("Playback paused");
        Ok(())
    }

    /// Restarts decoding from the live position on the already open device.
    /// Does nothing unless paused; on failure the controller stays paused.
    pub fn unpause(&self) -> Result<(), PlaybackError> {
        let mut guard = self.session.lock();
        let session = &mut *guard;
        if !session.paused {
            log::debug!("unpause() ignored, not paused");
            return Ok(());
        }

        let (Some(url), Some(executable), Some(context)) = (
            session.source_url.as_deref(),
            session.executable.as_deref(),
            session.context.as_mut(),
        ) else {
            log::debug!("unpause() ignored, no session");
            return Ok(());
        };

        let pipeline = self.launch(executable, url, context)?;
        session.pipeline = Some(pipeline);
        session.paused = false;
        log::info!("Playback resumed");
        Ok(())
    }

    /// Tears everything down: player, then decoder, then device. Safe to call
    /// any number of times, including on a controller that never started.
    pub fn stop(&self) {
        let mut session = self.session.lock();
        if let Some(pipeline) = session.pipeline.take() {
            pipeline.teardown();
        }
        if let Some(context) = session.context.take() {
            context.suspend();
            log::info!("Audio output released");
        }
        *session = Session::empty();
    }

    /// Checks whether the decoder exited on its own while playing.
    ///
    /// If it did, the player is torn down and the controller moves to
    /// [`PlaybackState::Paused`] with the device kept open, so that
    /// [`Self::unpause`] reconnects to the stream.
    pub fn poll_stream(&self) -> Result<(), PlaybackError> {
        let mut session = self.session.lock();
        let Some(pipeline) = session.pipeline.as_mut() else {
            return Ok(());
        };
        let Some(status) = pipeline.decoder.try_exit_status() else {
            return Ok(());
        };

        log::warn!("Decoder exited while playing: {status}");
        if let Some(pipeline) = session.pipeline.take() {
            pipeline.teardown();
        }
        session.paused = true;
        Err(PlaybackError::StreamInterrupted(status))
    }

    pub fn is_paused(&self) -> bool {
        self.session.lock().paused
    }

    pub fn state(&self) -> PlaybackState {
        let session = self.session.lock();
        match (&session.context, session.paused) {
            (None, _) => PlaybackState::Stopped,
            (Some(_), true) => PlaybackState::Paused,
            (Some(_), false) => PlaybackState::Playing,
        }
    }

    /// Process id of the running decoder, if any.
    pub fn decoder_pid(&self) -> Option<u32> {
        let session = self.session.lock();
        session.pipeline.as_ref().and_then(|pipeline| pipeline.decoder.id())
    }

    fn launch(
        &self,
        executable: &Path,
        url: &str,
        context: &mut B::Context,
    ) -> Result<Pipeline<<B::Context as OutputContext>::Player>, PlaybackError> {
        let mut decoder = self.decoder.spawn(executable, url)?;
        let Some(output) = decoder.take_output() else {
            return Err(PlaybackError::ProcessSpawnFailed(DecoderError::MissingOutput {
                program: self.decoder.program().to_string(),
            }));
        };

        // on error the decoder is dropped here, which kills and reaps it
        let mut player = context.new_player(Box::new(output))?;
        player.play();
        Ok(Pipeline { decoder, player })
    }
}

impl<B: AudioBackend> Drop for PlaybackController<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
