//! In-memory audio backend and decoder commands for unit tests.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use radiola_audio::{AudioBackend, DeviceError, OutputContext, OutputPlayer, PcmFormat};

use crate::decoder::DecoderCommand;

/// Counts what the fake device was asked to do.
#[derive(Debug, Default)]
pub(crate) struct DeviceLog {
    pub opens: AtomicUsize,
    pub releases: AtomicUsize,
    pub players: AtomicUsize,
    pub plays: AtomicUsize,
    pub pauses: AtomicUsize,
}

impl DeviceLog {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn players(&self) -> usize {
        self.players.load(Ordering::SeqCst)
    }

    pub fn pauses(&self) -> usize {
        self.pauses.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeBackend {
    pub log: Arc<DeviceLog>,
    pub fail_open: bool,
    /// When set, every player created after this flag flips fails.
    pub fail_players: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_open() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }
}

impl AudioBackend for FakeBackend {
    type Context = FakeContext;

    fn open(&self, _format: PcmFormat) -> Result<FakeContext, DeviceError> {
        if self.fail_open {
            return Err(DeviceError::NoOutputDevice);
        }
        self.log.opens.fetch_add(1, Ordering::SeqCst);
        Ok(FakeContext {
            log: self.log.clone(),
            fail_players: self.fail_players.clone(),
        })
    }
}

pub(crate) struct FakeContext {
    log: Arc<DeviceLog>,
    fail_players: Arc<AtomicBool>,
}

impl OutputContext for FakeContext {
    type Player = FakePlayer;

    fn new_player(&mut self, source: Box<dyn Read + Send>) -> Result<FakePlayer, DeviceError> {
        if self.fail_players.load(Ordering::SeqCst) {
            return Err(DeviceError::AudioThread("player refused by test".to_string()));
        }
        self.log.players.fetch_add(1, Ordering::SeqCst);
        Ok(FakePlayer {
            log: self.log.clone(),
            _source: source,
        })
    }

    fn suspend(self) {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct FakePlayer {
    log: Arc<DeviceLog>,
    _source: Box<dyn Read + Send>,
}

impl OutputPlayer for FakePlayer {
    fn play(&mut self) {
        self.log.plays.fetch_add(1, Ordering::SeqCst);
    }

    fn pause(&mut self) {
        self.log.pauses.fetch_add(1, Ordering::SeqCst);
    }
}

/// A decoder that produces no audio and runs until killed. The contract's
/// arguments end up as the script's positional parameters.
pub(crate) fn sleeping_decoder() -> DecoderCommand {
    DecoderCommand::new("sh", PcmFormat::default())
        .with_extra_args(vec!["-c".to_string(), "exec sleep 30".to_string()])
        .with_kill_timeout(Duration::from_secs(2))
}

/// A decoder that exits with status 3 right away.
pub(crate) fn failing_decoder() -> DecoderCommand {
    DecoderCommand::new("sh", PcmFormat::default())
        .with_extra_args(vec!["-c".to_string(), "exit 3".to_string()])
}

/// A decoder that forks a helper holding its stdout, like a wrapper script
/// around the real decoder would.
pub(crate) fn forking_decoder() -> DecoderCommand {
    DecoderCommand::new("sh", PcmFormat::default())
        .with_extra_args(vec!["-c".to_string(), "sleep 30; true".to_string()])
        .with_kill_timeout(Duration::from_secs(2))
}

pub(crate) fn missing_decoder() -> DecoderCommand {
    DecoderCommand::new("radiola-no-such-decoder", PcmFormat::default())
}

#[cfg(unix)]
pub(crate) fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), None).is_ok()
}

/// Whether any process of the group led by `pgid` can still be signalled.
#[cfg(unix)]
pub(crate) fn process_group_alive(pgid: u32) -> bool {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    killpg(Pid::from_raw(pgid as i32), None).is_ok()
}

/// Polls `condition` for up to five seconds. Killed forks are reaped by
/// init, so their disappearance is not immediate.
pub(crate) fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
