//! External decoder detection, spawning and termination.

use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use radiola_audio::PcmFormat;
use radiola_bridge::config::DecoderConfig;

/// How often a killed decoder is polled for its exit status.
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("{program} is required but not installed; install it and try again")]
    NotFound { program: String },
    #[error("failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} started without a readable output stream")]
    MissingOutput { program: String },
}

/// How to invoke the decoder that turns a stream URL into raw PCM on stdout.
#[derive(Debug, Clone)]
pub struct DecoderCommand {
    program: String,
    path: Option<PathBuf>,
    extra_args: Vec<String>,
    format: PcmFormat,
    kill_timeout: Duration,
}

impl DecoderCommand {
    pub fn new(program: impl Into<String>, format: PcmFormat) -> Self {
        let defaults = DecoderConfig::default();
        Self {
            program: program.into(),
            path: None,
            extra_args: Vec::new(),
            format,
            kill_timeout: Duration::from_millis(defaults.kill_timeout_ms),
        }
    }

    pub fn from_config(config: &DecoderConfig, format: PcmFormat) -> Self {
        Self::new(config.program.clone(), format)
            .with_path(config.path.clone())
            .with_extra_args(config.extra_args.clone())
            .with_kill_timeout(Duration::from_millis(config.kill_timeout_ms))
    }

    /// Use this executable instead of searching `PATH`.
    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        self.path = path;
        self
    }

    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn with_kill_timeout(mut self, kill_timeout: Duration) -> Self {
        self.kill_timeout = kill_timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }

    /// Finds the decoder executable, either at the configured path or in
    /// `PATH`.
    pub fn locate(&self) -> Result<PathBuf, DecoderError> {
        let found = match &self.path {
            Some(path) => path.is_file().then(|| path.clone()),
            None => which::which(&self.program).ok(),
        };
        found.ok_or_else(|| DecoderError::NotFound {
            program: self.program.clone(),
        })
    }

    /// Arguments passed to the decoder for `url`: any configured extras, then
    /// `-i <url> -f s16le -ar <rate> -ac <channels> -`.
    pub fn args(&self, url: &str) -> Vec<String> {
        let mut args = self.extra_args.clone();
        args.extend([
            "-i".to_string(),
            url.to_string(),
            "-f".to_string(),
            self.format.decoder_format_name().to_string(),
            "-ar".to_string(),
            self.format.sample_rate.to_string(),
            "-ac".to_string(),
            self.format.channels.to_string(),
            "-".to_string(),
        ]);
        args
    }

    /// Starts decoding `url` with the executable returned by [`Self::locate`].
    pub fn spawn(&self, executable: &Path, url: &str) -> Result<DecodeProcess, DecoderError> {
        let args = self.args(url);
        log::info!("Spawning decoder: {executable:?} {args:?}");

        let mut command = Command::new(executable);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        // own process group, so escalation can reach anything it forks and
        // terminal signals are left to us
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|source| DecoderError::SpawnFailed {
            program: self.program.clone(),
            source,
        })?;

        let Some(output) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(DecoderError::MissingOutput {
                program: self.program.clone(),
            });
        };

        log::info!("Decoder started (pid: {})", child.id());
        Ok(DecodeProcess {
            child: Some(child),
            output: Some(output),
            kill_timeout: self.kill_timeout,
        })
    }
}

/// How a decoder process ended when it was terminated.
#[derive(Debug)]
pub enum Termination {
    /// The process was reaped with this status.
    Exited(ExitStatus),
    /// The process outlived every kill attempt and was handed to a background
    /// reaper thread.
    Detached,
}

/// A running decoder. It is killed and reaped when terminated or dropped.
#[derive(Debug)]
pub struct DecodeProcess {
    child: Option<Child>,
    output: Option<ChildStdout>,
    kill_timeout: Duration,
}

impl DecodeProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Takes the decoder's stdout. Only the first call returns it.
    pub fn take_output(&mut self) -> Option<ChildStdout> {
        self.output.take()
    }

    /// Returns the exit status if the decoder has already exited on its own.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        let child = self.child.as_mut()?;
        match child.try_wait() {
            Ok(status) => status,
            Err(err) => {
                log::error!("Failed to poll decoder (pid: {}): {err}", child.id());
                None
            }
        }
    }

    /// Kills the decoder together with everything it forked and waits for it
    /// to exit.
    ///
    /// The kill is forceful and reaches the whole process group before the
    /// decoder is reaped. The wait is bounded by the kill timeout; after it
    /// the group is killed and waited for once more. A process that survives
    /// both is reaped on a background thread instead of blocking the caller.
    pub fn terminate(mut self) -> Termination {
        self.shutdown().unwrap_or(Termination::Detached)
    }

    fn shutdown(&mut self) -> Option<Termination> {
        let mut child = self.child.take()?;
        drop(self.output.take());

        let pid = child.id();
        if let Err(err) = child.kill() {
            // already exited, the wait below reaps it
            log::debug!("kill() on decoder (pid: {pid}) failed: {err}");
        }
        // the group id stays reserved while the unreaped child or any of its
        // forks is alive
        kill_process_group(&mut child);

        if let Some(status) = wait_with_timeout(&mut child, self.kill_timeout) {
            log::info!("Decoder (pid: {pid}) exited with: {status}");
            return Some(Termination::Exited(status));
        }

        log::warn!(
            "Decoder (pid: {pid}) still running {:?} after kill, killing its process group again",
            self.kill_timeout
        );
        kill_process_group(&mut child);
        if let Some(status) = wait_with_timeout(&mut child, self.kill_timeout) {
            log::info!("Decoder (pid: {pid}) exited with: {status}");
            return Some(Termination::Exited(status));
        }

        log::error!("Decoder (pid: {pid}) survived every kill, reaping it in the background");
        let reaper = thread::Builder::new()
            .name("radiola-reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) => log::info!("Decoder (pid: {pid}) finally exited with: {status}"),
                Err(err) => log::error!("wait() on decoder (pid: {pid}) failed: {err}"),
            });
        if let Err(err) = reaper {
            log::error!("Failed to start reaper thread for decoder (pid: {pid}): {err}");
        }
        Some(Termination::Detached)
    }
}

impl Drop for DecodeProcess {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Some(status),
            Ok(None) => {}
            Err(err) => {
                log::error!("Failed to poll decoder (pid: {}): {err}", child.id());
                return None;
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(REAP_POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let group = Pid::from_raw(child.id() as i32);
    match killpg(group, Signal::SIGKILL) {
        Ok(()) => {}
        // every member has already exited
        Err(Errno::ESRCH) => log::debug!("Decoder group {group} is already empty"),
        Err(err) => log::error!("killpg() on decoder group {group} failed: {err}"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    if let Err(err) = child.kill() {
        log::error!("kill() on decoder (pid: {}) failed: {err}", child.id());
    }
}
