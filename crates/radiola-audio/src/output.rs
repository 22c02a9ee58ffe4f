//! `cpal` implementation of the output device model.
//!
//! The device stream lives on its own thread for the whole life of a
//! [`CpalContext`], so the context itself can be moved between threads on
//! every platform. Samples reach the device callback through a ring buffer
//! filled by one feeder thread per [`CpalPlayer`].

use std::{
    io::{ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use cpal::traits::{DeviceTrait, StreamTrait};
use parking_lot::Mutex;
use ringbuf::{
    HeapRb,
    traits::{Consumer, Producer, Split},
};

use crate::{
    AudioBackend, DeviceError, OutputContext, OutputPlayer, PcmFormat,
    device::{HostOutputDevice, select_output_device},
    pcm::S16LeAssembler,
};

type SampleProducer = ringbuf::HeapProd<i16>;
type SampleConsumer = ringbuf::HeapCons<i16>;

/// Bytes read from the PCM source per iteration of the feeder loop.
const READ_CHUNK_BYTES: usize = 4096;

/// How long the feeder waits before retrying when the queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(2);

/// State shared by the device callback, the context and its players.
struct SharedQueue {
    producer: Mutex<SampleProducer>,
    /// Whether the callback should pop samples or emit silence.
    playing: AtomicBool,
    /// Set to make the callback discard everything queued on its next run.
    clear: AtomicBool,
}

impl SharedQueue {
    fn halt(&self) {
        self.playing.store(false, Ordering::Release);
        self.clear.store(true, Ordering::Release);
    }
}

/// Opens output streams on the host's default device, or on a configured one.
#[derive(Debug, Clone)]
pub struct CpalBackend {
    device_id: Option<String>,
    queue_milliseconds: u32,
}

impl CpalBackend {
    pub fn new(device_id: Option<String>, queue_milliseconds: u32) -> Self {
        Self {
            device_id,
            queue_milliseconds,
        }
    }
}

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn open(&self, format: PcmFormat) -> Result<CpalContext, DeviceError> {
        CpalContext::open(self.device_id.clone(), format, self.queue_milliseconds)
    }
}

/// An open output stream. Dropping it releases the device.
pub struct CpalContext {
    queue: Arc<SharedQueue>,
    shutdown: Option<mpsc::Sender<()>>,
    audio_thread: Option<JoinHandle<()>>,
}

impl CpalContext {
    fn open(
        device_id: Option<String>,
        format: PcmFormat,
        queue_milliseconds: u32,
    ) -> Result<Self, DeviceError> {
        let capacity = format.samples_for(queue_milliseconds).max(READ_CHUNK_BYTES);
        let (producer, consumer) = HeapRb::<i16>::new(capacity).split();
        let queue = Arc::new(SharedQueue {
            producer: Mutex::new(producer),
            playing: AtomicBool::new(false),
            clear: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), DeviceError>>(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let thread_queue = queue.clone();
        let audio_thread = thread::Builder::new()
            .name("radiola-audio".to_string())
            .spawn(move || {
                let stream = match open_output_stream(
                    device_id.as_deref(),
                    format,
                    consumer,
                    thread_queue,
                ) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // an error here means the context is gone, which is a release too
                let _ = shutdown_rx.recv();
                drop(stream);
                log::debug!("Audio output stream released");
            })
            .map_err(|err| DeviceError::AudioThread(err.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                queue,
                shutdown: Some(shutdown_tx),
                audio_thread: Some(audio_thread),
            }),
            Ok(Err(err)) => {
                let _ = audio_thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = audio_thread.join();
                Err(DeviceError::AudioThread(
                    "audio thread exited before the device was ready".to_string(),
                ))
            }
        }
    }

    fn release(&mut self) {
        self.queue.halt();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(audio_thread) = self.audio_thread.take() {
            if audio_thread.join().is_err() {
                log::error!("Audio thread panicked while releasing the device");
            }
        }
    }
}

impl OutputContext for CpalContext {
    type Player = CpalPlayer;

    fn new_player(&mut self, source: Box<dyn Read + Send>) -> Result<CpalPlayer, DeviceError> {
        self.queue.halt();

        let cancelled = Arc::new(AtomicBool::new(false));
        let feeder_queue = self.queue.clone();
        let feeder_cancelled = cancelled.clone();
        // The feeder is never joined: it may sit in a blocking read until the
        // decoder's pipe closes, which happens after the player is paused.
        thread::Builder::new()
            .name("radiola-pcm-feeder".to_string())
            .spawn(move || feed_queue(source, &feeder_queue, &feeder_cancelled))
            .map_err(|err| DeviceError::AudioThread(err.to_string()))?;

        Ok(CpalPlayer {
            queue: self.queue.clone(),
            cancelled,
        })
    }

    fn suspend(mut self) {
        self.release();
    }
}

impl Drop for CpalContext {
    fn drop(&mut self) {
        self.release();
    }
}

/// Plays one PCM source through a [`CpalContext`].
pub struct CpalPlayer {
    queue: Arc<SharedQueue>,
    cancelled: Arc<AtomicBool>,
}

impl OutputPlayer for CpalPlayer {
    fn play(&mut self) {
        if !self.cancelled.load(Ordering::Acquire) {
            self.queue.playing.store(true, Ordering::Release);
        }
    }

    fn pause(&mut self) {
        self.cancelled.store(true, Ordering::Release);
        self.queue.halt();
    }
}

impl Drop for CpalPlayer {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Copies decoded samples from `source` into the shared queue until the
/// source ends, fails, or the owning player is cancelled.
fn feed_queue(mut source: Box<dyn Read + Send>, queue: &SharedQueue, cancelled: &AtomicBool) {
    let mut bytes = [0u8; READ_CHUNK_BYTES];
    let mut samples = Vec::with_capacity(READ_CHUNK_BYTES / PcmFormat::BYTES_PER_SAMPLE + 1);
    let mut assembler = S16LeAssembler::new();

    while !cancelled.load(Ordering::Acquire) {
        let read = match source.read(&mut bytes) {
            Ok(0) => {
                log::debug!("PCM source reached the end of its stream");
                return;
            }
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => {
                log::warn!("Failed to read from the PCM source: {err}");
                return;
            }
        };

        samples.clear();
        assembler.push_bytes(&bytes[..read], &mut samples);

        let mut pending = samples.as_slice();
        while !pending.is_empty() {
            if cancelled.load(Ordering::Acquire) {
                return;
            }
            let pushed = queue.producer.lock().push_slice(pending);
            pending = &pending[pushed..];
            if pushed == 0 {
                thread::sleep(QUEUE_FULL_BACKOFF);
            }
        }
    }
}

fn open_output_stream(
    device_id: Option<&str>,
    format: PcmFormat,
    consumer: SampleConsumer,
    queue: Arc<SharedQueue>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();
    let device = select_output_device(&host, device_id)?;
    let supported = device.output_config_for(format)?;
    log::info!(
        "Opening output device {device} with {:?} samples at {} Hz, {} channel(-s)",
        supported.sample_format(),
        format.sample_rate,
        format.channels,
    );

    let config: cpal::StreamConfig = supported.config();
    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, consumer, queue)?,
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, consumer, queue)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, consumer, queue)?,
        _ => {
            return Err(DeviceError::UnsupportedFormat {
                sample_rate: format.sample_rate,
                channels: format.channels,
            });
        }
    };

    stream.play()?;
    Ok(stream)
}

fn build_stream<T>(
    device: &HostOutputDevice,
    config: &cpal::StreamConfig,
    mut consumer: SampleConsumer,
    queue: Arc<SharedQueue>,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + cpal::FromSample<i16>,
{
    Ok(device.device().build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            if queue.clear.swap(false, Ordering::AcqRel) {
                while consumer.try_pop().is_some() {}
            }

            let playing = queue.playing.load(Ordering::Acquire);
            for sample in data.iter_mut() {
                let value = if playing {
                    consumer.try_pop().unwrap_or(0)
                } else {
                    0
                };
                *sample = T::from_sample(value);
            }
        },
        |error| {
            log::error!("An error occured while playing the output stream: {error}");
        },
        None,
    )?)
}
