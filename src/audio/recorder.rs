//! Microphone capture using CPAL, encoded to WAV in memory with hound.
//!
//! The CPAL stream lives on a dedicated thread because `cpal::Stream` is not
//! `Send`. Samples are collected as i16 and only encoded when the recording is
//! finished, so the encoded size is known exactly at stop time.

use std::io::Cursor;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use hound::{WavSpec, WavWriter};

/// How long `open` waits for the capture thread to report the stream state.
const OPEN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised by a microphone implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MicrophoneError {
    #[error("No audio input device found")]
    NoInputDevice,
    #[error("Microphone access denied: {0}")]
    AccessDenied(String),
    #[error("No supported audio configuration")]
    NoSupportedConfig,
    #[error("Failed to create audio stream: {0}")]
    StreamCreationFailed(String),
    #[error("Failed to encode audio: {0}")]
    EncodeFailed(String),
}

/// PCM captured during one recording, before encoding.
#[derive(Debug, Clone, Default)]
pub struct CapturedPcm {
    pub samples: Vec<i16>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl CapturedPcm {
    pub fn duration_ms(&self) -> u64 {
        if self.channels == 0 || self.sample_rate == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Source of audio for a recording session.
pub trait Microphone: Send + Sync + 'static {
    /// Acquire the device and begin capturing.
    fn open(&self) -> Result<Box<dyn ActiveCapture>, MicrophoneError>;
}

/// A running capture. The device is held until `finish` returns.
pub trait ActiveCapture: Send {
    /// Stop capturing, release the device and return the encoded WAV.
    /// The device is released even when encoding fails.
    fn finish(self: Box<Self>) -> Result<Vec<u8>, MicrophoneError>;
}

/// Encode PCM samples as a 16-bit WAV file in memory.
pub fn encode_wav(pcm: &CapturedPcm) -> Result<Vec<u8>, MicrophoneError> {
    let spec = WavSpec {
        channels: pcm.channels.max(1),
        sample_rate: pcm.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| MicrophoneError::EncodeFailed(e.to_string()))?;
        for &sample in &pcm.samples {
            writer
                .write_sample(sample)
                .map_err(|e| MicrophoneError::EncodeFailed(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| MicrophoneError::EncodeFailed(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

/// Default input device via CPAL.
#[derive(Debug, Default)]
pub struct CpalMicrophone;

impl CpalMicrophone {
    pub fn new() -> Self {
        Self
    }
}

impl Microphone for CpalMicrophone {
    fn open(&self) -> Result<Box<dyn ActiveCapture>, MicrophoneError> {
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(u16, u32), MicrophoneError>>(1);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let samples = Arc::new(Mutex::new(Vec::<i16>::new()));

        let thread_samples = samples.clone();
        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || capture_thread(thread_samples, ready_tx, stop_rx))
            .map_err(|e| MicrophoneError::StreamCreationFailed(e.to_string()))?;

        let (channels, sample_rate) = match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(format)) => format,
            Ok(Err(e)) => {
                let _ = thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = stop_tx.send(());
                return Err(MicrophoneError::StreamCreationFailed(
                    "capture thread did not start".to_string(),
                ));
            }
        };

        log::info!(
            "Microphone open: {} Hz, {} channel(s)",
            sample_rate,
            channels
        );

        Ok(Box::new(CpalCapture {
            samples,
            channels,
            sample_rate,
            stop_tx,
            thread: Some(thread),
        }))
    }
}

struct CpalCapture {
    samples: Arc<Mutex<Vec<i16>>>,
    channels: u16,
    sample_rate: u32,
    stop_tx: std_mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CpalCapture {
    fn release(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Capture thread panicked");
            }
        }
    }
}

impl ActiveCapture for CpalCapture {
    fn finish(mut self: Box<Self>) -> Result<Vec<u8>, MicrophoneError> {
        self.release();

        let samples = match self.samples.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        let pcm = CapturedPcm {
            samples,
            channels: self.channels,
            sample_rate: self.sample_rate,
        };
        log::info!("Recording finished: {} ms of audio", pcm.duration_ms());
        encode_wav(&pcm)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.release();
    }
}

fn capture_thread(
    samples: Arc<Mutex<Vec<i16>>>,
    ready_tx: std_mpsc::SyncSender<Result<(u16, u32), MicrophoneError>>,
    stop_rx: std_mpsc::Receiver<()>,
) {
    let stream = match build_stream(samples) {
        Ok((stream, channels, sample_rate)) => match stream.play() {
            Ok(()) => {
                let _ = ready_tx.send(Ok((channels, sample_rate)));
                stream
            }
            Err(e) => {
                let _ = ready_tx.send(Err(MicrophoneError::AccessDenied(e.to_string())));
                return;
            }
        },
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Block until stop is requested or the owner is gone.
    let _ = stop_rx.recv();
    drop(stream);
    log::debug!("Microphone released");
}

fn build_stream(
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<(cpal::Stream, u16, u32), MicrophoneError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(MicrophoneError::NoInputDevice)?;

    log::info!("Using audio input device: {:?}", device.name());

    let supported = device
        .default_input_config()
        .map_err(|_| MicrophoneError::NoSupportedConfig)?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let channels = config.channels;
    let sample_rate = config.sample_rate.0;

    let stream = match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(&device, &config, samples),
        SampleFormat::U16 => build_stream_typed::<u16>(&device, &config, samples),
        SampleFormat::F32 => build_stream_typed::<f32>(&device, &config, samples),
        _ => Err(MicrophoneError::NoSupportedConfig),
    }?;

    Ok((stream, channels, sample_rate))
}

fn build_stream_typed<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    samples: Arc<Mutex<Vec<i16>>>,
) -> Result<cpal::Stream, MicrophoneError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let err_fn = |err| log::error!("Audio stream error: {}", err);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buffer) = samples.lock() {
                    buffer.extend(data.iter().map(|&s| sample_to_i16(s)));
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                MicrophoneError::AccessDenied("input device not available".to_string())
            }
            other => MicrophoneError::StreamCreationFailed(other.to_string()),
        })
}

/// Convert any sample type to i16 for WAV writing.
fn sample_to_i16<T>(sample: T) -> i16
where
    T: cpal::Sample,
    f32: cpal::FromSample<T>,
{
    let f32_sample: f32 = sample.to_sample::<f32>();
    let clamped = f32_sample.clamp(-1.0, 1.0);
    (clamped * i16::MAX as f32) as i16
}
