// src/audio/mod.rs

pub mod reader;
pub mod resample;

pub use reader::SnapshotReader;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info};

use crate::buffer::StoreSnapshot;
use crate::error::{StreamError, StreamResult};
use crate::player::AudioSink;

/// Helper struct to hold output device info
pub struct OutputConfig {
    pub device: Device,
    pub sample_format: SampleFormat,
    pub output_channels: usize,
    pub output_sample_rate: u32,
}

/// Finds the default audio output device and its config.
pub fn setup_output_device() -> StreamResult<OutputConfig> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| StreamError::Output("no output device available".into()))?;
    let supported_config = device
        .default_output_config()
        .map_err(|e| StreamError::Output(e.to_string()))?;
    let sample_format = supported_config.sample_format();
    let config = supported_config.config();
    let output_channels = config.channels as usize;
    let output_sample_rate = config.sample_rate.0;

    info!(
        channels = output_channels,
        sample_rate = output_sample_rate,
        "output device ready"
    );

    Ok(OutputConfig {
        device,
        sample_format,
        output_channels,
        output_sample_rate,
    })
}

/// Sample for output channel `out_ch` of `out_channels`, taken from one
/// source frame with possibly different channel count.
#[inline]
pub fn map_channel(frame: &[f32], out_ch: usize, out_channels: usize) -> f32 {
    let src_channels = frame.len();
    if src_channels == 0 {
        return 0.0;
    }
    if out_channels == 1 && src_channels > 1 {
        let sum: f32 = frame.iter().sum();
        return sum / src_channels as f32;
    }
    if src_channels == 1 {
        return frame[0];
    }
    frame.get(out_ch).copied().unwrap_or(0.0)
}

/// Build CPAL output stream that plays `reader` until it runs dry, then
/// raises `ended` once and outputs silence.
pub fn build_stream<T>(
    device: &Device,
    config: StreamConfig,
    mut reader: SnapshotReader,
    ended: Arc<AtomicBool>,
    err_fn: fn(cpal::StreamError),
) -> StreamResult<Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + SizedSample,
{
    let out_channels = config.channels as usize;
    let mut finished = false;
    device
        .build_output_stream(
            &config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(out_channels) {
                    if !finished && !reader.next_frame() {
                        finished = true;
                        ended.store(true, Ordering::Relaxed);
                    }
                    if finished {
                        frame.fill(T::from_sample(0.0f32));
                        continue;
                    }
                    let src = reader.frame();
                    for (oc, out) in frame.iter_mut().enumerate() {
                        *out = T::from_sample(map_channel(src, oc, out_channels));
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| StreamError::Output(e.to_string()))
}

fn log_stream_error(err: cpal::StreamError) {
    error!("output stream error: {err}");
}

/// Plays store snapshots on the default output device. Each `start` opens a
/// fresh stream at the device rate, resampling when the store differs.
pub struct CpalSink {
    output: OutputConfig,
    stream: Option<Stream>,
    ended: Arc<AtomicBool>,
}

impl CpalSink {
    pub fn new() -> StreamResult<Self> {
        Ok(Self {
            output: setup_output_device()?,
            stream: None,
            ended: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn output(&self) -> &OutputConfig {
        &self.output
    }
}

impl AudioSink for CpalSink {
    fn start(&mut self, snapshot: Arc<StoreSnapshot>, from_seconds: f64) -> StreamResult<()> {
        self.halt();

        let device_rate = self.output.output_sample_rate;
        let config = StreamConfig {
            channels: self.output.output_channels as u16,
            sample_rate: SampleRate(device_rate),
            buffer_size: BufferSize::Default,
        };
        let resampler = resample::build_resampler(snapshot.sample_rate(), device_rate, snapshot.channel_count())?;
        if resampler.is_some() {
            debug!(from = snapshot.sample_rate(), to = device_rate, "resampling output");
        }
        let from_frame = snapshot.frame_at(from_seconds);
        let reader = SnapshotReader::new(snapshot, from_frame, resampler);
        let ended = Arc::new(AtomicBool::new(false));
        let device = &self.output.device;

        let stream = match self.output.sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(device, config, reader, ended.clone(), log_stream_error)?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(device, config, reader, ended.clone(), log_stream_error)?
            }
            SampleFormat::U16 => {
                build_stream::<u16>(device, config, reader, ended.clone(), log_stream_error)?
            }
            other => {
                return Err(StreamError::Output(format!("unsupported sample format: {other:?}")));
            }
        };
        stream.play().map_err(|e| StreamError::Output(e.to_string()))?;

        self.ended = ended;
        self.stream = Some(stream);
        Ok(())
    }

    fn halt(&mut self) {
        // Dropping the stream stops the callback.
        self.stream = None;
    }

    fn take_ended(&mut self) -> bool {
        self.ended.swap(false, Ordering::Relaxed)
    }
}
