// src/decoder/mod.rs

pub mod convert;

use anyhow::{anyhow, Context};
use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use crate::events::{DecodeEvent, FrameBatch, MediaMetadata};

/// Where the encoded bytes come from.
pub enum DecodeSource {
    File(PathBuf),
    /// Whole encoded file, moved into the decoder thread.
    Memory(Vec<u8>),
}

impl DecodeSource {
    fn open(self) -> anyhow::Result<(Box<dyn MediaSource>, Hint)> {
        let mut hint = Hint::new();
        match self {
            DecodeSource::File(path) => {
                if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                    hint.with_extension(ext);
                }
                let file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
                Ok((Box::new(file), hint))
            }
            DecodeSource::Memory(bytes) => Ok((Box::new(Cursor::new(bytes)), hint)),
        }
    }
}

/// Decodes one source on its own thread and reports progress as
/// `DecodeEvent`s, in order.
pub struct Decoder {
    source: Option<DecodeSource>,
    events: Sender<DecodeEvent>,
}

impl Decoder {
    pub fn new(source: DecodeSource, events: Sender<DecodeEvent>) -> Self {
        Self {
            source: Some(source),
            events,
        }
    }

    pub fn spawn(mut self) -> JoinHandle<()> {
        thread::spawn(move || match self.run() {
            Ok(()) => {
                let _ = self.events.send(DecodeEvent::Done);
            }
            Err(e) if e.is::<ReceiverGone>() => {
                debug!("event receiver dropped, decoder exiting");
            }
            Err(e) => {
                warn!("decoder thread error: {e:#}");
                let _ = self.events.send(DecodeEvent::Error(format!("{e:#}")));
            }
        })
    }

    fn emit(&self, event: DecodeEvent) -> anyhow::Result<()> {
        self.events.send(event).map_err(|_| anyhow::Error::new(ReceiverGone))
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let source = self
            .source
            .take()
            .ok_or_else(|| anyhow!("decoder already ran"))?;
        let (media, hint) = source.open()?;
        let mss = MediaSourceStream::new(media, Default::default());
        let probed = get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("no default audio track"))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params.sample_rate.context("missing sample rate")?;
        let channels = params
            .channels
            .context("missing channel layout")?
            .count();
        let duration = params
            .n_frames
            .map(|n| n as f64 / sample_rate as f64)
            .unwrap_or(f64::NAN);

        info!(sample_rate, channels, duration, "decoding");
        self.emit(DecodeEvent::Metadata(MediaMetadata::new(duration, sample_rate, channels)))?;

        let mut decoder = get_codecs().make(&params, &DecoderOptions::default())?;
        let mut sample_buf: Option<SampleBuffer<f32>> = None;
        let mut write_offset = 0u64;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::IoError(_)) => continue,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("skipping undecodable packet: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.capacity() * spec.channels.count();
            let needs_new = sample_buf.as_ref().is_none_or(|b| b.capacity() < needed);
            if needs_new {
                sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
            }
            let Some(buf) = sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let planar = convert::deinterleave(buf.samples(), spec.channels.count());
            let batch = FrameBatch::new(planar, spec.rate, write_offset)?;
            write_offset += batch.frame_count() as u64;
            self.emit(DecodeEvent::Frame(batch))?;
        }

        debug!(frames = write_offset, "decode finished");
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("event receiver dropped")]
struct ReceiverGone;

/// Start decoding `source` on a new thread.
pub fn spawn_decoder(source: DecodeSource) -> (JoinHandle<()>, Receiver<DecodeEvent>) {
    let (tx, rx) = channel();
    let handle = Decoder::new(source, tx).spawn();
    (handle, rx)
}
