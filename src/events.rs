// src/events.rs

use crate::error::{StreamError, StreamResult};

/// Stream properties reported once, before any frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MediaMetadata {
    /// May be NaN or <= 0 when the container does not know its length.
    pub duration_estimate_seconds: f64,
    pub sample_rate: u32,
    pub channel_count: usize,
}

impl MediaMetadata {
    pub fn new(duration_estimate_seconds: f64, sample_rate: u32, channel_count: usize) -> Self {
        Self {
            duration_estimate_seconds,
            sample_rate,
            channel_count,
        }
    }

    pub fn has_known_duration(&self) -> bool {
        self.duration_estimate_seconds.is_finite() && self.duration_estimate_seconds > 0.0
    }
}

/// One block of decoded audio, planar f32.
///
/// Fields are private: a batch always has at least one channel and every
/// channel holds exactly `frame_count > 0` samples.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameBatch {
    channel_samples: Vec<Vec<f32>>,
    frame_count: usize,
    sample_rate: u32,
    write_offset: u64,
}

impl FrameBatch {
    pub fn new(channel_samples: Vec<Vec<f32>>, sample_rate: u32, write_offset: u64) -> StreamResult<Self> {
        let Some(first) = channel_samples.first() else {
            return Err(StreamError::UnsupportedFormat("frame batch has no channels".into()));
        };
        let frame_count = first.len();
        if frame_count == 0 {
            return Err(StreamError::UnsupportedFormat("frame batch holds no frames".into()));
        }
        if let Some((ch, bad)) = channel_samples
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != frame_count)
        {
            return Err(StreamError::UnsupportedFormat(format!(
                "channel {ch} holds {} samples, channel 0 holds {frame_count}",
                bad.len()
            )));
        }
        if sample_rate == 0 {
            return Err(StreamError::UnsupportedFormat("frame batch sample rate is 0".into()));
        }
        Ok(Self {
            channel_samples,
            frame_count,
            sample_rate,
            write_offset,
        })
    }

    pub fn channel_samples(&self) -> &[Vec<f32>] {
        &self.channel_samples
    }

    pub fn channel_count(&self) -> usize {
        self.channel_samples.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Global frame index of the first frame in this batch.
    pub fn write_offset(&self) -> u64 {
        self.write_offset
    }

    /// Split into two independently owned copies, one per consumer.
    pub fn fork(self) -> (FrameBatch, FrameBatch) {
        let copy = self.clone();
        (self, copy)
    }

    /// Arithmetic mean of all channels, per frame.
    pub fn mix_to_mono(&self) -> Vec<f32> {
        let channels = self.channel_samples.len();
        if channels == 1 {
            return self.channel_samples[0].clone();
        }
        let scale = 1.0 / channels as f32;
        let mut mono = vec![0.0f32; self.frame_count];
        for ch in &self.channel_samples {
            for (acc, &s) in mono.iter_mut().zip(ch.iter()) {
                *acc += s;
            }
        }
        for s in &mut mono {
            *s *= scale;
        }
        mono
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channel_samples
    }
}

/// Everything the decoder can say, in delivery order:
/// `Metadata`, then `Frame`*, then exactly one of `Done` / `Error`.
#[derive(Debug)]
pub enum DecodeEvent {
    Metadata(MediaMetadata),
    Frame(FrameBatch),
    Done,
    Error(String),
}

impl DecodeEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecodeEvent::Done | DecodeEvent::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_channels() {
        let err = FrameBatch::new(vec![vec![0.0; 4], vec![0.0; 3]], 48_000, 0).unwrap_err();
        assert!(matches!(err, StreamError::UnsupportedFormat(_)));
    }

    #[test]
    fn rejects_empty_channel_list() {
        assert!(FrameBatch::new(Vec::new(), 48_000, 0).is_err());
    }

    #[test]
    fn rejects_batch_without_frames() {
        let err = FrameBatch::new(vec![Vec::new(), Vec::new()], 48_000, 0).unwrap_err();
        assert!(matches!(err, StreamError::UnsupportedFormat(_)));
    }

    #[test]
    fn mono_mix_is_channel_mean() {
        let batch = FrameBatch::new(vec![vec![1.0, -1.0, 0.5], vec![0.0, -0.5, 0.5]], 44_100, 0).unwrap();
        assert_eq!(batch.mix_to_mono(), vec![0.5, -0.75, 0.5]);
    }

    #[test]
    fn fork_yields_equal_independent_batches() {
        let batch = FrameBatch::new(vec![vec![0.25; 8]], 44_100, 16).unwrap();
        let (a, b) = batch.fork();
        assert_eq!(a, b);
        let mut owned = a.into_channels();
        owned[0][0] = 1.0;
        assert_eq!(b.channel_samples()[0][0], 0.25);
    }

    #[test]
    fn unknown_duration_detection() {
        assert!(!MediaMetadata::new(f64::NAN, 48_000, 2).has_known_duration());
        assert!(!MediaMetadata::new(0.0, 48_000, 2).has_known_duration());
        assert!(MediaMetadata::new(10.0, 48_000, 2).has_known_duration());
    }
}
