// src/buffer/mod.rs

pub mod store;

pub use store::{SampleStore, StoreSnapshot};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{OverflowWarning, StreamError, StreamResult};
use crate::events::{FrameBatch, MediaMetadata};

/// Restart lead time used when the caller has no configured value.
pub const DEFAULT_PADDING_SECONDS: f64 = 0.5;

/// Capacity horizon for streams that do not report a duration.
pub const DEFAULT_FALLBACK_HORIZON_SECONDS: f64 = 300.0;

/// Largest store accepted, in frames (a little over 24 h at 48 kHz).
pub const MAX_CAPACITY_FRAMES: usize = u32::MAX as usize;

/// Frame capacity for `frames` (not yet rounded), bounded so the store is
/// always addressable.
fn capacity_for(frames: f64, channel_count: usize) -> StreamResult<usize> {
    let frames = frames.ceil();
    if !(frames.is_finite() && frames <= MAX_CAPACITY_FRAMES as f64) {
        return Err(StreamError::Configuration(format!(
            "store of {frames} frames exceeds the {MAX_CAPACITY_FRAMES} frame limit"
        )));
    }
    let capacity = frames as usize;
    capacity
        .checked_mul(channel_count)
        .and_then(|samples| samples.checked_mul(std::mem::size_of::<f32>()))
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .ok_or_else(|| StreamError::Configuration(format!("{capacity} frames x {channel_count} channels overflow")))?;
    Ok(capacity)
}

/// What the buffer needs to know about playback to judge underruns.
pub trait PlaybackProgress {
    fn is_playing(&self) -> bool;
    fn position_seconds(&self) -> f64;
}

/// Result of one append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendOutcome {
    pub applied_frames: usize,
    pub overflow: Option<OverflowWarning>,
}

/// Progressive fill of a fixed-capacity store while the decoder is still
/// running.
pub struct StreamingBuffer {
    store: SampleStore,
    available_seconds: f64,
    finalized: bool,
}

impl StreamingBuffer {
    /// Sizes the store from the metadata. Unknown durations fall back to
    /// `sample_rate * fallback_horizon_seconds` frames.
    pub fn allocate(metadata: &MediaMetadata, fallback_horizon_seconds: f64) -> StreamResult<Self> {
        if metadata.sample_rate == 0 {
            return Err(StreamError::Configuration("sample rate must be positive".into()));
        }
        if metadata.channel_count == 0 {
            return Err(StreamError::Configuration("channel count must be positive".into()));
        }
        if !(fallback_horizon_seconds.is_finite() && fallback_horizon_seconds > 0.0) {
            return Err(StreamError::Configuration(format!(
                "fallback horizon must be a positive number of seconds, got {fallback_horizon_seconds}"
            )));
        }

        let rate = metadata.sample_rate as f64;
        let capacity_frames = if metadata.has_known_duration() {
            capacity_for(metadata.duration_estimate_seconds * rate, metadata.channel_count)?
        } else {
            warn!(
                "duration unknown ({}), sizing store for {fallback_horizon_seconds}s",
                metadata.duration_estimate_seconds
            );
            capacity_for(fallback_horizon_seconds * rate, metadata.channel_count)?
        };

        info!(
            capacity_frames,
            sample_rate = metadata.sample_rate,
            channels = metadata.channel_count,
            "allocated sample store"
        );

        Ok(Self {
            store: SampleStore::with_capacity(metadata.channel_count, capacity_frames, metadata.sample_rate),
            available_seconds: 0.0,
            finalized: false,
        })
    }

    /// Copies a batch in at the write cursor. Frames past capacity are
    /// dropped and reported as an overflow warning.
    pub fn append(&mut self, batch: FrameBatch) -> StreamResult<AppendOutcome> {
        if batch.channel_count() != self.store.channel_count() {
            return Err(StreamError::UnsupportedFormat(format!(
                "batch has {} channels, store has {}",
                batch.channel_count(),
                self.store.channel_count()
            )));
        }
        if batch.sample_rate() != self.store.sample_rate() {
            return Err(StreamError::UnsupportedFormat(format!(
                "batch sample rate {} differs from stream rate {}",
                batch.sample_rate(),
                self.store.sample_rate()
            )));
        }

        if self.finalized {
            warn!(frames = batch.frame_count(), "append after finalize ignored");
            return Ok(AppendOutcome {
                applied_frames: 0,
                overflow: None,
            });
        }

        let requested = batch.frame_count();
        let offset = self.store.write_offset();
        let applied = requested.min(self.store.remaining_frames());
        if applied > 0 {
            self.store.write(batch.channel_samples(), applied);
        }
        self.available_seconds = self.store.write_offset() as f64 / self.store.sample_rate() as f64;

        let overflow = (applied < requested).then(|| {
            let w = OverflowWarning {
                offset,
                requested,
                applied,
                capacity: self.store.capacity_frames(),
            };
            warn!("{w}");
            w
        });

        debug!(
            offset,
            applied,
            available = self.available_seconds,
            "appended frames"
        );

        Ok(AppendOutcome {
            applied_frames: applied,
            overflow,
        })
    }

    /// True when playback is about to run past the decoded audio.
    pub fn should_restart_soon<P: PlaybackProgress + ?Sized>(&self, progress: &P, padding_seconds: f64) -> bool {
        if self.finalized || !progress.is_playing() {
            return false;
        }
        self.available_seconds - progress.position_seconds() < padding_seconds
    }

    /// No more frames will come; the playable length becomes the decoded
    /// length.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        let decoded = self.store.write_offset();
        let capacity = self.store.capacity_frames();
        if decoded < capacity {
            info!(decoded, capacity, "finalized short of capacity, trailing frames trimmed");
        } else {
            info!(decoded, "finalized");
        }
    }

    /// Fresh immutable view for the playback side. Shares already sealed
    /// chunks with earlier snapshots.
    pub fn snapshot(&self) -> Arc<StoreSnapshot> {
        let length = if self.finalized {
            self.store.write_offset()
        } else {
            self.store.capacity_frames()
        };
        Arc::new(self.store.snapshot(length))
    }

    /// Copy of exactly the decoded frames.
    pub fn trimmed(&self) -> Vec<Vec<f32>> {
        self.store.to_planar()
    }

    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    pub fn write_offset(&self) -> usize {
        self.store.write_offset()
    }

    pub fn capacity_frames(&self) -> usize {
        self.store.capacity_frames()
    }

    pub fn available_seconds(&self) -> f64 {
        self.available_seconds
    }

    pub fn sample_rate(&self) -> u32 {
        self.store.sample_rate()
    }

    pub fn channel_count(&self) -> usize {
        self.store.channel_count()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }
}
