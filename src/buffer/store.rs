// src/buffer/store.rs

use std::sync::Arc;

/// Frames per sealed chunk. Storage grows one chunk at a time and snapshots
/// share sealed chunks instead of copying them.
pub const CHUNK_FRAMES: usize = 16_384;

/// Planar samples for `CHUNK_FRAMES` frames (fewer for a snapshot's last chunk).
type Chunk = Arc<Vec<Vec<f32>>>;

fn empty_tail(channel_count: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channel_count).map(|_| Vec::with_capacity(frames)).collect()
}

/// Append-only planar sample storage with a fixed frame capacity. Only the
/// streaming buffer writes here.
pub struct SampleStore {
    sealed: Vec<Chunk>,
    tail: Vec<Vec<f32>>,
    channel_count: usize,
    capacity_frames: usize,
    sample_rate: u32,
    write_offset: usize,
}

impl SampleStore {
    /// Nothing beyond the first chunk is reserved up front.
    pub(crate) fn with_capacity(channel_count: usize, capacity_frames: usize, sample_rate: u32) -> Self {
        Self {
            sealed: Vec::new(),
            tail: empty_tail(channel_count, CHUNK_FRAMES.min(capacity_frames)),
            channel_count,
            capacity_frames,
            sample_rate,
            write_offset: 0,
        }
    }

    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    pub fn write_offset(&self) -> usize {
        self.write_offset
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn remaining_frames(&self) -> usize {
        self.capacity_frames - self.write_offset
    }

    fn tail_frames(&self) -> usize {
        self.tail.first().map_or(0, Vec::len)
    }

    /// Copies the first `frames` samples of each source channel at the write
    /// cursor. Caller guarantees `frames <= remaining_frames()` and one source
    /// per channel.
    pub(crate) fn write(&mut self, sources: &[Vec<f32>], frames: usize) {
        debug_assert!(frames <= self.remaining_frames());
        let mut done = 0;
        while done < frames {
            let n = (CHUNK_FRAMES - self.tail_frames()).min(frames - done);
            for (dst, src) in self.tail.iter_mut().zip(sources) {
                dst.extend_from_slice(&src[done..done + n]);
            }
            done += n;
            self.write_offset += n;
            if self.tail_frames() == CHUNK_FRAMES {
                self.seal_tail();
            }
        }
    }

    fn seal_tail(&mut self) {
        let next = CHUNK_FRAMES.min(self.remaining_frames());
        let full = std::mem::replace(&mut self.tail, empty_tail(self.channel_count, next));
        self.sealed.push(Arc::new(full));
    }

    /// View of everything written so far. Sealed chunks are shared; only the
    /// partial tail (under one chunk) is copied.
    pub(crate) fn snapshot(&self, length_frames: usize) -> StoreSnapshot {
        let mut chunks = self.sealed.clone();
        if self.tail_frames() > 0 {
            chunks.push(Arc::new(self.tail.clone()));
        }
        StoreSnapshot {
            chunks,
            channel_count: self.channel_count,
            decoded_frames: self.write_offset,
            length_frames,
            sample_rate: self.sample_rate,
        }
    }

    /// Contiguous copy of every decoded frame, per channel.
    pub(crate) fn to_planar(&self) -> Vec<Vec<f32>> {
        let mut planar = empty_tail(self.channel_count, self.write_offset);
        for chunk in self.sealed.iter().map(|c| c.as_slice()).chain([self.tail.as_slice()]) {
            for (dst, src) in planar.iter_mut().zip(chunk) {
                dst.extend_from_slice(src);
            }
        }
        planar
    }
}

/// Immutable view handed to the playback side.
///
/// Holds the decoded prefix; frames between the decoded end and
/// `length_frames` read as silence, the same as an unfilled preallocated
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    chunks: Vec<Chunk>,
    channel_count: usize,
    decoded_frames: usize,
    length_frames: usize,
    sample_rate: u32,
}

impl StoreSnapshot {
    /// Snapshot over owned planar samples. Channels are cut to the shortest.
    pub fn new(channels: Vec<Vec<f32>>, length_frames: usize, sample_rate: u32) -> Self {
        let decoded_frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        let chunks: Vec<Chunk> = (0..decoded_frames)
            .step_by(CHUNK_FRAMES)
            .map(|start| {
                let end = (start + CHUNK_FRAMES).min(decoded_frames);
                Arc::new(channels.iter().map(|c| c[start..end].to_vec()).collect::<Vec<_>>())
            })
            .collect();
        Self {
            chunks,
            channel_count: channels.len(),
            decoded_frames,
            length_frames,
            sample_rate,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playable length in frames, including any undecoded tail.
    pub fn length_frames(&self) -> usize {
        self.length_frames
    }

    pub fn decoded_frames(&self) -> usize {
        self.decoded_frames
    }

    pub fn duration_seconds(&self) -> f64 {
        self.length_frames as f64 / self.sample_rate as f64
    }

    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        if frame >= self.decoded_frames {
            return 0.0;
        }
        self.chunks
            .get(frame / CHUNK_FRAMES)
            .and_then(|chunk| chunk.get(channel))
            .and_then(|c| c.get(frame % CHUNK_FRAMES))
            .copied()
            .unwrap_or(0.0)
    }

    /// True when both views start with the same chunk allocation.
    pub fn shares_prefix_with(&self, other: &StoreSnapshot) -> bool {
        match (self.chunks.first(), other.chunks.first()) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Frame index for a position in seconds, clamped to the playable length.
    pub fn frame_at(&self, seconds: f64) -> usize {
        let frame = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        frame.min(self.length_frames)
    }
}
