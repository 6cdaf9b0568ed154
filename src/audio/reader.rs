// src/audio/reader.rs

use std::sync::Arc;

use rubato::{Resampler, SincFixedIn};
use tracing::error;

use crate::buffer::StoreSnapshot;

struct Resampling {
    resampler: SincFixedIn<f32>,
    input: Vec<Vec<f32>>,
    output: Vec<Vec<f32>>,
    ready: usize,
    pos: usize,
}

/// Pulls frames out of a snapshot at the device rate, one at a time, for the
/// output callback. Buffers are allocated up front.
pub struct SnapshotReader {
    snapshot: Arc<StoreSnapshot>,
    cursor: usize,
    frame: Vec<f32>,
    resampling: Option<Resampling>,
}

impl SnapshotReader {
    pub fn new(snapshot: Arc<StoreSnapshot>, from_frame: usize, resampler: Option<SincFixedIn<f32>>) -> Self {
        let resampling = resampler.map(|resampler| Resampling {
            input: resampler.input_buffer_allocate(true),
            output: resampler.output_buffer_allocate(true),
            resampler,
            ready: 0,
            pos: 0,
        });
        Self {
            frame: vec![0.0; snapshot.channel_count()],
            snapshot,
            cursor: from_frame,
            resampling,
        }
    }

    /// Samples of the current frame, one per source channel.
    pub fn frame(&self) -> &[f32] {
        &self.frame
    }

    /// Next source frame in snapshot frames (before resampling).
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Advance one output frame. False once the snapshot is exhausted.
    pub fn next_frame(&mut self) -> bool {
        let total = self.snapshot.length_frames();
        let Some(rs) = self.resampling.as_mut() else {
            if self.cursor >= total {
                return false;
            }
            for (ch, s) in self.frame.iter_mut().enumerate() {
                *s = self.snapshot.sample(ch, self.cursor);
            }
            self.cursor += 1;
            return true;
        };

        while rs.pos >= rs.ready {
            if self.cursor >= total {
                return false;
            }
            let need = rs.resampler.input_frames_next();
            for (ch, buf) in rs.input.iter_mut().enumerate() {
                buf.resize(need, 0.0);
                for (i, s) in buf.iter_mut().enumerate() {
                    // Past the end reads as silence, which pads the last block.
                    *s = self.snapshot.sample(ch, self.cursor + i);
                }
            }
            self.cursor += need;
            match rs.resampler.process_into_buffer(&rs.input, &mut rs.output, None) {
                Ok((_, produced)) => {
                    rs.ready = produced;
                    rs.pos = 0;
                }
                Err(e) => {
                    error!("resampling failed: {e}");
                    return false;
                }
            }
        }

        for (ch, s) in self.frame.iter_mut().enumerate() {
            *s = rs.output[ch][rs.pos];
        }
        rs.pos += 1;
        true
    }
}
