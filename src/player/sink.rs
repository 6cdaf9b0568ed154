// src/player/sink.rs

use std::sync::Arc;

use crate::buffer::StoreSnapshot;
use crate::error::StreamResult;

/// Output side of the playback controller.
pub trait AudioSink {
    /// Begin emitting `snapshot` from `from_seconds`. Replaces any running
    /// output.
    fn start(&mut self, snapshot: Arc<StoreSnapshot>, from_seconds: f64) -> StreamResult<()>;

    /// Stop emitting. Safe to call when nothing is running.
    fn halt(&mut self);

    /// True once after output ran off the end of its snapshot.
    fn take_ended(&mut self) -> bool;
}

/// Discards audio. Used for headless sessions; never reports an end.
#[derive(Debug, Default)]
pub struct NullSink {
    running: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl AudioSink for NullSink {
    fn start(&mut self, _snapshot: Arc<StoreSnapshot>, _from_seconds: f64) -> StreamResult<()> {
        self.running = true;
        Ok(())
    }

    fn halt(&mut self) {
        self.running = false;
    }

    fn take_ended(&mut self) -> bool {
        false
    }
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn start(&mut self, snapshot: Arc<StoreSnapshot>, from_seconds: f64) -> StreamResult<()> {
        (**self).start(snapshot, from_seconds)
    }

    fn halt(&mut self) {
        (**self).halt()
    }

    fn take_ended(&mut self) -> bool {
        (**self).take_ended()
    }
}
