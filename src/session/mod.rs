// src/session/mod.rs

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::buffer::{PlaybackProgress, StreamingBuffer};
use crate::config::StreamConfig;
use crate::error::{OverflowWarning, StreamError, StreamResult};
use crate::events::{DecodeEvent, FrameBatch, MediaMetadata};
use crate::player::{AudioSink, Clock, PlaybackController, PlaybackState};
use crate::waveform::{Renderer, WaveformAggregator};

#[derive(Clone, Debug, PartialEq)]
pub enum SessionStatus {
    /// No metadata yet.
    Waiting,
    Streaming,
    /// Decoder finished and the store is finalized.
    Complete,
    Failed(StreamError),
}

/// One decode session: routes decoder events into the playback buffer, the
/// player and the live waveform.
pub struct StreamSession<S: AudioSink, C: Clock, R: Renderer> {
    config: StreamConfig,
    controller: PlaybackController<S, C>,
    renderer: R,
    buffer: Option<StreamingBuffer>,
    waveform: Option<WaveformAggregator>,
    metadata: Option<MediaMetadata>,
    status: SessionStatus,
    overflows: Vec<OverflowWarning>,
    restarts: usize,
    // Last output failure, cleared by the next successful start.
    output_error: Option<StreamError>,
    // Decoded frames held by the controller's current snapshot.
    snapshot_frames: usize,
}

impl<S: AudioSink, C: Clock, R: Renderer> StreamSession<S, C, R> {
    pub fn new(config: StreamConfig, sink: S, clock: C, renderer: R) -> StreamResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            controller: PlaybackController::new(sink, clock),
            renderer,
            buffer: None,
            waveform: None,
            metadata: None,
            status: SessionStatus::Waiting,
            overflows: Vec::new(),
            restarts: 0,
            output_error: None,
            snapshot_frames: 0,
        })
    }

    /// Apply one decoder event. Fatal errors are returned and also recorded
    /// in the status; every event after a failure is ignored.
    pub fn handle_event(&mut self, event: DecodeEvent) -> StreamResult<()> {
        if let SessionStatus::Failed(_) = self.status {
            debug!("session failed, ignoring event");
            return Ok(());
        }

        let result = match event {
            DecodeEvent::Metadata(metadata) => self.on_metadata(metadata),
            DecodeEvent::Frame(batch) => self.on_frame(batch),
            DecodeEvent::Done => self.on_done(),
            DecodeEvent::Error(message) => Err(StreamError::Decode(message)),
        };

        if let Err(e) = &result {
            self.fail(e.clone());
        }
        result
    }

    fn on_metadata(&mut self, metadata: MediaMetadata) -> StreamResult<()> {
        if self.status != SessionStatus::Waiting {
            return Err(StreamError::Decode("metadata received twice".into()));
        }

        let buffer = StreamingBuffer::allocate(&metadata, self.config.fallback_horizon_seconds)?;
        let samples_per_pixel = self.config.samples_per_pixel_for(buffer.capacity_frames());
        let waveform = WaveformAggregator::init(
            self.config.pixel_width,
            samples_per_pixel,
            self.config.device_pixel_ratio,
        )?;

        self.renderer.init_surface(waveform.surface_spec(self.config.pixel_height));
        self.controller.load(buffer.snapshot());
        self.snapshot_frames = 0;

        info!(
            sample_rate = metadata.sample_rate,
            channels = metadata.channel_count,
            samples_per_pixel,
            "stream session started"
        );
        self.buffer = Some(buffer);
        self.waveform = Some(waveform);
        self.metadata = Some(metadata);
        self.status = SessionStatus::Streaming;
        Ok(())
    }

    fn on_frame(&mut self, batch: FrameBatch) -> StreamResult<()> {
        let (Some(buffer), Some(waveform)) = (self.buffer.as_mut(), self.waveform.as_mut()) else {
            return Err(StreamError::Decode("frame batch before metadata".into()));
        };
        if self.status == SessionStatus::Complete {
            warn!(frames = batch.frame_count(), "frame batch after completion dropped");
            return Ok(());
        }

        let offset = batch.write_offset();
        let (for_store, for_waveform) = batch.fork();

        // Appending first rejects mismatched batches before they reach the peaks.
        let outcome = buffer.append(for_store)?;
        if let Some(overflow) = outcome.overflow {
            self.overflows.push(overflow);
        }

        waveform.ingest(for_waveform, offset);
        let now_ms = self.controller.clock().now_millis();
        waveform.maybe_redraw(now_ms, self.config.min_redraw_interval_ms, &mut self.renderer);

        self.restart_if_starved();
        Ok(())
    }

    fn on_done(&mut self) -> StreamResult<()> {
        let (Some(buffer), Some(waveform)) = (self.buffer.as_mut(), self.waveform.as_mut()) else {
            return Err(StreamError::Decode("stream ended before metadata".into()));
        };

        buffer.finalize();
        let snapshot = buffer.snapshot();
        let decoded = buffer.write_offset();

        if self.controller.is_playing() {
            match self.controller.restart(snapshot) {
                Ok(()) => {
                    self.restarts += 1;
                    self.output_error = None;
                }
                Err(e) => {
                    error!("restart after completion failed: {e}");
                    self.output_error = Some(e);
                }
            }
        } else {
            self.controller.swap_store(snapshot);
        }
        self.snapshot_frames = decoded;

        let now_ms = self.controller.clock().now_millis();
        waveform.force_redraw(now_ms, &mut self.renderer);

        info!(frames = decoded, restarts = self.restarts, "stream complete");
        self.status = SessionStatus::Complete;
        Ok(())
    }

    fn fail(&mut self, e: StreamError) {
        error!("stream session failed: {e}");
        self.controller.pause();
        self.status = SessionStatus::Failed(e);
    }

    /// Restart over a larger store when playback is about to outrun the
    /// decoded audio and there is something new to hand over.
    fn restart_if_starved(&mut self) {
        let Some(buffer) = self.buffer.as_ref() else {
            return;
        };
        if buffer.write_offset() <= self.snapshot_frames {
            return;
        }
        if !buffer.should_restart_soon(&self.controller, self.config.padding_seconds) {
            return;
        }

        debug!(
            available = buffer.available_seconds(),
            position = self.controller.position_seconds(),
            "underrun imminent"
        );
        let decoded = buffer.write_offset();
        match self.controller.restart(buffer.snapshot()) {
            Ok(()) => {
                self.restarts += 1;
                self.snapshot_frames = decoded;
                self.output_error = None;
            }
            Err(e) => {
                error!("restart failed: {e}");
                self.output_error = Some(e);
            }
        }
    }

    /// Periodic work between events: notice the end of output, catch up on
    /// throttled redraws and starved playback.
    pub fn tick(&mut self) {
        self.controller.poll_output();
        if let Some(waveform) = self.waveform.as_mut() {
            let now_ms = self.controller.clock().now_millis();
            waveform.maybe_redraw(now_ms, self.config.min_redraw_interval_ms, &mut self.renderer);
        }
        if self.status == SessionStatus::Streaming {
            self.restart_if_starved();
        }
    }

    /// Consume events until the stream completes or fails. Ticks whenever
    /// the queue stays empty for one redraw interval.
    pub fn run(&mut self, events: &Receiver<DecodeEvent>) -> StreamResult<()> {
        let wait = Duration::from_secs_f64(self.config.min_redraw_interval_ms.max(1.0) / 1000.0);
        loop {
            match events.recv_timeout(wait) {
                Ok(event) => {
                    let terminal = event.is_terminal();
                    self.handle_event(event)?;
                    if terminal {
                        return Ok(());
                    }
                }
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Err(RecvTimeoutError::Disconnected) => {
                    let e = StreamError::Decode("decoder went away before completion".into());
                    self.fail(e.clone());
                    return Err(e);
                }
            }
        }
    }

    /// Forget the current stream so a new one can start.
    pub fn reset(&mut self) {
        self.controller.unload();
        self.buffer = None;
        self.waveform = None;
        self.metadata = None;
        self.status = SessionStatus::Waiting;
        self.overflows.clear();
        self.restarts = 0;
        self.output_error = None;
        self.snapshot_frames = 0;
    }

    /// Start or resume playback over everything decoded so far. A sink
    /// failure is returned and kept in `output_error` until the next
    /// successful start; the stream itself carries on.
    pub fn play(&mut self) -> StreamResult<()> {
        if self.controller.state() == PlaybackState::Playing {
            return Ok(());
        }
        if let Some(buffer) = self.buffer.as_ref() {
            self.controller.swap_store(buffer.snapshot());
            self.snapshot_frames = buffer.write_offset();
        }
        match self.controller.play() {
            Ok(()) => {
                self.output_error = None;
                Ok(())
            }
            Err(e) => {
                self.output_error = Some(e.clone());
                Err(e)
            }
        }
    }

    pub fn pause(&mut self) {
        self.controller.pause();
    }

    pub fn stop(&mut self) {
        self.controller.stop();
    }

    pub fn toggle(&mut self) -> StreamResult<()> {
        if self.controller.state() == PlaybackState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn metadata(&self) -> Option<&MediaMetadata> {
        self.metadata.as_ref()
    }

    pub fn buffer(&self) -> Option<&StreamingBuffer> {
        self.buffer.as_ref()
    }

    pub fn waveform(&self) -> Option<&WaveformAggregator> {
        self.waveform.as_ref()
    }

    pub fn controller(&self) -> &PlaybackController<S, C> {
        &self.controller
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn overflow_warnings(&self) -> &[OverflowWarning] {
        &self.overflows
    }

    pub fn restart_count(&self) -> usize {
        self.restarts
    }

    pub fn output_error(&self) -> Option<&StreamError> {
        self.output_error.as_ref()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.controller.state()
    }

    pub fn position_seconds(&self) -> f64 {
        self.controller.position_seconds()
    }
}
