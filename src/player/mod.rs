// src/player/mod.rs

pub mod clock;
pub mod sink;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use sink::{AudioSink, NullSink};

use std::sync::Arc;

use tracing::{debug, info};

use crate::buffer::{PlaybackProgress, StoreSnapshot};
use crate::error::StreamResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
}

/// Transport state of the one active player.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackSession {
    pub state: PlaybackState,
    pub paused_at_seconds: f64,
    /// Clock reading that corresponds to position 0 while playing.
    pub start_wall_time: f64,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            paused_at_seconds: 0.0,
            start_wall_time: 0.0,
        }
    }
}

/// Play/pause/stop over a store snapshot, with position derived from the
/// clock rather than from how much audio has been decoded.
pub struct PlaybackController<S: AudioSink, C: Clock> {
    session: PlaybackSession,
    store: Option<Arc<StoreSnapshot>>,
    sink: S,
    clock: C,
}

impl<S: AudioSink, C: Clock> PlaybackController<S, C> {
    pub fn new(sink: S, clock: C) -> Self {
        Self {
            session: PlaybackSession::default(),
            store: None,
            sink,
            clock,
        }
    }

    /// Install the store of a new session. Resets to Idle at position 0.
    pub fn load(&mut self, snapshot: Arc<StoreSnapshot>) {
        self.sink.halt();
        self.store = Some(snapshot);
        self.session = PlaybackSession::default();
    }

    /// Replace the store with a newer view of the same session, keeping
    /// position. Ignored while playing.
    pub fn swap_store(&mut self, snapshot: Arc<StoreSnapshot>) {
        if self.session.state == PlaybackState::Playing {
            return;
        }
        self.store = Some(snapshot);
    }

    /// Drop the store and return to Idle.
    pub fn unload(&mut self) {
        self.stop();
        self.store = None;
    }

    pub fn play(&mut self) -> StreamResult<()> {
        let Some(store) = self.store.as_ref() else {
            return Ok(());
        };
        if self.session.state == PlaybackState::Playing {
            return Ok(());
        }

        let from = self.session.paused_at_seconds;
        self.sink.start(store.clone(), from)?;
        self.session.start_wall_time = self.clock.now_seconds() - from;
        self.session.state = PlaybackState::Playing;
        debug!(from, "playing");
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.session.state != PlaybackState::Playing {
            return;
        }
        self.session.paused_at_seconds = self.clock.now_seconds() - self.session.start_wall_time;
        self.sink.halt();
        self.session.state = PlaybackState::Paused;
        debug!(at = self.session.paused_at_seconds, "paused");
    }

    pub fn stop(&mut self) {
        self.sink.halt();
        self.session.paused_at_seconds = 0.0;
        self.session.state = PlaybackState::Idle;
    }

    pub fn toggle(&mut self) -> StreamResult<()> {
        if self.session.state == PlaybackState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Stop and replay from the same position over a newer store.
    pub fn restart(&mut self, snapshot: Arc<StoreSnapshot>) -> StreamResult<()> {
        let current = self.position_seconds();
        self.stop();
        self.store = Some(snapshot);
        self.session.paused_at_seconds = current;
        info!(at = current, "restarting playback over larger store");
        self.play()
    }

    /// Handle a natural end of output reported by the sink.
    pub fn poll_output(&mut self) {
        if !self.sink.take_ended() {
            return;
        }
        if self.session.state == PlaybackState::Playing {
            debug!("reached end of store");
            self.session.paused_at_seconds = 0.0;
            self.session.state = PlaybackState::Idle;
        }
    }

    pub fn position_seconds(&self) -> f64 {
        match self.session.state {
            PlaybackState::Playing => self.clock.now_seconds() - self.session.start_wall_time,
            PlaybackState::Idle | PlaybackState::Paused => self.session.paused_at_seconds,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn store(&self) -> Option<&Arc<StoreSnapshot>> {
        self.store.as_ref()
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<S: AudioSink, C: Clock> PlaybackProgress for PlaybackController<S, C> {
    fn is_playing(&self) -> bool {
        self.session.state == PlaybackState::Playing
    }

    fn position_seconds(&self) -> f64 {
        PlaybackController::position_seconds(self)
    }
}

#[cfg(test)]
mod tests {
    use super::sink::testing::RecordingSink;
    use super::*;

    fn snapshot(frames: usize) -> Arc<StoreSnapshot> {
        Arc::new(StoreSnapshot::new(vec![vec![0.0; frames]], frames, 1000))
    }

    fn controller() -> (PlaybackController<RecordingSink, ManualClock>, RecordingSink, ManualClock) {
        let sink = RecordingSink::default();
        let clock = ManualClock::new();
        (PlaybackController::new(sink.clone(), clock.clone()), sink, clock)
    }

    #[test]
    fn play_without_store_is_a_no_op() {
        let (mut player, sink, _) = controller();
        player.play().unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(sink.log.lock().unwrap().starts.is_empty());
    }

    #[test]
    fn position_follows_clock_while_playing() {
        let (mut player, sink, clock) = controller();
        player.load(snapshot(10_000));
        clock.set(5.0);
        player.play().unwrap();
        clock.advance(1.5);
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!((player.position_seconds() - 1.5).abs() < 1e-9);

        // Second play is ignored.
        player.play().unwrap();
        assert_eq!(sink.log.lock().unwrap().starts.len(), 1);
    }

    #[test]
    fn pause_then_play_resumes_from_paused_position() {
        let (mut player, sink, clock) = controller();
        player.load(snapshot(10_000));
        player.play().unwrap();
        clock.advance(2.0);
        player.pause();
        assert_eq!(player.state(), PlaybackState::Paused);
        clock.advance(30.0);
        assert!((player.position_seconds() - 2.0).abs() < 1e-9);

        player.toggle().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        let log = sink.log.lock().unwrap();
        assert!((log.starts[1].1 - 2.0).abs() < 1e-9);
    }

    #[test]
    fn pause_is_ignored_unless_playing() {
        let (mut player, sink, _) = controller();
        player.load(snapshot(100));
        player.pause();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(sink.log.lock().unwrap().halts, 1); // from load
    }

    #[test]
    fn stop_is_idempotent() {
        let (mut player, _, clock) = controller();
        player.load(snapshot(10_000));
        player.play().unwrap();
        clock.advance(3.0);
        player.stop();
        let once = *player.session();
        player.stop();
        assert_eq!(*player.session(), once);
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.position_seconds(), 0.0);
    }

    #[test]
    fn restart_preserves_position() {
        let (mut player, sink, clock) = controller();
        player.load(snapshot(2_000));
        player.play().unwrap();
        clock.advance(1.6);
        let before = player.position_seconds();

        player.restart(snapshot(4_000)).unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
        assert!((player.position_seconds() - before).abs() < 1e-9);

        let log = sink.log.lock().unwrap();
        assert_eq!(log.starts.len(), 2);
        assert_eq!(log.starts[1].0, 4_000);
        assert!((log.starts[1].1 - 1.6).abs() < 1e-9);
    }

    #[test]
    fn natural_end_returns_to_idle() {
        let (mut player, sink, clock) = controller();
        player.load(snapshot(1_000));
        player.play().unwrap();
        clock.advance(1.0);
        player.poll_output();
        assert_eq!(player.state(), PlaybackState::Playing);

        sink.finish();
        player.poll_output();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.position_seconds(), 0.0);
    }

    #[test]
    fn swap_store_keeps_paused_position() {
        let (mut player, sink, clock) = controller();
        player.load(snapshot(1_000));
        player.play().unwrap();
        clock.advance(0.5);
        player.pause();
        player.swap_store(snapshot(5_000));
        player.play().unwrap();
        let log = sink.log.lock().unwrap();
        assert_eq!(log.starts[1], (5_000, 0.5));
    }

    #[test]
    fn sink_failure_leaves_state_untouched() {
        let (mut player, sink, _) = controller();
        player.load(snapshot(1_000));
        sink.log.lock().unwrap().fail_next_start = true;
        assert!(player.play().is_err());
        assert_eq!(player.state(), PlaybackState::Idle);
        player.play().unwrap();
        assert_eq!(player.state(), PlaybackState::Playing);
    }
}
