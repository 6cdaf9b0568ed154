// src/waveform/mod.rs
pub mod render;
pub mod terminal;

pub use render::{DrawPass, PixelSurface, Renderer, Stroke, StrokeRenderer, SurfaceSpec};
pub use terminal::TerminalSurface;

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::error::{StreamError, StreamResult};
use crate::events::FrameBatch;

/// Redraw cadence when none is configured (~60 Hz).
pub const DEFAULT_MIN_REDRAW_INTERVAL_MS: f64 = 16.0;

/// Peak resolution when none is configured.
pub const DEFAULT_SAMPLES_PER_PIXEL: usize = 30_000;

/// Min/max of all mono samples that fell into one pixel column.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PeakPair {
    pub min: f32,
    pub max: f32,
}

impl PeakPair {
    #[inline]
    fn widen(&mut self, s: f32) {
        if s < self.min {
            self.min = s;
        }
        if s > self.max {
            self.max = s;
        }
    }
}

/// Live min/max waveform that grows as frames arrive.
///
/// Columns only ever widen. Redraws touch only the columns changed since the
/// previous pass, and at most once per interval.
pub struct WaveformAggregator {
    peaks: Vec<PeakPair>,
    dirty: BTreeSet<usize>,
    samples_per_pixel: usize,
    device_pixel_ratio: f32,
    last_draw_ms: Option<f64>,
}

impl WaveformAggregator {
    pub fn init(pixel_width: usize, samples_per_pixel: usize, device_pixel_ratio: f32) -> StreamResult<Self> {
        if pixel_width == 0 {
            return Err(StreamError::Configuration("pixel width must be positive".into()));
        }
        if samples_per_pixel == 0 {
            return Err(StreamError::Configuration("samples per pixel must be positive".into()));
        }
        if !(device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0) {
            return Err(StreamError::Configuration(format!(
                "device pixel ratio must be positive, got {device_pixel_ratio}"
            )));
        }
        debug!(pixel_width, samples_per_pixel, "waveform peak table allocated");
        Ok(Self {
            peaks: vec![PeakPair::default(); pixel_width],
            dirty: BTreeSet::new(),
            samples_per_pixel,
            device_pixel_ratio,
            last_draw_ms: None,
        })
    }

    /// Fold a batch into the peak table. Returns how many samples landed in a
    /// visible column; samples past the last column are ignored.
    pub fn ingest(&mut self, batch: FrameBatch, global_write_offset: u64) -> usize {
        let mono = batch.mix_to_mono();
        let width = self.peaks.len();
        let spp = self.samples_per_pixel as u64;
        let mut last_marked = None;
        let mut visible = 0usize;

        for (i, &s) in mono.iter().enumerate() {
            let column = ((global_write_offset + i as u64) / spp) as usize;
            if column >= width {
                // Indices only grow from here on.
                break;
            }
            self.peaks[column].widen(s);
            if last_marked != Some(column) {
                self.dirty.insert(column);
                last_marked = Some(column);
            }
            visible += 1;
        }

        trace!(
            offset = global_write_offset,
            visible,
            dirty = self.dirty.len(),
            "ingested batch"
        );
        visible
    }

    /// Draw the dirty columns if at least `min_interval_ms` passed since the
    /// last pass. Returns whether a pass ran.
    pub fn maybe_redraw<R: Renderer + ?Sized>(&mut self, now_ms: f64, min_interval_ms: f64, renderer: &mut R) -> bool {
        if let Some(last) = self.last_draw_ms {
            if now_ms - last < min_interval_ms {
                return false;
            }
        }
        self.draw(now_ms, renderer)
    }

    /// Draw the dirty columns now, ignoring the throttle.
    pub fn force_redraw<R: Renderer + ?Sized>(&mut self, now_ms: f64, renderer: &mut R) -> bool {
        self.draw(now_ms, renderer)
    }

    fn draw<R: Renderer + ?Sized>(&mut self, now_ms: f64, renderer: &mut R) -> bool {
        if self.dirty.is_empty() {
            return false;
        }
        let columns: Vec<usize> = std::mem::take(&mut self.dirty).into_iter().collect();
        let pairs: Vec<PeakPair> = columns.iter().map(|&c| self.peaks[c]).collect();
        let height = renderer.surface_height();
        renderer.draw_columns(&columns, &pairs, height);
        self.last_draw_ms = Some(now_ms);
        trace!(columns = columns.len(), "waveform redraw");
        true
    }

    pub fn surface_spec(&self, pixel_height: usize) -> SurfaceSpec {
        SurfaceSpec {
            pixel_width: self.peaks.len(),
            pixel_height,
            samples_per_pixel: self.samples_per_pixel,
            device_pixel_ratio: self.device_pixel_ratio,
        }
    }

    pub fn peaks(&self) -> &[PeakPair] {
        &self.peaks
    }

    pub fn dirty_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.dirty.iter().copied()
    }

    pub fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub fn pixel_width(&self) -> usize {
        self.peaks.len()
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRenderer;
    use super::*;

    fn mono(samples: Vec<f32>, offset: u64) -> FrameBatch {
        FrameBatch::new(vec![samples], 48_000, offset).unwrap()
    }

    #[test]
    fn init_rejects_degenerate_sizes() {
        assert!(WaveformAggregator::init(0, 100, 1.0).is_err());
        assert!(WaveformAggregator::init(100, 0, 1.0).is_err());
        assert!(WaveformAggregator::init(100, 10, 0.0).is_err());
        assert!(WaveformAggregator::init(100, 10, f32::NAN).is_err());
    }

    #[test]
    fn table_starts_flat() {
        let wf = WaveformAggregator::init(8, 10, 1.0).unwrap();
        assert!(wf.peaks().iter().all(|p| *p == PeakPair { min: 0.0, max: 0.0 }));
        assert_eq!(wf.dirty_len(), 0);
    }

    #[test]
    fn ninety_thousand_samples_dirty_three_columns() {
        let mut wf = WaveformAggregator::init(1200, 30_000, 1.0).unwrap();
        let samples: Vec<f32> = (0..90_000).map(|i| ((i % 200) as f32 / 100.0) - 1.0).collect();
        let visible = wf.ingest(mono(samples, 0), 0);
        assert_eq!(visible, 90_000);
        assert_eq!(wf.dirty_columns().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn stereo_is_mixed_before_peaking() {
        let mut wf = WaveformAggregator::init(4, 2, 1.0).unwrap();
        let batch = FrameBatch::new(vec![vec![1.0, 1.0], vec![-1.0, 0.0]], 48_000, 0).unwrap();
        wf.ingest(batch, 0);
        assert_eq!(wf.peaks()[0], PeakPair { min: 0.0, max: 0.5 });
    }

    #[test]
    fn samples_past_width_are_ignored() {
        let mut wf = WaveformAggregator::init(2, 4, 1.0).unwrap();
        let visible = wf.ingest(mono(vec![0.9; 12], 2), 2);
        assert_eq!(visible, 6);
        assert_eq!(wf.dirty_columns().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(wf.peaks()[1].max, 0.9);
    }

    #[test]
    fn columns_only_widen() {
        let mut wf = WaveformAggregator::init(1, 100, 1.0).unwrap();
        let mut prev = wf.peaks()[0];
        for (k, chunk) in [vec![0.3, -0.2], vec![0.1, 0.0], vec![-0.7, 0.2], vec![0.8]]
            .into_iter()
            .enumerate()
        {
            wf.ingest(mono(chunk, k as u64 * 2), k as u64 * 2);
            let now = wf.peaks()[0];
            assert!(now.min <= now.max);
            assert!(now.min <= prev.min);
            assert!(now.max >= prev.max);
            prev = now;
        }
        assert_eq!(prev, PeakPair { min: -0.7, max: 0.8 });
    }

    #[test]
    fn redraw_is_throttled_and_clears_dirty_set() {
        let mut wf = WaveformAggregator::init(10, 1, 1.0).unwrap();
        let mut r = RecordingRenderer::default();
        r.init_surface(wf.surface_spec(100));

        wf.ingest(mono(vec![0.5, -0.5], 0), 0);
        assert!(wf.maybe_redraw(1000.0, 16.0, &mut r));
        assert_eq!(wf.dirty_len(), 0);

        wf.ingest(mono(vec![0.25], 2), 2);
        assert!(!wf.maybe_redraw(1010.0, 16.0, &mut r));
        assert_eq!(wf.dirty_len(), 1);

        assert!(wf.maybe_redraw(1016.0, 16.0, &mut r));
        assert_eq!(r.passes.len(), 2);
        assert_eq!(r.passes[0].0, vec![0, 1]);
        assert_eq!(r.passes[1].0, vec![2]);
        assert_eq!(r.passes[1].1, vec![PeakPair { min: 0.0, max: 0.25 }]);
    }

    #[test]
    fn empty_dirty_set_draws_nothing() {
        let mut wf = WaveformAggregator::init(10, 1, 1.0).unwrap();
        let mut r = RecordingRenderer::default();
        assert!(!wf.maybe_redraw(0.0, 16.0, &mut r));
        assert!(!wf.force_redraw(100.0, &mut r));
        assert!(r.passes.is_empty());
    }

    #[test]
    fn force_redraw_skips_throttle() {
        let mut wf = WaveformAggregator::init(10, 1, 1.0).unwrap();
        let mut r = RecordingRenderer::default();
        wf.ingest(mono(vec![0.1], 0), 0);
        assert!(wf.maybe_redraw(0.0, 16.0, &mut r));
        wf.ingest(mono(vec![0.2], 1), 1);
        assert!(wf.force_redraw(1.0, &mut r));
        assert_eq!(r.passes.len(), 2);
    }
}
