// src/waveform/terminal.rs

use super::render::PixelSurface;

const INK: char = '█';

/// Character-cell surface: one column per cell, one row per line.
#[derive(Clone, Debug, Default)]
pub struct TerminalSurface {
    width: usize,
    height: usize,
    cells: Vec<Vec<char>>,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<char> {
        self.cells.get(y).and_then(|row| row.get(x)).copied()
    }

    pub fn lines(&self) -> Vec<String> {
        self.cells.iter().map(|row| row.iter().collect()).collect()
    }

    fn row_of(&self, y: f32) -> usize {
        let max = self.height.saturating_sub(1) as f32;
        y.round().clamp(0.0, max) as usize
    }
}

impl PixelSurface for TerminalSurface {
    fn resize(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.cells = vec![vec![' '; width]; height];
    }

    fn clear_columns(&mut self, x0: f32, x1: f32) {
        let from = (x0.floor().max(0.0) as usize).min(self.width);
        let to = (x1.ceil().max(0.0) as usize).min(self.width);
        for row in &mut self.cells {
            row[from..to].fill(' ');
        }
    }

    fn stroke_vertical(&mut self, x: f32, y_from: f32, y_to: f32) {
        if self.height == 0 || x < 0.0 {
            return;
        }
        let x = x.floor() as usize;
        if x >= self.width {
            return;
        }
        let (a, b) = (self.row_of(y_from), self.row_of(y_to));
        let (top, bottom) = if a <= b { (a, b) } else { (b, a) };
        for row in &mut self.cells[top..=bottom] {
            row[x] = INK;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::render::{Renderer, StrokeRenderer, SurfaceSpec};
    use crate::waveform::PeakPair;

    fn renderer(width: usize, height: usize) -> StrokeRenderer<TerminalSurface> {
        let mut r = StrokeRenderer::new(TerminalSurface::new());
        r.init_surface(SurfaceSpec {
            pixel_width: width,
            pixel_height: height,
            samples_per_pixel: 1,
            device_pixel_ratio: 1.0,
        });
        r
    }

    #[test]
    fn full_scale_column_fills_every_row() {
        let mut r = renderer(3, 5);
        r.draw_columns(&[1], &[PeakPair { min: -1.0, max: 1.0 }], 4.0);
        let lines = r.surface().lines();
        assert_eq!(lines.len(), 5);
        assert!(lines.iter().all(|l| l == " █ "));
    }

    #[test]
    fn silent_column_marks_only_the_midline() {
        let mut r = renderer(2, 5);
        r.draw_columns(&[0], &[PeakPair::default()], 4.0);
        let s = r.surface();
        assert_eq!(s.cell(0, 2), Some(INK));
        assert_eq!(s.cell(0, 1), Some(' '));
        assert_eq!(s.cell(0, 3), Some(' '));
    }

    #[test]
    fn redraw_clears_previous_stroke_in_span() {
        let mut r = renderer(2, 5);
        r.draw_columns(&[0], &[PeakPair { min: -1.0, max: 1.0 }], 4.0);
        r.draw_columns(&[0], &[PeakPair { min: 0.0, max: 0.5 }], 4.0);
        let s = r.surface();
        assert_eq!(s.cell(0, 0), Some(' '));
        assert_eq!(s.cell(0, 2), Some(INK));
        assert_eq!(s.cell(0, 3), Some(INK));
        assert_eq!(s.cell(0, 4), Some(' '));
    }

    #[test]
    fn out_of_range_strokes_are_clipped() {
        let mut r = renderer(1, 3);
        r.draw_columns(&[5], &[PeakPair { min: -1.0, max: 1.0 }], 2.0);
        assert_eq!(r.surface().lines(), vec![" ", " ", " "]);
    }
}
