// src/waveform/render.rs

use super::PeakPair;

/// Geometry of the drawing surface, in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSpec {
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub samples_per_pixel: usize,
    pub device_pixel_ratio: f32,
}

impl SurfaceSpec {
    pub fn physical_width(&self) -> usize {
        (self.pixel_width as f32 * self.device_pixel_ratio).ceil() as usize
    }

    pub fn physical_height(&self) -> usize {
        (self.pixel_height as f32 * self.device_pixel_ratio).ceil() as usize
    }
}

/// Receives peak columns to draw. The aggregator never touches pixels.
pub trait Renderer {
    fn init_surface(&mut self, spec: SurfaceSpec);

    /// Logical height the strokes are scaled to.
    fn surface_height(&self) -> f32;

    /// `columns` is ascending and `peaks[i]` belongs to `columns[i]`.
    fn draw_columns(&mut self, columns: &[usize], peaks: &[PeakPair], surface_height: f32);
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn init_surface(&mut self, spec: SurfaceSpec) {
        (**self).init_surface(spec)
    }

    fn surface_height(&self) -> f32 {
        (**self).surface_height()
    }

    fn draw_columns(&mut self, columns: &[usize], peaks: &[PeakPair], surface_height: f32) {
        (**self).draw_columns(columns, peaks, surface_height)
    }
}

/// The line-drawing primitive. Coordinates are physical pixels.
pub trait PixelSurface {
    fn resize(&mut self, width: usize, height: usize);

    /// Clear every pixel with `x0 <= x < x1`.
    fn clear_columns(&mut self, x0: f32, x1: f32);

    fn stroke_vertical(&mut self, x: f32, y_from: f32, y_to: f32);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    pub x: f32,
    pub y_from: f32,
    pub y_to: f32,
}

/// One partial redraw: clear the span covering the dirty columns, then one
/// vertical stroke per column.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawPass {
    pub clear_from_x: f32,
    pub clear_to_x: f32,
    pub strokes: Vec<Stroke>,
}

impl DrawPass {
    pub fn plan(columns: &[usize], peaks: &[PeakPair], surface_height: f32, device_pixel_ratio: f32) -> Option<Self> {
        let (&first, &last) = (columns.first()?, columns.last()?);
        let mid = surface_height / 2.0;
        let strokes = columns
            .iter()
            .zip(peaks)
            .map(|(&c, p)| Stroke {
                x: c as f32 * device_pixel_ratio,
                y_from: (mid + p.min * mid) * device_pixel_ratio,
                y_to: (mid + p.max * mid) * device_pixel_ratio,
            })
            .collect();
        Some(Self {
            clear_from_x: first as f32 * device_pixel_ratio,
            clear_to_x: (last + 1) as f32 * device_pixel_ratio,
            strokes,
        })
    }

    pub fn apply<S: PixelSurface + ?Sized>(&self, surface: &mut S) {
        surface.clear_columns(self.clear_from_x, self.clear_to_x);
        for s in &self.strokes {
            surface.stroke_vertical(s.x, s.y_from, s.y_to);
        }
    }
}

/// Renderer that turns peak columns into strokes on a `PixelSurface`.
pub struct StrokeRenderer<S: PixelSurface> {
    surface: S,
    spec: Option<SurfaceSpec>,
}

impl<S: PixelSurface> StrokeRenderer<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, spec: None }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn spec(&self) -> Option<&SurfaceSpec> {
        self.spec.as_ref()
    }
}

impl<S: PixelSurface> Renderer for StrokeRenderer<S> {
    fn init_surface(&mut self, spec: SurfaceSpec) {
        self.surface.resize(spec.physical_width(), spec.physical_height());
        self.spec = Some(spec);
    }

    fn surface_height(&self) -> f32 {
        self.spec.map_or(0.0, |s| s.pixel_height as f32)
    }

    fn draw_columns(&mut self, columns: &[usize], peaks: &[PeakPair], surface_height: f32) {
        let dpr = self.spec.map_or(1.0, |s| s.device_pixel_ratio);
        if let Some(pass) = DrawPass::plan(columns, peaks, surface_height, dpr) {
            pass.apply(&mut self.surface);
        }
    }
}
