// src/config.rs

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::buffer::{DEFAULT_FALLBACK_HORIZON_SECONDS, DEFAULT_PADDING_SECONDS};
use crate::error::{StreamError, StreamResult};
use crate::waveform::{DEFAULT_MIN_REDRAW_INTERVAL_MS, DEFAULT_SAMPLES_PER_PIXEL};

/// Tunables recognised by a stream session. Missing keys in a config file
/// take their defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct StreamConfig {
    /// Restart this long before playback would run out of decoded audio.
    pub padding_seconds: f64,
    pub samples_per_pixel: usize,
    /// Derive samples per pixel from the store capacity so the whole stream
    /// fits `pixel_width`.
    pub fit_waveform_to_duration: bool,
    pub min_redraw_interval_ms: f64,
    /// Store horizon when the container does not report a duration.
    pub fallback_horizon_seconds: f64,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub device_pixel_ratio: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            padding_seconds: DEFAULT_PADDING_SECONDS,
            samples_per_pixel: DEFAULT_SAMPLES_PER_PIXEL,
            fit_waveform_to_duration: false,
            min_redraw_interval_ms: DEFAULT_MIN_REDRAW_INTERVAL_MS,
            fallback_horizon_seconds: DEFAULT_FALLBACK_HORIZON_SECONDS,
            pixel_width: 1200,
            pixel_height: 160,
            device_pixel_ratio: 1.0,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> StreamResult<()> {
        fn positive(name: &str, v: f64) -> StreamResult<()> {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(StreamError::Configuration(format!("{name} must be positive, got {v}")))
            }
        }

        if !(self.padding_seconds.is_finite() && self.padding_seconds >= 0.0) {
            return Err(StreamError::Configuration(format!(
                "padding_seconds must be >= 0, got {}",
                self.padding_seconds
            )));
        }
        if !(self.min_redraw_interval_ms.is_finite() && self.min_redraw_interval_ms >= 0.0) {
            return Err(StreamError::Configuration(format!(
                "min_redraw_interval_ms must be >= 0, got {}",
                self.min_redraw_interval_ms
            )));
        }
        positive("fallback_horizon_seconds", self.fallback_horizon_seconds)?;
        positive("samples_per_pixel", self.samples_per_pixel as f64)?;
        positive("pixel_width", self.pixel_width as f64)?;
        positive("pixel_height", self.pixel_height as f64)?;
        positive("device_pixel_ratio", self.device_pixel_ratio as f64)?;
        Ok(())
    }

    /// Samples per pixel for a store of `capacity_frames`.
    pub fn samples_per_pixel_for(&self, capacity_frames: usize) -> usize {
        if self.fit_waveform_to_duration {
            capacity_frames.div_ceil(self.pixel_width.max(1)).max(1)
        } else {
            self.samples_per_pixel
        }
    }

    pub fn save_to_disk(&self, path: impl AsRef<Path>) -> StreamResult<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_from_disk(path: impl AsRef<Path>) -> StreamResult<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }
}
