// src/audio/resample.rs

use rubato::{
    calculate_cutoff, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
    WindowFunction,
};

use crate::error::{StreamError, StreamResult};

/// Input frames consumed per resampler call.
pub const CHUNK_SIZE: usize = 1024;

/// Sinc resampler from `src_rate` to `dst_rate`, or `None` when the rates
/// already match.
pub fn build_resampler(src_rate: u32, dst_rate: u32, channels: usize) -> StreamResult<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    if src_rate == 0 || dst_rate == 0 || channels == 0 {
        return Err(StreamError::Output(format!(
            "cannot resample {channels} channel(s) from {src_rate} Hz to {dst_rate} Hz"
        )));
    }
    let ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 256usize;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let r = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, channels)
        .map_err(|e| StreamError::Output(format!("resampler: {e}")))?;
    Ok(Some(r))
}
