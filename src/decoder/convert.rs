// src/decoder/convert.rs

use crate::error::{StreamError, StreamResult};
use crate::events::FrameBatch;

/// How multi-channel samples are laid out in a flat buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmLayout {
    /// Frame-major: L R L R ...
    Interleaved,
    /// Channel-major: L L ... R R ...
    Planar,
}

/// Borrowed raw samples in one of the supported representations.
#[derive(Clone, Copy, Debug)]
pub enum PcmData<'a> {
    F32(&'a [f32]),
    S16(&'a [i16]),
    U8(&'a [u8]),
}

impl PcmData<'_> {
    fn len(&self) -> usize {
        match self {
            PcmData::F32(d) => d.len(),
            PcmData::S16(d) => d.len(),
            PcmData::U8(d) => d.len(),
        }
    }

    #[inline]
    fn get(&self, i: usize) -> f32 {
        match self {
            PcmData::F32(d) => d[i],
            PcmData::S16(d) => normalize_s16(d[i]),
            PcmData::U8(d) => normalize_u8(d[i]),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleKind {
    F32,
    S16,
    U8,
}

/// Parse names such as `f32`, `s16-planar`, `u8`.
pub fn parse_format(name: &str) -> StreamResult<(SampleKind, PcmLayout)> {
    let (base, layout) = match name.strip_suffix("-planar") {
        Some(base) => (base, PcmLayout::Planar),
        None => (name, PcmLayout::Interleaved),
    };
    let kind = match base {
        "f32" => SampleKind::F32,
        "s16" => SampleKind::S16,
        "u8" => SampleKind::U8,
        _ => return Err(StreamError::UnsupportedFormat(format!("sample format {name}"))),
    };
    Ok((kind, layout))
}

#[inline]
pub fn normalize_s16(x: i16) -> f32 {
    x as f32 / 32768.0
}

#[inline]
pub fn normalize_u8(x: u8) -> f32 {
    (x as f32 - 128.0) / 128.0
}

/// Normalize any supported representation to one f32 vector per channel.
pub fn to_planar(data: PcmData<'_>, layout: PcmLayout, channels: usize) -> StreamResult<Vec<Vec<f32>>> {
    if channels == 0 {
        return Err(StreamError::UnsupportedFormat("zero channels".into()));
    }
    let len = data.len();
    if len % channels != 0 {
        return Err(StreamError::UnsupportedFormat(format!(
            "{len} samples do not divide into {channels} channels"
        )));
    }
    let frames = len / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    match layout {
        PcmLayout::Interleaved => {
            for f in 0..frames {
                for (ch, out) in planar.iter_mut().enumerate() {
                    out.push(data.get(f * channels + ch));
                }
            }
        }
        PcmLayout::Planar => {
            for (ch, out) in planar.iter_mut().enumerate() {
                out.extend((0..frames).map(|f| data.get(ch * frames + f)));
            }
        }
    }
    Ok(planar)
}

/// Split interleaved f32 into planar channels.
pub fn deinterleave(interleaved: &[f32], channels: usize) -> Vec<Vec<f32>> {
    if channels == 0 {
        return Vec::new();
    }
    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for row in interleaved.chunks_exact(channels) {
        for (ch, &s) in row.iter().enumerate() {
            planar[ch].push(s);
        }
    }
    planar
}

/// Build a frame batch straight from raw PCM.
pub fn batch_from_pcm(
    data: PcmData<'_>,
    layout: PcmLayout,
    channels: usize,
    sample_rate: u32,
    write_offset: u64,
) -> StreamResult<FrameBatch> {
    FrameBatch::new(to_planar(data, layout, channels)?, sample_rate, write_offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_formats_scale_to_unit_range() {
        assert_eq!(normalize_s16(i16::MIN), -1.0);
        assert_eq!(normalize_s16(0), 0.0);
        assert_eq!(normalize_s16(16384), 0.5);
        assert_eq!(normalize_u8(128), 0.0);
        assert_eq!(normalize_u8(0), -1.0);
        assert_eq!(normalize_u8(192), 0.5);
    }

    #[test]
    fn interleaved_s16_splits_per_channel() {
        let raw = [16384i16, -16384, 0, 8192];
        let planar = to_planar(PcmData::S16(&raw), PcmLayout::Interleaved, 2).unwrap();
        assert_eq!(planar, vec![vec![0.5, 0.0], vec![-0.5, 0.25]]);
    }

    #[test]
    fn planar_u8_keeps_channel_blocks() {
        let raw = [128u8, 192, 64, 0];
        let planar = to_planar(PcmData::U8(&raw), PcmLayout::Planar, 2).unwrap();
        assert_eq!(planar, vec![vec![0.0, 0.5], vec![-0.5, -1.0]]);
    }

    #[test]
    fn ragged_input_is_unsupported() {
        let raw = [0.0f32; 5];
        assert!(matches!(
            to_planar(PcmData::F32(&raw), PcmLayout::Interleaved, 2),
            Err(StreamError::UnsupportedFormat(_))
        ));
        assert!(to_planar(PcmData::F32(&raw), PcmLayout::Planar, 0).is_err());
    }

    #[test]
    fn format_names() {
        assert_eq!(parse_format("f32").unwrap(), (SampleKind::F32, PcmLayout::Interleaved));
        assert_eq!(parse_format("s16-planar").unwrap(), (SampleKind::S16, PcmLayout::Planar));
        assert!(parse_format("s24").is_err());
    }

    #[test]
    fn deinterleave_drops_partial_frame() {
        let planar = deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0], 2);
        assert_eq!(planar, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn batch_from_pcm_carries_offset() {
        let raw = [0.1f32, 0.2, 0.3, 0.4];
        let batch = batch_from_pcm(PcmData::F32(&raw), PcmLayout::Interleaved, 2, 44_100, 512).unwrap();
        assert_eq!(batch.frame_count(), 2);
        assert_eq!(batch.write_offset(), 512);
    }
}
