use std::path::{Path, PathBuf};

use streamwave::player::{ManualClock, NullSink};
use streamwave::waveform::{StrokeRenderer, TerminalSurface};
use streamwave::{spawn_decoder, DecodeEvent, DecodeSource, SessionStatus, StreamConfig, StreamSession};

const RATE: u32 = 44_100;

fn tone(frame: usize, channel: usize) -> i16 {
    let phase = frame as f32 / RATE as f32 * 440.0 * std::f32::consts::TAU;
    let amp = if channel == 0 { 0.5 } else { 0.25 };
    (phase.sin() * amp * i16::MAX as f32) as i16
}

fn write_wav(path: &Path, channels: u16, frames: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for f in 0..frames {
        for ch in 0..channels as usize {
            writer.write_sample(tone(f, ch)).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn fixture(dir: &tempfile::TempDir, channels: u16, frames: usize) -> PathBuf {
    let path = dir.path().join("tone.wav");
    write_wav(&path, channels, frames);
    path
}

fn collect(source: DecodeSource) -> Vec<DecodeEvent> {
    let (handle, rx) = spawn_decoder(source);
    let events: Vec<DecodeEvent> = rx.iter().collect();
    handle.join().unwrap();
    events
}

#[test]
fn wav_file_streams_metadata_frames_then_done() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, 2, RATE as usize);
    let events = collect(DecodeSource::File(path));

    let DecodeEvent::Metadata(meta) = &events[0] else {
        panic!("first event was {:?}", events[0]);
    };
    assert_eq!(meta.sample_rate, RATE);
    assert_eq!(meta.channel_count, 2);
    assert!((meta.duration_estimate_seconds - 1.0).abs() < 1e-6);

    assert!(matches!(events.last(), Some(DecodeEvent::Done)));

    let mut expected_offset = 0u64;
    let mut first_frames = Vec::new();
    for event in &events[1..events.len() - 1] {
        let DecodeEvent::Frame(batch) = event else {
            panic!("unexpected event mid-stream: {event:?}");
        };
        assert_eq!(batch.write_offset(), expected_offset);
        assert_eq!(batch.channel_count(), 2);
        assert_eq!(batch.sample_rate(), RATE);
        if first_frames.is_empty() {
            first_frames = batch.channel_samples()[0].iter().take(64).copied().collect();
        }
        expected_offset += batch.frame_count() as u64;
    }
    assert_eq!(expected_offset, RATE as u64);

    for (f, &s) in first_frames.iter().enumerate() {
        let want = tone(f, 0) as f32 / 32768.0;
        assert!((s - want).abs() < 1e-4, "frame {f}: {s} vs {want}");
    }
}

#[test]
fn in_memory_bytes_decode_like_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, 1, 10_000);
    let bytes = std::fs::read(&path).unwrap();
    let events = collect(DecodeSource::Memory(bytes));

    assert!(matches!(events.first(), Some(DecodeEvent::Metadata(m)) if m.channel_count == 1));
    let total: usize = events
        .iter()
        .filter_map(|e| match e {
            DecodeEvent::Frame(b) => Some(b.frame_count()),
            _ => None,
        })
        .sum();
    assert_eq!(total, 10_000);
    assert!(matches!(events.last(), Some(DecodeEvent::Done)));
}

#[test]
fn missing_file_reports_error_only() {
    let events = collect(DecodeSource::File(PathBuf::from("/no/such/file.wav")));
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], DecodeEvent::Error(msg) if msg.contains("file.wav")));
}

#[test]
fn garbage_bytes_report_error() {
    let events = collect(DecodeSource::Memory(vec![0x42; 4096]));
    assert!(matches!(events.last(), Some(DecodeEvent::Error(_))));
    assert!(!events.iter().any(|e| matches!(e, DecodeEvent::Done)));
}

#[test]
fn headless_session_fills_store_and_waveform() {
    let dir = tempfile::tempdir().unwrap();
    let path = fixture(&dir, 2, RATE as usize);

    let config = StreamConfig {
        pixel_width: 40,
        pixel_height: 9,
        fit_waveform_to_duration: true,
        ..StreamConfig::default()
    };
    let mut session = StreamSession::new(
        config,
        NullSink::new(),
        ManualClock::new(),
        StrokeRenderer::new(TerminalSurface::new()),
    )
    .unwrap();

    let (handle, rx) = spawn_decoder(DecodeSource::File(path));
    session.run(&rx).unwrap();
    handle.join().unwrap();

    assert_eq!(*session.status(), SessionStatus::Complete);
    let buffer = session.buffer().unwrap();
    assert!(buffer.is_finalized());
    assert_eq!(buffer.write_offset(), RATE as usize);
    assert!(session.overflow_warnings().is_empty());

    let waveform = session.waveform().unwrap();
    assert_eq!(waveform.dirty_len(), 0);
    assert!(waveform.peaks().iter().all(|p| p.min < 0.0 && p.max > 0.0));

    let surface = session.renderer().surface();
    assert_eq!((surface.width(), surface.height()), (40, 9));
    for x in 0..40 {
        assert!(
            (0..9).any(|y| surface.cell(x, y) == Some('█')),
            "column {x} was never stroked"
        );
    }

    session.play().unwrap();
    let store = session.controller().store().unwrap();
    assert_eq!(store.length_frames(), RATE as usize);
}
