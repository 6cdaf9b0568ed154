// src/main.rs

use std::fmt::Write as FmtWrite;
use std::io::{stdout, Write};
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

use anyhow::Context;
use crossterm::{
    cursor::MoveTo,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        self, disable_raw_mode, enable_raw_mode, BeginSynchronizedUpdate, Clear, ClearType,
        EndSynchronizedUpdate,
    },
};
use tracing::info;

use streamwave::audio::CpalSink;
use streamwave::config::StreamConfig;
use streamwave::decoder::{spawn_decoder, DecodeSource};
use streamwave::events::DecodeEvent;
use streamwave::logging::init_logging;
use streamwave::player::{MonotonicClock, PlaybackState};
use streamwave::session::{SessionStatus, StreamSession};
use streamwave::waveform::{StrokeRenderer, TerminalSurface};

type DemoSession = StreamSession<CpalSink, MonotonicClock, StrokeRenderer<TerminalSurface>>;

// Rows kept below the waveform for the status line.
const STATUS_ROWS: u16 = 2;

fn main() -> Result<(), anyhow::Error> {
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: streamwave <audio file> [config.json]");
        std::process::exit(2);
    };

    let config = match args.next() {
        Some(config_path) => StreamConfig::load_from_disk(&config_path)
            .with_context(|| format!("loading config {config_path}"))?,
        None => terminal_config()?,
    };

    let sink = CpalSink::new()?;
    let mut session = StreamSession::new(
        config,
        sink,
        MonotonicClock::new(),
        StrokeRenderer::new(TerminalSurface::new()),
    )?;

    let (decoder, events) = spawn_decoder(DecodeSource::File(PathBuf::from(&path)));
    info!(path = %path, "decoder started");

    enable_raw_mode()?;
    execute!(stdout(), Clear(ClearType::All))?;
    let result = run_ui(&mut session, &events, &path);
    disable_raw_mode()?;

    session.stop();
    drop(events);
    let _ = decoder.join();
    println!();
    result
}

/// Fit the waveform to the current terminal.
fn terminal_config() -> Result<StreamConfig, anyhow::Error> {
    let (cols, rows) = terminal::size()?;
    Ok(StreamConfig {
        pixel_width: cols.max(1) as usize,
        pixel_height: rows.saturating_sub(STATUS_ROWS).max(1) as usize,
        fit_waveform_to_duration: true,
        ..StreamConfig::default()
    })
}

fn run_ui(session: &mut DemoSession, events: &Receiver<DecodeEvent>, path: &str) -> Result<(), anyhow::Error> {
    // ~20 FPS
    let frame = Duration::from_millis(50);
    let mut decoding = true;
    let mut draw_buffer = String::new();

    loop {
        while decoding {
            match events.try_recv() {
                // Failures land in the session status and show on the status line.
                Ok(ev) => {
                    let _ = session.handle_event(ev);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => decoding = false,
            }
        }

        if event::poll(frame)? {
            if let Event::Key(ev) = event::read()? {
                if ev.kind == KeyEventKind::Press {
                    let quit = matches!(ev.code, KeyCode::Char('q') | KeyCode::Char('Q'))
                        || (ev.code == KeyCode::Char('c') && ev.modifiers.contains(KeyModifiers::CONTROL));
                    if quit {
                        return Ok(());
                    }
                    match ev.code {
                        KeyCode::Char(' ') => {
                            // Kept by the session and shown on the status line.
                            if let Err(e) = session.toggle() {
                                info!("playback did not start: {e}");
                            }
                        }
                        KeyCode::Char('s') | KeyCode::Char('S') => session.stop(),
                        _ => {}
                    }
                }
            }
        }

        session.tick();
        draw(session, path, &mut draw_buffer)?;
    }
}

fn draw(session: &DemoSession, path: &str, buf: &mut String) -> Result<(), anyhow::Error> {
    buf.clear();
    let _ = write!(buf, "{}", MoveTo(0, 0));
    let lines = session.renderer().surface().lines();
    for line in &lines {
        let _ = write!(buf, "{line}\x1b[K\r\n");
    }

    let _ = write!(buf, "{}", MoveTo(0, lines.len() as u16));
    let _ = write!(buf, "{}", Clear(ClearType::UntilNewLine));

    let pos = session.position_seconds().max(0.0);
    let total = session.metadata().map(|m| m.duration_estimate_seconds).unwrap_or(0.0);
    let decoded = session.buffer().map(|b| b.available_seconds()).unwrap_or(0.0);
    let state = match session.playback_state() {
        PlaybackState::Idle => "stopped",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
    };
    let status = match session.status() {
        SessionStatus::Waiting => "opening".to_string(),
        SessionStatus::Streaming => "decoding".to_string(),
        SessionStatus::Complete => "decoded".to_string(),
        SessionStatus::Failed(e) => format!("failed: {e}"),
    };
    let status = match session.output_error() {
        Some(e) => format!("{status} | {e}"),
        None => status,
    };
    let _ = write!(
        buf,
        "{path} | {state} {} / {} | buffered {} | {status} | [space] play/pause [s] stop [q] quit",
        clock_text(pos),
        clock_text(total),
        clock_text(decoded),
    );

    let mut out = stdout();
    execute!(out, BeginSynchronizedUpdate)?;
    out.write_all(buf.as_bytes())?;
    execute!(out, EndSynchronizedUpdate)?;
    out.flush()?;
    Ok(())
}

fn clock_text(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".into();
    }
    let s = seconds as u64;
    format!("{:02}:{:02}", s / 60, s % 60)
}
