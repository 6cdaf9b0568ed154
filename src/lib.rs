// src/lib.rs

pub mod audio;
pub mod buffer;
pub mod config;
pub mod decoder;
pub mod error;
pub mod events;
pub mod logging;
pub mod player;
pub mod session;
pub mod waveform;

pub use buffer::{AppendOutcome, PlaybackProgress, StoreSnapshot, StreamingBuffer};
pub use config::StreamConfig;
pub use decoder::{spawn_decoder, DecodeSource};
pub use error::{OverflowWarning, StreamError, StreamResult};
pub use events::{DecodeEvent, FrameBatch, MediaMetadata};
pub use player::{PlaybackController, PlaybackState};
pub use session::{SessionStatus, StreamSession};
pub use waveform::{PeakPair, WaveformAggregator};
