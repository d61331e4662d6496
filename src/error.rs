//! Error types for the signal chain and its host collaborators.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by initialization, host access and configuration.
///
/// Note handling itself never fails: unmatched note-offs and unknown MIDI
/// status bytes are silent no-ops, not errors.
#[derive(Error, Debug)]
pub enum SynthError {
    /// The envelope processor module could not be loaded.
    #[error("failed to load processor module '{name}': {reason}")]
    ModuleLoad { name: String, reason: String },

    /// The processor payload could not be fetched.
    #[error("failed to fetch processor payload: {0}")]
    PayloadFetch(String),

    /// A voice's processor never answered the module handshake.
    #[error("voice {voice}: no module-ready reply within {timeout:?}")]
    HandshakeTimeout { voice: usize, timeout: Duration },

    /// A voice's processor refused the payload.
    #[error("voice {voice}: processor rejected the module payload")]
    HandshakeRejected { voice: usize },

    /// The other end of a message port has gone away.
    #[error("message port closed")]
    PortClosed,

    /// A ring buffer towards the audio thread is full.
    #[error("{0} queue is full")]
    QueueFull(&'static str),

    #[error("unknown waveform '{0}'")]
    UnknownWaveform(String),

    #[error("unknown envelope parameter '{0}'")]
    UnknownParameter(String),

    #[error("MIDI channel {0} is outside 1..=16")]
    InvalidChannel(u8),

    /// Audio output device could not be opened or started.
    #[error("audio device error: {0}")]
    AudioDevice(String),

    /// The audio context could not be resumed.
    #[error("failed to resume audio context: {0}")]
    Resume(String),

    /// MIDI access was denied or no backend is available.
    #[error("MIDI access failed: {0}")]
    MidiAccess(String),

    /// Settings could not be located or written.
    #[error("settings storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SynthError.
pub type Result<T> = std::result::Result<T, SynthError>;
