//! The signal graph, split between the control thread and the audio thread.
//!
//! [`AudioContext`] is the control handle: it creates voices, sends
//! [`GraphCommand`]s and reads the audio clock. [`AudioEngine`] lives on the
//! audio thread and is the only place samples are produced. The two halves
//! share nothing but a lock-free command ring and two atomics (clock and
//! running flag).

/// Control-side handle and audio clock.
pub mod context;
/// Audio-thread renderer.
pub mod engine;
/// Commands sent from control to audio.
pub mod message;
/// Per-voice tone generator, gain and envelope processor.
pub mod voice;

pub use context::{AudioContext, OutputStream};
pub use engine::AudioEngine;
pub use message::GraphCommand;
pub use voice::VoiceRenderer;
