// Voice management and MIDI routing on the control thread.
// Everything here talks to the audio side only through `graph::AudioContext`
// and the envelope processor ports.

pub mod chain;
pub mod envelope_unit;
pub mod pool;
pub mod voice;

pub use chain::{ChainDelta, SignalChain, MASTER_GAIN_RAMP, PITCH_BEND_RANGE_CENTS};
pub use envelope_unit::{EnvelopeUnit, SharedParameters};
pub use pool::VoicePool;
pub use voice::{Voice, VoiceSnapshot};
