//! Low-level DSP primitives rendered on the audio thread.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice renderers and envelope processors. They stay
//! focused on the signal math; message handling lives one layer up.

/// Attack/hold/decay/sustain/release envelope generator.
pub mod envelope;
/// Tone generator waveforms.
pub mod oscillator;
/// Linear parameter ramps.
pub mod ramp;

pub use envelope::{Envelope, EnvelopeParameters, Stage};
pub use oscillator::{Oscillator, Waveform};
pub use ramp::LinearRamp;
