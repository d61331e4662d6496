pub mod config;
pub mod dsp;
pub mod error;
pub mod graph; // Control/audio split of the signal graph
pub mod io;
pub mod runtime; // Output hosts that drive the audio engine
pub mod synth; // Voice pool, envelope adapters and the signal chain
pub mod worklet; // Envelope processor protocol

pub use config::{ChainConfig, StealPolicy};
pub use error::{Result, SynthError};
pub use io::midi::{decode, EventType, MidiEvent};
pub use synth::chain::{ChainDelta, SignalChain};
pub use worklet::{EnvelopeParameters, EnvelopeState, ParamName, Stage};

pub const MAX_BLOCK_SIZE: usize = 2048;
/// Number of voices in the polyphony pool.
pub const POOL_SIZE: usize = 20;
pub(crate) const MIN_TIME: f32 = 1.0 / 48_000.0;
