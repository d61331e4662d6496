//! Envelope processor and the message protocol used to drive it.
//!
//! Each voice owns one processor. The control thread never touches processor
//! state directly: it posts [`PortMessage`]s and parameter events through a
//! [`ProcessorPort`] and reads [`ProcessorReply`]s back. The processor side is
//! drained by the audio engine once per block, including while the audio
//! context is suspended.
//!
//! ```text
//!   control                         audio thread
//!   ───────                         ────────────
//!   wasm { payload }        ──→     store payload
//!                           ←──     module-ready { value }
//!   param(trigger, 1, t=0)  ──→     attack
//!   get-state               ──→
//!                           ←──     state { stage, stageProgress, ... }
//! ```

pub mod message;
pub mod module;
pub mod processor;

pub use crate::dsp::envelope::{EnvelopeParameters, Stage};
pub use message::{EnvelopeState, Inbound, ParamName, PortMessage, ProcessorReply};
pub use module::{FsModuleSource, ModuleSource, StaticModuleSource, ENVELOPE_PROCESSOR};
pub use processor::{EnvelopeProcessor, ProcessorOptions, ProcessorPort};
