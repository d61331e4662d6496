use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{
    dsp::envelope::{EnvelopeParameters, Stage},
    error::SynthError,
};

/// Real-time parameters exposed by the envelope processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParamName {
    Trigger,
    AttackTime,
    HoldTime,
    DecayTime,
    ReleaseTime,
    AttackValue,
    SustainValue,
}

impl ParamName {
    /// The six shape parameters, in editor order.
    pub const ENVELOPE: [ParamName; 6] = [
        ParamName::AttackTime,
        ParamName::HoldTime,
        ParamName::DecayTime,
        ParamName::ReleaseTime,
        ParamName::AttackValue,
        ParamName::SustainValue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamName::Trigger => "trigger",
            ParamName::AttackTime => "attackTime",
            ParamName::HoldTime => "holdTime",
            ParamName::DecayTime => "decayTime",
            ParamName::ReleaseTime => "releaseTime",
            ParamName::AttackValue => "attackValue",
            ParamName::SustainValue => "sustainValue",
        }
    }

    pub fn is_envelope(&self) -> bool {
        *self != ParamName::Trigger
    }
}

impl fmt::Display for ParamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamName {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        std::iter::once(ParamName::Trigger)
            .chain(ParamName::ENVELOPE)
            .find(|name| name.as_str() == s)
            .ok_or_else(|| SynthError::UnknownParameter(s.to_string()))
    }
}

impl EnvelopeParameters {
    /// Value of a shape parameter; `None` for the trigger line.
    pub fn get(&self, name: ParamName) -> Option<f32> {
        match name {
            ParamName::Trigger => None,
            ParamName::AttackTime => Some(self.attack_time),
            ParamName::HoldTime => Some(self.hold_time),
            ParamName::DecayTime => Some(self.decay_time),
            ParamName::ReleaseTime => Some(self.release_time),
            ParamName::AttackValue => Some(self.attack_value),
            ParamName::SustainValue => Some(self.sustain_value),
        }
    }

    /// Set a shape parameter. Returns false for the trigger line.
    pub fn set(&mut self, name: ParamName, value: f32) -> bool {
        let slot = match name {
            ParamName::Trigger => return false,
            ParamName::AttackTime => &mut self.attack_time,
            ParamName::HoldTime => &mut self.hold_time,
            ParamName::DecayTime => &mut self.decay_time,
            ParamName::ReleaseTime => &mut self.release_time,
            ParamName::AttackValue => &mut self.attack_value,
            ParamName::SustainValue => &mut self.sustain_value,
        };
        *slot = value;
        true
    }
}

/// Snapshot reported by an envelope processor on request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeState {
    pub stage: Stage,
    pub stage_progress: f32,
    pub output_value: f32,
    pub parameters: EnvelopeParameters,
}

impl EnvelopeState {
    /// Position on the envelope editor's time axis, where sustain is drawn
    /// one second wide. `-1.0` at rest.
    pub fn total_progress(&self) -> f32 {
        let p = &self.parameters;
        match self.stage {
            Stage::Rest => -1.0,
            Stage::Attack => self.stage_progress * p.attack_time,
            Stage::Hold => p.attack_time + self.stage_progress * p.hold_time,
            Stage::Decay => p.attack_time + p.hold_time + self.stage_progress * p.decay_time,
            Stage::Sustain => p.attack_time + p.hold_time + p.decay_time + self.stage_progress,
            Stage::Release => {
                p.attack_time
                    + p.hold_time
                    + p.decay_time
                    + 1.0
                    + self.stage_progress * p.release_time
            }
        }
    }
}

/// Messages posted to a processor's port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PortMessage {
    /// Hand over the processor payload; answered with `module-ready`.
    Wasm {
        #[serde(rename = "wasmModule")]
        wasm_module: Arc<[u8]>,
    },
    /// Ask for a `state` reply.
    GetState,
}

/// Messages a processor posts back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProcessorReply {
    ModuleReady { value: bool },
    State { state: EnvelopeState },
}

/// Everything travelling from the control thread to one processor.
///
/// Parameter automation shares the ring with port messages so their relative
/// order is preserved.
#[derive(Debug, Clone)]
pub enum Inbound {
    Port(PortMessage),
    /// Set `name` to `value` once the audio clock reaches `at` seconds.
    /// `0.0` applies on the next block.
    Param { name: ParamName, value: f32, at: f64 },
}
