use crate::{dsp::oscillator::Waveform, graph::voice::VoiceRenderer};

/// Control-to-audio commands for the signal graph.
///
/// Per-voice commands address voices by the index returned when they were
/// added. Broadcast commands apply to every voice, present and future.
pub enum GraphCommand {
    /// Add an unrouted voice; it renders nothing until connected.
    AddVoice(Box<VoiceRenderer>),
    ConnectVoice { voice: usize },
    SetDetune { voice: usize, cents: f32 },
    SetVoiceGain { voice: usize, level: f32 },
    SetWaveform(Waveform),
    SetPitchBend { cents: f32 },
    RampMasterGain { target: f32, seconds: f32 },
}

impl GraphCommand {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            GraphCommand::AddVoice(_) => "add-voice",
            GraphCommand::ConnectVoice { .. } => "connect-voice",
            GraphCommand::SetDetune { .. } => "set-detune",
            GraphCommand::SetVoiceGain { .. } => "set-voice-gain",
            GraphCommand::SetWaveform(_) => "set-waveform",
            GraphCommand::SetPitchBend { .. } => "set-pitch-bend",
            GraphCommand::RampMasterGain { .. } => "ramp-master-gain",
        }
    }
}
