use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    graph::{AudioContext, GraphCommand},
    io::converter::key_number_to_offset_in_cents,
    synth::envelope_unit::EnvelopeUnit,
};

/// Key used for pitch when a note-on carries no key number.
pub const DEFAULT_KEY: u8 = 48;

/// One slot of the polyphony pool.
///
/// The audio objects (tone generator, gain, envelope processor) live in the
/// engine under `index`; this side keeps the allocation bookkeeping.
pub struct Voice {
    index: usize,
    envelope: EnvelopeUnit,
    pub(crate) is_busy: bool,
    pub(crate) is_releasing: bool,
    pub(crate) last_invocation_time: f64,
    pub(crate) note: Option<u8>,
    pub(crate) key_velocity: f32,
    /// Bumped on every allocation; stale release timers compare against it.
    pub(crate) generation: u64,
}

/// What a consumer (note display, debugger) sees of a voice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceSnapshot {
    pub index: usize,
    pub is_busy: bool,
    pub is_releasing: bool,
    pub last_invocation_time: f64,
    pub note: Option<u8>,
    pub key_velocity: f32,
}

impl Voice {
    pub fn new(index: usize, envelope: EnvelopeUnit) -> Self {
        Self {
            index,
            envelope,
            is_busy: false,
            is_releasing: false,
            last_invocation_time: 0.0,
            note: None,
            key_velocity: 0.0,
            generation: 0,
        }
    }

    /// Take the voice for a new note and make it sound.
    ///
    /// The bookkeeping is only updated once every command went out; on error
    /// the voice keeps its previous state.
    pub(crate) fn start(&mut self, ctx: &mut AudioContext, key: Option<u8>, velocity: f32, now: f64) -> Result<()> {
        let cents = key_number_to_offset_in_cents(key.unwrap_or(DEFAULT_KEY));
        ctx.send(GraphCommand::SetDetune {
            voice: self.index,
            cents,
        })?;
        self.envelope.trigger()?;
        ctx.send(GraphCommand::SetVoiceGain {
            voice: self.index,
            level: velocity,
        })?;

        self.is_busy = true;
        self.is_releasing = false;
        self.last_invocation_time = now;
        self.note = key;
        self.key_velocity = velocity;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// Enter release. Busy flags are cleared later by the pool.
    pub(crate) fn release(&mut self) {
        self.is_releasing = true;
        self.key_velocity = 0.0;
        if let Err(err) = self.envelope.release() {
            log::warn!("voice {}: release not delivered: {err}", self.index);
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    pub fn is_releasing(&self) -> bool {
        self.is_releasing
    }

    pub fn last_invocation_time(&self) -> f64 {
        self.last_invocation_time
    }

    pub fn note(&self) -> Option<u8> {
        self.note
    }

    pub fn key_velocity(&self) -> f32 {
        self.key_velocity
    }

    pub fn envelope(&self) -> &EnvelopeUnit {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut EnvelopeUnit {
        &mut self.envelope
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        VoiceSnapshot {
            index: self.index,
            is_busy: self.is_busy,
            is_releasing: self.is_releasing,
            last_invocation_time: self.last_invocation_time,
            note: self.note,
            key_velocity: self.key_velocity,
        }
    }
}
