use serde::{Deserialize, Serialize};

/// Controller number for channel volume.
const CC_VOLUME: u8 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    NoteOn,
    NoteOff,
    PitchBend,
    ModWheel,
    VolumeChange,
    Unrecognized,
}

/// One decoded MIDI message.
///
/// `velocity` is normalized to 0.0..=1.0 for notes and controllers, to roughly
/// -1.0..=1.0 for pitch bend, and left as the raw data byte for unrecognized
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidiEvent {
    pub channel: u8,
    pub event_type: EventType,
    pub key_number: Option<u8>,
    pub velocity: f32,
    pub raw: [u8; 3],
}

/// Decode a raw `[status, data1, data2]` message.
///
/// Total: short buffers are zero-padded and unknown status bytes decode to
/// `EventType::Unrecognized`.
pub fn decode(bytes: &[u8]) -> MidiEvent {
    let mut raw = [0u8; 3];
    for (slot, byte) in raw.iter_mut().zip(bytes) {
        *slot = *byte;
    }
    let [status, data1, data2] = raw;
    let channel = (status & 0x0F) + 1;
    let normalized = data2 as f32 / 127.0;

    let (event_type, key_number, velocity) = match status & 0xF0 {
        0x80 => (EventType::NoteOff, Some(data1), normalized),
        // Note-on with velocity zero is a note-off
        0x90 if data2 == 0 => (EventType::NoteOff, Some(data1), normalized),
        0x90 => (EventType::NoteOn, Some(data1), normalized),
        0xB0 if data1 == CC_VOLUME => (EventType::VolumeChange, None, normalized),
        0xB0 => (EventType::ModWheel, None, normalized),
        0xE0 => {
            // Coarse approximation of the 14-bit bend value, centered on 64
            let top = if data1 == 127 { 1.0 } else { 0.0 };
            (EventType::PitchBend, None, (top + data2 as f32 - 64.0) / 64.0)
        }
        _ => (EventType::Unrecognized, Some(data1), data2 as f32),
    };

    MidiEvent {
        channel,
        event_type,
        key_number,
        velocity,
        raw,
    }
}

impl MidiEvent {
    pub fn is_note(&self) -> bool {
        matches!(self.event_type, EventType::NoteOn | EventType::NoteOff)
    }
}
