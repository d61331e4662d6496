/// Reference pitch of the tone generators (A4, MIDI key 69).
pub const A4_FREQUENCY: f32 = 440.0;
pub const A4_KEY: u8 = 69;

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Equal-tempered offset of a key from A4, in cents.
pub fn key_number_to_offset_in_cents(key: u8) -> f32 {
    (key as f32 - A4_KEY as f32) * 100.0
}

/// Frequency of a tone generator detuned by `cents` from A4.
pub fn cents_to_frequency(cents: f32) -> f32 {
    A4_FREQUENCY * 2.0_f32.powf(cents / 1200.0)
}

/// Scientific pitch name, with key 60 as C4.
pub fn key_number_to_note_name(key: u8) -> String {
    let octave = key as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[key as usize % 12], octave)
}
