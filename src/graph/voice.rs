use crate::{
    dsp::oscillator::{Oscillator, Waveform},
    io::converter::cents_to_frequency,
    worklet::{EnvelopeProcessor, ProcessorOptions, ProcessorPort},
    MAX_BLOCK_SIZE,
};

/// Audio-thread half of a voice: tone generator, velocity gain and the
/// envelope processor whose output modulates that gain.
pub struct VoiceRenderer {
    processor: EnvelopeProcessor,
    oscillator: Oscillator,
    detune: f32,
    gain: f32,
    connected: bool,
    envelope_buffer: Vec<f32>,
}

impl VoiceRenderer {
    pub fn new(sample_rate: f32, waveform: Waveform) -> (ProcessorPort, Self) {
        let (port, processor) = EnvelopeProcessor::new(ProcessorOptions::envelope(sample_rate));
        let renderer = Self {
            processor,
            oscillator: Oscillator::new(waveform),
            detune: 0.0,
            gain: 0.0,
            connected: false,
            envelope_buffer: vec![0.0; MAX_BLOCK_SIZE],
        };
        (port, renderer)
    }

    pub fn handle_messages(&mut self, now: f64) {
        self.processor.handle_messages(now);
    }

    /// Mix this voice into `out`. `out` must not exceed `MAX_BLOCK_SIZE`.
    pub fn render_add(&mut self, out: &mut [f32], pitch_bend_cents: f32, sample_rate: f32) {
        if !self.connected {
            return;
        }
        let envelope = &mut self.envelope_buffer[..out.len()];
        self.processor.process(envelope);

        let frequency = cents_to_frequency(self.detune + pitch_bend_cents);
        for (o, env) in out.iter_mut().zip(envelope.iter()) {
            *o += self.oscillator.next_sample(frequency, sample_rate) * self.gain * env;
        }
    }

    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_detune(&mut self, cents: f32) {
        self.detune = cents;
    }

    pub fn detune(&self) -> f32 {
        self.detune
    }

    pub fn set_gain(&mut self, level: f32) {
        self.gain = level;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.oscillator.set_waveform(waveform);
    }

    pub fn waveform(&self) -> Waveform {
        self.oscillator.waveform()
    }
}
