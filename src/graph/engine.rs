use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use rtrb::Consumer;

use crate::{
    dsp::{oscillator::Waveform, ramp::LinearRamp},
    graph::{message::GraphCommand, voice::VoiceRenderer},
    MAX_BLOCK_SIZE,
};

/// Audio-thread side of the signal graph.
///
/// Owned by whatever drives the output (cpal callback, offline driver). All
/// state changes arrive as [`GraphCommand`]s; the engine never blocks.
pub struct AudioEngine {
    rx: Consumer<GraphCommand>,
    voices: Vec<Box<VoiceRenderer>>,
    waveform: Waveform,
    pitch_bend_cents: f32,
    master: LinearRamp,
    master_buffer: Vec<f32>,
    sample_rate: f32,
    frames: u64,
    clock: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
}

impl AudioEngine {
    pub(crate) fn new(
        rx: Consumer<GraphCommand>,
        sample_rate: f32,
        max_voices: usize,
        clock: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            rx,
            voices: Vec::with_capacity(max_voices),
            waveform: Waveform::default(),
            pitch_bend_cents: 0.0,
            master: LinearRamp::new(0.0),
            master_buffer: vec![0.0; MAX_BLOCK_SIZE],
            sample_rate,
            frames: 0,
            clock,
            running,
        }
    }

    pub fn render_block(&mut self, out: &mut [f32]) {
        self.process_commands();

        // Ports are serviced even while suspended so handshakes can complete
        let now = self.current_time();
        for voice in &mut self.voices {
            voice.handle_messages(now);
        }

        out.fill(0.0);
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            for voice in &mut self.voices {
                voice.render_add(chunk, self.pitch_bend_cents, self.sample_rate);
            }

            let gains = &mut self.master_buffer[..chunk.len()];
            for g in gains.iter_mut() {
                *g = self.master.next_sample();
            }
            for (o, g) in chunk.iter_mut().zip(gains.iter()) {
                *o *= g;
            }
        }

        self.frames += out.len() as u64;
        self.clock.store(self.frames, Ordering::Release);
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.rx.pop() {
            match command {
                GraphCommand::AddVoice(mut voice) => {
                    voice.set_waveform(self.waveform);
                    self.voices.push(voice);
                }
                GraphCommand::ConnectVoice { voice } => {
                    if let Some(v) = self.voices.get_mut(voice) {
                        v.connect();
                    }
                }
                GraphCommand::SetDetune { voice, cents } => {
                    if let Some(v) = self.voices.get_mut(voice) {
                        v.set_detune(cents);
                    }
                }
                GraphCommand::SetVoiceGain { voice, level } => {
                    if let Some(v) = self.voices.get_mut(voice) {
                        v.set_gain(level);
                    }
                }
                GraphCommand::SetWaveform(waveform) => {
                    self.waveform = waveform;
                    for voice in &mut self.voices {
                        voice.set_waveform(waveform);
                    }
                }
                GraphCommand::SetPitchBend { cents } => {
                    self.pitch_bend_cents = cents;
                }
                GraphCommand::RampMasterGain { target, seconds } => {
                    let samples = (seconds.max(0.0) * self.sample_rate).round() as u32;
                    self.master.ramp_to(target, samples);
                }
            }
        }
    }

    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn voice(&self, index: usize) -> Option<&VoiceRenderer> {
        self.voices.get(index).map(|v| v.as_ref())
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    pub fn pitch_bend_cents(&self) -> f32 {
        self.pitch_bend_cents
    }

    pub fn master_gain(&self) -> f32 {
        self.master.value()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        dsp::oscillator::Waveform,
        graph::{context::AudioContext, message::GraphCommand},
        worklet::{ParamName, PortMessage, ProcessorReply},
    };

    const SAMPLE_RATE: f32 = 1_000.0;

    #[test]
    fn suspended_engine_is_silent_but_answers_ports() {
        let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, 4);
        let (_, mut port) = ctx.create_voice().unwrap();
        port.post(PortMessage::Wasm {
            wasm_module: Arc::from(&b"payload"[..]),
        })
        .unwrap();

        let mut out = [1.0f32; 16];
        engine.render_block(&mut out);

        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(engine.current_time(), 0.0);
        assert_eq!(port.try_recv(), Some(ProcessorReply::ModuleReady { value: true }));
    }

    #[test]
    fn waveform_and_pitch_bend_reach_every_voice() {
        let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, 4);
        ctx.create_voice().unwrap();
        ctx.send(GraphCommand::SetWaveform(Waveform::Square)).unwrap();
        ctx.send(GraphCommand::SetPitchBend { cents: 150.0 }).unwrap();
        ctx.create_voice().unwrap();

        let mut out = [0.0f32; 8];
        engine.render_block(&mut out);

        assert_eq!(engine.voice_count(), 2);
        assert_eq!(engine.voice(0).unwrap().waveform(), Waveform::Square);
        assert_eq!(engine.voice(1).unwrap().waveform(), Waveform::Square);
        assert_eq!(engine.pitch_bend_cents(), 150.0);
    }

    #[test]
    fn global_changes_reach_sounding_and_idle_voices() {
        let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, 4);
        ctx.resume().unwrap();
        let mut ports = Vec::new();
        for _ in 0..2 {
            let (index, mut port) = ctx.create_voice().unwrap();
            port.post(PortMessage::Wasm {
                wasm_module: Arc::from(&b"payload"[..]),
            })
            .unwrap();
            ctx.send(GraphCommand::ConnectVoice { voice: index }).unwrap();
            ports.push(port);
        }
        ctx.send(GraphCommand::SetWaveform(Waveform::Square)).unwrap();
        ctx.send(GraphCommand::SetVoiceGain { voice: 0, level: 1.0 }).unwrap();
        ctx.send(GraphCommand::RampMasterGain { target: 1.0, seconds: 0.0 }).unwrap();
        ports[0].set_param(ParamName::Trigger, 1.0, 0.0).unwrap();

        let mut out = [0.0f32; 16];
        engine.render_block(&mut out);
        assert!(out.iter().any(|s| s.abs() > 0.0));

        ctx.send(GraphCommand::SetWaveform(Waveform::Sawtooth)).unwrap();
        ctx.send(GraphCommand::SetPitchBend { cents: -200.0 }).unwrap();
        engine.render_block(&mut out);

        assert_eq!(engine.waveform(), Waveform::Sawtooth);
        assert_eq!(engine.pitch_bend_cents(), -200.0);
        for index in 0..2 {
            let voice = engine.voice(index).unwrap();
            assert_eq!(voice.waveform(), Waveform::Sawtooth);
            assert!(voice.is_connected());
        }
        assert_eq!(engine.voice(0).unwrap().gain(), 1.0);
        assert_eq!(engine.voice(1).unwrap().gain(), 0.0);
        assert!(out.iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn connected_voice_sounds_after_trigger() {
        let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, 4);
        ctx.resume().unwrap();
        let (index, mut port) = ctx.create_voice().unwrap();
        port.post(PortMessage::Wasm {
            wasm_module: Arc::from(&b"payload"[..]),
        })
        .unwrap();
        ctx.send(GraphCommand::ConnectVoice { voice: index }).unwrap();
        ctx.send(GraphCommand::SetVoiceGain { voice: index, level: 1.0 }).unwrap();
        ctx.send(GraphCommand::SetWaveform(Waveform::Square)).unwrap();
        ctx.send(GraphCommand::RampMasterGain { target: 1.0, seconds: 0.0 }).unwrap();
        port.set_param(ParamName::Trigger, 1.0, 0.0).unwrap();

        let mut out = [0.0f32; 32];
        engine.render_block(&mut out);

        assert!(out.iter().any(|s| s.abs() > 0.1));
        assert!(engine.voice(index).unwrap().is_connected());
        assert!((ctx.current_time() - 0.032).abs() < 1e-9);
    }

    #[test]
    fn master_gain_ramps_instead_of_stepping() {
        let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, 1);
        ctx.resume().unwrap();
        ctx.send(GraphCommand::RampMasterGain { target: 1.0, seconds: 0.01 }).unwrap();

        let mut out = [0.0f32; 5];
        engine.render_block(&mut out);
        assert!((engine.master_gain() - 0.5).abs() < 1e-6);

        engine.render_block(&mut out);
        assert_eq!(engine.master_gain(), 1.0);
    }
}
