//! Top-level coordinator between decoded MIDI and the audio graph.
//!
//! [`SignalChain`] owns the control half of the graph and the voice pool. It
//! is driven from a single control thread:
//!
//! ```ignore
//! let (context, engine) = AudioContext::new(48_000.0, POOL_SIZE);
//! // hand `engine` to an output (cpal callback, offline driver)
//! let mut chain = SignalChain::new(context, ChainConfig::default())?;
//! chain.initialize(&StaticModuleSource::builtin()).await?;
//!
//! let delta = chain.handle_midi_event(&decode(&[0x90, 60, 100]));
//! chain.tick(); // periodically: release clears, envelope state replies
//! ```

use std::{cell::Cell, rc::Rc, time::Instant};

use serde::Serialize;

use crate::{
    config::ChainConfig,
    dsp::oscillator::Waveform,
    error::{Result, SynthError},
    graph::{AudioContext, GraphCommand},
    io::midi::{EventType, MidiEvent},
    synth::{
        envelope_unit::{EnvelopeUnit, SharedParameters},
        pool::VoicePool,
        voice::{Voice, VoiceSnapshot},
    },
    worklet::{EnvelopeParameters, EnvelopeState, ModuleSource, ParamName, ENVELOPE_PROCESSOR},
};

/// Master gain changes glide over this many seconds.
pub const MASTER_GAIN_RAMP: f32 = 0.01;
/// Full-scale pitch bend in cents, either direction.
pub const PITCH_BEND_RANGE_CENTS: f32 = 200.0;
/// Upper bound applied to every envelope parameter update.
pub const ENVELOPE_PARAM_CEILING: f32 = 5.0;

/// What changed as a result of one MIDI event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDelta {
    pub voices: Option<Vec<VoiceSnapshot>>,
    pub master_gain: Option<f32>,
}

impl ChainDelta {
    pub fn is_empty(&self) -> bool {
        self.voices.is_none() && self.master_gain.is_none()
    }
}

pub struct SignalChain {
    context: AudioContext,
    pool: VoicePool,
    config: ChainConfig,
    parameters: SharedParameters,
    master_gain: f32,
    /// Origin of the control clock that release deadlines run on.
    epoch: Instant,
}

impl SignalChain {
    /// Wrap a context. The pool stays empty until [`initialize`] succeeds.
    ///
    /// [`initialize`]: SignalChain::initialize
    pub fn new(mut context: AudioContext, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let master_gain = config.initial_master_gain;
        context.send(GraphCommand::RampMasterGain {
            target: master_gain,
            seconds: 0.0,
        })?;
        context.send(GraphCommand::SetWaveform(config.waveform))?;

        Ok(Self {
            context,
            pool: VoicePool::empty(config.steal_policy),
            parameters: Rc::new(Cell::new(clamp_envelope(config.envelope))),
            config,
            master_gain,
            epoch: Instant::now(),
        })
    }

    /// Load the envelope module and bring up `pool_size` voices, one
    /// handshake at a time.
    ///
    /// The context is suspended while this runs. On error the pool is left
    /// empty and note events do nothing.
    pub async fn initialize<S: ModuleSource>(&mut self, source: &S) -> Result<()> {
        self.context.suspend();

        source.load_module(ENVELOPE_PROCESSOR).await?;
        let payload = source.fetch_payload().await?;
        let timeout = self.config.handshake_timeout_duration();
        let poll = self.config.handshake_poll_interval();

        let mut voices = Vec::with_capacity(self.config.pool_size);
        for _ in 0..self.config.pool_size {
            let (index, port) = self.context.create_voice()?;
            let mut envelope = EnvelopeUnit::new(index, port, self.parameters.clone());
            envelope.initialize(payload.clone(), timeout, poll).await?;
            self.context.send(GraphCommand::ConnectVoice { voice: index })?;
            voices.push(Voice::new(index, envelope));
        }

        self.pool = VoicePool::new(voices, self.config.steal_policy);
        log::info!(
            "signal chain ready: {} voices, {:?} stealing",
            self.pool.len(),
            self.config.steal_policy
        );
        Ok(())
    }

    /// Route one decoded event and report what changed.
    pub fn handle_midi_event(&mut self, event: &MidiEvent) -> ChainDelta {
        if let Some(channel) = self.config.input_channel {
            if event.channel != channel {
                log::trace!("ignoring event on channel {}", event.channel);
                return ChainDelta::default();
            }
        }

        let now = self.context.current_time();
        let control_now = self.control_time();
        match event.event_type {
            EventType::NoteOn => {
                self.pool.allocate(event, now, &mut self.context);
                ChainDelta {
                    voices: Some(self.pool.snapshot()),
                    master_gain: None,
                }
            }
            EventType::NoteOff => {
                self.pool.release(event, control_now);
                ChainDelta {
                    voices: Some(self.pool.snapshot()),
                    master_gain: None,
                }
            }
            EventType::PitchBend => {
                self.set_pitch_bend(event.velocity);
                ChainDelta::default()
            }
            EventType::VolumeChange => {
                let applied = match self.set_master_gain(event.velocity) {
                    Ok(()) => Some(event.velocity),
                    Err(err) => {
                        log::warn!("master gain not applied: {err}");
                        None
                    }
                };
                ChainDelta {
                    voices: None,
                    master_gain: applied,
                }
            }
            EventType::ModWheel | EventType::Unrecognized => {
                log::debug!("unhandled {:?} {:?}", event.event_type, event.raw);
                ChainDelta::default()
            }
        }
    }

    /// Glide the master gain to `level`, resuming a suspended context first.
    /// The range is the caller's concern.
    pub fn set_master_gain(&mut self, level: f32) -> Result<()> {
        if !self.context.is_running() {
            if let Err(err) = self.context.resume() {
                log::warn!("could not resume audio: {err}");
            }
        }
        self.context.send(GraphCommand::RampMasterGain {
            target: level,
            seconds: MASTER_GAIN_RAMP,
        })?;
        self.master_gain = level;
        Ok(())
    }

    /// Clamp each value to `0..=5` and broadcast the ones that changed.
    ///
    /// `trigger` is not an envelope shape parameter and is skipped. Returns
    /// the resulting shared parameters.
    pub fn update_envelope_parameters<I>(&mut self, changes: I) -> EnvelopeParameters
    where
        I: IntoIterator<Item = (ParamName, f32)>,
    {
        let mut params = self.parameters.get();
        for (name, value) in changes {
            if !name.is_envelope() || value.is_nan() {
                log::warn!("ignoring envelope update {name} = {value}");
                continue;
            }
            let clamped = value.clamp(0.0, ENVELOPE_PARAM_CEILING);
            if params.get(name) == Some(clamped) {
                continue;
            }
            params.set(name, clamped);
            self.parameters.set(params);
            self.pool.broadcast_parameter(name, clamped);
        }
        params
    }

    pub fn set_waveform(&mut self, waveform: Waveform) -> Result<()> {
        self.context.send(GraphCommand::SetWaveform(waveform))?;
        self.config.waveform = waveform;
        Ok(())
    }

    pub fn set_waveform_by_name(&mut self, name: &str) -> Result<()> {
        self.set_waveform(name.parse()?)
    }

    /// Latch a bend of `-1.0..=1.0` onto every voice.
    pub fn set_pitch_bend(&mut self, amount: f32) {
        let cents = amount * PITCH_BEND_RANGE_CENTS;
        if let Err(err) = self.context.send(GraphCommand::SetPitchBend { cents }) {
            log::warn!("pitch bend not applied: {err}");
        }
    }

    pub fn set_input_channel(&mut self, channel: Option<u8>) -> Result<()> {
        if let Some(c) = channel {
            if !(1..=16).contains(&c) {
                return Err(SynthError::InvalidChannel(c));
            }
        }
        self.config.input_channel = channel;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.context.resume()
    }

    pub fn stop(&mut self) {
        self.context.suspend();
    }

    pub fn is_running(&self) -> bool {
        self.context.is_running()
    }

    /// Housekeeping for the control loop: free voices whose release has
    /// finished and deliver envelope state replies.
    ///
    /// Release deadlines follow the control clock, so voices are freed even
    /// while the context is suspended. Returns the number of voices freed.
    pub fn tick(&mut self) -> usize {
        let freed = self.pool.run_due(self.control_time());
        self.pool.poll_envelopes();
        freed
    }

    /// Ask every voice's envelope for a state snapshot; answers arrive
    /// through the callbacks on a later [`tick`](SignalChain::tick).
    pub fn request_states(&mut self) {
        self.pool.request_states();
    }

    /// Subscribe to one voice's envelope state. Replaces any earlier
    /// subscriber for that voice; returns `false` for an unknown voice.
    pub fn set_state_callback(&mut self, voice: usize, callback: impl FnMut(EnvelopeState) + 'static) -> bool {
        match self.pool.voice_mut(voice) {
            Some(v) => {
                v.envelope_mut().set_state_callback(callback);
                true
            }
            None => false,
        }
    }

    /// Drop the state subscriber of one voice; returns `false` for an
    /// unknown voice.
    pub fn clear_state_callback(&mut self, voice: usize) -> bool {
        match self.pool.voice_mut(voice) {
            Some(v) => {
                v.envelope_mut().clear_state_callback();
                true
            }
            None => false,
        }
    }

    pub fn voices(&self) -> Vec<VoiceSnapshot> {
        self.pool.snapshot()
    }

    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn current_time(&self) -> f64 {
        self.context.current_time()
    }

    /// Wall-clock seconds since the chain was created.
    pub fn control_time(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn parameters(&self) -> EnvelopeParameters {
        self.parameters.get()
    }

    pub fn waveform(&self) -> Waveform {
        self.config.waveform
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

fn clamp_envelope(mut params: EnvelopeParameters) -> EnvelopeParameters {
    for name in ParamName::ENVELOPE {
        if let Some(value) = params.get(name) {
            let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, ENVELOPE_PARAM_CEILING) };
            params.set(name, clamped);
        }
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{graph::AudioEngine, io::midi::decode};

    fn chain(config: ChainConfig) -> (SignalChain, AudioEngine) {
        let (context, engine) = AudioContext::new(1_000.0, config.pool_size);
        (SignalChain::new(context, config).unwrap(), engine)
    }

    #[test]
    fn uninitialized_chain_ignores_notes() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        let delta = chain.handle_midi_event(&decode(&[0x90, 60, 100]));
        assert_eq!(delta.voices, Some(Vec::new()));
        assert_eq!(delta.master_gain, None);
    }

    #[test]
    fn volume_change_reports_master_gain_and_resumes() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        assert!(!chain.is_running());

        let delta = chain.handle_midi_event(&decode(&[0xB0, 7, 127]));
        assert_eq!(delta.master_gain, Some(1.0));
        assert!(delta.voices.is_none());
        assert_eq!(chain.master_gain(), 1.0);
        assert!(chain.is_running());
    }

    #[test]
    fn mod_wheel_and_bend_produce_empty_deltas() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        assert!(chain.handle_midi_event(&decode(&[0xB0, 1, 90])).is_empty());
        assert!(chain.handle_midi_event(&decode(&[0xE0, 0, 96])).is_empty());
        assert!(chain.handle_midi_event(&decode(&[0xF8])).is_empty());
    }

    #[test]
    fn events_on_other_channels_are_filtered() {
        let (mut chain, _engine) = chain(ChainConfig::new().input_channel(Some(2)));
        assert!(chain.handle_midi_event(&decode(&[0xB0, 7, 127])).is_empty());
        assert_eq!(chain.master_gain(), 0.2);

        let delta = chain.handle_midi_event(&decode(&[0xB1, 7, 64]));
        assert!(delta.master_gain.is_some());
    }

    #[test]
    fn invalid_channel_is_rejected() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        assert!(matches!(chain.set_input_channel(Some(0)), Err(SynthError::InvalidChannel(0))));
        assert!(chain.set_input_channel(Some(16)).is_ok());
    }

    #[test]
    fn envelope_updates_are_clamped() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        let params = chain.update_envelope_parameters([
            (ParamName::AttackTime, 999.0),
            (ParamName::SustainValue, -1.0),
            (ParamName::Trigger, 1.0),
        ]);
        assert_eq!(params.attack_time, 5.0);
        assert_eq!(params.sustain_value, 0.0);
        assert_eq!(chain.parameters(), params);
    }

    #[test]
    fn configured_envelope_is_clamped() {
        let envelope = EnvelopeParameters {
            attack_time: 999.0,
            release_time: -2.0,
            ..EnvelopeParameters::default()
        };
        let (chain, _engine) = chain(ChainConfig::new().envelope(envelope));
        let params = chain.parameters();
        assert_eq!(params.attack_time, 5.0);
        assert_eq!(params.release_time, 0.0);
        assert_eq!(params.decay_time, EnvelopeParameters::default().decay_time);
    }

    #[test]
    fn full_bend_reaches_the_engine_as_200_cents() {
        let (mut chain, mut engine) = chain(ChainConfig::default());
        chain.handle_midi_event(&decode(&[0xE0, 127, 127]));
        engine.render_block(&mut [0.0; 8]);
        assert_eq!(engine.pitch_bend_cents(), 200.0);

        chain.handle_midi_event(&decode(&[0xE0, 0, 0]));
        engine.render_block(&mut [0.0; 8]);
        assert_eq!(engine.pitch_bend_cents(), -200.0);
    }

    #[test]
    fn unsent_volume_change_reports_no_gain() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        while chain.context.send(GraphCommand::SetPitchBend { cents: 0.0 }).is_ok() {}

        let delta = chain.handle_midi_event(&decode(&[0xB0, 7, 127]));
        assert_eq!(delta.master_gain, None);
        assert_eq!(chain.master_gain(), 0.2);
        assert!(chain.set_master_gain(0.5).is_err());
    }

    #[test]
    fn state_callbacks_need_a_known_voice() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        assert!(!chain.set_state_callback(0, |_| {}));
        assert!(!chain.clear_state_callback(0));
    }

    #[test]
    fn control_clock_runs_while_suspended() {
        let (chain, _engine) = chain(ChainConfig::default());
        let before = chain.control_time();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(!chain.is_running());
        assert_eq!(chain.current_time(), 0.0);
        assert!(chain.control_time() > before);
    }

    #[test]
    fn waveform_names_parse() {
        let (mut chain, _engine) = chain(ChainConfig::default());
        chain.set_waveform_by_name("Sawtooth").unwrap();
        assert_eq!(chain.waveform(), Waveform::Sawtooth);
        assert!(matches!(
            chain.set_waveform_by_name("noise"),
            Err(SynthError::UnknownWaveform(_))
        ));
        assert_eq!(chain.waveform(), Waveform::Sawtooth);
    }
}
