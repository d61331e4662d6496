use serde::{Deserialize, Serialize};

use crate::MIN_TIME;

/*
AHDSR Envelope Implementation
=============================

This module implements the linear attack/hold/decay/sustain/release envelope
that runs inside every voice's envelope processor. The control layer never
calls it directly: it only sends parameter changes and trigger edges through
the processor's message port and reads back state snapshots.

Vocabulary
----------

  level       The envelope's current output value (0.0 to 1.0). The voice
              gain is multiplied by it sample by sample.

  stage       Rest, Attack, Hold, Decay, Sustain or Release.

  trigger     The gate edge. A rising edge (note_on) restarts Attack from
              zero. A falling edge (note_off) enters Release from wherever
              the envelope currently is.

  elapsed     Samples spent in the current stage. Timed stages derive their
              progress as elapsed / total, so a parameter change mid-stage
              bends the remaining ramp instead of restarting it.


The Shape
---------

  Level
    AV  ┐     ______
        │    ╱      ╲
    SV  │   ╱        ╲_________
        │  ╱                   ╲
    0.0 └─╱─────────────────────╲──→ Time
         Attack Hold Decay Sustain Release

  AV = attack value, SV = sustain value.

Hold is the difference to a plain ADSR: after the attack peak the level is
kept at AV for hold_time seconds before decay starts.


Stage progress
--------------

  Attack, Hold, Decay, Release   elapsed / total, 0.0 ..= 1.0
  Rest, Sustain                  0.0 (no duration)

Release always starts from the CURRENT level, which keeps a release during
attack or hold click-free.
*/

/// Envelope shape shared by every voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvelopeParameters {
    pub attack_time: f32,
    pub hold_time: f32,
    pub decay_time: f32,
    pub release_time: f32,
    pub attack_value: f32,
    pub sustain_value: f32,
}

impl Default for EnvelopeParameters {
    fn default() -> Self {
        Self {
            attack_time: 0.001,
            hold_time: 0.0625,
            decay_time: 0.125,
            release_time: 0.25,
            attack_value: 1.0,
            sustain_value: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Rest,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
}

pub struct Envelope {
    params: EnvelopeParameters,
    sample_rate: f32,

    // Runtime state
    stage: Stage,
    level: f32,
    elapsed: u32,

    // Level when release began
    release_start_level: f32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_params(sample_rate, EnvelopeParameters::default())
    }

    pub fn with_params(sample_rate: f32, params: EnvelopeParameters) -> Self {
        let mut env = Self {
            params,
            sample_rate,
            stage: Stage::Rest,
            level: 0.0,
            elapsed: 0,
            release_start_level: 0.0,
        };
        env.set_parameters(params);
        env
    }

    pub fn set_parameters(&mut self, params: EnvelopeParameters) {
        self.params = EnvelopeParameters {
            attack_time: params.attack_time.max(0.0),
            hold_time: params.hold_time.max(0.0),
            decay_time: params.decay_time.max(0.0),
            release_time: params.release_time.max(0.0),
            attack_value: params.attack_value.clamp(0.0, 1.0),
            sustain_value: params.sustain_value.clamp(0.0, 1.0),
        };
    }

    pub fn parameters(&self) -> EnvelopeParameters {
        self.params
    }

    /// Rising trigger edge: restart the attack from zero.
    pub fn note_on(&mut self) {
        self.level = 0.0;
        self.enter(Stage::Attack);
    }

    /// Falling trigger edge: release from the current level.
    pub fn note_off(&mut self) {
        if self.stage == Stage::Rest {
            return;
        }
        self.release_start_level = self.level;
        self.enter(Stage::Release);
    }

    /// Advance the envelope by one sample and return the new level.
    pub fn next_sample(&mut self) -> f32 {
        let p = self.params;
        match self.stage {
            Stage::Rest => {
                self.level = 0.0;
            }
            Stage::Attack => {
                let progress = self.step(p.attack_time);
                self.level = p.attack_value * progress;
                if progress >= 1.0 {
                    self.enter(Stage::Hold);
                }
            }
            Stage::Hold => {
                self.level = p.attack_value;
                if self.step(p.hold_time) >= 1.0 {
                    self.enter(Stage::Decay);
                }
            }
            Stage::Decay => {
                let progress = self.step(p.decay_time);
                self.level = p.attack_value + (p.sustain_value - p.attack_value) * progress;
                if progress >= 1.0 {
                    self.enter(Stage::Sustain);
                }
            }
            Stage::Sustain => {
                // Hold until the trigger falls
                self.level = p.sustain_value;
            }
            Stage::Release => {
                let progress = self.step(p.release_time);
                self.level = (self.release_start_level * (1.0 - progress)).max(0.0);
                if progress >= 1.0 {
                    self.level = 0.0;
                    self.enter(Stage::Rest);
                }
            }
        }
        self.level
    }

    /// Render a block of envelope values into the buffer.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.next_sample();
        }
    }

    pub fn is_active(&self) -> bool {
        self.stage != Stage::Rest
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    /// Fraction of the current stage already rendered.
    pub fn stage_progress(&self) -> f32 {
        let time = match self.stage {
            Stage::Attack => self.params.attack_time,
            Stage::Hold => self.params.hold_time,
            Stage::Decay => self.params.decay_time,
            Stage::Release => self.params.release_time,
            Stage::Rest | Stage::Sustain => return 0.0,
        };
        (self.elapsed as f32 / self.stage_samples(time) as f32).min(1.0)
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
        self.release_start_level = 0.0;
        self.enter(Stage::Rest);
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.elapsed = 0;
    }

    fn step(&mut self, time: f32) -> f32 {
        self.elapsed = self.elapsed.saturating_add(1);
        (self.elapsed as f32 / self.stage_samples(time) as f32).min(1.0)
    }

    fn stage_samples(&self, time: f32) -> u32 {
        if time <= MIN_TIME {
            1
        } else {
            (time * self.sample_rate).round().max(1.0) as u32
        }
    }
}
