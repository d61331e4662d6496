use crate::{
    config::StealPolicy,
    graph::AudioContext,
    io::midi::MidiEvent,
    synth::voice::{Voice, VoiceSnapshot},
    worklet::ParamName,
};

/// A release that frees its voice once the envelope has had time to finish.
#[derive(Debug, Clone, Copy)]
struct PendingClear {
    voice: usize,
    generation: u64,
    due: f64,
}

/// Fixed set of voices plus the allocation policy.
///
/// `last_invocation_time` is audio-clock seconds, used for stealing. Release
/// deadlines are on whatever clock the caller passes to `release` and
/// `run_due`; a released voice stays busy until `run_due` reaches its release
/// time plus `releaseTime`.
pub struct VoicePool {
    voices: Vec<Voice>,
    policy: StealPolicy,
    pending: Vec<PendingClear>,
}

impl VoicePool {
    pub fn new(voices: Vec<Voice>, policy: StealPolicy) -> Self {
        let pending = Vec::with_capacity(voices.len());
        Self {
            voices,
            policy,
            pending,
        }
    }

    pub fn empty(policy: StealPolicy) -> Self {
        Self::new(Vec::new(), policy)
    }

    /// Give a note-on a voice, stealing one when none is free.
    ///
    /// Returns the chosen position, or `None` for an empty pool or when the
    /// note could not be started.
    pub fn allocate(&mut self, event: &MidiEvent, now: f64, ctx: &mut AudioContext) -> Option<usize> {
        let slot = match self.voices.iter().position(|v| !v.is_busy) {
            Some(free) => free,
            None => {
                let stolen = self.steal_candidate()?;
                log::debug!(
                    "stealing voice {stolen} (note {:?}) for note {:?}",
                    self.voices[stolen].note,
                    event.key_number
                );
                stolen
            }
        };

        match self.voices[slot].start(ctx, event.key_number, event.velocity, now) {
            Ok(()) => Some(slot),
            Err(err) => {
                log::warn!("voice {slot}: note {:?} not started: {err}", event.key_number);
                None
            }
        }
    }

    fn steal_candidate(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, voice) in self.voices.iter().enumerate() {
            let t = voice.last_invocation_time;
            let better = match (best, self.policy) {
                (None, _) => true,
                (Some((_, bt)), StealPolicy::MostRecent) => t > bt,
                (Some((_, bt)), StealPolicy::Oldest) => t < bt,
            };
            if better {
                best = Some((i, t));
            }
        }
        best.map(|(i, _)| i)
    }

    /// Start the release of the most recent busy voice holding the note.
    ///
    /// Returns the released position, or `None` when no held voice matches.
    pub fn release(&mut self, event: &MidiEvent, now: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, voice) in self.voices.iter().enumerate() {
            if !voice.is_busy || voice.is_releasing || voice.note != event.key_number {
                continue;
            }
            if best.map_or(true, |(_, bt)| voice.last_invocation_time > bt) {
                best = Some((i, voice.last_invocation_time));
            }
        }
        let (slot, _) = best?;

        let voice = &mut self.voices[slot];
        voice.release();
        let due = now + voice.envelope().release_time() as f64;
        self.pending.push(PendingClear {
            voice: slot,
            generation: voice.generation,
            due,
        });
        Some(slot)
    }

    /// Free voices whose release has run its course. A clear whose voice was
    /// re-allocated since the release is dropped.
    ///
    /// Returns the number of voices freed.
    pub fn run_due(&mut self, now: f64) -> usize {
        let mut freed = 0;
        let voices = &mut self.voices;
        self.pending.retain(|clear| {
            if clear.due > now {
                return true;
            }
            match voices.get_mut(clear.voice) {
                Some(voice) if voice.generation == clear.generation => {
                    voice.is_busy = false;
                    voice.is_releasing = false;
                    freed += 1;
                }
                _ => log::trace!("voice {}: stale release clear dropped", clear.voice),
            }
            false
        });
        freed
    }

    /// Next time a pending clear falls due.
    pub fn next_due(&self) -> Option<f64> {
        self.pending.iter().map(|c| c.due).min_by(f64::total_cmp)
    }

    pub fn broadcast_parameter(&mut self, name: ParamName, value: f32) {
        for voice in &mut self.voices {
            if let Err(err) = voice.envelope_mut().set_parameter(name, value) {
                log::warn!("voice {}: {name} not delivered: {err}", voice.index());
            }
        }
    }

    /// Deliver queued envelope replies to their callbacks.
    pub fn poll_envelopes(&mut self) -> usize {
        self.voices.iter_mut().map(|v| v.envelope_mut().poll()).sum()
    }

    pub fn request_states(&mut self) {
        for voice in &mut self.voices {
            if let Err(err) = voice.envelope_mut().request_state() {
                log::warn!("voice {}: state request not delivered: {err}", voice.index());
            }
        }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn voice_mut(&mut self, slot: usize) -> Option<&mut Voice> {
        self.voices.get_mut(slot)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    pub fn busy_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_busy).count()
    }

    pub fn policy(&self) -> StealPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> Vec<VoiceSnapshot> {
        self.voices.iter().map(Voice::snapshot).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        graph::{AudioEngine, GraphCommand},
        io::midi::decode,
        synth::envelope_unit::EnvelopeUnit,
        worklet::EnvelopeParameters,
    };

    fn pool(size: usize, policy: StealPolicy) -> (VoicePool, AudioContext, AudioEngine) {
        let (mut ctx, engine) = AudioContext::new(1_000.0, size);
        let shared = Rc::new(Cell::new(EnvelopeParameters::default()));
        let voices = (0..size)
            .map(|_| {
                let (index, port) = ctx.create_voice().unwrap();
                Voice::new(index, EnvelopeUnit::new(index, port, shared.clone()))
            })
            .collect();
        (VoicePool::new(voices, policy), ctx, engine)
    }

    fn note_on(key: u8) -> MidiEvent {
        decode(&[0x90, key, 100])
    }

    fn note_off(key: u8) -> MidiEvent {
        decode(&[0x80, key, 0])
    }

    #[test]
    fn free_voices_are_used_in_order() {
        let (mut pool, mut ctx, _engine) = pool(4, StealPolicy::MostRecent);
        assert_eq!(pool.allocate(&note_on(60), 0.0, &mut ctx), Some(0));
        assert_eq!(pool.allocate(&note_on(64), 0.1, &mut ctx), Some(1));

        let v = &pool.voices()[1];
        assert!(v.is_busy());
        assert_eq!(v.note(), Some(64));
        assert!((v.key_velocity() - 100.0 / 127.0).abs() < 1e-6);
        assert_eq!(pool.busy_count(), 2);
    }

    #[test]
    fn full_pool_steals_most_recent_voice() {
        let (mut pool, mut ctx, _engine) = pool(20, StealPolicy::MostRecent);
        for key in 0..20u8 {
            pool.allocate(&note_on(40 + key), key as f64, &mut ctx);
        }
        let stolen = pool.allocate(&note_on(90), 20.0, &mut ctx);

        assert_eq!(stolen, Some(19));
        assert_eq!(pool.voices()[19].note(), Some(90));
        assert_eq!(pool.voices()[19].last_invocation_time(), 20.0);
        assert_eq!(pool.busy_count(), 20);
    }

    #[test]
    fn full_pool_steals_oldest_voice_when_configured() {
        let (mut pool, mut ctx, _engine) = pool(3, StealPolicy::Oldest);
        pool.allocate(&note_on(60), 0.5, &mut ctx);
        pool.allocate(&note_on(62), 0.2, &mut ctx);
        pool.allocate(&note_on(64), 0.9, &mut ctx);

        assert_eq!(pool.allocate(&note_on(65), 1.0, &mut ctx), Some(1));
    }

    #[test]
    fn steal_ties_go_to_lowest_index() {
        let (mut pool, mut ctx, _engine) = pool(3, StealPolicy::MostRecent);
        for key in [60, 62, 64] {
            pool.allocate(&note_on(key), 0.0, &mut ctx);
        }
        assert_eq!(pool.allocate(&note_on(65), 0.0, &mut ctx), Some(0));
    }

    #[test]
    fn released_voice_stays_busy_until_release_time_passes() {
        let (mut pool, mut ctx, _engine) = pool(2, StealPolicy::MostRecent);
        pool.allocate(&note_on(60), 0.0, &mut ctx);
        assert_eq!(pool.release(&note_off(60), 1.0), Some(0));

        let v = &pool.voices()[0];
        assert!(v.is_busy() && v.is_releasing());
        assert_eq!(v.key_velocity(), 0.0);
        assert_eq!(pool.next_due(), Some(1.25));

        assert_eq!(pool.run_due(1.2), 0);
        assert!(pool.voices()[0].is_busy());
        assert_eq!(pool.run_due(1.25), 1);
        assert!(!pool.voices()[0].is_busy());
        assert!(!pool.voices()[0].is_releasing());
    }

    #[test]
    fn release_picks_latest_holder_of_the_note() {
        let (mut pool, mut ctx, _engine) = pool(3, StealPolicy::MostRecent);
        pool.allocate(&note_on(60), 0.0, &mut ctx);
        pool.allocate(&note_on(60), 0.5, &mut ctx);
        pool.allocate(&note_on(60), 0.3, &mut ctx);

        assert_eq!(pool.release(&note_off(60), 1.0), Some(1));
        assert_eq!(pool.release(&note_off(60), 1.0), Some(2));
        assert_eq!(pool.release(&note_off(60), 1.0), Some(0));
        assert_eq!(pool.release(&note_off(60), 1.0), None);
    }

    #[test]
    fn release_of_unheld_note_is_ignored() {
        let (mut pool, mut ctx, _engine) = pool(2, StealPolicy::MostRecent);
        pool.allocate(&note_on(60), 0.0, &mut ctx);
        assert_eq!(pool.release(&note_off(61), 0.5), None);
        assert!(!pool.voices()[0].is_releasing());
        assert_eq!(pool.next_due(), None);
    }

    #[test]
    fn stale_clear_does_not_free_reallocated_voice() {
        let (mut pool, mut ctx, _engine) = pool(1, StealPolicy::MostRecent);
        pool.allocate(&note_on(60), 0.0, &mut ctx);
        pool.release(&note_off(60), 0.1);
        // Stolen while releasing
        pool.allocate(&note_on(67), 0.2, &mut ctx);

        assert_eq!(pool.run_due(1.0), 0);
        let v = &pool.voices()[0];
        assert!(v.is_busy());
        assert!(!v.is_releasing());
        assert_eq!(v.note(), Some(67));
    }

    #[test]
    fn failed_start_leaves_voice_free() {
        let (mut pool, mut ctx, _engine) = pool(2, StealPolicy::MostRecent);
        // Nobody drains the engine side, so the command ring fills up
        while ctx.send(GraphCommand::SetPitchBend { cents: 0.0 }).is_ok() {}

        assert_eq!(pool.allocate(&note_on(60), 0.0, &mut ctx), None);
        let v = &pool.voices()[0];
        assert!(!v.is_busy());
        assert_eq!(v.note(), None);
        assert_eq!(v.generation, 0);
        assert_eq!(pool.busy_count(), 0);
    }

    #[test]
    fn empty_pool_allocates_nothing() {
        let (mut ctx, _engine) = AudioContext::new(1_000.0, 0);
        let mut pool = VoicePool::empty(StealPolicy::MostRecent);
        assert_eq!(pool.allocate(&note_on(60), 0.0, &mut ctx), None);
        assert_eq!(pool.release(&note_off(60), 0.0), None);
        assert!(pool.snapshot().is_empty());
    }
}
