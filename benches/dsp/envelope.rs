//! Benchmarks for the AHDSR envelope generator.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_poly::dsp::envelope::{Envelope, EnvelopeParameters};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: f32 = 48_000.0;

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Attack phase (ramping up)
        let slow = EnvelopeParameters {
            attack_time: 0.1,
            ..EnvelopeParameters::default()
        };
        let mut env = Envelope::with_params(SAMPLE_RATE, slow);
        env.note_on();
        group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer));
            })
        });

        // Sustain phase (holding steady)
        let mut env = Envelope::new(SAMPLE_RATE);
        env.note_on();
        // Past attack, hold and decay
        for _ in 0..(SAMPLE_RATE as usize / 4) {
            env.next_sample();
        }
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer));
            })
        });

        // Release phase (ramping down)
        let mut env = Envelope::new(SAMPLE_RATE);
        env.note_on();
        for _ in 0..(SAMPLE_RATE as usize / 4) {
            env.next_sample();
        }
        env.note_off();
        group.bench_with_input(BenchmarkId::new("release", size), &size, |b, _| {
            b.iter(|| {
                env.render(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
