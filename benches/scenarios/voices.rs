//! Benchmarks for the engine with a pool of voices.

use std::{cell::Cell, hint::black_box, rc::Rc, sync::Arc};

use criterion::{BenchmarkId, Criterion};
use saavy_poly::{
    decode,
    graph::{AudioContext, AudioEngine, GraphCommand},
    synth::{EnvelopeUnit, Voice, VoicePool},
    worklet::{ParamName, PortMessage, ProcessorPort},
    EnvelopeParameters, StealPolicy, POOL_SIZE,
};

use crate::BLOCK_SIZES;

const SAMPLE_RATE: f32 = 48_000.0;

/// Context and engine with `voices` connected, payload accepted, master open.
fn engine_with_voices(voices: usize) -> (AudioContext, AudioEngine, Vec<(usize, ProcessorPort)>) {
    let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, voices);
    let mut ports = Vec::with_capacity(voices);
    for _ in 0..voices {
        let (index, mut port) = ctx.create_voice().unwrap();
        port.post(PortMessage::Wasm {
            wasm_module: Arc::from(&b"bench"[..]),
        })
        .unwrap();
        ctx.send(GraphCommand::ConnectVoice { voice: index }).unwrap();
        ports.push((index, port));
    }
    ctx.send(GraphCommand::RampMasterGain { target: 0.2, seconds: 0.0 }).unwrap();
    ctx.resume().unwrap();

    let mut warmup = vec![0.0f32; 64];
    engine.render_block(&mut warmup);
    for (_, port) in &mut ports {
        while port.try_recv().is_some() {}
    }
    (ctx, engine, ports)
}

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Connected but silent pool: cost of an idle instrument
        let (_ctx, mut idle, _ports) = engine_with_voices(POOL_SIZE);
        group.bench_with_input(BenchmarkId::new("idle_pool", size), &size, |b, _| {
            b.iter(|| {
                idle.render_block(black_box(&mut buffer));
            })
        });

        // Every voice held: worst case
        let (mut ctx, mut full, mut ports) = engine_with_voices(POOL_SIZE);
        for (i, (index, port)) in ports.iter_mut().enumerate() {
            ctx.send(GraphCommand::SetDetune {
                voice: *index,
                cents: i as f32 * 100.0,
            })
            .unwrap();
            ctx.send(GraphCommand::SetVoiceGain { voice: *index, level: 0.8 }).unwrap();
            port.set_param(ParamName::Trigger, 1.0, 0.0).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("full_pool", size), &size, |b, _| {
            b.iter(|| {
                full.render_block(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

/// Allocation, release and clearing on the control side, with the engine
/// draining the resulting commands.
pub fn bench_note_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/note_churn");

    let (mut ctx, mut engine) = AudioContext::new(SAMPLE_RATE, POOL_SIZE);
    let shared = Rc::new(Cell::new(EnvelopeParameters::default()));
    let voices = (0..POOL_SIZE)
        .map(|_| {
            let (index, port) = ctx.create_voice().unwrap();
            Voice::new(index, EnvelopeUnit::new(index, port, shared.clone()))
        })
        .collect();
    let mut pool = VoicePool::new(voices, StealPolicy::MostRecent);
    let mut buffer = vec![0.0f32; 64];

    let on = decode(&[0x90, 60, 100]);
    let off = decode(&[0x80, 60, 0]);
    let mut now = 0.0;

    group.bench_function("on_off_clear", |b| {
        b.iter(|| {
            now += 0.001;
            black_box(pool.allocate(black_box(&on), now, &mut ctx));
            black_box(pool.release(black_box(&off), now));
            pool.run_due(now + 1.0);
            engine.render_block(&mut buffer);
        })
    });

    group.finish();
}
