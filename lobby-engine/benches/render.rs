//! Software renderer benchmarks.
//!
//! Run with: cargo bench -p lobby-engine
//!
//! Reference deadlines at 48kHz:
//!   - 128 samples = 2.67ms
//!   - 512 samples = 10.67ms
//!
//! `render/full_bar` renders with every voice of one bar alive (three FM pads,
//! bass, hats and snares), which is the busiest the graph gets.

use std::hint::black_box;
use std::time::Instant;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use lobby_engine::{AudioContext, EngineConfig, LookaheadScheduler, MusicEngine, OfflineContext, Progression};

const SR: f32 = 48_000.0;
const BLOCK_SIZES: &[usize] = &[128, 256, 512];

fn busy_engine() -> MusicEngine<OfflineContext> {
    let config = EngineConfig { seed: Some(7), ..Default::default() };
    let mut engine = match MusicEngine::new(OfflineContext::new(SR), config) {
        Ok(engine) => engine,
        Err(err) => panic!("bench config rejected: {err}"),
    };
    engine.start(Instant::now());
    // Past the first downbeat and snare so everything has started.
    engine.context_mut().advance(0.75);
    engine
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];
        group.bench_with_input(BenchmarkId::new("full_bar", size), &size, |b, _| {
            b.iter_batched(
                busy_engine,
                |mut engine| {
                    engine.context_mut().render(black_box(&mut buffer));
                    engine
                },
                BatchSize::LargeInput,
            )
        });

        let mut idle = OfflineContext::new(SR);
        let _ = idle.resume();
        group.bench_with_input(BenchmarkId::new("empty", size), &size, |b, _| {
            b.iter(|| idle.render(black_box(&mut buffer)))
        });
    }
    group.finish();
}

fn bench_schedule(c: &mut Criterion) {
    let tempo = EngineConfig::default().tempo();
    c.bench_function("scheduler/hundred_bars", |b| {
        b.iter(|| {
            let mut sched = LookaheadScheduler::new(tempo, 0.2, Progression::default());
            let mut cues = 0usize;
            sched.tick(black_box(100.0 * tempo.bar()), |_| cues += 1);
            cues
        })
    });
}

criterion_group!(benches, bench_render, bench_schedule);
criterion_main!(benches);
