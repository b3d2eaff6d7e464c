use criterion::{criterion_group, criterion_main, Criterion};
use spectrum_bars::audio::{SampleBuffer, StereoSample};
use spectrum_bars::config::{Config, SmoothingMode};
use spectrum_bars::graphics::VisualShape;
use spectrum_bars::SpectrumEngine;

fn test_signal(cfg: &Config) -> SampleBuffer {
    let rate = cfg.sample_rate as f64;
    let frames = (0..cfg.sample_size())
        .map(|i| {
            let t = i as f64 / rate;
            let v = 8000.0 * (2.0 * std::f64::consts::PI * 220.0 * t).sin()
                + 6000.0 * (2.0 * std::f64::consts::PI * 3300.0 * t).sin();
            StereoSample::new(v as i16, (v * 0.5) as i16)
        })
        .collect();
    SampleBuffer::from_frames(frames)
}

fn engine_tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("SpectrumEngine");
    for (name, stereo, log_freq_scale) in [
        ("mono_linear", false, false),
        ("mono_log", false, true),
        ("stereo_linear", true, false),
        ("stereo_log", true, true),
    ] {
        let cfg = Config {
            detail: 64,
            stereo,
            log_freq_scale,
            smoothing: SmoothingMode::Monstercat,
            ..Config::default()
        };
        let samples = test_signal(&cfg);
        let mut engine = SpectrumEngine::new(cfg);
        group.bench_function(name, |b| {
            b.iter(|| engine.tick(std::hint::black_box(&samples), 1.0 / 30.0))
        });
    }
    group.finish();
}

fn layout_benchmark(c: &mut Criterion) {
    let cfg = Config {
        detail: 128,
        stereo: true,
        ..Config::default()
    };
    let mut engine = SpectrumEngine::new(cfg.clone());
    engine.tick(&test_signal(&cfg), 1.0 / 30.0);
    let frame = engine.frame();
    let shape = VisualShape::Bars { rounded: true };

    c.bench_function("rounded_bars_tessellate", |b| {
        b.iter(|| {
            shape
                .layout(std::hint::black_box(&frame), &cfg)
                .iter()
                .map(|p| p.tessellate().vertices.len())
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, engine_tick_benchmark, layout_benchmark);
criterion_main!(benches);
