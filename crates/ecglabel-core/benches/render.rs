//! Strip rendering benchmarks.
//!
//! Run with:
//! ```sh
//! cargo bench --bench render
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ecglabel_core::model::{Signal, SignalId, SignalMetadata};
use ecglabel_core::render::{StripLayout, StripRenderer};

/// Synthetic sinus-like trace in microvolts.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn synthetic_signal(seconds: f64, rate: f64) -> Signal {
    let samples = (0..(seconds * rate) as usize)
        .map(|i| {
            let t = i as f64 / rate;
            let beat = (t * 1.2).fract();
            let qrs = if beat < 0.04 { 1_200.0 } else { 0.0 };
            qrs + 80.0 * (t * std::f64::consts::TAU).sin()
        })
        .collect();
    Signal {
        id: SignalId::new(1),
        samples,
        sampling_rate_hz: rate,
        reference_heart_rate: 72.0,
        metadata: SignalMetadata::default(),
    }
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render.strip");

    for dpi in [150.0, 300.0] {
        let layout = StripLayout {
            dpi,
            ..StripLayout::default()
        };
        let renderer = StripRenderer::new(layout).unwrap();
        let signal = synthetic_signal(30.0, 300.0);
        group.throughput(Throughput::Elements(signal.samples.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(dpi), &signal, |b, signal| {
            b.iter(|| black_box(renderer.render(signal).unwrap()));
        });
    }

    group.finish();
}

fn bench_png(c: &mut Criterion) {
    let renderer = StripRenderer::new(StripLayout::default()).unwrap();
    let strip = renderer
        .render(&synthetic_signal(30.0, 300.0))
        .unwrap()
        .into_strip()
        .unwrap();
    c.bench_function("render.png_encode", |b| {
        b.iter(|| black_box(strip.to_png().unwrap().len()));
    });
}

criterion_group!(benches, bench_render, bench_png);
criterion_main!(benches);
