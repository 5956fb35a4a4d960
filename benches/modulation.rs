use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bandviz::audio::{AnalyserConfig, AudioGraph, BandReducer, FrequencySample, RENDER_QUANTUM};

fn per_frame(c: &mut Criterion) {
    let graph = AudioGraph::new(44100, &AnalyserConfig::default()).unwrap();
    let block: Vec<f32> = (0..735)
        .map(|i| (2.0 * std::f32::consts::PI * 110.0 * i as f32 / 44100.0).sin() * 0.5)
        .collect();
    let reducer = BandReducer::default();
    let mut sample = FrequencySample::default();

    c.bench_function("filter_bank_render_quantum", |b| {
        b.iter(|| graph.process(black_box(&block[..RENDER_QUANTUM])))
    });

    c.bench_function("sample_and_reduce_frame", |b| {
        b.iter(|| {
            graph.process(&block);
            sample.refresh(graph.analysers());
            black_box(reducer.reduce(&sample))
        })
    });
}

criterion_group!(benches, per_frame);
criterion_main!(benches);
