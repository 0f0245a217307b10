use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gestured::clock::Stamp;
use gestured::types::{SensorRow, ROW_WIDTH};
use gestured::{FeatureExtractor, Projection, SlidingWindow, StatSet};

const WINDOW: usize = 64;
const SEGMENTS: usize = 4;
const D_PCA: usize = 32;

fn full_window() -> SlidingWindow {
    let mut window = SlidingWindow::new(WINDOW).unwrap();
    let now = Stamp::now();
    for i in 0..WINDOW {
        let values: Vec<f32> = (0..ROW_WIDTH).map(|c| ((i * ROW_WIDTH + c) as f32 * 0.01).sin()).collect();
        window.push(SensorRow::from_slice(&values).unwrap(), now);
    }
    window
}

fn bench_extract(c: &mut Criterion) {
    let window = full_window();
    let mut extractor = FeatureExtractor::new(WINDOW, SEGMENTS, StatSet::all()).unwrap();
    let mut features = Vec::with_capacity(extractor.feature_len());

    c.bench_function("segment_features", |b| {
        b.iter(|| {
            extractor.extract_into(black_box(&window), &mut features).unwrap();
        });
    });
}

fn bench_extract_and_project(c: &mut Criterion) {
    let window = full_window();
    let mut extractor = FeatureExtractor::new(WINDOW, SEGMENTS, StatSet::all()).unwrap();
    let mut projection = Projection::identity(extractor.feature_len(), D_PCA).unwrap();
    let mut features = Vec::with_capacity(extractor.feature_len());
    let mut projected = vec![0.0f32; D_PCA];

    c.bench_function("features_plus_projection", |b| {
        b.iter(|| {
            extractor.extract_into(black_box(&window), &mut features).unwrap();
            projection.project_into(&features, &mut projected).unwrap();
        });
    });
}

criterion_group!(benches, bench_extract, bench_extract_and_project);
criterion_main!(benches);
