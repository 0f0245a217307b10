use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::thread;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use gestured::accelerator::LinearWeights;
use gestured::backend::{open_backend, Backend};
use gestured::config::{ProjectionParams, LINEAR_WEIGHTS_FILE, META_FILE, PROJECTION_FILE};
use gestured::decision::{DecisionStatus, JsonLinesSink};
use gestured::features::STD_EPSILON;
use gestured::packet::{encode_frames, PacketDecoder};
use gestured::types::{SensorRow, ROW_WIDTH};
use gestured::{
    ingest_queue, Batch, Decision, FilterConfig, LinearAccelerator, ManualClock, ModelBundle, ModelMeta,
    Pipeline, Projection, Stat,
};
use tempfile::tempdir;

const WINDOW: usize = 8;
const FEATURES: usize = 2 * ROW_WIDTH;

/// Modelo de juguete: la media global empuja hacia la clase 1, su negativo
/// hacia la clase 2.
fn write_model(dir: &Path) {
    fs::write(
        dir.join(META_FILE),
        r#"{"window": 8, "num_segments": 2, "stats_list": ["mean"], "D_pca": 2,
            "classes": 3, "class_names": ["nada", "arriba", "abajo"]}"#,
    )
    .unwrap();

    let params = ProjectionParams {
        scaler_mean: vec![0.0; FEATURES],
        scaler_scale: vec![1.0; FEATURES],
        pca_mean: vec![0.0; FEATURES],
        pca_components: vec![
            vec![1.0 / FEATURES as f32; FEATURES],
            vec![-1.0 / FEATURES as f32; FEATURES],
        ],
    };
    fs::write(dir.join(PROJECTION_FILE), serde_json::to_string(&params).unwrap()).unwrap();

    let weights = LinearWeights {
        weights: vec![vec![0.0, 0.0], vec![10.0, 0.0], vec![0.0, 10.0]],
        bias: vec![0.0; 3],
    };
    fs::write(dir.join(LINEAR_WEIGHTS_FILE), serde_json::to_string(&weights).unwrap()).unwrap();
}

fn batches(value: f32, count: usize, frames_per_batch: usize) -> Vec<Batch> {
    let frame = SensorRow::filled(value).to_frame();
    (0..count)
        .map(|i| Batch::new(1000 + i as u64, vec![frame; frames_per_batch]))
        .collect()
}

#[test]
fn test_threads_produce_single_decision_within_cooldown() {
    let dir = tempdir().unwrap();
    write_model(dir.path());

    let bundle = ModelBundle::load(dir.path()).unwrap();
    let device = open_backend(Backend::Linear, &bundle, None).unwrap();
    let mut pipeline = Pipeline::from_bundle(&bundle, device, FilterConfig::default()).unwrap();

    let (producer, consumer) = ingest_queue(10);
    let producer_thread = thread::spawn(move || {
        // Espera a que el consumidor retire cada lote: nada se descarta
        for (sent, batch) in batches(1.0, 5, 4).into_iter().enumerate() {
            producer.enqueue(batch);
            while producer.stats().delivered <= sent as u64 {
                thread::sleep(Duration::from_millis(1));
            }
        }
        producer.stats()
    });

    let shutdown = AtomicBool::new(false);
    let mut decisions: Vec<Decision> = Vec::new();
    let stats = pipeline.run(&consumer, &mut decisions, &shutdown, Duration::from_millis(50));
    let queue_stats = producer_thread.join().unwrap();

    assert_eq!(queue_stats.dropped, 0);
    assert_eq!(queue_stats.delivered, 5);
    assert_eq!(stats.frames, 20);
    // La primera inferencia ocurre con el frame 8
    assert_eq!(stats.inferences, 13);
    assert_eq!(decisions.len(), 1);

    let decision = &decisions[0];
    assert_eq!(decision.prediction, 1);
    assert_eq!(pipeline.class_name(decision.prediction), "arriba");
    assert_eq!(decision.status, DecisionStatus::Success);
    // El frame 9 es el segundo del tercer lote
    assert_eq!(decision.session, 1002);
    assert!(decision.latency_ms.unwrap() >= 0.0);
}

#[test]
fn test_burst_before_consumer_keeps_only_latest_batch() {
    let dir = tempdir().unwrap();
    write_model(dir.path());
    let bundle = ModelBundle::load(dir.path()).unwrap();
    let device = open_backend(Backend::Linear, &bundle, None).unwrap();
    let mut pipeline = Pipeline::from_bundle(&bundle, device, FilterConfig::default()).unwrap();

    let (producer, consumer) = ingest_queue(10);
    for batch in batches(1.0, 5, 4) {
        producer.enqueue(batch);
    }
    let queue_stats = producer.stats();
    drop(producer);

    let shutdown = AtomicBool::new(false);
    let mut decisions: Vec<Decision> = Vec::new();
    let stats = pipeline.run(&consumer, &mut decisions, &shutdown, Duration::from_millis(50));

    assert_eq!(queue_stats.dropped, 4);
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.frames + 4 * queue_stats.dropped, 20);
    // Con 4 frames la ventana de 8 no se llena
    assert_eq!(stats.inferences, 0);
    assert!(decisions.is_empty());
}

#[test]
fn test_udp_payloads_through_pipeline_with_manual_clock() {
    let dir = tempdir().unwrap();
    write_model(dir.path());
    let bundle = ModelBundle::load(dir.path()).unwrap();

    let clock = ManualClock::new();
    let device = LinearAccelerator::from_json_file(bundle.path(LINEAR_WEIGHTS_FILE)).unwrap();
    let mut pipeline = Pipeline::new(
        &bundle.meta,
        bundle.projection.clone(),
        device,
        FilterConfig::default(),
        clock.clone(),
    )
    .unwrap();

    let decoder = PacketDecoder::default();
    let mut sink = JsonLinesSink::new(Vec::new());

    // Tres "gestos" hacia abajo separados por más que el cooldown
    let mut session = 1000;
    for _ in 0..3 {
        for batch in batches(-1.0, 3, 4) {
            let payload = encode_frames(&batch.frames);
            let frames = decoder.decode(&payload).unwrap();
            pipeline.process_batch(&Batch::new(session, frames), &mut sink);
            session += 1;
        }
        clock.advance(Duration::from_millis(3100));
    }

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);

    for line in lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["prediction"], 2);
        assert_eq!(value["status"], "success");
        // Reloj detenido: la marca y la predicción coinciden
        assert_eq!(value["latency_ms"].as_f64().unwrap(), 0.0);
    }
}

#[test]
fn test_constant_rows_give_mean_and_epsilon_std() {
    let meta = ModelMeta {
        window: 32,
        num_segments: 4,
        stats_list: vec![Stat::Std, Stat::Mean],
        d_pca: 4,
        classes: 2,
        class_names: Vec::new(),
        hop: None,
    };
    let feature_len = meta.feature_len();
    assert_eq!(feature_len, 4 * ROW_WIDTH * 2);

    let device = LinearAccelerator::new(LinearWeights {
        weights: vec![vec![0.0; 4]; 2],
        bias: vec![0.0; 2],
    })
    .unwrap();
    let projection = Projection::identity(feature_len, 4).unwrap();
    let mut pipeline = Pipeline::new(
        &meta,
        projection,
        device,
        FilterConfig::default(),
        ManualClock::new(),
    )
    .unwrap();

    for _ in 0..meta.window {
        let decision = pipeline.process_row(SensorRow::filled(0.5), 7).unwrap();
        // Logits iguales: la clase 0 gana el empate
        assert!(decision.is_none());
    }

    // Identidad truncada a 4 filas: las 4 primeras medias del segmento 0
    let projected = pipeline.last_projection();
    assert_eq!(projected.len(), 4);
    for &value in projected {
        assert_abs_diff_eq!(value, 0.5, epsilon = 1e-7);
    }

    let features = pipeline.last_features();
    assert_eq!(features.len(), feature_len);
    // Por segmento: 30 medias y luego 30 desviaciones
    for segment in features.chunks(2 * ROW_WIDTH) {
        for &mean in &segment[..ROW_WIDTH] {
            assert_abs_diff_eq!(mean, 0.5, epsilon = 1e-7);
        }
        for &std in &segment[ROW_WIDTH..] {
            assert_abs_diff_eq!(std, STD_EPSILON, epsilon = 1e-12);
        }
    }
}
