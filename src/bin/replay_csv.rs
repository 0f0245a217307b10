use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gestured::backend::{open_backend, Backend};
use gestured::csv_loader::load_frames_from_csv;
use gestured::decision::JsonLinesSink;
use gestured::{DecisionSink, FilterConfig, ManualClock, ModelBundle, Pipeline};

/// Reproduce una captura CSV por el pipeline completo con reloj simulado.
#[derive(Parser, Debug)]
#[command(name = "replay_csv")]
struct Args {
    /// Captura con cabecera `t,IMU0_ax,...,IMU4_gz`
    csv: PathBuf,

    #[arg(long)]
    model_dir: PathBuf,

    #[arg(long, value_enum, default_value = "linear")]
    backend: Backend,

    #[arg(long)]
    weights: Option<PathBuf>,

    /// Frecuencia de muestreo de la captura
    #[arg(long, default_value_t = 50.0)]
    rate_hz: f64,

    #[arg(long, default_value_t = 0.5)]
    confidence: f32,

    #[arg(long, default_value_t = 3.0)]
    cooldown_secs: f64,

    /// Frames por sesión, igual que en los paquetes UDP
    #[arg(long, default_value_t = 4)]
    frames_per_packet: usize,

    /// Imprime el último vector de características
    #[arg(long)]
    dump_features: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    if args.rate_hz.is_nan() || args.rate_hz <= 0.0 {
        bail!("rate_hz debe ser positivo");
    }
    let frame_period = Duration::from_secs_f64(1.0 / args.rate_hz);
    let cooldown = Duration::try_from_secs_f64(args.cooldown_secs)
        .with_context(|| format!("cooldown inválido: {}", args.cooldown_secs))?;

    info!("🎞️  Reproduciendo {:?}", args.csv);
    let frames = load_frames_from_csv(&args.csv)?;

    let bundle = ModelBundle::load(&args.model_dir)
        .with_context(|| format!("No se pudo cargar el modelo de {:?}", args.model_dir))?;
    if frames.len() < bundle.meta.window {
        warn!(
            frames = frames.len(),
            window = bundle.meta.window,
            "La captura es más corta que la ventana; no habrá inferencias"
        );
    }

    let device = open_backend(args.backend, &bundle, args.weights.as_deref())?;
    let clock = ManualClock::new();
    let filter = FilterConfig {
        confidence_threshold: args.confidence,
        cooldown,
    };
    let mut pipeline = Pipeline::new(&bundle.meta, bundle.projection.clone(), device, filter, clock.clone())?;

    let stdout = io::stdout();
    let mut sink = JsonLinesSink::new(stdout.lock());
    let per_session = args.frames_per_packet.max(1);

    for (idx, frame) in frames.iter().enumerate() {
        let session = 1000 + (idx / per_session) as u64;
        match pipeline.process_frame(frame, session) {
            Ok(Some(decision)) => {
                sink.emit(&decision)?;
                info!(
                    frame = idx,
                    gesture = %pipeline.class_name(decision.prediction),
                    "🥇 Gesto confirmado"
                );
            }
            Ok(None) => {}
            Err(e) => warn!(frame = idx, "⚠️  Frame descartado: {}", e),
        }
        clock.advance(frame_period);
    }

    let stats = pipeline.stats();
    info!(
        frames = stats.frames,
        inferences = stats.inferences,
        decisions = stats.decisions,
        "✅ Reproducción terminada"
    );

    if args.dump_features {
        let features = pipeline.last_features();
        eprintln!("\n📊 {} features:", features.len());
        for (idx, value) in features.iter().enumerate() {
            eprintln!("  {:03}: {:>12.6}", idx, value);
        }
    }

    Ok(())
}
