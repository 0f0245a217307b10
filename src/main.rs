/*
Daemon de inferencia de gestos en tiempo real.

Recibe paquetes UDP del guante (4 frames × 5 IMU × 6 ejes, f32 big-endian),
los encola con política latest-wins y emite una decisión JSON por línea en
stdout cada vez que un gesto queda confirmado.

Ejemplo:
    RUST_LOG=debug ./target/release/gestured --model-dir model/ --backend cnn1d
*/

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::net::UdpSocket;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use gestured::backend::{open_backend, Backend};
use gestured::decision::JsonLinesSink;
use gestured::packet::PacketDecoder;
use gestured::{ingest_queue, Accelerator, Batch, FilterConfig, IngestProducer, ModelBundle, Pipeline, PipelineConfig};

/// Primer id de sesión; cada lote recibido incrementa el contador
const FIRST_SESSION: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "gestured", about = "Inferencia de gestos en tiempo real")]
struct Args {
    /// Directorio con meta.json, projection.json y los pesos
    #[arg(long)]
    model_dir: PathBuf,

    /// Dirección UDP donde llegan los paquetes del guante
    #[arg(long, default_value = "0.0.0.0:5005")]
    bind: String,

    #[arg(long, value_enum, default_value = "linear")]
    backend: Backend,

    /// Archivo de pesos (por defecto el del backend dentro de model_dir)
    #[arg(long)]
    weights: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    queue_capacity: usize,

    /// Timeout del consumidor en milisegundos
    #[arg(long, default_value_t = 1000)]
    poll_ms: u64,

    #[arg(long, default_value_t = 0.5)]
    confidence: f32,

    #[arg(long, default_value_t = 3.0)]
    cooldown_secs: f64,

    #[arg(long, default_value_t = 4)]
    frames_per_packet: usize,

    /// Detiene el daemon tras N segundos (pruebas en banco)
    #[arg(long)]
    run_secs: Option<u64>,
}

impl Args {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let cooldown = Duration::try_from_secs_f64(self.cooldown_secs)
            .with_context(|| format!("cooldown inválido: {}", self.cooldown_secs))?;
        Ok(PipelineConfig {
            filter: FilterConfig {
                confidence_threshold: self.confidence,
                cooldown,
            },
            queue_capacity: self.queue_capacity.max(1),
            poll_interval: Duration::from_millis(self.poll_ms),
            frames_per_packet: self.frames_per_packet,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.pipeline_config()?;

    let bundle = ModelBundle::load(&args.model_dir)
        .with_context(|| format!("No se pudo cargar el modelo de {:?}", args.model_dir))?;
    info!(
        window = bundle.meta.window,
        segments = bundle.meta.num_segments,
        d_pca = bundle.meta.d_pca,
        classes = bundle.meta.classes,
        "✅ Modelo cargado"
    );

    let device = open_backend(args.backend, &bundle, args.weights.as_deref())
        .context("No se pudo abrir el acelerador")?;
    info!(backend = device.name(), "✅ Acelerador listo");

    let mut pipeline = Pipeline::from_bundle(&bundle, device, config.filter)?;

    let socket = UdpSocket::bind(&args.bind).with_context(|| format!("No se pudo abrir {}", args.bind))?;
    socket.set_read_timeout(Some(config.poll_interval))?;
    info!(bind = %args.bind, "🎧 Escuchando paquetes UDP");

    let shutdown = Arc::new(AtomicBool::new(false));
    let (producer, consumer) = ingest_queue(config.queue_capacity);

    let receiver = {
        let shutdown = Arc::clone(&shutdown);
        let decoder = PacketDecoder::new(config.frames_per_packet);
        thread::Builder::new()
            .name("udp-ingest".into())
            .spawn(move || receive_loop(socket, decoder, producer, &shutdown))?
    };

    if let Some(secs) = args.run_secs {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            info!("⏱️  Tiempo de ejecución agotado");
            shutdown.store(true, Ordering::Relaxed);
        });
    }

    let stdout = io::stdout();
    let mut sink = JsonLinesSink::new(stdout.lock());
    let stats = pipeline.run(&consumer, &mut sink, &shutdown, config.poll_interval);

    shutdown.store(true, Ordering::Relaxed);
    if receiver.join().is_err() {
        error!("❌ El hilo de recepción terminó con pánico");
    }

    info!(
        batches = stats.batches,
        decisions = stats.decisions,
        rejected = stats.rejected,
        "👋 Saliendo"
    );
    Ok(())
}

/// Hilo productor: socket → decodificador → cola
fn receive_loop(socket: UdpSocket, decoder: PacketDecoder, producer: IngestProducer, shutdown: &AtomicBool) {
    let mut buf = vec![0u8; decoder.expected_len().max(2048)];
    let mut session = FIRST_SESSION;

    while !shutdown.load(Ordering::Relaxed) {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => continue,
            Err(e) => {
                error!("❌ Error leyendo del socket: {}", e);
                break;
            }
        };

        let frames = match decoder.decode(&buf[..len]) {
            Ok(frames) => frames,
            Err(e) => {
                warn!(%peer, "⚠️  Paquete descartado: {}", e);
                continue;
            }
        };

        let dropped = producer.enqueue(Batch::new(session, frames));
        if dropped > 0 {
            debug!(session, dropped, "Lotes viejos descartados");
        }
        session += 1;
    }

    let stats = producer.stats();
    info!(enqueued = stats.enqueued, dropped = stats.dropped, "Recepción detenida");
}
