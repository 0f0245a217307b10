//! Pipeline de inferencia de gestos en tiempo real para un guante con 5 IMU.
//!
//! Flujo: lotes de frames → cola latest-wins → ventana deslizante →
//! estadísticas por segmento + proyección → acelerador → filtro
//! (confianza, doble confirmación, cooldown) → decisión con latencia.

pub mod accelerator;
pub mod backend;
pub mod clock;
pub mod cnn1d;
pub mod config;
pub mod csv_loader;
pub mod decision;
pub mod error;
pub mod features;
pub mod filter;
pub mod ingest_queue;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod packet;
pub mod pipeline;
pub mod projection;
pub mod types;
pub mod window;

pub use accelerator::{Accelerator, AcceleratorAdapter, AcceleratorError, LinearAccelerator};
pub use clock::{Clock, ManualClock, Stamp, SystemClock};
pub use config::{ModelBundle, ModelMeta, PipelineConfig};
pub use decision::{Decision, DecisionSink};
pub use error::{PipelineError, Result};
pub use features::{FeatureExtractor, Stat, StatSet};
pub use filter::{FilterConfig, PredictionFilter, Verdict};
pub use ingest_queue::{ingest_queue, IngestConsumer, IngestProducer};
pub use pipeline::{Pipeline, PipelineStats};
pub use projection::Projection;
pub use types::{Batch, Frame, SensorReading, SensorRow};
pub use window::SlidingWindow;
