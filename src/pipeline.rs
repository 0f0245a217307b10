//! Orquestador: por cada frame de un lote, ventana → características →
//! proyección → acelerador → filtro, y emisión de las decisiones confirmadas.
//!
//! Todo el estado mutable (ventana, filtro, buffers del acelerador) vive en
//! `Pipeline` y sólo lo toca el hilo consumidor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::accelerator::{Accelerator, AcceleratorAdapter};
use crate::clock::{Clock, SystemClock};
use crate::config::{check_projection, ModelBundle, ModelMeta};
use crate::decision::{Decision, DecisionSink, DecisionStatus};
use crate::error::{PipelineError, Result};
use crate::features::FeatureExtractor;
use crate::filter::{FilterConfig, PredictionFilter, Verdict};
use crate::ingest_queue::IngestConsumer;
use crate::projection::Projection;
use crate::types::{Batch, Frame, SensorRow};
use crate::window::SlidingWindow;

/// Contadores del consumidor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub batches: u64,
    pub frames: u64,
    pub inferences: u64,
    /// Frames descartados por entrada inválida
    pub rejected: u64,
    /// Frames sin decisión por fallo del acelerador
    pub skipped: u64,
    pub decisions: u64,
}

pub struct Pipeline<A, C = SystemClock> {
    window: SlidingWindow,
    extractor: FeatureExtractor,
    projection: Projection,
    accelerator: AcceleratorAdapter<A>,
    filter: PredictionFilter,
    clock: C,
    class_names: Vec<String>,
    features: Vec<f32>,
    projected: Vec<f32>,
    stats: PipelineStats,
}

impl<A: Accelerator> Pipeline<A, SystemClock> {
    pub fn from_bundle(bundle: &ModelBundle, device: A, filter: FilterConfig) -> Result<Self> {
        Self::new(&bundle.meta, bundle.projection.clone(), device, filter, SystemClock)
    }
}

impl<A: Accelerator, C: Clock> Pipeline<A, C> {
    /// Valida las dimensiones de todas las etapas; un desajuste es fatal
    pub fn new(
        meta: &ModelMeta,
        projection: Projection,
        device: A,
        filter: FilterConfig,
        clock: C,
    ) -> Result<Self> {
        meta.validate()?;
        check_projection(meta, &projection)?;

        let extractor = meta.feature_extractor()?;
        let accelerator = AcceleratorAdapter::new(device, meta.d_pca, meta.classes)?;

        Ok(Self {
            window: SlidingWindow::new(meta.window)?,
            features: Vec::with_capacity(extractor.feature_len()),
            projected: vec![0.0; meta.d_pca],
            extractor,
            projection,
            accelerator,
            filter: PredictionFilter::new(filter),
            clock,
            class_names: (0..meta.classes).map(|c| meta.class_name(c)).collect(),
            stats: PipelineStats::default(),
        })
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn filter(&self) -> &PredictionFilter {
        &self.filter
    }

    pub fn class_name(&self, class: usize) -> &str {
        self.class_names.get(class).map(String::as_str).unwrap_or("?")
    }

    /// Último vector de características calculado (vacío si aún no hubo inferencia)
    pub fn last_features(&self) -> &[f32] {
        &self.features
    }

    /// Salida de la última proyección (ceros si aún no hubo inferencia)
    pub fn last_projection(&self) -> &[f32] {
        &self.projected
    }

    pub fn process_frame(&mut self, frame: &Frame, session: u64) -> Result<Option<Decision>> {
        self.process_row(SensorRow::from_frame(frame), session)
    }

    /// Avanza la ventana una fila y, si está llena, ejecuta una inferencia.
    /// Retorna la decisión si el filtro confirmó un gesto.
    pub fn process_row(&mut self, row: SensorRow, session: u64) -> Result<Option<Decision>> {
        self.stats.frames += 1;
        let result = self.advance(row, session);
        match &result {
            Ok(Some(_)) => self.stats.decisions += 1,
            Ok(None) => {}
            Err(PipelineError::AcceleratorUnavailable(_)) => self.stats.skipped += 1,
            Err(_) => self.stats.rejected += 1,
        }
        result
    }

    fn advance(&mut self, row: SensorRow, session: u64) -> Result<Option<Decision>> {
        self.window.push(row, self.clock.now());

        if !self.window.is_ready() {
            return Ok(None);
        }

        let verdict = self.infer()?;
        if !verdict.is_actionable() {
            return Ok(None);
        }

        let predicted_at = self.clock.now();
        let ready = self.window.ready_mark();
        let decision = Decision {
            session,
            prediction: verdict.confirmed,
            window_ready_time: ready.map(|mark| mark.wall),
            prediction_time: predicted_at.wall,
            latency_ms: ready.map(|mark| predicted_at.millis_since(&mark)),
            status: DecisionStatus::Success,
        };
        Ok(Some(decision))
    }

    fn infer(&mut self) -> Result<Verdict> {
        self.extractor.extract_into(&self.window, &mut self.features)?;
        self.projection.project_into(&self.features, &mut self.projected)?;
        let logits = self.accelerator.transfer(&self.projected)?;
        self.stats.inferences += 1;

        let verdict = self.filter.update(logits, self.clock.now().instant);
        debug!(
            raw = verdict.raw,
            confidence = verdict.confidence,
            confirmed = verdict.confirmed,
            "inferencia"
        );
        Ok(verdict)
    }

    /// Procesa un lote en orden. Ningún error por frame sale de aquí: se
    /// registra y el frame queda sin decisión. Retorna las decisiones emitidas.
    pub fn process_batch(&mut self, batch: &Batch, sink: &mut dyn DecisionSink) -> usize {
        self.stats.batches += 1;
        let mut emitted = 0;

        for frame in &batch.frames {
            match self.process_frame(frame, batch.session) {
                Ok(Some(decision)) => {
                    info!(
                        session = decision.session,
                        class = decision.prediction,
                        label = self.class_name(decision.prediction),
                        latency_ms = decision.latency_ms,
                        "[PRED] gesto confirmado"
                    );
                    match sink.emit(&decision) {
                        Ok(()) => emitted += 1,
                        Err(e) => warn!("❌ No se pudo emitir la decisión: {}", e),
                    }
                }
                Ok(None) => {}
                Err(PipelineError::AcceleratorUnavailable(e)) => {
                    warn!(session = batch.session, "❌ Acelerador: {}; frame sin decisión", e);
                }
                Err(e) => {
                    warn!(session = batch.session, "⚠️  Frame descartado: {}", e);
                }
            }
        }

        emitted
    }

    /// Bucle del consumidor. Sale cuando `shutdown` se activa o el productor
    /// se cerró y la cola quedó vacía.
    pub fn run(
        &mut self,
        queue: &IngestConsumer,
        sink: &mut dyn DecisionSink,
        shutdown: &AtomicBool,
        poll_interval: Duration,
    ) -> PipelineStats {
        info!("🎬 Pipeline en marcha");

        while !shutdown.load(Ordering::Relaxed) {
            match queue.dequeue(poll_interval) {
                Some(batch) => {
                    self.process_batch(&batch, sink);
                }
                None if queue.is_closed() => {
                    info!("Productor cerrado, fin del pipeline");
                    break;
                }
                None => {}
            }
        }

        let queue_stats = queue.stats();
        info!(
            frames = self.stats.frames,
            inferences = self.stats.inferences,
            decisions = self.stats.decisions,
            skipped = self.stats.skipped,
            batches_dropped = queue_stats.dropped,
            "Pipeline detenido"
        );
        self.stats
    }
}
