use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
    Success,
}

/// Registro emitido por cada gesto confirmado
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub session: u64,
    /// Clase confirmada, nunca 0
    pub prediction: usize,
    pub window_ready_time: Option<DateTime<Utc>>,
    pub prediction_time: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub status: DecisionStatus,
}

/// Colaborador de salida que recibe las decisiones
pub trait DecisionSink {
    fn emit(&mut self, decision: &Decision) -> Result<()>;
}

impl DecisionSink for Vec<Decision> {
    fn emit(&mut self, decision: &Decision) -> Result<()> {
        self.push(decision.clone());
        Ok(())
    }
}

/// Una línea JSON por decisión
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> DecisionSink for JsonLinesSink<W> {
    fn emit(&mut self, decision: &Decision) -> Result<()> {
        serde_json::to_writer(&mut self.writer, decision).map_err(|e| PipelineError::Sink(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .and_then(|_| self.writer.flush())
            .map_err(|e| PipelineError::Sink(e.to_string()))
    }
}
