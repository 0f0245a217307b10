use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::types::{SensorRow, ROW_WIDTH};
use crate::window::SlidingWindow;

/// Se suma a la desviación estándar para evitar ceros degenerados
pub const STD_EPSILON: f32 = 1e-8;

/// Estadísticas por segmento, en orden canónico
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    #[serde(rename = "mean")]
    Mean,
    #[serde(rename = "std")]
    Std,
    #[serde(rename = "p2p")]
    PeakToPeak,
    #[serde(rename = "energy")]
    Energy,
}

impl Stat {
    pub const CANONICAL: [Stat; 4] = [Stat::Mean, Stat::Std, Stat::PeakToPeak, Stat::Energy];

    pub fn name(&self) -> &'static str {
        match self {
            Stat::Mean => "mean",
            Stat::Std => "std",
            Stat::PeakToPeak => "p2p",
            Stat::Energy => "energy",
        }
    }

    fn bit(&self) -> u8 {
        match self {
            Stat::Mean => 1,
            Stat::Std => 1 << 1,
            Stat::PeakToPeak => 1 << 2,
            Stat::Energy => 1 << 3,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Stat::CANONICAL
            .into_iter()
            .find(|stat| stat.name() == s)
            .ok_or_else(|| PipelineError::Configuration(format!("estadística desconocida: {}", s)))
    }
}

/// Conjunto de estadísticas habilitadas. Se itera siempre en orden
/// canónico, sin importar el orden de configuración.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatSet {
    mask: u8,
}

impl StatSet {
    pub fn all() -> Self {
        Self::from_stats(Stat::CANONICAL)
    }

    pub fn from_stats<I: IntoIterator<Item = Stat>>(stats: I) -> Self {
        let mask = stats.into_iter().fold(0u8, |mask, stat| mask | stat.bit());
        Self { mask }
    }

    pub fn contains(&self, stat: Stat) -> bool {
        self.mask & stat.bit() != 0
    }

    pub fn len(&self) -> usize {
        self.mask.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.mask == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Stat> {
        let set = *self;
        Stat::CANONICAL.into_iter().filter(move |stat| set.contains(*stat))
    }
}

/// Límites `[a, b)` de cada segmento: `a = round(s·W/S)`, `b = round((s+1)·W/S)`.
/// Redondeo al par más cercano en empates, como la herramienta que ajustó
/// los parámetros; los segmentos pueden quedar desiguales.
pub fn segment_bounds(window_len: usize, num_segments: usize) -> Vec<Range<usize>> {
    let boundary = |s: usize| -> usize {
        ((s * window_len) as f64 / num_segments as f64).round_ties_even() as usize
    };
    (0..num_segments).map(|s| boundary(s)..boundary(s + 1)).collect()
}

/// Extrae el vector de características de una ventana completa
pub struct FeatureExtractor {
    window_len: usize,
    segments: Vec<Range<usize>>,
    stats: StatSet,
    /// Copia cronológica de la ventana, reutilizada entre llamadas
    scratch: Vec<SensorRow>,
}

impl FeatureExtractor {
    pub fn new(window_len: usize, num_segments: usize, stats: StatSet) -> Result<Self> {
        if num_segments == 0 || num_segments > window_len {
            return Err(PipelineError::Configuration(format!(
                "segmentos inválidos: {} para ventana de {}",
                num_segments, window_len
            )));
        }
        if stats.is_empty() {
            return Err(PipelineError::Configuration(
                "no hay estadísticas habilitadas".into(),
            ));
        }

        Ok(Self {
            window_len,
            segments: segment_bounds(window_len, num_segments),
            stats,
            scratch: Vec::with_capacity(window_len),
        })
    }

    /// Longitud = S x 30 columnas x estadísticas habilitadas
    pub fn feature_len(&self) -> usize {
        self.segments.len() * ROW_WIDTH * self.stats.len()
    }

    pub fn stats(&self) -> StatSet {
        self.stats
    }

    pub fn segments(&self) -> &[Range<usize>] {
        &self.segments
    }

    pub fn extract(&mut self, window: &SlidingWindow) -> Result<Vec<f32>> {
        let mut features = Vec::with_capacity(self.feature_len());
        self.extract_into(window, &mut features)?;
        Ok(features)
    }

    /// Igual que `extract` pero reutiliza el buffer de salida
    pub fn extract_into(&mut self, window: &SlidingWindow, out: &mut Vec<f32>) -> Result<()> {
        if window.len() != self.window_len {
            return Err(PipelineError::InvalidInput(format!(
                "ventana con {} filas, esperadas {}",
                window.len(),
                self.window_len
            )));
        }

        self.scratch.clear();
        self.scratch.extend(window.iter().copied());

        out.clear();
        for range in &self.segments {
            summarize_segment(&self.scratch[range.clone()], self.stats, out);
        }
        Ok(())
    }
}

/// Estadísticas columna a columna de un segmento, concatenadas en orden canónico
fn summarize_segment(rows: &[SensorRow], stats: StatSet, out: &mut Vec<f32>) {
    let n = rows.len() as f32;

    let mut mean = [0.0f32; ROW_WIDTH];
    let mut min = [f32::INFINITY; ROW_WIDTH];
    let mut max = [f32::NEG_INFINITY; ROW_WIDTH];
    let mut energy = [0.0f32; ROW_WIDTH];

    for row in rows {
        for (col, &x) in row.values().iter().enumerate() {
            mean[col] += x;
            min[col] = min[col].min(x);
            max[col] = max[col].max(x);
            energy[col] += x * x;
        }
    }
    for m in mean.iter_mut() {
        *m /= n;
    }

    for stat in stats.iter() {
        match stat {
            Stat::Mean => out.extend_from_slice(&mean),
            Stat::Std => {
                // Desviación poblacional, en dos pasadas
                let mut var = [0.0f32; ROW_WIDTH];
                for row in rows {
                    for (col, &x) in row.values().iter().enumerate() {
                        let d = x - mean[col];
                        var[col] += d * d;
                    }
                }
                out.extend(var.iter().map(|v| (v / n).sqrt() + STD_EPSILON));
            }
            Stat::PeakToPeak => out.extend(max.iter().zip(&min).map(|(hi, lo)| hi - lo)),
            Stat::Energy => out.extend_from_slice(&energy),
        }
    }
}
