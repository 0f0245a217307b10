//! Carga de los artefactos del modelo desde un directorio:
//!
//! - `meta.json`: ventana, segmentos, estadísticas, `D_pca`, clases
//! - `projection.json`: scaler y PCA
//! - pesos del backend (`linear.json` o `cnn1d.json`)

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};
use crate::features::{FeatureExtractor, Stat, StatSet};
use crate::filter::FilterConfig;
use crate::ingest_queue::DEFAULT_CAPACITY;
use crate::packet::DEFAULT_FRAMES_PER_PACKET;
use crate::projection::Projection;
use crate::types::ROW_WIDTH;

pub const META_FILE: &str = "meta.json";
pub const PROJECTION_FILE: &str = "projection.json";
pub const LINEAR_WEIGHTS_FILE: &str = "linear.json";
pub const CNN1D_WEIGHTS_FILE: &str = "cnn1d.json";

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| PipelineError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Metadatos de preprocesado exportados junto al modelo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMeta {
    pub window: usize,
    pub num_segments: usize,
    pub stats_list: Vec<Stat>,
    #[serde(rename = "D_pca")]
    pub d_pca: usize,
    pub classes: usize,
    #[serde(default)]
    pub class_names: Vec<String>,
    /// Se acepta por compatibilidad; la ventana avanza una fila por frame
    #[serde(default)]
    pub hop: Option<usize>,
}

impl ModelMeta {
    pub fn stat_set(&self) -> StatSet {
        StatSet::from_stats(self.stats_list.iter().copied())
    }

    /// Longitud del vector de características antes de proyectar
    pub fn feature_len(&self) -> usize {
        self.num_segments * ROW_WIDTH * self.stat_set().len()
    }

    pub fn class_name(&self, class: usize) -> String {
        self.class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }

    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(PipelineError::Configuration("window debe ser > 0".into()));
        }
        if self.num_segments == 0 || self.num_segments > self.window {
            return Err(PipelineError::Configuration(format!(
                "num_segments={} incompatible con window={}",
                self.num_segments, self.window
            )));
        }
        if self.stat_set().is_empty() {
            return Err(PipelineError::Configuration("stats_list vacío".into()));
        }
        if self.d_pca == 0 || self.classes == 0 {
            return Err(PipelineError::Configuration(
                "D_pca y classes deben ser > 0".into(),
            ));
        }
        if !self.class_names.is_empty() && self.class_names.len() != self.classes {
            return Err(PipelineError::Configuration(format!(
                "{} nombres de clase para {} clases",
                self.class_names.len(),
                self.classes
            )));
        }
        Ok(())
    }

    pub fn feature_extractor(&self) -> Result<FeatureExtractor> {
        FeatureExtractor::new(self.window, self.num_segments, self.stat_set())
    }
}

/// Parámetros del scaler + PCA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionParams {
    pub scaler_mean: Vec<f32>,
    pub scaler_scale: Vec<f32>,
    pub pca_mean: Vec<f32>,
    /// `D_pca` filas de `feature_len` columnas
    pub pca_components: Vec<Vec<f32>>,
}

impl ProjectionParams {
    pub fn into_projection(self) -> Result<Projection> {
        Projection::new(self.scaler_mean, self.scaler_scale, self.pca_mean, self.pca_components)
    }
}

/// Metadatos y proyección validados entre sí
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub meta: ModelMeta,
    pub projection: Projection,
    dir: PathBuf,
}

impl ModelBundle {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let meta: ModelMeta = read_json(&dir.join(META_FILE))?;
        let params: ProjectionParams = read_json(&dir.join(PROJECTION_FILE))?;
        let bundle = Self::from_parts(meta, params.into_projection()?, dir)?;
        Ok(bundle)
    }

    pub fn from_parts(meta: ModelMeta, projection: Projection, dir: impl Into<PathBuf>) -> Result<Self> {
        meta.validate()?;
        check_projection(&meta, &projection)?;
        Ok(Self {
            meta,
            projection,
            dir: dir.into(),
        })
    }

    /// Ruta de un artefacto dentro del directorio del modelo
    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

/// La proyección debe consumir el vector de características y producir `D_pca`
pub fn check_projection(meta: &ModelMeta, projection: &Projection) -> Result<()> {
    if projection.input_len() != meta.feature_len() {
        return Err(PipelineError::Configuration(format!(
            "la proyección espera {} características, la extracción produce {}",
            projection.input_len(),
            meta.feature_len()
        )));
    }
    if projection.output_len() != meta.d_pca {
        return Err(PipelineError::Configuration(format!(
            "la proyección produce {} valores, D_pca={}",
            projection.output_len(),
            meta.d_pca
        )));
    }
    Ok(())
}

/// Parámetros de ejecución del daemon
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub filter: FilterConfig,
    pub queue_capacity: usize,
    /// Timeout de `dequeue`; marca el ritmo con que se revisa el apagado
    pub poll_interval: Duration,
    pub frames_per_packet: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            filter: FilterConfig::default(),
            queue_capacity: DEFAULT_CAPACITY,
            poll_interval: Duration::from_secs(1),
            frames_per_packet: DEFAULT_FRAMES_PER_PACKET,
        }
    }
}
