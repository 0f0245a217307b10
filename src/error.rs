use std::path::PathBuf;
use thiserror::Error;

use crate::accelerator::AcceleratorError;

/// Errores del pipeline de inferencia.
///
/// `InvalidInput` y `AcceleratorUnavailable` son fallos por frame: el
/// orquestador los registra y sigue con el siguiente frame. `Configuration`
/// es fatal y sólo aparece al arrancar.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),

    #[error("Acelerador no disponible: {0}")]
    AcceleratorUnavailable(#[from] AcceleratorError),

    #[error("Error de configuración: {0}")]
    Configuration(String),

    #[error("No se pudo leer {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON inválido en {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Error escribiendo decisión: {0}")]
    Sink(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
