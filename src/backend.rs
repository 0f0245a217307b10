use std::fmt;
use std::path::Path;

use clap::ValueEnum;

use crate::accelerator::{Accelerator, LinearAccelerator};
use crate::cnn1d::Cnn1dAccelerator;
use crate::config::{ModelBundle, CNN1D_WEIGHTS_FILE, LINEAR_WEIGHTS_FILE};
use crate::error::{PipelineError, Result};

/// Implementación del dispositivo a usar
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Linear,
    Cnn1d,
    Onnx,
}

impl Backend {
    fn default_file(&self) -> &'static str {
        match self {
            Backend::Linear => LINEAR_WEIGHTS_FILE,
            Backend::Cnn1d => CNN1D_WEIGHTS_FILE,
            Backend::Onnx => "model.onnx",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Linear => "linear",
            Backend::Cnn1d => "cnn1d",
            Backend::Onnx => "onnx",
        };
        f.write_str(name)
    }
}

/// Abre el dispositivo. Sin `weights` se usa el archivo por defecto del
/// directorio del modelo.
pub fn open_backend(
    backend: Backend,
    bundle: &ModelBundle,
    weights: Option<&Path>,
) -> Result<Box<dyn Accelerator + Send>> {
    let path = weights
        .map(Path::to_path_buf)
        .unwrap_or_else(|| bundle.path(backend.default_file()));

    let device: Box<dyn Accelerator + Send> = match backend {
        Backend::Linear => Box::new(LinearAccelerator::from_json_file(&path)?),
        Backend::Cnn1d => Box::new(Cnn1dAccelerator::from_json_file(&path)?),
        #[cfg(feature = "onnx")]
        Backend::Onnx => Box::new(crate::onnx::OnnxAccelerator::new(
            &path,
            bundle.meta.d_pca,
            bundle.meta.classes,
        )?),
        #[cfg(not(feature = "onnx"))]
        Backend::Onnx => {
            return Err(PipelineError::Configuration(
                "compilado sin la feature `onnx`".into(),
            ))
        }
    };
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        for backend in Backend::value_variants() {
            assert_eq!(Backend::from_str(&backend.to_string(), false).unwrap(), *backend);
        }
        assert!(Backend::from_str("fpga", false).is_err());
    }

    #[test]
    fn test_onnx_without_feature_or_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let meta: crate::config::ModelMeta = serde_json::from_str(
            r#"{"window": 4, "num_segments": 2, "stats_list": ["mean"], "D_pca": 2, "classes": 2}"#,
        )
        .unwrap();
        let projection = crate::projection::Projection::identity(meta.feature_len(), 2).unwrap();
        let bundle = ModelBundle::from_parts(meta, projection, dir.path()).unwrap();
        assert!(matches!(
            open_backend(Backend::Onnx, &bundle, None),
            Err(PipelineError::Configuration(_))
        ));
    }
}
