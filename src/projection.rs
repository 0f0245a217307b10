use crate::error::{PipelineError, Result};

/// Estandarización + PCA aprendidas fuera de línea:
/// `((x - scaler_mean) / scaler_scale - pca_mean) · componentsᵀ`
///
/// `scaler_scale` no debe contener ceros; se asume desde la configuración.
#[derive(Debug, Clone)]
pub struct Projection {
    scaler_mean: Vec<f32>,
    scaler_scale: Vec<f32>,
    pca_mean: Vec<f32>,
    /// Fila-mayor: `output_len` filas de `input_len` columnas
    components: Vec<f32>,
    input_len: usize,
    output_len: usize,
    centered: Vec<f32>,
}

impl Projection {
    pub fn new(
        scaler_mean: Vec<f32>,
        scaler_scale: Vec<f32>,
        pca_mean: Vec<f32>,
        components: Vec<Vec<f32>>,
    ) -> Result<Self> {
        let input_len = scaler_mean.len();
        let output_len = components.len();

        if input_len == 0 || output_len == 0 {
            return Err(PipelineError::Configuration("proyección vacía".into()));
        }
        for (name, len) in [("scaler_scale", scaler_scale.len()), ("pca_mean", pca_mean.len())] {
            if len != input_len {
                return Err(PipelineError::Configuration(format!(
                    "{} tiene {} valores, scaler_mean tiene {}",
                    name, len, input_len
                )));
            }
        }
        if let Some((idx, row)) = components.iter().enumerate().find(|(_, r)| r.len() != input_len) {
            return Err(PipelineError::Configuration(format!(
                "pca_components[{}] tiene {} columnas, esperadas {}",
                idx,
                row.len(),
                input_len
            )));
        }

        Ok(Self {
            scaler_mean,
            scaler_scale,
            pca_mean,
            components: components.into_iter().flatten().collect(),
            input_len,
            output_len,
            centered: vec![0.0; input_len],
        })
    }

    /// Sin escalado ni centrado, y las primeras `output_len` filas de la identidad
    pub fn identity(input_len: usize, output_len: usize) -> Result<Self> {
        let components = (0..output_len)
            .map(|row| (0..input_len).map(|col| if row == col { 1.0 } else { 0.0 }).collect())
            .collect();
        Self::new(
            vec![0.0; input_len],
            vec![1.0; input_len],
            vec![0.0; input_len],
            components,
        )
    }

    pub fn input_len(&self) -> usize {
        self.input_len
    }

    pub fn output_len(&self) -> usize {
        self.output_len
    }

    pub fn project(&mut self, features: &[f32]) -> Result<Vec<f32>> {
        let mut out = vec![0.0; self.output_len];
        self.project_into(features, &mut out)?;
        Ok(out)
    }

    pub fn project_into(&mut self, features: &[f32], out: &mut [f32]) -> Result<()> {
        if features.len() != self.input_len {
            return Err(PipelineError::InvalidInput(format!(
                "vector de características con {} valores, esperados {}",
                features.len(),
                self.input_len
            )));
        }
        if out.len() != self.output_len {
            return Err(PipelineError::InvalidInput(format!(
                "buffer de salida con {} valores, esperados {}",
                out.len(),
                self.output_len
            )));
        }

        for (i, c) in self.centered.iter_mut().enumerate() {
            *c = (features[i] - self.scaler_mean[i]) / self.scaler_scale[i] - self.pca_mean[i];
        }

        for (o, row) in out.iter_mut().zip(self.components.chunks_exact(self.input_len)) {
            *o = row.iter().zip(&self.centered).map(|(w, x)| w * x).sum();
        }
        Ok(())
    }
}
