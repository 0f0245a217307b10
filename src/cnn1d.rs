//! Modelo de software del IP desplegado en la FPGA:
//! Conv1D (kernel 3, padding con ceros) → ReLU → Flatten → Dense.
//! Devuelve logits; el softmax se aplica en el filtro.

use serde::Deserialize;
use std::path::Path;

use crate::accelerator::{check_buffers, Accelerator, AcceleratorError};
use crate::config::read_json;
use crate::error::{PipelineError, Result};

pub const KERNEL: usize = 3;

/// Pesos exportados desde el entrenamiento
#[derive(Debug, Clone, Deserialize)]
pub struct Cnn1dWeights {
    /// `[CONV_OUT][KERNEL]`
    pub conv_weights: Vec<[f32; KERNEL]>,
    /// `[CONV_OUT]`
    pub conv_bias: Vec<f32>,
    /// `[D_in * CONV_OUT][CLASSES]`, índice de fila `t * CONV_OUT + f`
    pub dense_weights: Vec<Vec<f32>>,
    /// `[CLASSES]`
    pub dense_bias: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct Cnn1dAccelerator {
    conv_weights: Vec<[f32; KERNEL]>,
    conv_bias: Vec<f32>,
    dense_weights: Vec<f32>,
    dense_bias: Vec<f32>,
    input_len: usize,
}

impl Cnn1dAccelerator {
    pub fn new(weights: Cnn1dWeights) -> Result<Self> {
        let filters = weights.conv_weights.len();
        let classes = weights.dense_bias.len();

        if filters == 0 || weights.conv_bias.len() != filters {
            return Err(PipelineError::Configuration(format!(
                "conv1d con {} filtros y {} bias",
                filters,
                weights.conv_bias.len()
            )));
        }
        if classes == 0 || weights.dense_weights.iter().any(|row| row.len() != classes) {
            return Err(PipelineError::Configuration(format!(
                "filas de la capa densa deben tener {} columnas",
                classes
            )));
        }
        let rows = weights.dense_weights.len();
        if rows == 0 || rows % filters != 0 {
            return Err(PipelineError::Configuration(format!(
                "capa densa con {} filas no es múltiplo de {} filtros",
                rows, filters
            )));
        }

        Ok(Self {
            conv_weights: weights.conv_weights,
            conv_bias: weights.conv_bias,
            dense_weights: weights.dense_weights.into_iter().flatten().collect(),
            dense_bias: weights.dense_bias,
            input_len: rows / filters,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(read_json(path.as_ref())?)
    }

    fn filters(&self) -> usize {
        self.conv_weights.len()
    }
}

impl Accelerator for Cnn1dAccelerator {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.dense_bias.len()
    }

    fn transfer(&mut self, input: &[f32], output: &mut [f32]) -> std::result::Result<(), AcceleratorError> {
        check_buffers(input, output, self.input_len, self.dense_bias.len())?;

        let classes = self.dense_bias.len();
        output.copy_from_slice(&self.dense_bias);

        for t in 0..self.input_len {
            let prev = if t > 0 { input[t - 1] } else { 0.0 };
            let next = input.get(t + 1).copied().unwrap_or(0.0);
            let taps = [prev, input[t], next];

            for (f, (kernel, bias)) in self.conv_weights.iter().zip(&self.conv_bias).enumerate() {
                let act = kernel
                    .iter()
                    .zip(&taps)
                    .fold(*bias, |acc, (w, x)| acc + w * x)
                    .max(0.0);

                // Conv y densa fusionadas: cada activación se acumula al momento
                let row = (t * self.filters() + f) * classes;
                for (logit, w) in output.iter_mut().zip(&self.dense_weights[row..row + classes]) {
                    *logit += act * w;
                }
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cnn1d"
    }
}
