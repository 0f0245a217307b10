//! Contrato con el acelerador de inferencia.
//!
//! El dispositivo se ve como una transferencia síncrona: escribir el vector de
//! entrada en un buffer visible para el dispositivo, arrancar, esperar y leer
//! el buffer de salida. El adaptador posee ambos buffers y toma `&mut self`,
//! así nunca hay dos transferencias en vuelo.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::read_json;
use crate::error::{PipelineError, Result};

#[derive(Error, Debug)]
pub enum AcceleratorError {
    #[error("timeout tras {0:?}")]
    Timeout(Duration),

    #[error("fallo de transferencia: {0}")]
    Transfer(String),

    #[error("buffer de {kind} con {actual} valores, el dispositivo espera {expected}")]
    BufferSize {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Dispositivo de inferencia con semántica petición-respuesta bloqueante
pub trait Accelerator {
    /// Ancho del buffer de entrada (`D_in`)
    fn input_len(&self) -> usize;

    /// Ancho del buffer de salida (`CLASSES`)
    fn output_len(&self) -> usize;

    /// Un viaje completo: `input` → dispositivo → `output`. Retorna cuando la
    /// transferencia terminó o falló; no hay reintentos.
    fn transfer(&mut self, input: &[f32], output: &mut [f32]) -> std::result::Result<(), AcceleratorError>;

    fn name(&self) -> &str {
        "acelerador"
    }
}

impl<A: Accelerator + ?Sized> Accelerator for Box<A> {
    fn input_len(&self) -> usize {
        (**self).input_len()
    }

    fn output_len(&self) -> usize {
        (**self).output_len()
    }

    fn transfer(&mut self, input: &[f32], output: &mut [f32]) -> std::result::Result<(), AcceleratorError> {
        (**self).transfer(input, output)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Posee los buffers de entrada/salida y adapta el dispositivo al pipeline
pub struct AcceleratorAdapter<A> {
    device: A,
    in_buf: Vec<f32>,
    out_buf: Vec<f32>,
}

impl<A: Accelerator> AcceleratorAdapter<A> {
    /// Comprueba que el dispositivo coincide con `D_in` y `CLASSES` del modelo
    pub fn new(device: A, input_len: usize, classes: usize) -> Result<Self> {
        if device.input_len() != input_len || device.output_len() != classes {
            return Err(PipelineError::Configuration(format!(
                "{} espera {}→{}, el modelo declara {}→{}",
                device.name(),
                device.input_len(),
                device.output_len(),
                input_len,
                classes
            )));
        }

        Ok(Self {
            device,
            in_buf: vec![0.0; input_len],
            out_buf: vec![0.0; classes],
        })
    }

    /// Copia `projected` al buffer de entrada y ejecuta una transferencia.
    /// Cualquier fallo del dispositivo se reporta como `AcceleratorUnavailable`.
    pub fn transfer(&mut self, projected: &[f32]) -> Result<&[f32]> {
        if projected.len() != self.in_buf.len() {
            return Err(PipelineError::InvalidInput(format!(
                "vector proyectado con {} valores, el acelerador espera {}",
                projected.len(),
                self.in_buf.len()
            )));
        }

        self.in_buf.copy_from_slice(projected);
        self.device.transfer(&self.in_buf, &mut self.out_buf)?;
        Ok(&self.out_buf)
    }

    pub fn input_len(&self) -> usize {
        self.in_buf.len()
    }

    pub fn output_len(&self) -> usize {
        self.out_buf.len()
    }

    pub fn device(&self) -> &A {
        &self.device
    }
}

pub(crate) fn check_buffers(
    input: &[f32],
    output: &[f32],
    input_len: usize,
    output_len: usize,
) -> std::result::Result<(), AcceleratorError> {
    if input.len() != input_len {
        return Err(AcceleratorError::BufferSize {
            kind: "entrada",
            expected: input_len,
            actual: input.len(),
        });
    }
    if output.len() != output_len {
        return Err(AcceleratorError::BufferSize {
            kind: "salida",
            expected: output_len,
            actual: output.len(),
        });
    }
    Ok(())
}

/// Pesos de una capa lineal, en JSON: `weights` con `CLASSES` filas de `D_in`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearWeights {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// Modelo de software del acelerador: `logits = W·x + b`
#[derive(Debug, Clone)]
pub struct LinearAccelerator {
    weights: Vec<f32>,
    bias: Vec<f32>,
    input_len: usize,
}

impl LinearAccelerator {
    pub fn new(weights: LinearWeights) -> Result<Self> {
        let classes = weights.weights.len();
        if classes == 0 || weights.bias.len() != classes {
            return Err(PipelineError::Configuration(format!(
                "capa lineal con {} filas y {} bias",
                classes,
                weights.bias.len()
            )));
        }

        let input_len = weights.weights[0].len();
        if input_len == 0 || weights.weights.iter().any(|row| row.len() != input_len) {
            return Err(PipelineError::Configuration(
                "filas de la capa lineal con anchos distintos".into(),
            ));
        }

        Ok(Self {
            weights: weights.weights.into_iter().flatten().collect(),
            bias: weights.bias,
            input_len,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(read_json(path.as_ref())?)
    }
}

impl Accelerator for LinearAccelerator {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.bias.len()
    }

    fn transfer(&mut self, input: &[f32], output: &mut [f32]) -> std::result::Result<(), AcceleratorError> {
        check_buffers(input, output, self.input_len, self.bias.len())?;

        for ((logit, row), bias) in output
            .iter_mut()
            .zip(self.weights.chunks_exact(self.input_len))
            .zip(&self.bias)
        {
            *logit = bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>();
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "lineal"
    }
}
