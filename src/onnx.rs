//! Acelerador respaldado por ONNX Runtime. Útil para validar el modelo
//! exportado en una máquina sin la FPGA.

use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::ValueType;
use std::path::Path;
use tracing::info;

use crate::accelerator::{check_buffers, Accelerator, AcceleratorError};
use crate::error::{PipelineError, Result};

pub struct OnnxAccelerator {
    session: Session,
    input_name: String,
    output_name: String,
    input_len: usize,
    output_len: usize,
}

impl OnnxAccelerator {
    /// El modelo recibe `[1, input_len]` y produce `output_len` logits
    pub fn new(model_path: impl AsRef<Path>, input_len: usize, output_len: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        let config_err = |e: ort::Error| {
            PipelineError::Configuration(format!("ONNX {:?}: {}", model_path, e))
        };

        let session = Session::builder()
            .map_err(config_err)?
            .commit_from_file(model_path)
            .map_err(config_err)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| PipelineError::Configuration("el modelo ONNX no tiene entradas".into()))?;

        // Primer tensor f32 de salida (los logits)
        let output_name = session
            .outputs
            .iter()
            .find(|output| {
                matches!(
                    output.output_type,
                    ValueType::Tensor {
                        ty: TensorElementType::Float32,
                        ..
                    }
                )
            })
            .or_else(|| session.outputs.first())
            .map(|output| output.name.clone())
            .ok_or_else(|| PipelineError::Configuration("el modelo ONNX no tiene salidas".into()))?;

        info!(model = ?model_path, input = %input_name, output = %output_name, "[ONNX] Modelo cargado");

        Ok(Self {
            session,
            input_name,
            output_name,
            input_len,
            output_len,
        })
    }

    /// Retorna cuántos logits produjo el modelo
    fn run(&mut self, input: &[f32], output: &mut [f32]) -> std::result::Result<usize, ort::Error> {
        let input_value = ort::value::Value::from_array((vec![1_usize, self.input_len], input.to_vec()))?;

        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => &input_value,
        ])?;

        let (_, logits) = outputs[self.output_name.as_str()].try_extract_tensor::<f32>()?;
        for (dst, src) in output.iter_mut().zip(logits.iter()) {
            *dst = *src;
        }
        Ok(logits.len())
    }
}

impl Accelerator for OnnxAccelerator {
    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn transfer(&mut self, input: &[f32], output: &mut [f32]) -> std::result::Result<(), AcceleratorError> {
        check_buffers(input, output, self.input_len, self.output_len)?;
        let produced = self
            .run(input, output)
            .map_err(|e| AcceleratorError::Transfer(e.to_string()))?;
        if produced < self.output_len {
            return Err(AcceleratorError::BufferSize {
                kind: "salida",
                expected: self.output_len,
                actual: produced,
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
