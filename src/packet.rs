//! Codec del payload de entrada.
//!
//! Cada mensaje trae exactamente `frames_per_packet` frames; cada frame son
//! 5 sensores x 6 floats IEEE-754 en orden de red (big-endian):
//! `ax, ay, az, gx, gy, gz`. Con 4 frames el payload mide 480 bytes.

use crate::error::{PipelineError, Result};
use crate::types::{Frame, SensorReading, AXES_PER_SENSOR, NUM_SENSORS};

pub const DEFAULT_FRAMES_PER_PACKET: usize = 4;

const VALUE_BYTES: usize = 4;
const SENSOR_BYTES: usize = AXES_PER_SENSOR * VALUE_BYTES; // 24
const FRAME_BYTES: usize = NUM_SENSORS * SENSOR_BYTES; // 120

#[derive(Debug, Clone, Copy)]
pub struct PacketDecoder {
    frames_per_packet: usize,
}

impl PacketDecoder {
    pub fn new(frames_per_packet: usize) -> Self {
        Self { frames_per_packet }
    }

    pub fn frames_per_packet(&self) -> usize {
        self.frames_per_packet
    }

    pub fn expected_len(&self) -> usize {
        self.frames_per_packet * FRAME_BYTES
    }

    /// Decodifica un payload completo; cualquier otro tamaño se rechaza
    pub fn decode(&self, payload: &[u8]) -> Result<Vec<Frame>> {
        let expected = self.expected_len();
        if payload.len() != expected {
            return Err(PipelineError::InvalidInput(format!(
                "tamaño de paquete {}, esperado {}",
                payload.len(),
                expected
            )));
        }

        let frames = payload
            .chunks_exact(FRAME_BYTES)
            .map(|frame_bytes| {
                let mut frame: Frame = [None; NUM_SENSORS];
                for (slot, sensor_bytes) in frame.iter_mut().zip(frame_bytes.chunks_exact(SENSOR_BYTES)) {
                    let mut axes = [0.0f32; AXES_PER_SENSOR];
                    for (axis, bytes) in axes.iter_mut().zip(sensor_bytes.chunks_exact(VALUE_BYTES)) {
                        *axis = f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                    }
                    *slot = Some(SensorReading::from_axes(axes));
                }
                frame
            })
            .collect();

        Ok(frames)
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_PER_PACKET)
    }
}

/// Codifica frames al formato de red. Los sensores ausentes viajan como ceros.
pub fn encode_frames(frames: &[Frame]) -> Vec<u8> {
    let mut out = Vec::with_capacity(frames.len() * FRAME_BYTES);
    for frame in frames {
        for reading in frame {
            let axes = reading.map(|r| r.axes()).unwrap_or_default();
            for value in axes {
                out.extend_from_slice(&value.to_be_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame(base: f32) -> Frame {
        std::array::from_fn(|s| {
            let offset = base + (s * AXES_PER_SENSOR) as f32;
            Some(SensorReading::from_axes(std::array::from_fn(|a| offset + a as f32)))
        })
    }

    #[test]
    fn test_default_packet_is_480_bytes() {
        assert_eq!(PacketDecoder::default().expected_len(), 480);
    }

    #[test]
    fn test_decode_big_endian_layout() {
        let frames: Vec<Frame> = (0..4).map(|i| sample_frame(i as f32 * 100.0)).collect();
        let payload = encode_frames(&frames);

        // primer valor del primer sensor: 0.0; segundo valor: 1.0 en big-endian
        assert_eq!(&payload[4..8], &1.0f32.to_be_bytes());

        let decoded = PacketDecoder::default().decode(&payload).unwrap();
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded[3][4].unwrap().angular_rate, [327.0, 328.0, 329.0]);
        assert_eq!(decoded, frames);
    }

    #[test]
    fn test_wrong_size_is_invalid_input() {
        let decoder = PacketDecoder::default();
        for len in [0usize, 479, 481, 960] {
            let err = decoder.decode(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidInput(_)), "len {}", len);
        }
    }

    #[test]
    fn test_custom_frame_count() {
        let decoder = PacketDecoder::new(1);
        let payload = encode_frames(&[sample_frame(0.0)]);
        assert_eq!(payload.len(), decoder.expected_len());
        assert_eq!(decoder.decode(&payload).unwrap().len(), 1);
    }
}
