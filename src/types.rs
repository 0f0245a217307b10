use crate::error::{PipelineError, Result};

/// Constantes del sistema
pub const NUM_SENSORS: usize = 5;
pub const AXES_PER_SENSOR: usize = 6; // ax, ay, az, gx, gy, gz
pub const ROW_WIDTH: usize = NUM_SENSORS * AXES_PER_SENSOR; // 30

/// Lectura de un IMU: aceleración y velocidad angular en 3 ejes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorReading {
    pub acceleration: [f32; 3],
    pub angular_rate: [f32; 3],
}

impl SensorReading {
    /// Construye la lectura desde [ax, ay, az, gx, gy, gz]
    pub fn from_axes(axes: [f32; AXES_PER_SENSOR]) -> Self {
        Self {
            acceleration: [axes[0], axes[1], axes[2]],
            angular_rate: [axes[3], axes[4], axes[5]],
        }
    }

    pub fn axes(&self) -> [f32; AXES_PER_SENSOR] {
        let [ax, ay, az] = self.acceleration;
        let [gx, gy, gz] = self.angular_rate;
        [ax, ay, az, gx, gy, gz]
    }
}

/// Frame completo con los 5 sensores, indexado por id de sensor.
/// `None` si el sensor no reportó en este instante.
pub type Frame = [Option<SensorReading>; NUM_SENSORS];

/// Lote de frames entregado por el transporte.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// Identificador de sesión/correlación asignado por el productor
    pub session: u64,
    pub frames: Vec<Frame>,
}

impl Batch {
    pub fn new(session: u64, frames: Vec<Frame>) -> Self {
        Self { session, frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Fila de 30 valores: 5 sensores x [ax, ay, az, gx, gy, gz].
/// Los sensores ausentes se rellenan con ceros.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorRow([f32; ROW_WIDTH]);

impl SensorRow {
    /// Aplana un frame al layout [sensor][eje]
    pub fn from_frame(frame: &Frame) -> Self {
        let mut values = [0.0f32; ROW_WIDTH];
        for (sensor_idx, reading) in frame.iter().enumerate() {
            if let Some(reading) = reading {
                let base = sensor_idx * AXES_PER_SENSOR;
                values[base..base + AXES_PER_SENSOR].copy_from_slice(&reading.axes());
            }
        }
        Self(values)
    }

    /// Valida el ancho antes de que la fila llegue a la ventana
    pub fn from_slice(values: &[f32]) -> Result<Self> {
        let values: [f32; ROW_WIDTH] = values.try_into().map_err(|_| {
            PipelineError::InvalidInput(format!(
                "la fila debe tener {} valores, recibidos {}",
                ROW_WIDTH,
                values.len()
            ))
        })?;
        Ok(Self(values))
    }

    pub fn filled(value: f32) -> Self {
        Self([value; ROW_WIDTH])
    }

    pub fn values(&self) -> &[f32; ROW_WIDTH] {
        &self.0
    }

    /// Reconstruye el frame; todos los sensores quedan presentes
    pub fn to_frame(&self) -> Frame {
        std::array::from_fn(|sensor_idx| {
            let base = sensor_idx * AXES_PER_SENSOR;
            let mut axes = [0.0f32; AXES_PER_SENSOR];
            axes.copy_from_slice(&self.0[base..base + AXES_PER_SENSOR]);
            Some(SensorReading::from_axes(axes))
        })
    }
}
