use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;

use crate::types::{Frame, SensorReading, AXES_PER_SENSOR, NUM_SENSORS, ROW_WIDTH};

/// Carga frames desde un CSV de captura con cabecera
/// `t,IMU0_ax,IMU0_ay,IMU0_az,IMU0_gx,IMU0_gy,IMU0_gz,...,IMU4_gz`.
/// La columna `t` es opcional. Si las 6 celdas de un sensor están vacías,
/// el sensor se considera ausente en ese frame.
pub fn load_frames_from_csv(path: impl AsRef<Path>) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Fila {} inválida en {:?}", row_idx + 1, path))?;

        let skip = match record.len() {
            n if n == ROW_WIDTH => 0,
            n if n == ROW_WIDTH + 1 => 1,
            n => bail!(
                "La fila {} tiene {} columnas (se esperan {} o {})",
                row_idx + 1,
                n,
                ROW_WIDTH,
                ROW_WIDTH + 1
            ),
        };

        let cells: Vec<&str> = record.iter().skip(skip).map(str::trim).collect();
        let mut frame: Frame = [None; NUM_SENSORS];

        for (sensor, chunk) in cells.chunks_exact(AXES_PER_SENSOR).enumerate() {
            if chunk.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let mut axes = [0.0f32; AXES_PER_SENSOR];
            for (axis, cell) in axes.iter_mut().zip(chunk) {
                *axis = cell.parse().with_context(|| {
                    format!("Valor {:?} inválido (fila {}, sensor {})", cell, row_idx + 1, sensor)
                })?;
            }
            frame[sensor] = Some(SensorReading::from_axes(axes));
        }

        frames.push(frame);
    }

    if frames.is_empty() {
        bail!("El CSV {:?} no contiene datos", path);
    }

    Ok(frames)
}
