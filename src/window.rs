use crate::clock::Stamp;
use crate::error::{PipelineError, Result};
use crate::types::SensorRow;

/// Ventana deslizante de capacidad fija sobre un buffer circular.
///
/// Los slots se reservan al crearla; `push` sobrescribe el más antiguo
/// cuando está llena, sin realocar.
pub struct SlidingWindow {
    rows: Vec<SensorRow>,
    /// Próximo slot a escribir
    cursor: usize,
    len: usize,
    /// Momento en que la ventana quedó saturada por última vez
    ready_mark: Option<Stamp>,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(PipelineError::Configuration(
                "la ventana necesita al menos una fila".into(),
            ));
        }
        Ok(Self {
            rows: vec![SensorRow::default(); capacity],
            cursor: 0,
            len: 0,
            ready_mark: None,
        })
    }

    /// Añade una fila. Si la ventana ya estaba llena, la marca se toma antes
    /// de insertar: la ventana previa quedó completa y empieza a deslizar.
    pub fn push(&mut self, row: SensorRow, at: Stamp) {
        if self.is_ready() {
            self.ready_mark = Some(at);
        }

        self.rows[self.cursor] = row;
        self.cursor = (self.cursor + 1) % self.capacity();

        if self.len < self.capacity() {
            self.len += 1;
            // Primera vez que se llena
            if self.len == self.capacity() && self.ready_mark.is_none() {
                self.ready_mark = Some(at);
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.rows.len()
    }

    pub fn ready_mark(&self) -> Option<Stamp> {
        self.ready_mark
    }

    /// Filas en orden cronológico (más antigua primero)
    pub fn iter(&self) -> impl Iterator<Item = &SensorRow> + '_ {
        let start = if self.is_ready() { self.cursor } else { 0 };
        let capacity = self.capacity();
        (0..self.len).map(move |i| &self.rows[(start + i) % capacity])
    }

    pub fn clear(&mut self) {
        self.cursor = 0;
        self.len = 0;
        self.ready_mark = None;
    }
}
