//! Cola de ingesta "latest-wins".
//!
//! Antes de insertar, el productor descarta cualquier lote pendiente, así que
//! nunca hay más de un lote esperando. Bajo sobrecarga se prioriza la
//! frescura de la decisión frente a procesar todos los frames.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::types::Batch;

pub const DEFAULT_CAPACITY: usize = 10;

/// Estadísticas de la cola
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub dropped: u64,
    pub delivered: u64,
}

#[derive(Default)]
struct Shared {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    closed: AtomicBool,
}

impl Shared {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
        }
    }
}

/// Crea la cola con capacidad blanda `capacity` (mínimo 1)
pub fn ingest_queue(capacity: usize) -> (IngestProducer, IngestConsumer) {
    let (tx, rx) = bounded(capacity.max(1));
    let shared = Arc::new(Shared::default());

    let producer = IngestProducer {
        tx,
        drain: rx.clone(),
        shared: Arc::clone(&shared),
    };
    let consumer = IngestConsumer { rx, shared };

    (producer, consumer)
}

/// Extremo productor. No es `Clone`: un único escritor hace el
/// drenado-e-inserción.
pub struct IngestProducer {
    tx: Sender<Batch>,
    drain: Receiver<Batch>,
    shared: Arc<Shared>,
}

impl IngestProducer {
    /// Inserta sin bloquear, descartando lo pendiente. Retorna cuántos lotes
    /// se descartaron.
    pub fn enqueue(&self, batch: Batch) -> usize {
        let mut dropped = 0;
        while self.drain.try_recv().is_ok() {
            dropped += 1;
        }

        match self.tx.try_send(batch) {
            Ok(()) => {
                self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            // Sólo posible con capacidad agotada por otro escritor; el lote nuevo se pierde
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                dropped += 1;
            }
        }

        if dropped > 0 {
            self.shared.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
        }
        dropped
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.snapshot()
    }
}

impl Drop for IngestProducer {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

/// Extremo consumidor, usado por el orquestador
pub struct IngestConsumer {
    rx: Receiver<Batch>,
    shared: Arc<Shared>,
}

impl IngestConsumer {
    /// Bloquea hasta `timeout`. `None` es un tick ocioso, no un error.
    pub fn dequeue(&self, timeout: Duration) -> Option<Batch> {
        match self.rx.recv_timeout(timeout) {
            Ok(batch) => {
                self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                Some(batch)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// El productor se cerró y no queda nada pendiente
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire) && self.rx.is_empty()
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.snapshot()
    }
}
