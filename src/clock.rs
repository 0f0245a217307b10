use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Instante capturado dos veces: monotónico para latencia y cooldown,
/// de pared para el registro de salida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stamp {
    pub instant: Instant,
    pub wall: DateTime<Utc>,
}

impl Stamp {
    pub fn now() -> Self {
        Self {
            instant: Instant::now(),
            wall: Utc::now(),
        }
    }

    /// Milisegundos transcurridos desde `earlier` (0 si es posterior)
    pub fn millis_since(&self, earlier: &Stamp) -> f64 {
        self.instant.saturating_duration_since(earlier.instant).as_secs_f64() * 1000.0
    }

    pub fn advanced_by(&self, delta: Duration) -> Self {
        Self {
            instant: self.instant + delta,
            wall: self.wall + chrono::Duration::from_std(delta).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }
}

pub trait Clock {
    fn now(&self) -> Stamp;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Stamp {
        Stamp::now()
    }
}

/// Reloj que sólo avanza cuando se le pide. Los clones comparten el tiempo,
/// así el replay (o un test) puede avanzar el reloj que posee el pipeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    current: Arc<Mutex<Stamp>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Stamp::now())
    }

    pub fn starting_at(stamp: Stamp) -> Self {
        Self {
            current: Arc::new(Mutex::new(stamp)),
        }
    }

    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = current.advanced_by(delta);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Stamp {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        let t0 = clock.now();

        handle.advance(Duration::from_millis(250));
        let t1 = clock.now();

        assert_eq!(t1.millis_since(&t0), 250.0);
        assert_eq!((t1.wall - t0.wall).num_milliseconds(), 250);
    }

    #[test]
    fn test_millis_since_saturates() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_secs(1));
        let t1 = clock.now();
        assert_eq!(t0.millis_since(&t1), 0.0);
    }
}
