//! Post-procesado de los logits del acelerador: umbral de confianza,
//! confirmación en dos frames consecutivos y cooldown entre decisiones.

use std::time::{Duration, Instant};

/// Clase reservada para "sin gesto"
pub const NO_GESTURE: usize = 0;
pub const SOFTMAX_EPSILON: f32 = 1e-9;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Softmax estable: `exp(x - max) / (Σ exp(x - max) + ε)`
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let mut probs = Vec::with_capacity(logits.len());
    softmax_into(logits, &mut probs);
    probs
}

pub fn softmax_into(logits: &[f32], probs: &mut Vec<f32>) {
    probs.clear();
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    probs.extend(logits.iter().map(|&x| (x - max).exp()));
    let denom = probs.iter().sum::<f32>() + SOFTMAX_EPSILON;
    for p in probs.iter_mut() {
        *p /= denom;
    }
}

/// Índice del máximo; en empate gana el primero
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (idx, &v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((idx, v)),
        })
        .map(|(idx, _)| idx)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    pub confidence_threshold: f32,
    pub cooldown: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            cooldown: DEFAULT_COOLDOWN,
        }
    }
}

/// Estado del filtro; vive lo que vive el proceso
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionState {
    pub last_raw_class: usize,
    pub cooldown_deadline: Option<Instant>,
    /// Sólo diagnóstico: la última salida del filtro. Ninguna decisión lo lee.
    pub last_confirmed: usize,
}

/// Resultado de un paso del filtro
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    /// Clase cruda tras el umbral de confianza
    pub raw: usize,
    pub confidence: f32,
    /// Clase confirmada; `NO_GESTURE` si no hay decisión accionable
    pub confirmed: usize,
}

impl Verdict {
    pub fn is_actionable(&self) -> bool {
        self.confirmed != NO_GESTURE
    }
}

pub struct PredictionFilter {
    config: FilterConfig,
    state: PredictionState,
    probs: Vec<f32>,
}

impl PredictionFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            state: PredictionState::default(),
            probs: Vec::new(),
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn state(&self) -> &PredictionState {
        &self.state
    }

    /// Un paso de la máquina de Mealy sobre los logits de una inferencia
    pub fn update(&mut self, logits: &[f32], now: Instant) -> Verdict {
        softmax_into(logits, &mut self.probs);

        let (mut raw, confidence) = match argmax(&self.probs) {
            Some(idx) => (idx, self.probs[idx]),
            None => (NO_GESTURE, 0.0),
        };

        if raw != NO_GESTURE && confidence < self.config.confidence_threshold {
            raw = NO_GESTURE;
        }

        // Dos frames consecutivos con la misma clase
        let mut confirmed = if raw != NO_GESTURE && raw == self.state.last_raw_class {
            raw
        } else {
            NO_GESTURE
        };
        self.state.last_raw_class = raw;

        if confirmed != NO_GESTURE {
            match self.state.cooldown_deadline {
                Some(deadline) if now < deadline => confirmed = NO_GESTURE,
                _ => self.state.cooldown_deadline = Some(now + self.config.cooldown),
            }
        }

        self.state.last_confirmed = confirmed;
        Verdict {
            raw,
            confidence,
            confirmed,
        }
    }
}

impl Default for PredictionFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    /// Logits que dan a `class` una probabilidad ~1
    fn confident(class: usize, classes: usize) -> Vec<f32> {
        (0..classes).map(|c| if c == class { 20.0 } else { 0.0 }).collect()
    }

    #[test]
    fn test_debounce_needs_two_frames() {
        let mut filter = PredictionFilter::default();
        let now = Instant::now();

        let first = filter.update(&confident(3, 5), now);
        let second = filter.update(&confident(3, 5), now);

        assert_eq!(first.raw, 3);
        assert_eq!(first.confirmed, 0);
        assert_eq!(second.confirmed, 3);
    }

    #[test]
    fn test_debounce_resets_on_change() {
        let mut filter = PredictionFilter::default();
        let now = Instant::now();

        let seq: Vec<usize> = [2, 3, 2, 0, 2]
            .iter()
            .map(|&c| filter.update(&confident(c, 5), now).confirmed)
            .collect();
        assert_eq!(seq, vec![0, 0, 0, 0, 0]);
        assert_eq!(filter.state().last_raw_class, 2);
    }

    #[test]
    fn test_low_confidence_forced_to_no_gesture() {
        let mut filter = PredictionFilter::default();
        let now = Instant::now();

        // clase 2 con p ≈ 0.3 (las otras cuatro se reparten el resto)
        let logits = [0.0f32, 0.0, 0.54, 0.0, 0.0];
        let probs = softmax(&logits);
        assert_eq!(argmax(&probs), Some(2));
        assert!(probs[2] < 0.5 && probs[2] > 0.25);

        for _ in 0..3 {
            let verdict = filter.update(&logits, now);
            assert_eq!(verdict.raw, 0);
            assert_eq!(verdict.confirmed, 0);
        }
    }

    #[test]
    fn test_cooldown_blocks_then_releases() {
        let mut filter = PredictionFilter::default();
        let t0 = Instant::now();

        filter.update(&confident(1, 4), t0);
        assert_eq!(filter.update(&confident(1, 4), t0).confirmed, 1);

        // Otra clase confirmada dentro de los 3 s
        let t1 = t0 + Duration::from_secs(1);
        filter.update(&confident(2, 4), t1);
        assert_eq!(filter.update(&confident(2, 4), t1).confirmed, 0);

        let t2 = t0 + Duration::from_secs(3);
        assert_eq!(filter.update(&confident(2, 4), t2).confirmed, 2);
        assert_eq!(filter.state().cooldown_deadline, Some(t2 + DEFAULT_COOLDOWN));
    }

    #[test]
    fn test_blocked_confirmation_does_not_extend_cooldown() {
        let mut filter = PredictionFilter::default();
        let t0 = Instant::now();

        filter.update(&confident(1, 3), t0);
        filter.update(&confident(1, 3), t0);
        filter.update(&confident(1, 3), t0 + Duration::from_secs(2));

        assert_eq!(filter.state().cooldown_deadline, Some(t0 + DEFAULT_COOLDOWN));
        assert_eq!(filter.state().last_confirmed, 0);
    }

    #[test]
    fn test_argmax_first_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.1, 0.7, 0.7]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_empty_logits_are_no_gesture() {
        let mut filter = PredictionFilter::default();
        let verdict = filter.update(&[], Instant::now());
        assert!(!verdict.is_actionable());
        assert_eq!(verdict.confidence, 0.0);
    }

    proptest! {
        #[test]
        fn prop_softmax_sums_to_one(logits in prop::collection::vec(-50.0f32..50.0, 1..12)) {
            let sum: f64 = softmax(&logits).iter().map(|&p| p as f64).sum();
            prop_assert!((sum - 1.0).abs() <= 1e-6, "suma {}", sum);
        }

        #[test]
        fn prop_softmax_shift_invariant(
            logits in prop::collection::vec(-20.0f32..20.0, 1..16),
            shift in -20.0f32..20.0,
        ) {
            let shifted: Vec<f32> = logits.iter().map(|x| x + shift).collect();
            let a = softmax(&logits);
            let b = softmax(&shifted);
            for (pa, pb) in a.iter().zip(&b) {
                assert_abs_diff_eq!(*pa, *pb, epsilon = 1e-4);
            }
        }
    }
}
