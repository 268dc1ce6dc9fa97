//! Streaming mean/variance accumulator.

use serde::{Deserialize, Serialize};

/// Single-pass mean/variance over batches of scalars.
///
/// Batches are folded in with the pairwise (Chan et al.) update, so
/// `merge` is associative and worker-local accumulators can be combined in
/// any grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingStats {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
}

impl StreamingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a batch of values in. Empty batches are ignored.
    pub fn update(&mut self, values: &[f64]) {
        if values.is_empty() {
            return;
        }
        let n = values.len() as f64;
        let batch_mean = values.iter().sum::<f64>() / n;
        let batch_m2 = values.iter().map(|v| (v - batch_mean).powi(2)).sum::<f64>();
        self.combine(values.len() as u64, batch_mean, batch_m2);
    }

    /// Fold another accumulator in.
    pub fn merge(&mut self, other: &StreamingStats) {
        self.combine(other.count, other.mean, other.m2);
    }

    fn combine(&mut self, count: u64, mean: f64, m2: f64) {
        if count == 0 {
            return;
        }
        if self.count == 0 {
            *self = Self { count, mean, m2 };
            return;
        }
        let (na, nb) = (self.count as f64, count as f64);
        let total = na + nb;
        let delta = mean - self.mean;
        self.mean += delta * nb / total;
        self.m2 += m2 + delta * delta * na * nb / total;
        self.count += count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of everything seen so far (0 when empty).
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (ddof = 0).
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Population standard deviation used as a scale.
    ///
    /// A zero deviation is reported as 1.0 so dividing by it is a no-op.
    pub fn std(&self) -> f64 {
        let std = self.variance().sqrt();
        if std == 0.0 { 1.0 } else { std }
    }
}
