//! Training statistics
//!
//! Metrics from a single per-agent training pass and helpers for
//! aggregating them across a population or a run.

use std::ops::AddAssign;

/// Statistics for one training pass over an agent's buffer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingStats {
    /// Mean squared error between actor output and its training target
    pub policy_loss: f64,

    /// Mean squared error between critic output and the discounted return
    pub value_loss: f64,

    /// Mean discounted return over the buffer
    pub mean_return: f64,

    /// Transitions consumed
    pub samples: usize,

    /// Number of training passes folded into these statistics
    pub num_updates: usize,
}

impl TrainingStats {
    /// Create zero-initialized statistics
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Whether no pass has been recorded
    pub fn is_empty(&self) -> bool {
        self.num_updates == 0
    }

    /// Add another statistics instance to this one
    pub fn add(&mut self, other: &TrainingStats) {
        self.policy_loss += other.policy_loss;
        self.value_loss += other.value_loss;
        self.mean_return += other.mean_return;
        self.samples += other.samples;
        self.num_updates += other.num_updates;
    }

    /// Compute average statistics across multiple passes
    ///
    /// `samples` stays a total.
    pub fn average(&self) -> Self {
        let scale = self.num_updates as f64;
        if scale == 0.0 {
            return Self::zeros();
        }

        Self {
            policy_loss: self.policy_loss / scale,
            value_loss: self.value_loss / scale,
            mean_return: self.mean_return / scale,
            samples: self.samples,
            num_updates: 1,
        }
    }
}

impl AddAssign<&TrainingStats> for TrainingStats {
    fn add_assign(&mut self, other: &TrainingStats) {
        self.add(other);
    }
}
