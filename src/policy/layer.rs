//! Dense layer storage shared by both network kinds
//!
//! Weights are kept flattened in row-major order: the weight connecting input
//! `j` to output `i` lives at `weights[i * in_features + j]`. This is also the
//! order written to weight documents.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weights and biases for a single fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix (flattened, row-major)
    pub weights: Vec<f32>,
    /// Bias vector
    pub biases: Vec<f32>,
    /// Input dimension
    pub in_features: usize,
    /// Output dimension
    pub out_features: usize,
}

impl DenseLayer {
    /// Create a zero-filled layer
    pub fn zeros(in_features: usize, out_features: usize) -> Self {
        Self {
            weights: vec![0.0; in_features * out_features],
            biases: vec![0.0; out_features],
            in_features,
            out_features,
        }
    }

    /// Create a layer with `scale = sqrt(2 / fan_in)` uniform weights and
    /// zero biases
    pub fn xavier<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let scale = (2.0 / in_features as f32).sqrt();
        let weights = (0..in_features * out_features)
            .map(|_| rng.gen_range(-1.0_f32..=1.0) * scale)
            .collect();

        Self { weights, biases: vec![0.0; out_features], in_features, out_features }
    }

    /// Affine projection `W x + b` (no activation)
    ///
    /// The caller guarantees `input.len() == in_features`.
    pub fn forward(&self, input: &[f32]) -> Vec<f32> {
        debug_assert_eq!(input.len(), self.in_features, "Input size mismatch");

        self.weights
            .chunks_exact(self.in_features)
            .zip(&self.biases)
            .map(|(row, &bias)| bias + row.iter().zip(input).map(|(w, x)| w * x).sum::<f32>())
            .collect()
    }

    /// Propagate output deltas back to the layer's inputs: `Wᵀ δ`
    pub fn backward_input(&self, deltas: &[f32]) -> Vec<f32> {
        let mut grad = vec![0.0; self.in_features];
        for (row, &delta) in self.weights.chunks_exact(self.in_features).zip(deltas) {
            for (g, &w) in grad.iter_mut().zip(row) {
                *g += w * delta;
            }
        }
        grad
    }

    /// Additive update `W += lr · δ ⊗ input`, `b += lr · δ`
    pub fn apply_update(&mut self, input: &[f32], deltas: &[f32], lr: f32) {
        for ((row, bias), &delta) in
            self.weights.chunks_exact_mut(self.in_features).zip(self.biases.iter_mut()).zip(deltas)
        {
            let step = lr * delta;
            for (w, &x) in row.iter_mut().zip(input) {
                *w += step * x;
            }
            *bias += step;
        }
    }

    /// Check that the arrays agree with the declared dimensions
    pub fn is_consistent(&self) -> bool {
        self.weights.len() == self.in_features * self.out_features
            && self.biases.len() == self.out_features
    }
}
