//! Activation functions and their derivatives
//!
//! Derivatives are expressed in terms of the activation's *output* so the
//! backward passes can work from cached activations alone.

use serde::{Deserialize, Serialize};

/// Activation applied after an affine projection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Activation {
    /// `max(0, x)`
    ReLU,
    /// Hyperbolic tangent, range `[-1, 1]`
    Tanh,
    /// Logistic function, range `[0, 1]`
    Sigmoid,
    /// Pass-through
    Identity,
}

impl Activation {
    /// Apply activation function to a single value
    #[inline]
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
            Activation::Identity => x,
        }
    }

    /// Derivative with respect to the pre-activation, given the output `y`
    #[inline]
    pub fn derivative_from_output(&self, y: f32) -> f32 {
        match self {
            Activation::ReLU => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - y * y,
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Identity => 1.0,
        }
    }

    /// Apply activation function to a vector in-place
    #[inline]
    pub fn apply_vec(&self, vec: &mut [f32]) {
        for val in vec.iter_mut() {
            *val = self.apply(*val);
        }
    }

    /// Range of values this activation can produce
    pub fn output_range(&self) -> (f32, f32) {
        match self {
            Activation::ReLU => (0.0, f32::INFINITY),
            Activation::Tanh => (-1.0, 1.0),
            Activation::Sigmoid => (0.0, 1.0),
            Activation::Identity => (f32::NEG_INFINITY, f32::INFINITY),
        }
    }
}

/// Logistic sigmoid
#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_midpoint() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(20.0) > 0.99);
        assert!(sigmoid(-20.0) < 0.01);
    }

    #[test]
    fn test_derivatives_match_finite_difference() {
        let h = 1e-3;
        for act in [Activation::Tanh, Activation::Sigmoid, Activation::Identity] {
            for &x in &[-1.5_f32, -0.2, 0.3, 1.1] {
                let numeric = (act.apply(x + h) - act.apply(x - h)) / (2.0 * h);
                let analytic = act.derivative_from_output(act.apply(x));
                assert!(
                    (numeric - analytic).abs() < 1e-2,
                    "{:?} at {}: {} vs {}",
                    act,
                    x,
                    numeric,
                    analytic
                );
            }
        }
    }

    #[test]
    fn test_relu_gating() {
        let mut v = vec![-1.0, 0.0, 2.0];
        Activation::ReLU.apply_vec(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 2.0]);
        assert_eq!(Activation::ReLU.derivative_from_output(0.0), 0.0);
        assert_eq!(Activation::ReLU.derivative_from_output(2.0), 1.0);
    }
}
