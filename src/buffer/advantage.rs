//! Generalized Advantage Estimation (GAE) and discounted returns
//!
//! GAE balances bias and variance in policy gradient methods by
//! exponentially weighting TD residuals.
//!
//! # Mathematical Formula
//! ```text
//! G_t = r_t + γ · G_{t+1}                 (G_t = r_t at a done step)
//! δ_t = r_t + γ · V_{t+1} − V_t           (V_{t+1} = 0 at a done step)
//! A_t = δ_t + γ · λ · A_{t+1}             (A_{t+1} = 0 at a done step)
//! ```
//!
//! Where:
//! - G_t is the discounted return
//! - δ_t is the temporal difference error
//! - A_t is the advantage estimate
//! - V_{t+1} past the final step is the bootstrap value

/// Advantages and returns for one trajectory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AdvantageEstimate {
    /// GAE advantage per step
    pub advantages: Vec<f32>,
    /// Discounted return per step
    pub returns: Vec<f32>,
}

/// Compute GAE advantages and discounted returns for one trajectory
///
/// Walks the trajectory backward. A `done` step cuts both recursions, so
/// nothing from a later episode leaks into an earlier one.
///
/// # Arguments
/// * `rewards` - Per-step rewards
/// * `values` - Value estimates of each step's state
/// * `dones` - Whether each step ended its episode
/// * `bootstrap_value` - Value of the state after the final step (ignored
///   when the final step is done)
/// * `gamma` - Discount factor
/// * `lambda` - GAE smoothing parameter
pub fn compute_gae(
    rewards: &[f32],
    values: &[f32],
    dones: &[bool],
    bootstrap_value: f32,
    gamma: f32,
    lambda: f32,
) -> AdvantageEstimate {
    let num_steps = rewards.len();
    debug_assert_eq!(values.len(), num_steps);
    debug_assert_eq!(dones.len(), num_steps);

    let mut advantages = vec![0.0; num_steps];
    let mut returns = vec![0.0; num_steps];

    let mut gae = 0.0;
    let mut discounted = bootstrap_value;
    let mut next_value = bootstrap_value;

    for t in (0..num_steps).rev() {
        if dones[t] {
            gae = 0.0;
            discounted = 0.0;
            next_value = 0.0;
        }

        let delta = rewards[t] + gamma * next_value - values[t];
        gae = delta + gamma * lambda * gae;
        discounted = rewards[t] + gamma * discounted;

        advantages[t] = gae;
        returns[t] = discounted;
        next_value = values[t];
    }

    AdvantageEstimate { advantages, returns }
}

/// Stability constant added to the variance before normalizing
pub const NORMALIZATION_EPSILON: f64 = 1e-8;

/// Normalize advantages in place to zero mean and unit variance
///
/// Divides by `sqrt(variance + ε)`, so a constant buffer maps to zeros
/// instead of dividing by zero. An empty slice is left alone.
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }

    let n = advantages.len() as f64;
    let mean = advantages.iter().map(|&a| a as f64).sum::<f64>() / n;
    let variance = advantages.iter().map(|&a| (a as f64 - mean).powi(2)).sum::<f64>() / n;
    let std = (variance + NORMALIZATION_EPSILON).sqrt();

    for a in advantages.iter_mut() {
        *a = ((*a as f64 - mean) / std) as f32;
    }
}
