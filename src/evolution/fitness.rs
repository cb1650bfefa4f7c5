//! Fitness scoring and ranking
//!
//! ```text
//! f = w_R · clamp(total_reward / reward_normalization, -1, 1)
//!   + w_S · clamp01(survival_time / generation_duration)
//! ```
//!
//! A cumulative reward below the outlier threshold (typically a long run of
//! timeout penalties) has its reward term raised to the outlier floor so one
//! bad episode cannot dominate the ranking.

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Per-agent record for the current generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFitness {
    /// Slot the record belongs to
    pub agent_index: usize,
    /// Composite score, set at evaluation
    pub fitness: f32,
    /// Cumulative reward read from the arena at evaluation
    pub total_reward: f32,
    /// Kills read from the arena at evaluation
    pub kills: u32,
    /// Seconds the agent spent alive this generation
    pub survival_time: f32,
    /// Whether the agent ranked among the elites
    pub is_elite: bool,
}

impl AgentFitness {
    /// Zeroed record for `agent_index`
    pub fn new(agent_index: usize) -> Self {
        Self {
            agent_index,
            fitness: 0.0,
            total_reward: 0.0,
            kills: 0,
            survival_time: 0.0,
            is_elite: false,
        }
    }

    /// Return to the zeroed state, keeping the index
    pub fn reset(&mut self) {
        *self = Self::new(self.agent_index);
    }

    /// Whether every tracked quantity is zero
    pub fn is_zeroed(&self) -> bool {
        *self == Self::new(self.agent_index)
    }
}

/// Coefficients of the composite fitness
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitnessScorer {
    reward_weight: f32,
    survival_weight: f32,
    reward_normalization: f32,
    outlier_threshold: f32,
    outlier_floor: f32,
    anomaly_limit: f32,
    generation_duration: f32,
}

impl From<&EngineConfig> for FitnessScorer {
    fn from(config: &EngineConfig) -> Self {
        Self {
            reward_weight: config.reward_weight,
            survival_weight: config.survival_weight,
            reward_normalization: config.reward_normalization,
            outlier_threshold: config.outlier_reward_threshold,
            outlier_floor: config.outlier_reward_floor,
            anomaly_limit: config.anomaly_limit,
            generation_duration: config.generation_duration,
        }
    }
}

impl FitnessScorer {
    /// Replace a non-finite or absurdly large reward with a bounded one
    ///
    /// Returns the sanitized value and whether it had to change.
    pub fn sanitize_reward(&self, reward: f32) -> (f32, bool) {
        if reward.is_nan() {
            (0.0, true)
        } else if reward.abs() > self.anomaly_limit {
            (reward.clamp(-self.anomaly_limit, self.anomaly_limit), true)
        } else {
            (reward, false)
        }
    }

    /// Composite fitness of one agent
    pub fn score(&self, total_reward: f32, survival_time: f32) -> f32 {
        let mut reward_term = (total_reward / self.reward_normalization).clamp(-1.0, 1.0);
        if total_reward < self.outlier_threshold {
            reward_term = reward_term.max(self.outlier_floor);
        }
        let survival_term = (survival_time / self.generation_duration).clamp(0.0, 1.0);

        self.reward_weight * reward_term + self.survival_weight * survival_term
    }
}

/// Agent indices ordered best first
///
/// The sort is stable, so equal fitness keeps the lower index first.
pub fn rank(records: &[AgentFitness]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..records.len()).collect();
    order.sort_by(|&a, &b| records[b].fitness.total_cmp(&records[a].fitness));
    order
}

/// Mean fitness of a table; zero when empty
pub fn mean_fitness(records: &[AgentFitness]) -> f32 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.fitness).sum::<f32>() / records.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> FitnessScorer {
        FitnessScorer::from(&EngineConfig::new().generation_duration(100.0))
    }

    fn record(index: usize, fitness: f32) -> AgentFitness {
        AgentFitness { fitness, ..AgentFitness::new(index) }
    }

    #[test]
    fn test_score_components() {
        let scorer = scorer();
        // Defaults: w_R = 0.8, w_S = 0.2, normalization 10
        assert!((scorer.score(5.0, 50.0) - (0.8 * 0.5 + 0.2 * 0.5)).abs() < 1e-6);
        assert!((scorer.score(100.0, 1000.0) - 1.0).abs() < 1e-6);
        assert!((scorer.score(-10.0, 0.0) + 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_outlier_reward_is_floored() {
        let scorer = scorer();
        // Below -50 the reward term is raised from -1 to -0.5
        assert!((scorer.score(-80.0, 0.0) - 0.8 * -0.5).abs() < 1e-6);
        // -20 is not an outlier and keeps the full -1 term
        assert!((scorer.score(-20.0, 0.0) - 0.8 * -1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sanitize_reward() {
        let scorer = scorer();
        assert_eq!(scorer.sanitize_reward(3.0), (3.0, false));
        assert_eq!(scorer.sanitize_reward(f32::NAN), (0.0, true));
        assert_eq!(scorer.sanitize_reward(f32::INFINITY), (1e6, true));
        assert_eq!(scorer.sanitize_reward(-5e7), (-1e6, true));
    }

    #[test]
    fn test_rank_is_descending_and_stable() {
        let records = vec![record(0, 0.1), record(1, 0.5), record(2, 0.5), record(3, 0.9)];
        assert_eq!(rank(&records), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_reset_zeroes_record() {
        let mut r = AgentFitness {
            fitness: 0.7,
            total_reward: 3.0,
            kills: 2,
            survival_time: 12.0,
            is_elite: true,
            ..AgentFitness::new(4)
        };
        assert!(!r.is_zeroed());
        r.reset();
        assert!(r.is_zeroed());
        assert_eq!(r.agent_index, 4);
    }

    #[test]
    fn test_mean_fitness() {
        assert_eq!(mean_fitness(&[]), 0.0);
        assert!((mean_fitness(&[record(0, 0.2), record(1, 0.6)]) - 0.4).abs() < 1e-6);
    }
}
