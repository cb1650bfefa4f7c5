//! Engine configuration and hyperparameters
//!
//! This module defines every option recognized by the engine, with
//! validation, builder-style setters and JSON loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Which policy network backs every agent in the population
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NetworkKind {
    /// Two hidden-layer actor with an optional critic
    #[default]
    Feedforward,

    /// Single-cell memory network
    Recurrent,
}

/// Engine configuration parameters
///
/// Defaults are tuned for a small arena with a handful of agents and a
/// 5-axis action space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Policy architecture used by every agent
    pub network: NetworkKind,

    /// Observation length
    pub input_size: usize,

    /// Feedforward hidden layer sizes (exactly two)
    pub hidden_sizes: Vec<usize>,

    /// Whether feedforward agents carry a critic network
    pub use_critic: bool,

    /// Step size for weight updates
    pub learning_rate: f32,

    /// Discount factor
    pub gamma: f32,

    /// GAE smoothing parameter
    pub lambda: f32,

    /// Transitions per training pass (also the recurrent minibatch size)
    pub batch_size: usize,

    /// How far a training target moves toward the taken action per unit of
    /// advantage
    pub advantage_mix: f32,

    /// Standard deviation of Gaussian exploration noise added to actions
    pub exploration_noise: f32,

    /// Number of agents
    pub population_size: usize,

    /// Seconds per generation
    pub generation_duration: f32,

    /// Mean fitness at or above which evolution is skipped
    pub success_threshold: f32,

    /// Reserved: cloned elites are copied without perturbation
    pub mutation_rate: f32,

    /// Fraction of the population kept unmodified each generation
    pub elite_percentage: f32,

    /// Seconds between full-population snapshots
    pub auto_save_interval: f32,

    /// Seconds without any cumulative reward change before a generation is
    /// cut short (0 disables)
    pub inactivity_timeout: f32,

    /// Weight of the reward term in fitness
    pub reward_weight: f32,

    /// Weight of the survival term in fitness
    pub survival_weight: f32,

    /// Cumulative reward that maps to a reward term of 1.0
    pub reward_normalization: f32,

    /// Cumulative rewards below this are treated as outliers
    pub outlier_reward_threshold: f32,

    /// Reward term assigned to outliers
    pub outlier_reward_floor: f32,

    /// Cumulative reward magnitude considered implausible
    pub anomaly_limit: f32,

    /// Zero recurrent memory when an agent dies
    pub reset_memory_on_death: bool,

    /// Recurrent observation history length
    pub sequence_length: usize,

    /// Recurrent cell width
    pub hidden_size: usize,

    /// Recurrent cell state clamp
    pub cell_clip: f32,

    /// Recurrent hidden dropout probability while training
    pub dropout: f32,

    /// Recurrent replay memory capacity
    pub replay_capacity: usize,

    /// Simulated seconds per tick
    pub tick_interval: f32,

    /// Base seed; agent `i` uses `seed + i`
    pub seed: u64,

    /// Where checkpoints are written
    pub checkpoint_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: NetworkKind::Feedforward,
            input_size: 12,
            hidden_sizes: vec![64, 64],
            use_critic: true,
            learning_rate: 0.01,
            gamma: 0.99,
            lambda: 0.95,
            batch_size: 64,
            advantage_mix: 0.1,
            exploration_noise: 0.1,
            population_size: 8,
            generation_duration: 120.0,
            success_threshold: 0.8,
            mutation_rate: 0.0,
            elite_percentage: 0.25,
            auto_save_interval: 300.0,
            inactivity_timeout: 30.0,
            reward_weight: 0.8,
            survival_weight: 0.2,
            reward_normalization: 10.0,
            outlier_reward_threshold: -50.0,
            outlier_reward_floor: -0.5,
            anomaly_limit: 1.0e6,
            reset_memory_on_death: true,
            sequence_length: 8,
            hidden_size: 32,
            cell_clip: 5.0,
            dropout: 0.0,
            replay_capacity: 1000,
            tick_interval: 1.0 / 30.0,
            seed: 42,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

impl EngineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&json)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of action outputs every network produces
    pub fn output_size(&self) -> usize {
        crate::policy::ACTION_DIM
    }

    /// Number of elites for the configured population
    pub fn elite_count(&self) -> usize {
        let count = (self.elite_percentage * self.population_size as f32).round() as usize;
        count.min(self.population_size)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            anyhow::bail!("input_size must be positive");
        }
        if self.hidden_sizes.len() != 2 || self.hidden_sizes.contains(&0) {
            anyhow::bail!("hidden_sizes must hold exactly two positive sizes");
        }
        if self.learning_rate <= 0.0 {
            anyhow::bail!("learning_rate must be positive");
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            anyhow::bail!("gamma must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            anyhow::bail!("lambda must be in [0, 1]");
        }
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be positive");
        }
        if self.exploration_noise < 0.0 {
            anyhow::bail!("exploration_noise must be non-negative");
        }
        if self.population_size == 0 {
            anyhow::bail!("population_size must be positive");
        }
        if self.generation_duration <= 0.0 {
            anyhow::bail!("generation_duration must be positive");
        }
        if !(0.0..=1.0).contains(&self.elite_percentage) {
            anyhow::bail!("elite_percentage must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            anyhow::bail!("mutation_rate must be in [0, 1]");
        }
        if self.auto_save_interval < 0.0 || self.inactivity_timeout < 0.0 {
            anyhow::bail!("timer intervals must be non-negative");
        }
        if self.reward_normalization <= 0.0 {
            anyhow::bail!("reward_normalization must be positive");
        }
        if self.sequence_length == 0 || self.hidden_size == 0 {
            anyhow::bail!("sequence_length and hidden_size must be positive");
        }
        if self.cell_clip <= 0.0 {
            anyhow::bail!("cell_clip must be positive");
        }
        if !(0.0..1.0).contains(&self.dropout) {
            anyhow::bail!("dropout must be in [0, 1)");
        }
        if self.replay_capacity == 0 {
            anyhow::bail!("replay_capacity must be positive");
        }
        if self.tick_interval <= 0.0 {
            anyhow::bail!("tick_interval must be positive");
        }
        Ok(())
    }

    /// Set the network kind
    pub fn network(mut self, kind: NetworkKind) -> Self {
        self.network = kind;
        self
    }

    /// Set the observation length
    pub fn input_size(mut self, size: usize) -> Self {
        self.input_size = size;
        self
    }

    /// Set both feedforward hidden sizes
    pub fn hidden_sizes(mut self, first: usize, second: usize) -> Self {
        self.hidden_sizes = vec![first, second];
        self
    }

    /// Enable or disable the critic
    pub fn use_critic(mut self, enabled: bool) -> Self {
        self.use_critic = enabled;
        self
    }

    /// Set learning rate
    pub fn learning_rate(mut self, lr: f32) -> Self {
        self.learning_rate = lr;
        self
    }

    /// Set discount factor
    pub fn gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set GAE lambda
    pub fn lambda(mut self, lambda: f32) -> Self {
        self.lambda = lambda;
        self
    }

    /// Set batch size
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set exploration noise
    pub fn exploration_noise(mut self, std: f32) -> Self {
        self.exploration_noise = std;
        self
    }

    /// Set population size
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Set generation duration in seconds
    pub fn generation_duration(mut self, seconds: f32) -> Self {
        self.generation_duration = seconds;
        self
    }

    /// Set success threshold
    pub fn success_threshold(mut self, threshold: f32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set elite fraction
    pub fn elite_percentage(mut self, fraction: f32) -> Self {
        self.elite_percentage = fraction;
        self
    }

    /// Set auto-save interval in seconds
    pub fn auto_save_interval(mut self, seconds: f32) -> Self {
        self.auto_save_interval = seconds;
        self
    }

    /// Set inactivity timeout in seconds
    pub fn inactivity_timeout(mut self, seconds: f32) -> Self {
        self.inactivity_timeout = seconds;
        self
    }

    /// Set whether recurrent memory resets on death
    pub fn reset_memory_on_death(mut self, reset: bool) -> Self {
        self.reset_memory_on_death = reset;
        self
    }

    /// Set recurrent hidden size
    pub fn hidden_size(mut self, size: usize) -> Self {
        self.hidden_size = size;
        self
    }

    /// Set recurrent history length
    pub fn sequence_length(mut self, len: usize) -> Self {
        self.sequence_length = len;
        self
    }

    /// Set base seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set tick interval in seconds
    pub fn tick_interval(mut self, seconds: f32) -> Self {
        self.tick_interval = seconds;
        self
    }

    /// Set checkpoint directory
    pub fn checkpoint_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.checkpoint_dir = dir.into();
        self
    }
}
