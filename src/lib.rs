//! # arena-rl
//!
//! Learning and evolution engine for populations of agents competing in a
//! simulated arena.
//!
//! Every agent owns a small policy network (a feedforward actor-critic or a
//! single-cell recurrent network), learns online from its own advantage
//! weighted experience, and takes part in generational selection: the best
//! agents are checkpointed and cloned over the rest.
//!
//! The arena itself is external and reached through
//! [`env::ArenaEnvironment`]; [`env::TargetPractice`] is a small built-in
//! one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arena_rl::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = EngineConfig::new().input_size(arena_rl::env::target_practice::OBSERVATION_SIZE);
//! let arena = TargetPractice::new(config.population_size, config.seed);
//! let mut runner = ArenaRunner::new(&config, arena)?;
//! let reports = runner.run_generations(5)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Experience buffers and advantage estimation
pub mod buffer;

/// Engine configuration
pub mod config;

/// Arena interface and built-in arenas
pub mod env;

/// Error types
pub mod error;

/// Fitness, selection and checkpointing
pub mod evolution;

/// Policy networks
pub mod policy;

/// Tick loop tying arena, agents and evolution together
pub mod runner;

/// Per-agent training passes
pub mod train;

/// Prelude module for convenient imports
///
/// This module re-exports commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::{
        buffer::{Experience, ExperienceBuffer},
        config::{EngineConfig, NetworkKind},
        env::{ArenaEnvironment, TargetPractice},
        error::{NetworkError, PersistenceError},
        evolution::{EvaluationTrigger, EvolutionController, GenerationReport},
        policy::{ActionVector, Policy, PolicyNetwork},
        runner::ArenaRunner,
        train::{AgentTrainer, TrainingStats},
    };
}

/// Current version of arena-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
