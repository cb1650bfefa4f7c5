//! Training
//!
//! Advantage-weighted updates of an agent's network from its experience
//! buffer.

pub mod stats;
pub mod trainer;

pub use stats::TrainingStats;
pub use trainer::AgentTrainer;
