//! Population evolution
//!
//! Agents compete in a shared arena for one generation at a time. At the end
//! of each generation they are ranked by a composite fitness, the elites are
//! checkpointed, and the rest are replaced by copies of the elites.

pub mod checkpoint;
pub mod controller;
pub mod fitness;
pub mod population;

pub use checkpoint::{CheckpointJob, CheckpointKind, CheckpointReport, Checkpointer};
pub use controller::{
    EvaluationTrigger, EvolutionController, GenerationOutcome, GenerationPhase, GenerationReport,
};
pub use fitness::{AgentFitness, FitnessScorer};
pub use population::{Agent, AgentId, Decision, Population};
