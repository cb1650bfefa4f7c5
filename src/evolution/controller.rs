//! Generation lifecycle
//!
//! ```text
//! Idle → Accumulating → Evaluating → Evolving | Skipping → Reset → Idle
//! ```
//!
//! While accumulating, [`EvolutionController::observe`] advances the
//! generation clock and each agent's survival time. Evaluation starts when
//! the clock runs out, the arena reports the episode over (or at most one
//! agent alive), rewards stop changing for `inactivity_timeout` seconds, or
//! [`EvolutionController::force_evaluation`] was called.
//!
//! Evaluation scores and ranks every agent, checkpoints the elites, and
//! unless the population is already good enough replaces every other agent
//! with a clone of a random elite. Fitness trackers and the arena are then
//! reset for the next generation.
//!
//! Independently of generations, the whole population is snapshotted every
//! `auto_save_interval` seconds.

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;

use super::{
    checkpoint::{CheckpointJob, CheckpointKind, CheckpointReport, Checkpointer},
    fitness::{mean_fitness, rank, AgentFitness, FitnessScorer},
    population::Population,
};
use crate::{config::EngineConfig, env::ArenaEnvironment, policy::PolicyNetwork};

/// Where the controller is in the generation lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenerationPhase {
    /// Between generations, nothing observed yet
    Idle,
    /// Generation clock running
    Accumulating,
    /// Scoring the population
    Evaluating,
    /// Replacing non-elites with elite clones
    Evolving,
    /// Evaluation found no reason (or no way) to evolve
    Skipping,
    /// Clearing trackers and the arena
    Reset,
}

/// What ended a generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EvaluationTrigger {
    /// `generation_duration` elapsed
    Timer,
    /// The arena finished its episode or at most one agent is alive
    EpisodeEnded,
    /// No cumulative reward changed for `inactivity_timeout` seconds
    Inactivity,
    /// [`EvolutionController::force_evaluation`] was called
    Forced,
}

/// What evaluation did to the population
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GenerationOutcome {
    /// Non-elite slots were replaced
    Evolved {
        /// `(slot, elite it cloned)` pairs
        replacements: Vec<(usize, usize)>,
    },
    /// Mean fitness reached the success threshold
    SkippedSuccess,
    /// The elite fraction rounds to zero agents
    SkippedNoElites,
}

/// Summary of one evaluated generation
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    /// Generation number, starting at 0
    pub generation: u64,
    /// What ended the generation
    pub trigger: EvaluationTrigger,
    /// Simulated seconds the generation lasted
    pub duration: f32,
    /// Mean fitness across the population
    pub mean_fitness: f32,
    /// Highest fitness
    pub best_fitness: f32,
    /// Lowest fitness
    pub worst_fitness: f32,
    /// Agent indices best first
    pub ranking: Vec<usize>,
    /// Elite agent indices best first
    pub elites: Vec<usize>,
    /// What happened to the population
    pub outcome: GenerationOutcome,
    /// Fitness table as scored, before the reset
    pub fitness: Vec<AgentFitness>,
}

/// Drives fitness tracking, selection and checkpointing
pub struct EvolutionController {
    config: EngineConfig,
    scorer: FitnessScorer,
    population: Population,
    fitness: Vec<AgentFitness>,
    phase: GenerationPhase,
    generation: u64,
    elapsed: f32,
    idle_time: f32,
    last_rewards: Vec<f32>,
    autosave_timer: f32,
    autosave_sequence: u64,
    force_requested: bool,
    checkpointer: Checkpointer,
    rng: StdRng,
}

impl EvolutionController {
    /// Create a controller with a fresh population
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        let population = Population::new(config)?;
        let fitness = (0..population.len()).map(AgentFitness::new).collect();
        let last_rewards = vec![0.0; population.len()];

        Ok(Self {
            config: config.clone(),
            scorer: FitnessScorer::from(config),
            population,
            fitness,
            phase: GenerationPhase::Idle,
            generation: 0,
            elapsed: 0.0,
            idle_time: 0.0,
            last_rewards,
            autosave_timer: 0.0,
            autosave_sequence: 0,
            force_requested: false,
            checkpointer: Checkpointer::spawn(&config.checkpoint_dir),
            rng: StdRng::seed_from_u64(config.seed ^ 0xA076_1D64_78BD_642F),
        })
    }

    /// The agents under control
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// The agents under control, mutably
    pub fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// Current fitness table
    pub fn fitness(&self) -> &[AgentFitness] {
        &self.fitness
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> GenerationPhase {
        self.phase
    }

    /// Number of generations evaluated so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Simulated seconds since the current generation started
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Request evaluation at the next [`observe`](Self::observe)
    pub fn force_evaluation(&mut self) {
        self.force_requested = true;
    }

    /// Account for `dt` simulated seconds and report whether evaluation is due
    pub fn observe(&mut self, env: &dyn ArenaEnvironment, dt: f32) -> Option<EvaluationTrigger> {
        if self.phase == GenerationPhase::Idle {
            self.phase = GenerationPhase::Accumulating;
        }

        self.elapsed += dt;
        for record in &mut self.fitness {
            if env.is_agent_alive(record.agent_index) {
                record.survival_time += dt;
            }
        }

        // Any single agent's cumulative reward moving counts as activity
        let mut active = false;
        for (i, last) in self.last_rewards.iter_mut().enumerate() {
            let reward = env.reward(i);
            if (reward - *last).abs() > f32::EPSILON {
                *last = reward;
                active = true;
            }
        }
        if active {
            self.idle_time = 0.0;
        } else {
            self.idle_time += dt;
        }

        if self.config.auto_save_interval > 0.0 {
            self.autosave_timer += dt;
            if self.autosave_timer >= self.config.auto_save_interval {
                self.autosave_timer -= self.config.auto_save_interval;
                self.auto_save();
            }
        }

        let trigger = self.pending_trigger(env);
        if trigger.is_some() {
            self.phase = GenerationPhase::Evaluating;
        }
        trigger
    }

    fn pending_trigger(&self, env: &dyn ArenaEnvironment) -> Option<EvaluationTrigger> {
        if self.force_requested {
            return Some(EvaluationTrigger::Forced);
        }
        // A lone agent is never "the last one standing"
        let last_standing = env.num_agents() > 1 && env.alive_agent_count() <= 1;
        if env.is_episode_finished() || last_standing {
            return Some(EvaluationTrigger::EpisodeEnded);
        }
        if self.elapsed >= self.config.generation_duration {
            return Some(EvaluationTrigger::Timer);
        }
        if self.config.inactivity_timeout > 0.0 && self.idle_time >= self.config.inactivity_timeout {
            return Some(EvaluationTrigger::Inactivity);
        }
        None
    }

    /// [`observe`](Self::observe), then evaluate if due
    pub fn advance(
        &mut self,
        env: &mut dyn ArenaEnvironment,
        dt: f32,
    ) -> Result<Option<GenerationReport>> {
        match self.observe(env, dt) {
            Some(trigger) => self.evaluate_generation(env, trigger).map(Some),
            None => Ok(None),
        }
    }

    /// Score, select and reset
    ///
    /// Only an arena reset failure is returned as an error; checkpoint
    /// failures are logged and reported through
    /// [`checkpoint_reports`](Self::checkpoint_reports).
    pub fn evaluate_generation(
        &mut self,
        env: &mut dyn ArenaEnvironment,
        trigger: EvaluationTrigger,
    ) -> Result<GenerationReport> {
        self.phase = GenerationPhase::Evaluating;

        for record in &mut self.fitness {
            let raw = env.reward(record.agent_index);
            let (total_reward, anomalous) = self.scorer.sanitize_reward(raw);
            if anomalous {
                tracing::warn!(
                    "Agent {} reported anomalous reward {}; clamped to {}",
                    record.agent_index,
                    raw,
                    total_reward
                );
            }
            record.total_reward = total_reward;
            record.kills = env.kill_count(record.agent_index);
            record.fitness = self.scorer.score(total_reward, record.survival_time);
            record.is_elite = false;
        }

        let ranking = rank(&self.fitness);
        let elite_count = self.config.elite_count();
        let elites: Vec<usize> = ranking[..elite_count].to_vec();
        for &index in &elites {
            self.fitness[index].is_elite = true;
        }
        self.checkpoint_elites(&elites);

        let mean = mean_fitness(&self.fitness);
        let outcome = if mean >= self.config.success_threshold {
            self.phase = GenerationPhase::Skipping;
            tracing::info!(
                "Generation {} | mean fitness {:.3} reached threshold {:.3}, keeping population",
                self.generation,
                mean,
                self.config.success_threshold
            );
            GenerationOutcome::SkippedSuccess
        } else if elites.is_empty() {
            self.phase = GenerationPhase::Skipping;
            tracing::warn!(
                "Generation {} | elite fraction {} of {} agents rounds to zero, skipping evolution",
                self.generation,
                self.config.elite_percentage,
                self.population.len()
            );
            GenerationOutcome::SkippedNoElites
        } else {
            self.phase = GenerationPhase::Evolving;
            GenerationOutcome::Evolved { replacements: self.replace_non_elites(&ranking, &elites) }
        };

        let report = GenerationReport {
            generation: self.generation,
            trigger,
            duration: self.elapsed,
            mean_fitness: mean,
            best_fitness: ranking.first().map_or(0.0, |&i| self.fitness[i].fitness),
            worst_fitness: ranking.last().map_or(0.0, |&i| self.fitness[i].fitness),
            ranking,
            elites,
            outcome,
            fitness: self.fitness.clone(),
        };

        tracing::info!(
            "Generation {} | {:?} after {:.1}s | mean {:.3} | best {:.3} | worst {:.3} | elites {:?}",
            report.generation,
            report.trigger,
            report.duration,
            report.mean_fitness,
            report.best_fitness,
            report.worst_fitness,
            report.elites
        );

        self.reset_generation(env)?;
        Ok(report)
    }

    fn replace_non_elites(&mut self, ranking: &[usize], elites: &[usize]) -> Vec<(usize, usize)> {
        let stride = self.population.len() as u64;
        let mut replacements = Vec::with_capacity(ranking.len() - elites.len());

        for &slot in &ranking[elites.len()..] {
            let elite = elites[self.rng.gen_range(0..elites.len())];
            let Some(source) = self.population.get(elite).map(|a| a.policy.clone()) else {
                continue;
            };
            if let Some(agent) = self.population.get_mut(slot) {
                let seed = agent.seed().wrapping_add((self.generation + 1).wrapping_mul(stride));
                agent.adopt(&source, seed);
                replacements.push((slot, elite));
            }
        }

        tracing::debug!("Generation {} replacements: {:?}", self.generation, replacements);
        replacements
    }

    fn reset_generation(&mut self, env: &mut dyn ArenaEnvironment) -> Result<()> {
        self.phase = GenerationPhase::Reset;

        for record in &mut self.fitness {
            record.reset();
        }
        env.reset_cumulative_rewards();
        env.reset_timeout_status();
        env.reset()?;

        // Transitions recorded before the reset no longer continue anywhere
        for agent in self.population.agents_mut() {
            agent.buffer.clear();
        }
        self.population.reset_memories();

        self.elapsed = 0.0;
        self.idle_time = 0.0;
        self.last_rewards.iter_mut().for_each(|r| *r = 0.0);
        self.force_requested = false;
        self.generation += 1;
        self.phase = GenerationPhase::Idle;
        Ok(())
    }

    fn checkpoint_elites(&mut self, elites: &[usize]) {
        for (rank, &agent_index) in elites.iter().enumerate() {
            if let Some(agent) = self.population.get_mut(agent_index) {
                self.checkpointer.submit(CheckpointJob {
                    kind: CheckpointKind::Elite { generation: self.generation, rank },
                    agent_index,
                    document: agent.policy.to_document(),
                });
            }
        }
    }

    /// Queue a snapshot of every agent
    pub fn auto_save(&mut self) {
        self.autosave_sequence += 1;
        let kind = CheckpointKind::AutoSave { sequence: self.autosave_sequence };
        tracing::info!(
            "Auto-saving {} agents (snapshot {})",
            self.population.len(),
            self.autosave_sequence
        );
        for agent in self.population.agents_mut() {
            self.checkpointer.submit(CheckpointJob {
                kind,
                agent_index: agent.id,
                document: agent.policy.to_document(),
            });
        }
    }

    /// Block until queued checkpoints are on disk
    pub fn flush_checkpoints(&self) {
        self.checkpointer.flush();
    }

    /// Checkpoint results since the last call
    pub fn checkpoint_reports(&self) -> Vec<CheckpointReport> {
        self.checkpointer.drain_reports()
    }
}
