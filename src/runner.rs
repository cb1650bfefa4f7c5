//! Fixed-rate training loop
//!
//! Each tick:
//! 1. Read every live agent's observation
//! 2. Choose actions for all agents in parallel
//! 3. Apply the actions and step the arena
//! 4. Record each agent's transition; train any agent whose buffer is due
//! 5. Let the evolution controller advance the generation clock and
//!    evaluate when a generation ends
//!
//! Training only starts after every action of the tick has been chosen, so
//! no network is read and written at the same time.

use anyhow::Result;

use crate::{
    buffer::Experience,
    config::EngineConfig,
    env::ArenaEnvironment,
    evolution::{EvolutionController, GenerationReport},
    policy::PolicyNetwork,
    train::{AgentTrainer, TrainingStats},
};

/// Result of one tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// Tick number, starting at 1
    pub tick: u64,
    /// Agents that ran a training pass this tick
    pub trained_agents: usize,
    /// Set when the tick ended a generation
    pub report: Option<GenerationReport>,
}

/// Drives an arena, a population and its evolution
pub struct ArenaRunner<E: ArenaEnvironment> {
    env: E,
    controller: EvolutionController,
    trainer: AgentTrainer,
    tick_interval: f32,
    reset_memory_on_death: bool,
    ticks: u64,
    generation_stats: TrainingStats,
}

impl<E: ArenaEnvironment> ArenaRunner<E> {
    /// Create a runner; the arena must host exactly `population_size` agents
    pub fn new(config: &EngineConfig, env: E) -> Result<Self> {
        if env.num_agents() != config.population_size {
            anyhow::bail!(
                "arena hosts {} agents but population_size is {}",
                env.num_agents(),
                config.population_size
            );
        }

        Ok(Self {
            controller: EvolutionController::new(config)?,
            trainer: AgentTrainer::new(config),
            tick_interval: config.tick_interval,
            reset_memory_on_death: config.reset_memory_on_death,
            env,
            ticks: 0,
            generation_stats: TrainingStats::zeros(),
        })
    }

    /// The arena
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The evolution controller
    pub fn controller(&self) -> &EvolutionController {
        &self.controller
    }

    /// The evolution controller, mutably
    pub fn controller_mut(&mut self) -> &mut EvolutionController {
        &mut self.controller
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Training statistics accumulated in the current generation
    pub fn generation_stats(&self) -> &TrainingStats {
        &self.generation_stats
    }

    /// Run a single tick
    pub fn tick(&mut self) -> Result<TickOutcome> {
        self.ticks += 1;
        let n = self.env.num_agents();

        let active: Vec<bool> = (0..n).map(|i| self.env.is_agent_alive(i)).collect();
        let observations: Vec<Vec<f32>> = (0..n).map(|i| self.env.agent_state(i)).collect();

        let decisions = self.controller.population_mut().act_all(&observations, &active);
        for (index, decision) in decisions.iter().enumerate() {
            if let Some(decision) = decision {
                self.env.apply_action(&decision.action, index);
            }
        }

        self.env.step()?;

        let episode_over = self.env.is_episode_finished();
        let mut trained_agents = 0;

        for (index, (decision, state)) in decisions.into_iter().zip(observations).enumerate() {
            let Some(decision) = decision else {
                continue;
            };
            let alive = self.env.is_agent_alive(index);
            let mut experience = Experience::new(
                state,
                decision.outputs,
                self.env.last_step_reward(index),
                self.env.agent_state(index),
                !alive || episode_over,
                decision.value,
            );
            if let Some(memory) = decision.memory {
                experience = experience.with_memory(memory);
            }

            let Some(agent) = self.controller.population_mut().get_mut(index) else {
                continue;
            };
            if agent.buffer.record(experience) {
                let stats = self.trainer.train(&mut agent.policy, &mut agent.buffer);
                self.generation_stats += &stats;
                trained_agents += 1;
            }
            if !alive && self.reset_memory_on_death {
                agent.policy.reset_memory();
            }
        }

        let report = self.controller.advance(&mut self.env, self.tick_interval)?;
        if let Some(report) = &report {
            let stats = self.generation_stats.average();
            tracing::info!(
                "Generation {} training | passes {} | samples {} | policy loss {:.4} | value loss {:.4} | mean return {:.3}",
                report.generation,
                self.generation_stats.num_updates,
                stats.samples,
                stats.policy_loss,
                stats.value_loss,
                stats.mean_return
            );
            self.generation_stats = TrainingStats::zeros();
        }

        Ok(TickOutcome { tick: self.ticks, trained_agents, report })
    }

    /// Tick until `generations` more generations have been evaluated
    pub fn run_generations(&mut self, generations: usize) -> Result<Vec<GenerationReport>> {
        let mut reports = Vec::with_capacity(generations);
        while reports.len() < generations {
            if let Some(report) = self.tick()?.report {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Queue a snapshot of every agent and wait for it to reach disk
    pub fn save_all(&mut self) {
        self.controller.auto_save();
        self.controller.flush_checkpoints();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::NetworkKind,
        env::{target_practice::OBSERVATION_SIZE, TargetPractice},
        evolution::GenerationPhase,
        policy::{ActionVector, Policy},
    };

    /// Arena where agent 0 dies on the first step and everyone else lives on
    struct FirstCasualtyArena {
        alive: Vec<bool>,
    }

    impl FirstCasualtyArena {
        fn new(n: usize) -> Self {
            Self { alive: vec![true; n] }
        }
    }

    impl ArenaEnvironment for FirstCasualtyArena {
        fn num_agents(&self) -> usize {
            self.alive.len()
        }
        fn step(&mut self) -> Result<()> {
            self.alive[0] = false;
            Ok(())
        }
        fn reset(&mut self) -> Result<()> {
            self.alive.iter_mut().for_each(|a| *a = true);
            Ok(())
        }
        fn apply_action(&mut self, _action: &ActionVector, _agent_index: usize) {}
        fn current_state(&self) -> Vec<f32> {
            vec![0.6, -0.4, 0.9, 0.2, 0.7, 1.0]
        }
        fn is_agent_alive(&self, agent_index: usize) -> bool {
            self.alive[agent_index]
        }
        fn reward(&self, _agent_index: usize) -> f32 {
            0.0
        }
        fn last_step_reward(&self, _agent_index: usize) -> f32 {
            0.0
        }
        fn kill_count(&self, _agent_index: usize) -> u32 {
            0
        }
        fn is_episode_finished(&self) -> bool {
            false
        }
        fn reset_cumulative_rewards(&mut self) {}
        fn reset_timeout_status(&mut self) {}
    }

    fn hidden_of(runner: &ArenaRunner<FirstCasualtyArena>, index: usize) -> Vec<f32> {
        match &runner.controller().population().get(index).unwrap().policy {
            Policy::Recurrent(net) => net.hidden_state().to_vec(),
            Policy::Feedforward(_) => unreachable!(),
        }
    }

    fn config(dir: &std::path::Path) -> EngineConfig {
        EngineConfig::new()
            .input_size(OBSERVATION_SIZE)
            .hidden_sizes(8, 8)
            .hidden_size(8)
            .population_size(4)
            .batch_size(16)
            .generation_duration(2.0)
            .tick_interval(0.1)
            .auto_save_interval(0.0)
            .checkpoint_dir(dir)
    }

    #[test]
    fn test_rejects_mismatched_arena() {
        let dir = tempfile::tempdir().unwrap();
        let result = ArenaRunner::new(&config(dir.path()), TargetPractice::new(3, 0));
        assert!(result.is_err());
    }

    #[test]
    fn test_generation_ends_on_timer() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ArenaRunner::new(&config(dir.path()), TargetPractice::new(4, 0)).unwrap();

        let reports = runner.run_generations(1).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].generation, 0);
        // 2.0s at 0.1s per tick, give or take float accumulation
        assert!((19..=21).contains(&runner.ticks()));
        assert_eq!(runner.controller().generation(), 1);
        assert_eq!(runner.controller().phase(), GenerationPhase::Idle);
    }

    #[test]
    fn test_agents_train_during_generation() {
        let dir = tempfile::tempdir().unwrap();
        for kind in [NetworkKind::Feedforward, NetworkKind::Recurrent] {
            let config = config(dir.path()).network(kind);
            let mut runner = ArenaRunner::new(&config, TargetPractice::new(4, 1)).unwrap();

            let mut trained = 0;
            for _ in 0..16 {
                trained += runner.tick().unwrap().trained_agents;
            }
            // Every live agent fills its 16-transition buffer by now
            assert!(trained >= 1, "{:?}: no training pass ran", kind);
        }
    }

    #[test]
    fn test_several_generations_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = ArenaRunner::new(&config(dir.path()), TargetPractice::new(4, 2)).unwrap();

        let reports = runner.run_generations(3).unwrap();
        let generations: Vec<u64> = reports.iter().map(|r| r.generation).collect();
        assert_eq!(generations, vec![0, 1, 2]);
        for report in &reports {
            assert_eq!(report.ranking.len(), 4);
            assert_eq!(report.elites.len(), 1);
        }
    }

    #[test]
    fn test_memory_reset_on_death() {
        let dir = tempfile::tempdir().unwrap();
        for reset in [true, false] {
            let config = config(dir.path())
                .network(NetworkKind::Recurrent)
                .generation_duration(100.0)
                .inactivity_timeout(0.0)
                .reset_memory_on_death(reset);
            let mut runner = ArenaRunner::new(&config, FirstCasualtyArena::new(4)).unwrap();

            let outcome = runner.tick().unwrap();
            assert!(outcome.report.is_none());
            assert!(!runner.env().is_agent_alive(0));

            // Survivors keep their memory either way
            assert!(hidden_of(&runner, 1).iter().any(|&h| h != 0.0));

            let dead = hidden_of(&runner, 0);
            if reset {
                assert!(dead.iter().all(|&h| h == 0.0), "{:?}", dead);
            } else {
                assert!(dead.iter().any(|&h| h != 0.0));
                // The dead agent no longer acts, so its memory stays put
                runner.tick().unwrap();
                assert_eq!(hidden_of(&runner, 0), dead);
            }
        }
    }
}
