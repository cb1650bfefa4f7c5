//! End-to-end generation lifecycle against a scripted arena
//!
//! The arena hands out rewards chosen by the test so rankings, elites and
//! resets can be checked exactly.

use anyhow::Result;
use arena_rl::{
    config::EngineConfig,
    env::ArenaEnvironment,
    evolution::{EvaluationTrigger, EvolutionController, GenerationOutcome},
    policy::{ActionVector, PolicyNetwork},
};

/// Arena whose per-agent rewards are fixed by the test
struct ScriptedArena {
    rewards: Vec<f32>,
    alive: Vec<bool>,
    ticks: usize,
    resets: usize,
}

impl ScriptedArena {
    fn new(rewards: Vec<f32>) -> Self {
        let n = rewards.len();
        Self { rewards, alive: vec![true; n], ticks: 0, resets: 0 }
    }
}

impl ArenaEnvironment for ScriptedArena {
    fn num_agents(&self) -> usize {
        self.rewards.len()
    }

    fn step(&mut self) -> Result<()> {
        self.ticks += 1;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        self.alive.iter_mut().for_each(|a| *a = true);
        Ok(())
    }

    fn apply_action(&mut self, _action: &ActionVector, _agent_index: usize) {}

    fn current_state(&self) -> Vec<f32> {
        vec![0.25, -0.5, 0.75, 0.0]
    }

    fn is_agent_alive(&self, agent_index: usize) -> bool {
        self.alive[agent_index]
    }

    fn reward(&self, agent_index: usize) -> f32 {
        self.rewards[agent_index]
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

    fn reset_cumulative_rewards(&mut self) {
        self.rewards.iter_mut().for_each(|r| *r = 0.0);
    }

    fn reset_timeout_status(&mut self) {
        self.ticks = 0;
    }
}

fn config(dir: &std::path::Path, population: usize) -> EngineConfig {
    EngineConfig::new()
        .input_size(4)
        .hidden_sizes(8, 8)
        .population_size(population)
        .generation_duration(10.0)
        .auto_save_interval(0.0)
        .inactivity_timeout(0.0)
        .checkpoint_dir(dir)
}

#[test]
fn test_elite_count_follows_rounded_fraction() {
    let dir = tempfile::tempdir().unwrap();

    for (population, expected) in [(2, 1), (4, 1), (6, 2), (8, 2), (10, 3), (12, 3)] {
        let mut ctrl = EvolutionController::new(&config(dir.path(), population)).unwrap();
        let rewards = (0..population).map(|i| i as f32 * 0.5).collect();
        let mut arena = ScriptedArena::new(rewards);

        let report = ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Forced).unwrap();
        assert_eq!(report.elites.len(), expected, "population {}", population);

        // Highest reward first
        let best_first: Vec<usize> = (0..population).rev().collect();
        assert_eq!(report.ranking, best_first);
    }
}

#[test]
fn test_ties_rank_by_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctrl = EvolutionController::new(&config(dir.path(), 8)).unwrap();
    let mut arena = ScriptedArena::new(vec![1.0, 3.0, 3.0, 0.0, 1.0, 3.0, 0.0, 1.0]);

    let report = ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Forced).unwrap();
    assert_eq!(report.ranking, vec![1, 2, 5, 0, 4, 7, 3, 6]);
    assert_eq!(report.elites, vec![1, 2]);
}

#[test]
fn test_evolution_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let rewards = vec![4.0, 1.0, 9.0, 2.0, 7.0, 0.0, 5.0, 3.0];

    let run = || {
        let mut ctrl = EvolutionController::new(&config(dir.path(), 8)).unwrap();
        let mut arena = ScriptedArena::new(rewards.clone());
        ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Forced).unwrap().outcome
    };

    assert_eq!(run(), run());
}

#[test]
fn test_non_elites_become_elite_clones() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctrl = EvolutionController::new(&config(dir.path(), 4)).unwrap();
    let mut arena = ScriptedArena::new(vec![0.0, 0.0, 6.0, 0.0]);
    let probe = arena.current_state();

    let mut elite_before = ctrl.population().get(2).unwrap().policy.clone();
    let expected = elite_before.forward(&probe).unwrap();

    let report = ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Forced).unwrap();
    assert_eq!(report.elites, vec![2]);
    assert!(matches!(report.outcome, GenerationOutcome::Evolved { .. }));

    for agent in ctrl.population_mut().agents_mut() {
        assert_eq!(agent.policy.forward(&probe).unwrap(), expected, "agent {}", agent.id);
    }
}

#[test]
fn test_trackers_and_arena_reset_after_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctrl = EvolutionController::new(&config(dir.path(), 4)).unwrap();
    let mut arena = ScriptedArena::new(vec![3.0, 2.0, 1.0, 0.0]);
    arena.ticks = 42;

    for _ in 0..4 {
        assert!(ctrl.observe(&arena, 1.0).is_none());
    }
    assert!(ctrl.fitness().iter().all(|f| f.survival_time > 0.0));

    ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Forced).unwrap();

    for record in ctrl.fitness() {
        assert_eq!(record.fitness, 0.0);
        assert_eq!(record.total_reward, 0.0);
        assert_eq!(record.kills, 0);
        assert_eq!(record.survival_time, 0.0);
        assert!(!record.is_elite);
    }
    assert!(arena.rewards.iter().all(|&r| r == 0.0));
    assert_eq!(arena.ticks, 0);
    assert_eq!(arena.resets, 1);
}

#[test]
fn test_success_threshold_boundary() {
    let dir = tempfile::tempdir().unwrap();
    // Reward 10 and full survival score exactly 1.0
    let at = config(dir.path(), 4).success_threshold(1.0);
    let mut ctrl = EvolutionController::new(&at).unwrap();
    let mut arena = ScriptedArena::new(vec![10.0; 4]);
    ctrl.observe(&arena, 10.0);
    let report = ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Timer).unwrap();
    assert_eq!(report.outcome, GenerationOutcome::SkippedSuccess);

    // Just below the threshold evolves
    let mut ctrl = EvolutionController::new(&at).unwrap();
    let mut arena = ScriptedArena::new(vec![10.0, 10.0, 10.0, 9.0]);
    ctrl.observe(&arena, 10.0);
    let report = ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Timer).unwrap();
    assert!(matches!(report.outcome, GenerationOutcome::Evolved { .. }));
}

#[test]
fn test_elites_are_checkpointed_unmodified() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctrl = EvolutionController::new(&config(dir.path(), 4)).unwrap();
    let mut arena = ScriptedArena::new(vec![0.0, 5.0, 0.0, 0.0]);
    let probe = arena.current_state();

    let mut elite = ctrl.population().get(1).unwrap().policy.clone();
    ctrl.evaluate_generation(&mut arena, EvaluationTrigger::Forced).unwrap();
    ctrl.flush_checkpoints();

    let reports = ctrl.checkpoint_reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].agent_index, 1);

    let mut restored = ctrl.population().get(3).unwrap().policy.clone();
    restored.load_weights(&reports[0].path).unwrap();
    assert_eq!(restored.forward(&probe).unwrap(), elite.forward(&probe).unwrap());
}
