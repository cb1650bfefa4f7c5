//! Target Practice arena
//!
//! A small competitive arena for exercising the full engine loop:
//! - Each agent stands in the unit square with a heading and its own target
//! - Look turns, forward/strafe move, shoot fires along the heading
//! - A shot hits when the target is within range and inside a narrow cone
//! - Energy drains every tick and is topped up by hits; an agent with no
//!   energy left is dead until the next reset
//! - The episode ends when every agent is dead or the tick limit is reached
//!
//! Agents compete only through the population ranking: the best shots keep
//! their weights, the rest are replaced by clones of them.
//!
//! Observation (per agent, all roughly in `[-1, 1]`):
//! `[bearing / π, distance / √2, energy, x, y, aiming]`

use std::f32::consts::{PI, SQRT_2};

use anyhow::Result;
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::ArenaEnvironment;
use crate::policy::ActionVector;

/// Observation length produced by [`TargetPractice`]
pub const OBSERVATION_SIZE: usize = 6;

const MAX_TURN: f32 = 0.3;
const MOVE_SPEED: f32 = 0.02;
const SHOT_RANGE: f32 = 0.6;
const SHOT_CONE: f32 = 0.25;
const HIT_REWARD: f32 = 1.0;
const MISS_PENALTY: f32 = -0.05;
const STEP_PENALTY: f32 = -0.005;
const HIT_ENERGY: f32 = 0.5;
const ENERGY_EPSILON: f32 = 1e-6;
const DEFAULT_LIFETIME: usize = 300;
const DEFAULT_MAX_STEPS: usize = 1800;

#[derive(Debug, Clone, Default)]
struct Shooter {
    x: f32,
    y: f32,
    heading: f32,
    target: (f32, f32),
    energy: f32,
    alive: bool,
    reward: f32,
    last_reward: f32,
    kills: u32,
    pending: ActionVector,
}

impl Shooter {
    /// Signed angle from the heading to the target, in `[-π, π]`
    fn bearing(&self) -> f32 {
        let (tx, ty) = self.target;
        wrap_angle((ty - self.y).atan2(tx - self.x) - self.heading)
    }

    fn distance(&self) -> f32 {
        let (tx, ty) = self.target;
        ((tx - self.x).powi(2) + (ty - self.y).powi(2)).sqrt()
    }

    fn is_aiming(&self) -> bool {
        self.distance() <= SHOT_RANGE && self.bearing().abs() <= SHOT_CONE
    }
}

fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Target shooting arena for a population of agents
#[derive(Debug)]
pub struct TargetPractice {
    shooters: Vec<Shooter>,
    steps: usize,
    max_steps: usize,
    energy_drain: f32,
    rng: StdRng,
}

impl TargetPractice {
    /// Create an arena for `num_agents` agents, already reset
    pub fn new(num_agents: usize, seed: u64) -> Self {
        let mut arena = Self {
            shooters: vec![Shooter::default(); num_agents],
            steps: 0,
            max_steps: DEFAULT_MAX_STEPS,
            energy_drain: 1.0 / DEFAULT_LIFETIME as f32,
            rng: StdRng::seed_from_u64(seed),
        };
        arena.respawn();
        arena
    }

    /// Set the tick limit of an episode
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Set how many ticks a full energy bar lasts without hits
    pub fn with_lifetime(mut self, ticks: usize) -> Self {
        self.energy_drain = 1.0 / ticks.max(1) as f32;
        self
    }

    /// Ticks since the last timeout reset
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn random_point(&mut self) -> (f32, f32) {
        (self.rng.gen_range(0.05..0.95), self.rng.gen_range(0.05..0.95))
    }

    fn respawn(&mut self) {
        for i in 0..self.shooters.len() {
            let (x, y) = self.random_point();
            let target = self.random_point();
            let heading = self.rng.gen_range(-PI..PI);

            let shooter = &mut self.shooters[i];
            shooter.x = x;
            shooter.y = y;
            shooter.heading = heading;
            shooter.target = target;
            shooter.energy = 1.0;
            shooter.alive = true;
            shooter.last_reward = 0.0;
            shooter.pending = ActionVector::default();
        }
        self.steps = 0;
    }
}

impl ArenaEnvironment for TargetPractice {
    fn num_agents(&self) -> usize {
        self.shooters.len()
    }

    fn step(&mut self) -> Result<()> {
        self.steps += 1;

        for i in 0..self.shooters.len() {
            if !self.shooters[i].alive {
                self.shooters[i].last_reward = 0.0;
                continue;
            }
            let new_target = self.random_point();

            let shooter = &mut self.shooters[i];
            let action = std::mem::take(&mut shooter.pending);

            shooter.heading = wrap_angle(shooter.heading + action.look_delta * MAX_TURN);
            let (sin, cos) = shooter.heading.sin_cos();
            let lateral = action.strafe_right - action.strafe_left;
            // Strafe right is the heading rotated clockwise
            shooter.x = (shooter.x + MOVE_SPEED * (action.forward * cos + lateral * sin)).clamp(0.0, 1.0);
            shooter.y = (shooter.y + MOVE_SPEED * (action.forward * sin - lateral * cos)).clamp(0.0, 1.0);

            let mut reward = STEP_PENALTY;
            if action.shoot {
                if shooter.is_aiming() {
                    reward += HIT_REWARD;
                    shooter.kills += 1;
                    shooter.energy = (shooter.energy + HIT_ENERGY).min(1.0);
                    shooter.target = new_target;
                } else {
                    reward += MISS_PENALTY;
                }
            }

            shooter.energy -= self.energy_drain;
            if shooter.energy <= ENERGY_EPSILON {
                shooter.energy = 0.0;
                shooter.alive = false;
            }

            shooter.last_reward = reward;
            shooter.reward += reward;
        }

        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.respawn();
        Ok(())
    }

    fn apply_action(&mut self, action: &ActionVector, agent_index: usize) {
        if let Some(shooter) = self.shooters.get_mut(agent_index) {
            shooter.pending = *action;
        }
    }

    /// The first agent's view
    fn current_state(&self) -> Vec<f32> {
        self.agent_state(0)
    }

    fn agent_state(&self, agent_index: usize) -> Vec<f32> {
        match self.shooters.get(agent_index) {
            Some(s) => vec![
                s.bearing() / PI,
                s.distance() / SQRT_2,
                s.energy,
                s.x,
                s.y,
                if s.is_aiming() { 1.0 } else { 0.0 },
            ],
            None => vec![0.0; OBSERVATION_SIZE],
        }
    }

    fn is_agent_alive(&self, agent_index: usize) -> bool {
        self.shooters.get(agent_index).is_some_and(|s| s.alive)
    }

    fn reward(&self, agent_index: usize) -> f32 {
        self.shooters.get(agent_index).map_or(0.0, |s| s.reward)
    }

    fn last_step_reward(&self, agent_index: usize) -> f32 {
        self.shooters.get(agent_index).map_or(0.0, |s| s.last_reward)
    }

    fn kill_count(&self, agent_index: usize) -> u32 {
        self.shooters.get(agent_index).map_or(0, |s| s.kills)
    }

    fn is_episode_finished(&self) -> bool {
        self.steps >= self.max_steps || self.shooters.iter().all(|s| !s.alive)
    }

    fn reset_cumulative_rewards(&mut self) {
        for shooter in &mut self.shooters {
            shooter.reward = 0.0;
            shooter.last_reward = 0.0;
            shooter.kills = 0;
        }
    }

    fn reset_timeout_status(&mut self) {
        self.steps = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aimed_arena() -> TargetPractice {
        let mut arena = TargetPractice::new(2, 7);
        let shooter = &mut arena.shooters[0];
        shooter.x = 0.5;
        shooter.y = 0.5;
        shooter.heading = 0.0;
        shooter.target = (0.7, 0.5);
        arena
    }

    fn fire() -> ActionVector {
        ActionVector { shoot: true, shoot_intent: 1.0, ..ActionVector::default() }
    }

    #[test]
    fn test_observation_shape() {
        let arena = TargetPractice::new(3, 1);
        for i in 0..3 {
            let obs = arena.agent_state(i);
            assert_eq!(obs.len(), OBSERVATION_SIZE);
            assert!(obs.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
        }
        assert_eq!(arena.current_state(), arena.agent_state(0));
    }

    #[test]
    fn test_aimed_shot_hits() {
        let mut arena = aimed_arena();
        assert_eq!(arena.agent_state(0)[5], 1.0);

        arena.apply_action(&fire(), 0);
        arena.step().unwrap();

        assert_eq!(arena.kill_count(0), 1);
        assert!((arena.last_step_reward(0) - (HIT_REWARD + STEP_PENALTY)).abs() < 1e-6);
        assert!((arena.reward(0) - arena.last_step_reward(0)).abs() < 1e-6);
    }

    #[test]
    fn test_missed_shot_is_penalized() {
        let mut arena = aimed_arena();
        arena.shooters[0].heading = PI;

        arena.apply_action(&fire(), 0);
        arena.step().unwrap();

        assert_eq!(arena.kill_count(0), 0);
        assert!((arena.last_step_reward(0) - (MISS_PENALTY + STEP_PENALTY)).abs() < 1e-6);
    }

    #[test]
    fn test_action_is_consumed_by_step() {
        let mut arena = aimed_arena();
        arena.apply_action(&fire(), 0);
        arena.step().unwrap();
        arena.shooters[0].target = (0.7, 0.5);
        arena.step().unwrap();
        assert_eq!(arena.kill_count(0), 1);
    }

    #[test]
    fn test_energy_runs_out() {
        let mut arena = TargetPractice::new(2, 3).with_lifetime(5);
        for _ in 0..5 {
            assert_eq!(arena.alive_agent_count(), 2);
            arena.step().unwrap();
        }
        assert_eq!(arena.alive_agent_count(), 0);
        assert!(arena.is_episode_finished());

        arena.reset().unwrap();
        assert_eq!(arena.alive_agent_count(), 2);
        assert!(!arena.is_episode_finished());
    }

    #[test]
    fn test_timeout_and_counters_reset() {
        let mut arena = aimed_arena().with_max_steps(3);
        arena.apply_action(&fire(), 0);
        for _ in 0..3 {
            arena.step().unwrap();
        }
        assert!(arena.is_episode_finished());
        assert!(arena.reward(0) != 0.0);

        arena.reset_timeout_status();
        assert!(!arena.is_episode_finished());

        arena.reset_cumulative_rewards();
        assert_eq!(arena.reward(0), 0.0);
        assert_eq!(arena.kill_count(0), 0);
    }

    #[test]
    fn test_seeded_arenas_match() {
        let a = TargetPractice::new(4, 11);
        let b = TargetPractice::new(4, 11);
        for i in 0..4 {
            assert_eq!(a.agent_state(i), b.agent_state(i));
        }
    }
}
