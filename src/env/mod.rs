//! Arena interface and built-in arenas
//!
//! The engine never simulates the world itself. Movement, collisions, line
//! of sight and life bookkeeping live behind [`ArenaEnvironment`]; the engine
//! only pushes actions in and reads observations, rewards and liveness out.

use anyhow::Result;

use crate::policy::ActionVector;

pub mod target_practice;

pub use target_practice::TargetPractice;

/// Multi-agent arena driven one tick at a time
///
/// Agents are addressed by index `0..num_agents()`. Rewards are cumulative
/// since the last [`reset_cumulative_rewards`](Self::reset_cumulative_rewards).
pub trait ArenaEnvironment {
    /// Number of agent slots
    fn num_agents(&self) -> usize;

    /// Advance the simulation one tick using the actions applied since the
    /// previous step
    fn step(&mut self) -> Result<()>;

    /// Revive every agent and re-randomize positions
    fn reset(&mut self) -> Result<()>;

    /// Queue `action` for agent `agent_index` for the next step
    fn apply_action(&mut self, action: &ActionVector, agent_index: usize);

    /// Shared observation of the arena
    fn current_state(&self) -> Vec<f32>;

    /// Observation from one agent's point of view
    ///
    /// Arenas without per-agent views fall back to the shared observation.
    fn agent_state(&self, _agent_index: usize) -> Vec<f32> {
        self.current_state()
    }

    /// Whether agent `agent_index` is still in play
    fn is_agent_alive(&self, agent_index: usize) -> bool;

    /// Number of agents still in play
    fn alive_agent_count(&self) -> usize {
        (0..self.num_agents()).filter(|&i| self.is_agent_alive(i)).count()
    }

    /// Cumulative reward of one agent
    fn reward(&self, agent_index: usize) -> f32;

    /// Reward one agent earned on the most recent step
    fn last_step_reward(&self, agent_index: usize) -> f32;

    /// Kills scored by one agent
    fn kill_count(&self, agent_index: usize) -> u32;

    /// Whether the arena considers the current episode over
    fn is_episode_finished(&self) -> bool;

    /// Zero every agent's cumulative reward and kill count
    fn reset_cumulative_rewards(&mut self);

    /// Clear any episode timeout the arena tracks
    fn reset_timeout_status(&mut self);
}
