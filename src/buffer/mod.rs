//! Per-agent experience storage
//!
//! Each agent owns one [`ExperienceBuffer`]. Transitions are appended every
//! tick; once the buffer reaches `batch_size` or an episode ends the caller
//! computes advantages and runs a training pass (see
//! [`crate::train::AgentTrainer`]), after which the buffer is cleared.

pub mod advantage;


pub use advantage::{compute_gae, normalize_advantages, AdvantageEstimate};

/// One agent transition
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    /// Observation the action was chosen from
    pub state: Vec<f32>,
    /// Action actually taken, in network output order
    pub action: Vec<f32>,
    /// Reward received for this tick
    pub reward: f32,
    /// Observation after the tick
    pub next_state: Vec<f32>,
    /// Whether the agent's episode ended on this tick
    pub done: bool,
    /// Value estimate of `state` at decision time
    pub value: f32,
    /// GAE advantage; 0 until the advantage pass runs
    pub advantage: f32,
    /// Discounted return; 0 until the advantage pass runs
    pub ret: f32,
    /// Recurrent hidden state that produced the action, if any
    pub memory: Option<Vec<f32>>,
}

impl Experience {
    /// Create a transition with advantage and return unset
    pub fn new(
        state: Vec<f32>,
        action: Vec<f32>,
        reward: f32,
        next_state: Vec<f32>,
        done: bool,
        value: f32,
    ) -> Self {
        Self { state, action, reward, next_state, done, value, advantage: 0.0, ret: 0.0, memory: None }
    }

    /// Attach the hidden state the action came from
    pub fn with_memory(mut self, memory: Vec<f32>) -> Self {
        self.memory = Some(memory);
        self
    }
}

/// Rolling buffer of one agent's transitions
#[derive(Debug, Clone)]
pub struct ExperienceBuffer {
    batch_size: usize,
    experiences: Vec<Experience>,
}

impl ExperienceBuffer {
    /// Create a buffer that asks for training every `batch_size` transitions
    pub fn new(batch_size: usize) -> Self {
        Self { batch_size: batch_size.max(1), experiences: Vec::with_capacity(batch_size) }
    }

    /// Append a transition
    ///
    /// Returns `true` when a training pass is due: the transition ended an
    /// episode or the buffer holds at least `batch_size` entries.
    pub fn record(&mut self, experience: Experience) -> bool {
        let done = experience.done;
        self.experiences.push(experience);
        done || self.experiences.len() >= self.batch_size
    }

    /// Fill in advantages and returns for every stored transition
    ///
    /// `bootstrap_value` stands in for the value of the state after the last
    /// transition when that transition did not end the episode.
    pub fn compute_advantages(&mut self, bootstrap_value: f32, gamma: f32, lambda: f32) {
        let rewards: Vec<f32> = self.experiences.iter().map(|e| e.reward).collect();
        let values: Vec<f32> = self.experiences.iter().map(|e| e.value).collect();
        let dones: Vec<bool> = self.experiences.iter().map(|e| e.done).collect();

        let estimate = compute_gae(&rewards, &values, &dones, bootstrap_value, gamma, lambda);

        for ((experience, advantage), ret) in
            self.experiences.iter_mut().zip(estimate.advantages).zip(estimate.returns)
        {
            experience.advantage = advantage;
            experience.ret = ret;
        }
    }

    /// Normalize stored advantages to zero mean and unit variance
    pub fn normalize_advantages(&mut self) {
        let mut advantages: Vec<f32> = self.experiences.iter().map(|e| e.advantage).collect();
        normalize_advantages(&mut advantages);
        for (experience, advantage) in self.experiences.iter_mut().zip(advantages) {
            experience.advantage = advantage;
        }
    }

    /// Stored transitions, oldest first
    pub fn experiences(&self) -> &[Experience] {
        &self.experiences
    }

    /// Most recent transition
    pub fn last(&self) -> Option<&Experience> {
        self.experiences.last()
    }

    /// Drop every stored transition
    pub fn clear(&mut self) {
        self.experiences.clear();
    }

    /// Transitions per training pass
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Number of stored transitions
    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }
}
