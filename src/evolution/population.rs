//! Population of competing agents
//!
//! Every agent owns its network, its experience buffer and its random
//! stream, so action selection can run across agents in parallel without any
//! shared mutable state.

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::Normal;
use rayon::prelude::*;

use crate::{
    buffer::ExperienceBuffer,
    config::EngineConfig,
    error::NetworkError,
    policy::{ActionVector, Policy, PolicyNetwork},
};

/// Index of an agent slot in the population
pub type AgentId = usize;

/// What an agent decided on one tick
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Action handed to the arena
    pub action: ActionVector,
    /// Network outputs after exploration noise, as recorded for training
    pub outputs: Vec<f32>,
    /// Value estimate of the observation
    pub value: f32,
    /// Recurrent hidden state after the forward pass
    pub memory: Option<Vec<f32>>,
}

/// One member of the population
#[derive(Debug, Clone)]
pub struct Agent {
    /// Slot index
    pub id: AgentId,

    /// Network the agent acts with
    pub policy: Policy,

    /// Transitions since the last training pass
    pub buffer: ExperienceBuffer,

    seed: u64,
    noise: Option<Normal<f32>>,
    rng: StdRng,
}

impl Agent {
    /// Create agent `id` with its own seed `config.seed + id`
    pub fn new(id: AgentId, config: &EngineConfig) -> Result<Self, NetworkError> {
        let seed = config.seed.wrapping_add(id as u64);
        let mut policy = Policy::from_config(config, seed)?;
        policy.initialize();

        let noise = if config.exploration_noise > 0.0 {
            Normal::new(0.0, config.exploration_noise).ok()
        } else {
            None
        };

        Ok(Self {
            id,
            policy,
            buffer: ExperienceBuffer::new(config.batch_size),
            seed,
            noise,
            // Offset so the exploration stream differs from weight init
            rng: StdRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15),
        })
    }

    /// Seed this slot was created with
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Choose an action for `observation`
    ///
    /// A network error yields a zero action and a warning instead of
    /// stopping the tick.
    pub fn act(&mut self, observation: &[f32]) -> Decision {
        let outputs = match self.policy.forward(observation) {
            Ok(outputs) => outputs,
            Err(e) => {
                tracing::warn!("Agent {} forward failed, acting with zeros: {}", self.id, e);
                return Decision {
                    action: ActionVector::default(),
                    outputs: vec![0.0; self.policy.output_size()],
                    value: 0.0,
                    memory: None,
                };
            }
        };

        let value = self.policy.forward_value(observation).unwrap_or(0.0);
        let memory = match &self.policy {
            Policy::Recurrent(net) => Some(net.hidden_state().to_vec()),
            Policy::Feedforward(_) => None,
        };

        let mut outputs = outputs;
        for (axis, y) in outputs.iter_mut().enumerate() {
            let noise = match self.noise {
                Some(normal) => self.rng.sample(normal),
                None => 0.0,
            };
            *y = self.policy.clamp_output(axis, *y + noise);
        }

        Decision {
            action: ActionVector::from_outputs(&outputs, self.policy.shoot_threshold()),
            outputs,
            value,
            memory,
        }
    }

    /// Replace this agent's network with a copy of `elite`
    ///
    /// The copy gets a fresh random stream derived from `seed`, empty memory
    /// and an empty buffer; weights are copied unchanged.
    pub fn adopt(&mut self, elite: &Policy, seed: u64) {
        let mut policy = elite.clone();
        policy.reseed(seed);
        policy.reset_memory();
        if let Policy::Recurrent(net) = &mut policy {
            net.clear_replay();
        }
        self.policy = policy;
        self.buffer.clear();
    }
}

/// Fixed-size set of agents
#[derive(Debug, Clone)]
pub struct Population {
    agents: Vec<Agent>,
}

impl Population {
    /// Create `config.population_size` freshly initialized agents
    pub fn new(config: &EngineConfig) -> Result<Self, NetworkError> {
        let agents = (0..config.population_size)
            .map(|id| Agent::new(id, config))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { agents })
    }

    /// Number of agents
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the population has no agents
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Get agent by ID
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    /// Get mutable agent by ID
    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.agents.get_mut(id)
    }

    /// All agents in slot order
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// All agents in slot order, mutably
    pub fn agents_mut(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Decide actions for every agent in parallel
    ///
    /// `observations[i]` belongs to agent `i`; agents listed as inactive
    /// produce `None`. Each agent only touches its own network.
    pub fn act_all(&mut self, observations: &[Vec<f32>], active: &[bool]) -> Vec<Option<Decision>> {
        self.agents
            .par_iter_mut()
            .map(|agent| {
                let id = agent.id;
                if !active.get(id).copied().unwrap_or(false) {
                    return None;
                }
                observations.get(id).map(|obs| agent.act(obs))
            })
            .collect()
    }

    /// Clear every recurrent memory
    pub fn reset_memories(&mut self) {
        for agent in &mut self.agents {
            agent.policy.reset_memory();
        }
    }
}
