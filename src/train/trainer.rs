//! Per-agent training pass
//!
//! Turns one agent's buffered transitions into weight updates:
//!
//! 1. Bootstrap the tail of an unfinished trajectory with the value estimate
//!    of its last `next_state`
//! 2. Compute GAE advantages and discounted returns, then normalize the
//!    advantages
//! 3. Update the network
//!    - Feedforward: move each output toward the taken action in proportion
//!      to the advantage, then regress the critic onto the return
//!    - Recurrent: push every transition into the replay memory and run one
//!      minibatch update
//! 4. Clear the buffer

use tracing::{debug, warn};

use crate::{
    buffer::ExperienceBuffer,
    config::EngineConfig,
    policy::{FeedforwardNetwork, Policy, PolicyNetwork, RecurrentNetwork, ReplaySample},
};

use super::stats::TrainingStats;

/// Hyperparameters of a training pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentTrainer {
    learning_rate: f32,
    gamma: f32,
    lambda: f32,
    advantage_mix: f32,
    batch_size: usize,
}

impl AgentTrainer {
    /// Create a trainer from engine configuration
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            gamma: config.gamma,
            lambda: config.lambda,
            advantage_mix: config.advantage_mix,
            batch_size: config.batch_size,
        }
    }

    /// Train `policy` on everything in `buffer` and empty the buffer
    ///
    /// An empty buffer is a no-op and returns zeroed statistics.
    pub fn train(&self, policy: &mut Policy, buffer: &mut ExperienceBuffer) -> TrainingStats {
        let Some(last) = buffer.last() else {
            return TrainingStats::zeros();
        };

        // The recurrent estimate reads the hidden state left by the last
        // forward on `last.state`, so it bootstraps with V(s_T) not V(s_T+1)
        let bootstrap = if last.done {
            0.0
        } else {
            policy.forward_value(&last.next_state).unwrap_or(0.0)
        };

        buffer.compute_advantages(bootstrap, self.gamma, self.lambda);
        let mean_return = buffer.experiences().iter().map(|e| e.ret as f64).sum::<f64>()
            / buffer.len() as f64;
        buffer.normalize_advantages();

        let mut stats = match policy {
            Policy::Feedforward(net) => self.train_feedforward(net, buffer),
            Policy::Recurrent(net) => self.train_recurrent(net, buffer),
        };
        stats.mean_return = mean_return;
        stats.samples = buffer.len();
        stats.num_updates = 1;

        debug!(
            "Training pass | samples {} | policy loss {:.4} | value loss {:.4}",
            stats.samples,
            stats.policy_loss,
            stats.value_loss
        );

        buffer.clear();
        stats
    }

    fn train_feedforward(
        &self,
        net: &mut FeedforwardNetwork,
        buffer: &ExperienceBuffer,
    ) -> TrainingStats {
        let mut policy_loss = 0.0;
        let mut value_loss = 0.0;
        let mut trained = 0usize;

        for experience in buffer.experiences() {
            let output = match net.forward(&experience.state) {
                Ok(output) => output,
                Err(e) => {
                    warn!("Skipping transition during training: {}", e);
                    continue;
                }
            };

            let target: Vec<f32> = output
                .iter()
                .zip(&experience.action)
                .map(|(&y, &a)| {
                    (y + self.advantage_mix * experience.advantage * (a - y)).clamp(-1.0, 1.0)
                })
                .collect();

            match net.backward(&experience.state, &target, self.learning_rate) {
                Ok(loss) => policy_loss += loss as f64,
                Err(e) => {
                    warn!("Skipping transition during training: {}", e);
                    continue;
                }
            }

            if net.has_critic() {
                if let Ok(loss) =
                    net.backward_value(&experience.state, experience.ret, self.learning_rate)
                {
                    value_loss += loss as f64;
                }
            }
            trained += 1;
        }

        let scale = trained.max(1) as f64;
        TrainingStats {
            policy_loss: policy_loss / scale,
            value_loss: value_loss / scale,
            ..TrainingStats::zeros()
        }
    }

    fn train_recurrent(&self, net: &mut RecurrentNetwork, buffer: &ExperienceBuffer) -> TrainingStats {
        for experience in buffer.experiences() {
            let Some(hidden) = experience.memory.clone() else {
                debug!("Transition without hidden state; not replayable");
                continue;
            };
            let sample = ReplaySample {
                hidden,
                action: experience.action.clone(),
                signal: experience.advantage,
            };
            if let Err(e) = net.store_experience(sample) {
                warn!("Dropping replay sample: {}", e);
            }
        }

        let policy_loss = net.train_on_batch(self.batch_size, self.learning_rate);
        TrainingStats { policy_loss: policy_loss as f64, ..TrainingStats::zeros() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{buffer::Experience, config::NetworkKind, policy::ACTION_DIM};

    const STATE: [f32; 4] = [0.5, -0.2, 0.1, 0.8];

    fn config() -> EngineConfig {
        let mut config = EngineConfig::new().input_size(4).hidden_sizes(16, 16).hidden_size(8);
        config.advantage_mix = 0.5;
        config
    }

    fn episode(action: [f32; ACTION_DIM], reward: f32) -> Experience {
        Experience::new(STATE.to_vec(), action.to_vec(), reward, STATE.to_vec(), true, 0.0)
    }

    #[test]
    fn test_empty_buffer_is_noop() {
        let config = config();
        let trainer = AgentTrainer::new(&config);
        let mut policy = Policy::from_config(&config, 1).unwrap();
        let mut buffer = ExperienceBuffer::new(config.batch_size);

        let stats = trainer.train(&mut policy, &mut buffer);
        assert!(stats.is_empty());
        assert_eq!(stats.samples, 0);
    }

    #[test]
    fn test_feedforward_moves_toward_rewarded_action() {
        let config = config();
        let trainer = AgentTrainer::new(&config);
        let mut policy = Policy::from_config(&config, 2).unwrap();
        let before = policy.forward(&STATE).unwrap()[0];

        for _ in 0..30 {
            let mut buffer = ExperienceBuffer::new(config.batch_size);
            // The rewarded episode pulls look toward +1, the unrewarded one
            // pushes it away from -1
            buffer.record(episode([1.0, 0.0, 0.0, 0.0, 0.0], 1.0));
            buffer.record(episode([-1.0, 0.0, 0.0, 0.0, 0.0], 0.0));

            let stats = trainer.train(&mut policy, &mut buffer);
            assert_eq!(stats.samples, 2);
            assert!(buffer.is_empty());
        }

        let after = policy.forward(&STATE).unwrap()[0];
        assert!(after > before, "look output should rise: {} -> {}", before, after);
    }

    #[test]
    fn test_critic_regresses_toward_returns() {
        let config = config();
        let trainer = AgentTrainer::new(&config);
        let mut policy = Policy::from_config(&config, 3).unwrap();

        // Returns of a 4-step episode of unit rewards average to about 2.48
        let target = (3.940_399 + 2.9701 + 1.99 + 1.0) / 4.0;
        let initial_gap = (policy.forward_value(&STATE).unwrap() - target).abs();

        for _ in 0..50 {
            let mut buffer = ExperienceBuffer::new(config.batch_size);
            for step in 0..4 {
                buffer.record(Experience::new(
                    STATE.to_vec(),
                    vec![0.0; ACTION_DIM],
                    1.0,
                    STATE.to_vec(),
                    step == 3,
                    0.0,
                ));
            }
            trainer.train(&mut policy, &mut buffer);
        }

        let final_gap = (policy.forward_value(&STATE).unwrap() - target).abs();
        assert!(final_gap < initial_gap, "gap {} -> {}", initial_gap, final_gap);
    }

    #[test]
    fn test_recurrent_fills_replay_memory() {
        let config = config().network(NetworkKind::Recurrent);
        let trainer = AgentTrainer::new(&config);
        let mut policy = Policy::from_config(&config, 4).unwrap();
        let mut buffer = ExperienceBuffer::new(config.batch_size);

        for reward in [1.0, 0.0, 0.5] {
            policy.forward(&STATE).unwrap();
            let hidden = match &policy {
                Policy::Recurrent(net) => net.hidden_state().to_vec(),
                Policy::Feedforward(_) => unreachable!(),
            };
            buffer.record(
                Experience::new(STATE.to_vec(), vec![0.5; ACTION_DIM], reward, STATE.to_vec(), false, 0.0)
                    .with_memory(hidden),
            );
        }

        let stats = trainer.train(&mut policy, &mut buffer);
        assert_eq!(stats.samples, 3);
        assert!(buffer.is_empty());
        match &policy {
            Policy::Recurrent(net) => assert_eq!(net.replay_len(), 3),
            Policy::Feedforward(_) => unreachable!(),
        }
    }
}
