//! Policy networks
//!
//! Two interchangeable backends share the [`PolicyNetwork`] capability set:
//! a feedforward actor-critic and a recurrent memory network. The
//! [`Policy`] enum is the closed set the engine dispatches over; which
//! variant every agent gets is decided by [`EngineConfig::network`].

pub mod action;
pub mod activation;
pub mod feedforward;
pub mod layer;
pub mod recurrent;
pub mod weights;

use std::path::Path;

pub use action::ActionVector;
pub use activation::Activation;
pub use feedforward::FeedforwardNetwork;
pub use recurrent::{RecurrentNetwork, RecurrentSettings, ReplaySample};
pub use weights::{Architecture, NetworkDocument};

use crate::{
    config::{EngineConfig, NetworkKind},
    error::{NetworkError, PersistenceError},
};

/// Number of action outputs: look, shoot, forward, strafe left, strafe right
pub const ACTION_DIM: usize = 5;

/// Index of the look-delta axis
pub const LOOK_AXIS: usize = 0;
/// Index of the shoot-intent axis
pub const SHOOT_AXIS: usize = 1;
/// Index of the forward axis
pub const FORWARD_AXIS: usize = 2;
/// Index of the strafe-left axis
pub const STRAFE_LEFT_AXIS: usize = 3;
/// Index of the strafe-right axis
pub const STRAFE_RIGHT_AXIS: usize = 4;

/// Capabilities shared by both network backends
pub trait PolicyNetwork {
    /// Which backend this is
    fn kind(&self) -> NetworkKind;

    /// Observation length
    fn input_size(&self) -> usize;

    /// Action length
    fn output_size(&self) -> usize;

    /// Activation applied to output `axis`
    fn output_activation(&self, axis: usize) -> Activation;

    /// Allocate and randomize weights; no-op when already initialized
    fn initialize(&mut self);

    /// Whether weights have been allocated
    fn is_initialized(&self) -> bool;

    /// Compute the action outputs for one observation
    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>, NetworkError>;

    /// Estimate the value of one observation
    fn forward_value(&mut self, input: &[f32]) -> Result<f32, NetworkError>;

    /// Clear any per-episode state
    fn reset_memory(&mut self);

    /// Replace the private random stream
    fn reseed(&mut self, seed: u64);

    /// Declared shape used by weight documents
    fn architecture(&self) -> Architecture;

    /// Capture all weights
    fn to_document(&mut self) -> NetworkDocument;

    /// Replace all weights from a document; on error nothing changes
    fn load_document(&mut self, document: NetworkDocument) -> Result<(), PersistenceError>;

    /// Save weights to `path` (`.json` or bincode)
    fn save_weights(&mut self, path: &Path) -> Result<(), PersistenceError> {
        self.to_document().save(path)
    }

    /// Load weights from `path`; on error the network is left untouched
    fn load_weights(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let document = NetworkDocument::load(path)?;
        self.load_document(document)
    }
}

/// The network an agent acts with
#[derive(Debug, Clone)]
pub enum Policy {
    /// Actor-critic multilayer perceptron
    Feedforward(FeedforwardNetwork),
    /// Single-cell memory network
    Recurrent(RecurrentNetwork),
}

impl Policy {
    /// Build the configured backend for the agent seeded with `seed`
    pub fn from_config(config: &EngineConfig, seed: u64) -> Result<Self, NetworkError> {
        let policy = match config.network {
            NetworkKind::Feedforward => Policy::Feedforward(FeedforwardNetwork::new(
                config.input_size,
                &config.hidden_sizes,
                ACTION_DIM,
                config.use_critic,
                seed,
            )?),
            NetworkKind::Recurrent => Policy::Recurrent(RecurrentNetwork::new(
                config.input_size,
                ACTION_DIM,
                RecurrentSettings::from(config),
                seed,
            )?),
        };
        Ok(policy)
    }

    fn network(&self) -> &dyn PolicyNetwork {
        match self {
            Policy::Feedforward(net) => net,
            Policy::Recurrent(net) => net,
        }
    }

    fn network_mut(&mut self) -> &mut dyn PolicyNetwork {
        match self {
            Policy::Feedforward(net) => net,
            Policy::Recurrent(net) => net,
        }
    }

    /// Threshold above which the raw shoot output means "fire"
    pub fn shoot_threshold(&self) -> f32 {
        match self.output_activation(SHOOT_AXIS) {
            Activation::Sigmoid => 0.5,
            _ => 0.0,
        }
    }

    /// Clamp one output to the range its activation can produce
    pub fn clamp_output(&self, axis: usize, value: f32) -> f32 {
        let (low, high) = self.output_activation(axis).output_range();
        value.clamp(low, high)
    }
}

impl PolicyNetwork for Policy {
    fn kind(&self) -> NetworkKind {
        self.network().kind()
    }

    fn input_size(&self) -> usize {
        self.network().input_size()
    }

    fn output_size(&self) -> usize {
        self.network().output_size()
    }

    fn output_activation(&self, axis: usize) -> Activation {
        self.network().output_activation(axis)
    }

    fn initialize(&mut self) {
        self.network_mut().initialize()
    }

    fn is_initialized(&self) -> bool {
        self.network().is_initialized()
    }

    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>, NetworkError> {
        self.network_mut().forward(input)
    }

    fn forward_value(&mut self, input: &[f32]) -> Result<f32, NetworkError> {
        self.network_mut().forward_value(input)
    }

    fn reset_memory(&mut self) {
        self.network_mut().reset_memory()
    }

    fn reseed(&mut self, seed: u64) {
        self.network_mut().reseed(seed)
    }

    fn architecture(&self) -> Architecture {
        self.network().architecture()
    }

    fn to_document(&mut self) -> NetworkDocument {
        self.network_mut().to_document()
    }

    fn load_document(&mut self, document: NetworkDocument) -> Result<(), PersistenceError> {
        self.network_mut().load_document(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_config() {
        let config = EngineConfig::new().input_size(6);
        let policy = Policy::from_config(&config, 0).unwrap();
        assert_eq!(policy.kind(), NetworkKind::Feedforward);
        assert_eq!(policy.output_size(), ACTION_DIM);
        assert_eq!(policy.shoot_threshold(), 0.0);

        let config = config.network(NetworkKind::Recurrent);
        let policy = Policy::from_config(&config, 0).unwrap();
        assert_eq!(policy.kind(), NetworkKind::Recurrent);
        assert_eq!(policy.shoot_threshold(), 0.5);
        assert_eq!(policy.output_activation(SHOOT_AXIS), Activation::Sigmoid);
        assert_eq!(policy.output_activation(LOOK_AXIS), Activation::Tanh);
    }

    #[test]
    fn test_variants_share_capabilities() {
        for kind in [NetworkKind::Feedforward, NetworkKind::Recurrent] {
            let config = EngineConfig::new().input_size(4).network(kind).hidden_size(8);
            let mut policy = Policy::from_config(&config, 3).unwrap();

            let output = policy.forward(&[0.1, 0.2, 0.3, 0.4]).unwrap();
            assert_eq!(output.len(), ACTION_DIM);
            assert!(policy.forward_value(&[0.1, 0.2, 0.3, 0.4]).is_ok());
            assert!(policy.forward(&[0.1]).is_err());

            let document = policy.to_document();
            assert_eq!(document.architecture.kind, kind);
            policy.load_document(document).unwrap();
        }
    }

    #[test]
    fn test_clamp_output() {
        let config = EngineConfig::new().network(NetworkKind::Recurrent);
        let policy = Policy::from_config(&config, 0).unwrap();
        assert_eq!(policy.clamp_output(SHOOT_AXIS, 1.4), 1.0);
        assert_eq!(policy.clamp_output(SHOOT_AXIS, -0.2), 0.0);
        assert_eq!(policy.clamp_output(FORWARD_AXIS, -1.7), -1.0);
    }
}
