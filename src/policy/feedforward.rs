//! Feedforward actor-critic policy with hand-derived gradients
//!
//! # Architecture
//!
//! ```text
//!        Input (observation)
//!         /              \
//!   [Dense(h1)] ReLU   [Dense(h1)] ReLU
//!         |                  |
//!   [Dense(h2)] ReLU   [Dense(h2)] ReLU
//!         |                  |
//!   [Dense(5)] Tanh    [Dense(1)] (linear)
//!         |                  |
//!      Actions             Value
//! ```
//!
//! The critic is optional and shares no weights with the actor. Both stacks
//! train with plain single-sample gradient descent on the squared error
//! `½‖target − output‖²`, applied in place.

use rand::{rngs::StdRng, SeedableRng};

use super::{
    activation::Activation,
    layer::DenseLayer,
    weights::{Architecture, LayerRecord, LayerSpec, NetworkDocument},
    PolicyNetwork,
};
use crate::{
    config::NetworkKind,
    error::{NetworkError, PersistenceError},
};

const ACTOR_LAYERS: [&str; 3] = ["actor.fc1", "actor.fc2", "actor.out"];
const CRITIC_LAYERS: [&str; 3] = ["critic.fc1", "critic.fc2", "critic.out"];

/// Three dense layers with ReLU hidden activations
#[derive(Debug, Clone, PartialEq)]
struct Stack {
    fc1: DenseLayer,
    fc2: DenseLayer,
    out: DenseLayer,
    output_activation: Activation,
}

/// Activations recorded during one forward pass
struct Trace {
    hidden1: Vec<f32>,
    hidden2: Vec<f32>,
    output: Vec<f32>,
}

impl Stack {
    fn random(
        input: usize,
        hidden: [usize; 2],
        output: usize,
        output_activation: Activation,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            fc1: DenseLayer::xavier(input, hidden[0], rng),
            fc2: DenseLayer::xavier(hidden[0], hidden[1], rng),
            out: DenseLayer::xavier(hidden[1], output, rng),
            output_activation,
        }
    }

    fn trace(&self, input: &[f32]) -> Trace {
        let mut hidden1 = self.fc1.forward(input);
        Activation::ReLU.apply_vec(&mut hidden1);

        let mut hidden2 = self.fc2.forward(&hidden1);
        Activation::ReLU.apply_vec(&mut hidden2);

        let mut output = self.out.forward(&hidden2);
        self.output_activation.apply_vec(&mut output);

        Trace { hidden1, hidden2, output }
    }

    /// One gradient step toward `target`; returns the squared error before
    /// the update
    fn descend(&mut self, input: &[f32], target: &[f32], lr: f32) -> f32 {
        let trace = self.trace(input);

        let mut loss = 0.0;
        let delta_out: Vec<f32> = target
            .iter()
            .zip(&trace.output)
            .map(|(&t, &y)| {
                let err = t - y;
                loss += err * err;
                err * self.output_activation.derivative_from_output(y)
            })
            .collect();

        let delta2 = gated(self.out.backward_input(&delta_out), &trace.hidden2);
        let delta1 = gated(self.fc2.backward_input(&delta2), &trace.hidden1);

        self.out.apply_update(&trace.hidden2, &delta_out, lr);
        self.fc2.apply_update(&trace.hidden1, &delta2, lr);
        self.fc1.apply_update(input, &delta1, lr);

        loss
    }

    fn layers(&self) -> [&DenseLayer; 3] {
        [&self.fc1, &self.fc2, &self.out]
    }
}

/// Multiply back-propagated gradients by the ReLU derivative
fn gated(mut grad: Vec<f32>, activations: &[f32]) -> Vec<f32> {
    for (g, &a) in grad.iter_mut().zip(activations) {
        *g *= Activation::ReLU.derivative_from_output(a);
    }
    grad
}

#[derive(Debug, Clone, PartialEq)]
struct Params {
    actor: Stack,
    critic: Option<Stack>,
}

/// Two hidden-layer actor network with an optional critic
///
/// Weights are allocated lazily: [`initialize`](PolicyNetwork::initialize)
/// is idempotent and every other call initializes first if needed.
#[derive(Debug, Clone)]
pub struct FeedforwardNetwork {
    input_size: usize,
    hidden_sizes: [usize; 2],
    output_size: usize,
    use_critic: bool,
    params: Option<Params>,
    rng: StdRng,
}

impl FeedforwardNetwork {
    /// Create a network description; weights are drawn on first use
    ///
    /// # Arguments
    ///
    /// * `input_size` - Observation length
    /// * `hidden_sizes` - Exactly two hidden widths
    /// * `output_size` - Action length
    /// * `use_critic` - Whether to build the parallel value network
    /// * `seed` - Seed for this network's private random stream
    pub fn new(
        input_size: usize,
        hidden_sizes: &[usize],
        output_size: usize,
        use_critic: bool,
        seed: u64,
    ) -> Result<Self, NetworkError> {
        let hidden_sizes: [usize; 2] = hidden_sizes.try_into().map_err(|_| {
            NetworkError::InvalidArchitecture(format!(
                "feedforward network needs two hidden sizes, got {}",
                hidden_sizes.len()
            ))
        })?;
        if input_size == 0 || output_size == 0 || hidden_sizes.contains(&0) {
            return Err(NetworkError::InvalidArchitecture(
                "layer sizes must be positive".to_string(),
            ));
        }

        Ok(Self {
            input_size,
            hidden_sizes,
            output_size,
            use_critic,
            params: None,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Whether a critic stack is configured
    pub fn has_critic(&self) -> bool {
        self.use_critic
    }

    /// Single-step gradient descent toward `target`
    ///
    /// Re-runs the forward pass on `input` so the activations used for the
    /// gradient always belong to this input. Returns `‖target − output‖²`
    /// measured before the update.
    pub fn backward(&mut self, input: &[f32], target: &[f32], lr: f32) -> Result<f32, NetworkError> {
        self.check_input(input, "backward")?;
        if target.len() != self.output_size {
            return Err(NetworkError::shape("backward target", self.output_size, target.len()));
        }

        let params = self.params_mut();
        Ok(params.actor.descend(input, target, lr))
    }

    /// Single-step gradient descent of the critic toward `target_value`
    ///
    /// Returns the squared error before the update.
    pub fn backward_value(
        &mut self,
        input: &[f32],
        target_value: f32,
        lr: f32,
    ) -> Result<f32, NetworkError> {
        self.check_input(input, "backward_value")?;
        match self.params_mut().critic.as_mut() {
            Some(critic) => Ok(critic.descend(input, &[target_value], lr)),
            None => Err(NetworkError::ValueNetworkDisabled),
        }
    }

    fn check_input(&self, input: &[f32], context: &'static str) -> Result<(), NetworkError> {
        if input.len() != self.input_size {
            return Err(NetworkError::shape(context, self.input_size, input.len()));
        }
        Ok(())
    }

    fn params_mut(&mut self) -> &mut Params {
        let params = match self.params.take() {
            Some(params) => params,
            None => self.random_params(),
        };
        self.params.insert(params)
    }

    fn random_params(&mut self) -> Params {
        let actor = Stack::random(
            self.input_size,
            self.hidden_sizes,
            self.output_size,
            Activation::Tanh,
            &mut self.rng,
        );
        let critic = self.use_critic.then(|| {
            Stack::random(self.input_size, self.hidden_sizes, 1, Activation::Identity, &mut self.rng)
        });
        Params { actor, critic }
    }

    fn layer_specs(&self) -> Vec<LayerSpec> {
        let [h1, h2] = self.hidden_sizes;
        let mut specs = vec![
            LayerSpec { name: ACTOR_LAYERS[0], in_features: self.input_size, out_features: h1 },
            LayerSpec { name: ACTOR_LAYERS[1], in_features: h1, out_features: h2 },
            LayerSpec { name: ACTOR_LAYERS[2], in_features: h2, out_features: self.output_size },
        ];
        if self.use_critic {
            specs.extend([
                LayerSpec { name: CRITIC_LAYERS[0], in_features: self.input_size, out_features: h1 },
                LayerSpec { name: CRITIC_LAYERS[1], in_features: h1, out_features: h2 },
                LayerSpec { name: CRITIC_LAYERS[2], in_features: h2, out_features: 1 },
            ]);
        }
        specs
    }
}

impl PolicyNetwork for FeedforwardNetwork {
    fn kind(&self) -> NetworkKind {
        NetworkKind::Feedforward
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn output_activation(&self, _axis: usize) -> Activation {
        Activation::Tanh
    }

    fn initialize(&mut self) {
        if self.params.is_none() {
            self.params = Some(self.random_params());
        }
    }

    fn is_initialized(&self) -> bool {
        self.params.is_some()
    }

    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>, NetworkError> {
        self.check_input(input, "forward")?;
        Ok(self.params_mut().actor.trace(input).output)
    }

    fn forward_value(&mut self, input: &[f32]) -> Result<f32, NetworkError> {
        if !self.use_critic {
            return Err(NetworkError::ValueNetworkDisabled);
        }
        self.check_input(input, "forward_value")?;
        match &self.params_mut().critic {
            Some(critic) => Ok(critic.trace(input).output[0]),
            None => Err(NetworkError::ValueNetworkDisabled),
        }
    }

    fn reset_memory(&mut self) {}

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn architecture(&self) -> Architecture {
        Architecture {
            kind: NetworkKind::Feedforward,
            input_size: self.input_size,
            hidden_sizes: self.hidden_sizes.to_vec(),
            output_size: self.output_size,
            has_critic: self.use_critic,
        }
    }

    fn to_document(&mut self) -> NetworkDocument {
        let architecture = self.architecture();
        let params = self.params_mut();

        let mut layers: Vec<LayerRecord> = ACTOR_LAYERS
            .iter()
            .zip(params.actor.layers())
            .map(|(name, layer)| LayerRecord::from_layer(name, layer))
            .collect();
        if let Some(critic) = &params.critic {
            layers.extend(
                CRITIC_LAYERS
                    .iter()
                    .zip(critic.layers())
                    .map(|(name, layer)| LayerRecord::from_layer(name, layer)),
            );
        }

        NetworkDocument { architecture, layers }
    }

    fn load_document(&mut self, document: NetworkDocument) -> Result<(), PersistenceError> {
        let specs = self.layer_specs();
        let mut layers = document.into_layers(&self.architecture(), &specs)?.into_iter();

        let mut next_stack = |output_activation: Activation| -> Option<Stack> {
            Some(Stack {
                fc1: layers.next()?,
                fc2: layers.next()?,
                out: layers.next()?,
                output_activation,
            })
        };

        let actor = next_stack(Activation::Tanh).ok_or_else(|| PersistenceError::MalformedLayer {
            layer: "actor".to_string(),
            reason: "missing actor layers".to_string(),
        })?;
        let critic = if self.use_critic {
            Some(next_stack(Activation::Identity).ok_or_else(|| PersistenceError::MalformedLayer {
                layer: "critic".to_string(),
                reason: "missing critic layers".to_string(),
            })?)
        } else {
            None
        };

        self.params = Some(Params { actor, critic });
        Ok(())
    }
}
