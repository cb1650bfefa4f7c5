//! Recurrent memory policy (single simplified LSTM cell)
//!
//! # Architecture
//!
//! ```text
//!   z_t = [x_t ; h_{t-1}]
//!   f = σ(W_f z + b_f)     i = σ(W_i z + b_i)
//!   g = tanh(W_c z + b_c)  o = σ(W_o z + b_o)
//!   c_t = clamp(f ⊙ c_{t-1} + i ⊙ g, ±cell_clip)
//!   h_t = o ⊙ tanh(c_t)
//!   y   = act(W_out h_t + b_out)   tanh per axis, sigmoid on the shoot axis
//! ```
//!
//! Hidden and cell state persist across calls until
//! [`reset_memory`](PolicyNetwork::reset_memory).
//!
//! # Training
//!
//! Training is a deliberately reduced rule, not backpropagation through time:
//! transitions are kept in a capped replay memory together with the hidden
//! state that produced them, and [`RecurrentNetwork::train_on_batch`] nudges
//! only the output projection toward the taken action, scaled by each
//! sample's advantage signal. The gate weights keep their initial values.

use std::collections::VecDeque;

use rand::{rngs::StdRng, seq::index, Rng, SeedableRng};

use super::{
    activation::Activation,
    layer::DenseLayer,
    weights::{Architecture, LayerRecord, LayerSpec, NetworkDocument},
    PolicyNetwork, SHOOT_AXIS,
};
use crate::{
    config::{EngineConfig, NetworkKind},
    error::{NetworkError, PersistenceError},
};

const LAYER_NAMES: [&str; 5] =
    ["gate.forget", "gate.input", "gate.candidate", "gate.output", "head"];

/// Memory-specific hyperparameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecurrentSettings {
    /// Width of the hidden and cell state
    pub hidden_size: usize,
    /// Observations kept in the diagnostic history
    pub sequence_length: usize,
    /// Magnitude bound on the cell state
    pub cell_clip: f32,
    /// Probability of zeroing a hidden unit while training
    pub dropout: f32,
    /// Replay memory capacity
    pub replay_capacity: usize,
}

impl From<&EngineConfig> for RecurrentSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            hidden_size: config.hidden_size,
            sequence_length: config.sequence_length,
            cell_clip: config.cell_clip,
            dropout: config.dropout,
            replay_capacity: config.replay_capacity,
        }
    }
}

/// One replayable decision
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaySample {
    /// Hidden state the action was produced from
    pub hidden: Vec<f32>,
    /// Action actually taken (after exploration noise)
    pub action: Vec<f32>,
    /// Scale of the update, usually the normalized advantage
    pub signal: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Gates {
    forget: DenseLayer,
    input: DenseLayer,
    candidate: DenseLayer,
    output: DenseLayer,
    head: DenseLayer,
}

impl Gates {
    fn layers(&self) -> [&DenseLayer; 5] {
        [&self.forget, &self.input, &self.candidate, &self.output, &self.head]
    }
}

/// Single-cell recurrent policy
#[derive(Debug, Clone)]
pub struct RecurrentNetwork {
    input_size: usize,
    output_size: usize,
    settings: RecurrentSettings,
    params: Option<Gates>,
    cell: Vec<f32>,
    hidden: Vec<f32>,
    history: VecDeque<Vec<f32>>,
    replay: VecDeque<ReplaySample>,
    training: bool,
    rng: StdRng,
}

impl RecurrentNetwork {
    /// Create a network description; weights are drawn on first use
    pub fn new(
        input_size: usize,
        output_size: usize,
        settings: RecurrentSettings,
        seed: u64,
    ) -> Result<Self, NetworkError> {
        if input_size == 0 || output_size == 0 || settings.hidden_size == 0 {
            return Err(NetworkError::InvalidArchitecture(
                "layer sizes must be positive".to_string(),
            ));
        }
        if settings.sequence_length == 0 || settings.replay_capacity == 0 {
            return Err(NetworkError::InvalidArchitecture(
                "sequence length and replay capacity must be positive".to_string(),
            ));
        }

        Ok(Self {
            input_size,
            output_size,
            settings,
            params: None,
            cell: vec![0.0; settings.hidden_size],
            hidden: vec![0.0; settings.hidden_size],
            history: VecDeque::with_capacity(settings.sequence_length),
            replay: VecDeque::with_capacity(settings.replay_capacity),
            training: true,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Current hidden state
    pub fn hidden_state(&self) -> &[f32] {
        &self.hidden
    }

    /// Current cell state
    pub fn cell_state(&self) -> &[f32] {
        &self.cell
    }

    /// Most recent observations, oldest first
    pub fn history(&self) -> impl Iterator<Item = &[f32]> {
        self.history.iter().map(Vec::as_slice)
    }

    /// Enable or disable dropout
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    /// Number of samples in replay memory
    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Drop every replay sample
    pub fn clear_replay(&mut self) {
        self.replay.clear();
    }

    /// Append a sample to replay memory, evicting the oldest when full
    pub fn store_experience(&mut self, sample: ReplaySample) -> Result<(), NetworkError> {
        if sample.hidden.len() != self.settings.hidden_size {
            return Err(NetworkError::shape(
                "store_experience hidden",
                self.settings.hidden_size,
                sample.hidden.len(),
            ));
        }
        if sample.action.len() != self.output_size {
            return Err(NetworkError::shape(
                "store_experience action",
                self.output_size,
                sample.action.len(),
            ));
        }

        while self.replay.len() >= self.settings.replay_capacity {
            self.replay.pop_front();
        }
        self.replay.push_back(sample);
        Ok(())
    }

    /// Nudge the output projection using a random minibatch from replay
    ///
    /// For each sample: `δ_k = signal · (a_k − y_k) · act_k'(y_k)`, then
    /// `W_out += lr · δ ⊗ h`. Returns the mean squared action gap before the
    /// updates, or 0 when replay memory is empty.
    pub fn train_on_batch(&mut self, batch_size: usize, lr: f32) -> f32 {
        if self.replay.is_empty() || batch_size == 0 {
            return 0.0;
        }
        self.initialize();

        let amount = batch_size.min(self.replay.len());
        let picks = index::sample(&mut self.rng, self.replay.len(), amount);

        let activations: Vec<Activation> =
            (0..self.output_size).map(|axis| self.output_activation(axis)).collect();
        let Some(gates) = self.params.as_mut() else {
            return 0.0;
        };

        let mut gap = 0.0;
        for pick in picks.iter() {
            let sample = &self.replay[pick];
            let mut output = gates.head.forward(&sample.hidden);
            for (y, act) in output.iter_mut().zip(&activations) {
                *y = act.apply(*y);
            }

            let deltas: Vec<f32> = sample
                .action
                .iter()
                .zip(&output)
                .zip(&activations)
                .map(|((&a, &y), act)| {
                    gap += (a - y) * (a - y);
                    sample.signal * (a - y) * act.derivative_from_output(y)
                })
                .collect();

            gates.head.apply_update(&sample.hidden, &deltas, lr);
        }

        gap / (amount * self.output_size) as f32
    }

    fn random_gates(&mut self) -> Gates {
        let concat = self.input_size + self.settings.hidden_size;
        let hidden = self.settings.hidden_size;
        let rng = &mut self.rng;
        Gates {
            forget: DenseLayer::xavier(concat, hidden, rng),
            input: DenseLayer::xavier(concat, hidden, rng),
            candidate: DenseLayer::xavier(concat, hidden, rng),
            output: DenseLayer::xavier(concat, hidden, rng),
            head: DenseLayer::xavier(hidden, self.output_size, rng),
        }
    }

    fn check_input(&self, input: &[f32], context: &'static str) -> Result<(), NetworkError> {
        if input.len() != self.input_size {
            return Err(NetworkError::shape(context, self.input_size, input.len()));
        }
        Ok(())
    }

    fn layer_specs(&self) -> Vec<LayerSpec> {
        let concat = self.input_size + self.settings.hidden_size;
        let hidden = self.settings.hidden_size;
        let mut specs: Vec<LayerSpec> = LAYER_NAMES[..4]
            .iter()
            .map(|&name| LayerSpec { name, in_features: concat, out_features: hidden })
            .collect();
        specs.push(LayerSpec {
            name: LAYER_NAMES[4],
            in_features: hidden,
            out_features: self.output_size,
        });
        specs
    }
}

impl PolicyNetwork for RecurrentNetwork {
    fn kind(&self) -> NetworkKind {
        NetworkKind::Recurrent
    }

    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn output_activation(&self, axis: usize) -> Activation {
        if axis == SHOOT_AXIS {
            Activation::Sigmoid
        } else {
            Activation::Tanh
        }
    }

    fn initialize(&mut self) {
        if self.params.is_none() {
            self.params = Some(self.random_gates());
        }
    }

    fn is_initialized(&self) -> bool {
        self.params.is_some()
    }

    fn forward(&mut self, input: &[f32]) -> Result<Vec<f32>, NetworkError> {
        self.check_input(input, "forward")?;
        self.initialize();
        let Some(gates) = self.params.as_ref() else {
            return Ok(vec![0.0; self.output_size]);
        };

        let z: Vec<f32> = input.iter().chain(&self.hidden).copied().collect();
        let forget = gates.forget.forward(&z);
        let input_gate = gates.input.forward(&z);
        let candidate = gates.candidate.forward(&z);
        let output_gate = gates.output.forward(&z);

        let clip = self.settings.cell_clip;
        for j in 0..self.settings.hidden_size {
            let f = Activation::Sigmoid.apply(forget[j]);
            let i = Activation::Sigmoid.apply(input_gate[j]);
            let g = Activation::Tanh.apply(candidate[j]);
            let o = Activation::Sigmoid.apply(output_gate[j]);

            self.cell[j] = (f * self.cell[j] + i * g).clamp(-clip, clip);
            self.hidden[j] = o * self.cell[j].tanh();
        }

        if self.training && self.settings.dropout > 0.0 {
            for h in self.hidden.iter_mut() {
                if self.rng.gen::<f32>() < self.settings.dropout {
                    *h = 0.0;
                }
            }
        }

        if self.history.len() == self.settings.sequence_length {
            self.history.pop_front();
        }
        self.history.push_back(input.to_vec());

        let mut output = gates.head.forward(&self.hidden);
        for (axis, y) in output.iter_mut().enumerate() {
            *y = self.output_activation(axis).apply(*y);
        }
        Ok(output)
    }

    /// Mean of the post-forward hidden state, bounded to `[-1, 1]`
    ///
    /// Reads the state left by the last `forward`; it does not advance the
    /// memory.
    fn forward_value(&mut self, input: &[f32]) -> Result<f32, NetworkError> {
        self.check_input(input, "forward_value")?;
        self.initialize();
        Ok(self.hidden.iter().sum::<f32>() / self.hidden.len() as f32)
    }

    fn reset_memory(&mut self) {
        self.cell.iter_mut().for_each(|c| *c = 0.0);
        self.hidden.iter_mut().for_each(|h| *h = 0.0);
        self.history.clear();
    }

    fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn architecture(&self) -> Architecture {
        Architecture {
            kind: NetworkKind::Recurrent,
            input_size: self.input_size,
            hidden_sizes: vec![self.settings.hidden_size],
            output_size: self.output_size,
            has_critic: false,
        }
    }

    fn to_document(&mut self) -> NetworkDocument {
        self.initialize();
        let layers = match &self.params {
            Some(gates) => LAYER_NAMES
                .iter()
                .zip(gates.layers())
                .map(|(name, layer)| LayerRecord::from_layer(name, layer))
                .collect(),
            None => Vec::new(),
        };
        NetworkDocument { architecture: self.architecture(), layers }
    }

    fn load_document(&mut self, document: NetworkDocument) -> Result<(), PersistenceError> {
        let specs = self.layer_specs();
        let layers = document.into_layers(&self.architecture(), &specs)?;
        let [forget, input, candidate, output, head]: [DenseLayer; 5] =
            layers.try_into().map_err(|_| PersistenceError::MalformedLayer {
                layer: "gates".to_string(),
                reason: "expected five layers".to_string(),
            })?;

        self.params = Some(Gates { forget, input, candidate, output, head });
        self.reset_memory();
        Ok(())
    }
}
