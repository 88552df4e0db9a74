use burn::nn::{Lstm, LstmConfig, LstmState};
use burn::prelude::*;

use crate::columns;
use crate::data::{AnyTensor, Batch, StateMap};
use crate::error::{self, ModuleError};
use crate::module::component::{CriticEncoder, Encoder, EncoderOutput};

use super::multi_layer_perceptron::{MultiLayerPerceptron, MultiLayerPerceptronConfig};

#[derive(Config, Debug)]
pub struct MlpEncoderConfig {
    pub input_size: usize,
    pub hidden_sizes: Vec<usize>,
    /// Actor and critic read the same trunk when set.
    #[config(default = false)]
    pub shared: bool,
    #[config(default = 0.01)]
    pub negative_slope: f64,
}

/// Feed-forward encoder with an actor trunk and, unless shared, a critic trunk.
#[derive(Module, Debug)]
pub struct MlpEncoder<B: Backend> {
    actor: MultiLayerPerceptron<B>,
    critic: Option<MultiLayerPerceptron<B>>,
}

impl MlpEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<MlpEncoder<B>> {
        let trunk = self.trunk_config()?;
        let actor = trunk.init(device)?;
        let critic = match self.shared {
            true => None,
            false => Some(trunk.init(device)?),
        };
        Ok(MlpEncoder { actor, critic })
    }

    pub fn output_size(&self) -> Option<usize> {
        self.hidden_sizes.last().copied()
    }

    fn trunk_config(&self) -> error::Result<MultiLayerPerceptronConfig> {
        if self.hidden_sizes.is_empty() {
            return Err(ModuleError::InvalidConfig(
                "an MLP encoder needs at least one hidden layer".to_string(),
            ));
        }
        let mut sizes = vec![self.input_size];
        sizes.extend_from_slice(&self.hidden_sizes);
        Ok(MultiLayerPerceptronConfig::new(sizes)
            .with_negative_slope(self.negative_slope)
            .with_activate_output(true))
    }
}

impl<B: Backend> MlpEncoder<B> {
    pub fn is_shared(&self) -> bool {
        self.critic.is_none()
    }
}

impl<B: Backend> Encoder<B> for MlpEncoder<B> {
    fn encode(&self, batch: &Batch<B>) -> error::Result<EncoderOutput<B>> {
        let obs = batch.observations()?.clone().into_batch_matrix();
        let actor = self.actor.forward(obs.clone());
        let critic = match &self.critic {
            Some(critic) => critic.forward(obs),
            None => actor.clone(),
        };
        Ok(EncoderOutput {
            actor,
            critic,
            state_out: None,
        })
    }

    fn critic_encoder(&self) -> Option<&dyn CriticEncoder<B>> {
        match self.critic {
            Some(_) => Some(self),
            None => None,
        }
    }
}

impl<B: Backend> CriticEncoder<B> for MlpEncoder<B> {
    fn encode_critic(&self, batch: &Batch<B>) -> error::Result<Tensor<B, 2>> {
        let obs = batch.observations()?.clone().into_batch_matrix();
        let trunk = self.critic.as_ref().unwrap_or(&self.actor);
        Ok(trunk.forward(obs))
    }
}

#[derive(Config, Debug)]
pub struct LstmEncoderConfig {
    pub input_size: usize,
    #[config(default = 256)]
    pub cell_size: usize,
    /// Widths of the feed-forward tokenizer in front of the LSTM. Empty feeds
    /// observations straight into the cell.
    #[config(default = "Vec::new()")]
    pub tokenizer_sizes: Vec<usize>,
    #[config(default = 0.01)]
    pub negative_slope: f64,
}

/// Shared recurrent encoder. Reads `state_in.{h,c}` and always emits
/// `state_out.{h,c}`.
#[derive(Module, Debug)]
pub struct LstmEncoder<B: Backend> {
    tokenizer: Option<MultiLayerPerceptron<B>>,
    lstm: Lstm<B>,
    cell_size: usize,
}

impl LstmEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<LstmEncoder<B>> {
        if self.cell_size == 0 {
            return Err(ModuleError::InvalidConfig(
                "LSTM cell size must be positive".to_string(),
            ));
        }
        let (tokenizer, lstm_input) = match self.tokenizer_sizes.last() {
            Some(&width) => {
                let mut sizes = vec![self.input_size];
                sizes.extend_from_slice(&self.tokenizer_sizes);
                let tokenizer = MultiLayerPerceptronConfig::new(sizes)
                    .with_negative_slope(self.negative_slope)
                    .with_activate_output(true)
                    .init(device)?;
                (Some(tokenizer), width)
            }
            None => (None, self.input_size),
        };
        Ok(LstmEncoder {
            tokenizer,
            lstm: LstmConfig::new(lstm_input, self.cell_size, true).init(device),
            cell_size: self.cell_size,
        })
    }
}

impl<B: Backend> LstmEncoder<B> {
    fn zero_state(&self, batch_size: usize, device: &B::Device) -> StateMap<B> {
        let mut state = StateMap::new();
        for key in [columns::HIDDEN, columns::CELL] {
            state.insert(
                key.to_string(),
                Tensor::zeros([batch_size, self.cell_size], device),
            );
        }
        state
    }

    fn state_component(state: &StateMap<B>, key: &str) -> error::Result<Tensor<B, 2>> {
        state
            .get(key)
            .cloned()
            .ok_or_else(|| ModuleError::MissingColumn(format!("{}/{key}", columns::STATE_IN)))
    }
}

impl<B: Backend> Encoder<B> for LstmEncoder<B> {
    fn encode(&self, batch: &Batch<B>) -> error::Result<EncoderOutput<B>> {
        // [batch, obs] is a single time step, [batch, time, obs] a sequence.
        let sequence: Tensor<B, 3> = match batch.observations()? {
            AnyTensor::Rank2(obs) => obs.clone().unsqueeze_dim(1),
            AnyTensor::Rank3(obs) => obs.clone(),
            other => {
                return Err(ModuleError::RankMismatch {
                    column: columns::OBS.to_string(),
                    expected: 3,
                    actual: other.rank(),
                })
            }
        };
        let [batch_size, _, _] = sequence.dims();
        let sequence = match &self.tokenizer {
            Some(tokenizer) => tokenizer.forward(sequence),
            None => sequence,
        };

        let state = match batch.state_in()? {
            Some(state) => state,
            None => {
                let device = sequence.device();
                tracing::debug!(batch_size, "no state_in, starting from zero state");
                self.zero_state(batch_size, &device)
            }
        };
        let hidden = Self::state_component(&state, columns::HIDDEN)?;
        let cell = Self::state_component(&state, columns::CELL)?;

        let (output, next) = self.lstm.forward(sequence, Some(LstmState::new(cell, hidden)));
        let [batch_size, time, width] = output.dims();
        let latent = output.reshape([batch_size * time, width]);

        let mut state_out = StateMap::new();
        state_out.insert(columns::HIDDEN.to_string(), next.hidden);
        state_out.insert(columns::CELL.to_string(), next.cell);
        Ok(EncoderOutput {
            actor: latent.clone(),
            critic: latent,
            state_out: Some(state_out),
        })
    }

    fn initial_state(&self, batch_size: usize, device: &B::Device) -> Option<StateMap<B>> {
        Some(self.zero_state(batch_size, device))
    }
}
