use burn::prelude::*;

use crate::error::{self, ModuleError};
use crate::module::component::Encoder;
use crate::module::nn::encoder::{LstmEncoder, LstmEncoderConfig, MlpEncoder, MlpEncoderConfig};
use crate::module::nn::multi_layer_perceptron::{MultiLayerPerceptron, MultiLayerPerceptronConfig};
use crate::module::ppo::PpoModule;

#[derive(Config, Debug, PartialEq)]
pub enum ActionSpace {
    /// `n` discrete actions; the policy emits one logit per action.
    Discrete(usize),
    /// `d`-dimensional box; the policy emits a mean and a log std per dimension.
    Continuous(usize),
}

impl ActionSpace {
    pub fn dist_input_size(&self) -> usize {
        match self {
            Self::Discrete(n) => *n,
            Self::Continuous(d) => 2 * d,
        }
    }
}

pub type MlpPpoModule<B> =
    PpoModule<B, MlpEncoder<B>, MultiLayerPerceptron<B>, MultiLayerPerceptron<B>>;
pub type LstmPpoModule<B> =
    PpoModule<B, LstmEncoder<B>, MultiLayerPerceptron<B>, MultiLayerPerceptron<B>>;

/// Builds a [`PpoModule`] with default encoder and heads.
#[derive(Config, Debug)]
pub struct PpoModuleConfig {
    pub observation_size: usize,
    pub action_space: ActionSpace,
    #[config(default = "vec![256, 256]")]
    pub hidden_sizes: Vec<usize>,
    /// Hidden widths of the policy and value heads.
    #[config(default = "Vec::new()")]
    pub head_hidden_sizes: Vec<usize>,
    /// Let the value head read the actor trunk instead of its own.
    #[config(default = false)]
    pub vf_share_layers: bool,
    #[config(default = 256)]
    pub lstm_cell_size: usize,
    #[config(default = 0.01)]
    pub negative_slope: f64,
    #[config(default = false)]
    pub inference_only: bool,
    #[config(default = false)]
    pub uses_new_env_runners: bool,
}

impl PpoModuleConfig {
    pub fn mlp_encoder(&self) -> MlpEncoderConfig {
        MlpEncoderConfig::new(self.observation_size, self.hidden_sizes.clone())
            .with_shared(self.vf_share_layers)
            .with_negative_slope(self.negative_slope)
    }

    /// The hidden sizes become the tokenizer in front of the cell. The
    /// recurrent trunk is always shared.
    pub fn lstm_encoder(&self) -> LstmEncoderConfig {
        LstmEncoderConfig::new(self.observation_size)
            .with_cell_size(self.lstm_cell_size)
            .with_tokenizer_sizes(self.hidden_sizes.clone())
            .with_negative_slope(self.negative_slope)
    }

    pub fn pi_head(&self, latent_size: usize) -> MultiLayerPerceptronConfig {
        self.head(latent_size, self.action_space.dist_input_size())
    }

    pub fn vf_head(&self, latent_size: usize) -> MultiLayerPerceptronConfig {
        self.head(latent_size, 1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<MlpPpoModule<B>> {
        let encoder_config = self.mlp_encoder();
        let latent_size = encoder_config.output_size().ok_or_else(|| {
            ModuleError::InvalidConfig("an MLP encoder needs at least one hidden layer".to_string())
        })?;
        let encoder = encoder_config.init(device)?;
        self.init_with(encoder, latent_size, device)
    }

    pub fn init_recurrent<B: Backend>(
        &self,
        device: &B::Device,
    ) -> error::Result<LstmPpoModule<B>> {
        let encoder = self.lstm_encoder().init(device)?;
        self.init_with(encoder, self.lstm_cell_size, device)
    }

    /// Wraps a custom encoder whose latents are `latent_size` wide.
    pub fn init_with<B, E>(
        &self,
        encoder: E,
        latent_size: usize,
        device: &B::Device,
    ) -> error::Result<PpoModule<B, E, MultiLayerPerceptron<B>, MultiLayerPerceptron<B>>>
    where
        B: Backend,
        E: Module<B> + Encoder<B>,
    {
        if self.action_space.dist_input_size() == 0 {
            return Err(ModuleError::InvalidConfig(format!(
                "empty action space {:?}",
                self.action_space
            )));
        }
        let pi = self.pi_head(latent_size).init(device)?;
        let vf = self.vf_head(latent_size).init(device)?;
        tracing::debug!(
            observation_size = self.observation_size,
            action_space = ?self.action_space,
            latent_size,
            inference_only = self.inference_only,
            "built PPO module"
        );
        Ok(PpoModule::new(encoder, pi, vf)
            .with_inference_only(self.inference_only)
            .with_uses_new_env_runners(self.uses_new_env_runners))
    }

    fn head(&self, latent_size: usize, output_size: usize) -> MultiLayerPerceptronConfig {
        let mut sizes = vec![latent_size];
        sizes.extend_from_slice(&self.head_hidden_sizes);
        sizes.push(output_size);
        MultiLayerPerceptronConfig::new(sizes).with_negative_slope(self.negative_slope)
    }
}
