use burn::{prelude::Backend, tensor::Tensor};

use crate::data::{Batch, StateMap};
use crate::error::Result;

/// Latents produced by an encoder for one batch.
#[derive(Clone, Debug)]
pub struct EncoderOutput<B: Backend> {
    pub actor: Tensor<B, 2>,
    pub critic: Tensor<B, 2>,
    /// Outgoing recurrent state. `None` for feed-forward encoders.
    pub state_out: Option<StateMap<B>>,
}

pub trait Encoder<B: Backend> {
    fn encode(&self, batch: &Batch<B>) -> Result<EncoderOutput<B>>;

    /// Critic-only path, for encoders that keep a separate value trunk.
    fn critic_encoder(&self) -> Option<&dyn CriticEncoder<B>> {
        None
    }

    fn initial_state(&self, _batch_size: usize, _device: &B::Device) -> Option<StateMap<B>> {
        None
    }
}

pub trait CriticEncoder<B: Backend> {
    fn encode_critic(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>>;
}

pub trait PolicyHead<B: Backend> {
    /// `[batch, latent]` to `[batch, dist_inputs]`.
    fn action_dist_inputs(&self, latent: Tensor<B, 2>) -> Tensor<B, 2>;
}

pub trait ValueHead<B: Backend> {
    /// `[batch, latent]` to `[batch, 1]`.
    fn values(&self, latent: Tensor<B, 2>) -> Tensor<B, 2>;
}

pub trait ValueFunction<B: Backend> {
    fn compute_values(&self, batch: &mut Batch<B>) -> Result<Tensor<B, 1>>;
}
