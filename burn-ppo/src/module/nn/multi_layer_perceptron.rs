use burn::module::Module;
use burn::nn::Linear;
use burn::prelude::*;
use nn::{LeakyRelu, LeakyReluConfig, LinearConfig};

use crate::error::{self, ModuleError};
use crate::module::component::{PolicyHead, ValueHead};

#[derive(Config, Debug)]
pub struct MultiLayerPerceptronConfig {
    /// Layer widths: input, hidden..., output.
    pub sizes: Vec<usize>,
    #[config(default = 0.01)]
    pub negative_slope: f64,
    /// Apply the activation after the last layer as well. Encoder trunks set
    /// this, heads do not.
    #[config(default = false)]
    pub activate_output: bool,
}

#[derive(Module, Debug)]
pub struct MultiLayerPerceptron<B: Backend> {
    linear_layers: Vec<Linear<B>>,
    activation: LeakyRelu,
    activate_output: bool,
}

impl MultiLayerPerceptronConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> error::Result<MultiLayerPerceptron<B>> {
        self.validate()?;

        let linear_layers = self
            .sizes
            .windows(2)
            .map(|pair| LinearConfig::new(pair[0], pair[1]).init(device))
            .collect();
        let activation = LeakyReluConfig::new()
            .with_negative_slope(self.negative_slope)
            .init();
        Ok(MultiLayerPerceptron {
            linear_layers,
            activation,
            activate_output: self.activate_output,
        })
    }

    pub fn output_size(&self) -> Option<usize> {
        self.sizes.last().copied()
    }

    fn validate(&self) -> error::Result<()> {
        if self.sizes.len() < 2 {
            return Err(ModuleError::InvalidConfig(format!(
                "an MLP needs (input size, hidden size, ..., output size), got {:?}",
                self.sizes
            )));
        }
        if self.sizes.contains(&0) {
            return Err(ModuleError::InvalidConfig(format!(
                "MLP layer sizes must be positive, got {:?}",
                self.sizes
            )));
        }
        Ok(())
    }
}

impl<B: Backend> MultiLayerPerceptron<B> {
    pub fn forward<const D: usize>(&self, input: Tensor<B, D>) -> Tensor<B, D> {
        let mut x = input;

        match self.linear_layers.last() {
            Some(f) => {
                for layer in self.linear_layers[..self.linear_layers.len() - 1].iter() {
                    x = layer.forward(x);
                    x = self.activation.forward(x);
                }
                let x = f.forward(x);
                if self.activate_output {
                    self.activation.forward(x)
                } else {
                    x
                }
            }
            None => x,
        }
    }
}

impl<B: Backend> PolicyHead<B> for MultiLayerPerceptron<B> {
    fn action_dist_inputs(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(latent)
    }
}

impl<B: Backend> ValueHead<B> for MultiLayerPerceptron<B> {
    fn values(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward(latent)
    }
}
