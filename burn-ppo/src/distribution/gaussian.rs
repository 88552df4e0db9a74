use std::f64::consts::PI;

use burn::prelude::*;
use burn::tensor::Distribution;

use super::ActionDistribution;

/// Diagonal Gaussian. Inputs are `[batch, 2 * d]`, the mean followed by the
/// log standard deviation, so their width must be even.
#[derive(Clone, Debug)]
pub struct DiagGaussian<B: Backend> {
    mean: Tensor<B, 2>,
    log_std: Tensor<B, 2>,
}

impl<B: Backend> DiagGaussian<B> {
    pub fn mean(&self) -> &Tensor<B, 2> {
        &self.mean
    }

    pub fn log_std(&self) -> &Tensor<B, 2> {
        &self.log_std
    }
}

fn half_log_two_pi() -> f64 {
    0.5 * (2.0 * PI).ln()
}

impl<B: Backend> ActionDistribution<B> for DiagGaussian<B> {
    type Action = Tensor<B, 2>;

    fn from_inputs(inputs: Tensor<B, 2>) -> Self {
        let [batch_size, width] = inputs.dims();
        debug_assert!(width % 2 == 0, "odd distribution input width {width}");
        let d = width / 2;
        Self {
            mean: inputs.clone().slice([0..batch_size, 0..d]),
            log_std: inputs.slice([0..batch_size, d..2 * d]),
        }
    }

    fn sample(&self) -> Self::Action {
        let noise = Tensor::<B, 2>::random(
            self.mean.shape(),
            Distribution::Normal(0.0, 1.0),
            &self.mean.device(),
        );
        self.mean.clone() + noise * self.log_std.clone().exp()
    }

    fn deterministic_sample(&self) -> Self::Action {
        self.mean.clone()
    }

    fn logp(&self, actions: &Self::Action) -> Tensor<B, 1> {
        let z = (actions.clone() - self.mean.clone()) / self.log_std.clone().exp();
        (z.powf_scalar(2.0).mul_scalar(-0.5) - self.log_std.clone())
            .sub_scalar(half_log_two_pi())
            .sum_dim(1)
            .squeeze(1)
    }

    fn entropy(&self) -> Tensor<B, 1> {
        self.log_std
            .clone()
            .add_scalar(0.5 + half_log_two_pi())
            .sum_dim(1)
            .squeeze(1)
    }

    fn kl(&self, other: &Self) -> Tensor<B, 1> {
        let var_p = self.log_std.clone().mul_scalar(2.0).exp();
        let var_q = other.log_std.clone().mul_scalar(2.0).exp();
        let mean_gap = (self.mean.clone() - other.mean.clone()).powf_scalar(2.0);
        ((other.log_std.clone() - self.log_std.clone()) + (var_p + mean_gap) / var_q.mul_scalar(2.0))
            .sub_scalar(0.5)
            .sum_dim(1)
            .squeeze(1)
    }
}
