//! Action distributions parameterized by a module's `action_dist_inputs`.

mod categorical;
mod gaussian;

pub use categorical::Categorical;
pub use gaussian::DiagGaussian;

use burn::prelude::*;

pub trait ActionDistribution<B: Backend>: Sized {
    type Action: Clone;

    fn from_inputs(inputs: Tensor<B, 2>) -> Self;

    fn sample(&self) -> Self::Action;

    /// Most likely action.
    fn deterministic_sample(&self) -> Self::Action;

    /// Log-likelihood of `actions`, `[batch]`.
    fn logp(&self, actions: &Self::Action) -> Tensor<B, 1>;

    fn entropy(&self) -> Tensor<B, 1>;

    /// KL(self || other), `[batch]`.
    fn kl(&self, other: &Self) -> Tensor<B, 1>;
}
