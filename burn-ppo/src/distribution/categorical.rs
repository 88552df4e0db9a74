use burn::prelude::*;
use burn::tensor::activation::log_softmax;
use burn::tensor::Distribution;

use super::ActionDistribution;

/// Upper bound of the uniform draws behind the Gumbel noise. Must stay below
/// 1.0 once cast to `f32`, where `-ln(-ln(u))` would be infinite.
const UNIFORM_HIGH: f64 = 1.0 - f32::EPSILON as f64;

/// Categorical distribution over `[batch, n_actions]` logits.
#[derive(Clone, Debug)]
pub struct Categorical<B: Backend> {
    logits: Tensor<B, 2>,
}

impl<B: Backend> Categorical<B> {
    pub fn logits(&self) -> &Tensor<B, 2> {
        &self.logits
    }

    fn log_probs(&self) -> Tensor<B, 2> {
        log_softmax(self.logits.clone(), 1)
    }

    fn gumbel_noise(&self) -> Tensor<B, 2> {
        let uniform = Tensor::<B, 2>::random(
            self.logits.shape(),
            Distribution::Uniform(f64::EPSILON, UNIFORM_HIGH),
            &self.logits.device(),
        );
        uniform.log().neg().log().neg()
    }
}

impl<B: Backend> ActionDistribution<B> for Categorical<B> {
    type Action = Tensor<B, 1, Int>;

    fn from_inputs(inputs: Tensor<B, 2>) -> Self {
        Self { logits: inputs }
    }

    /// Gumbel-max sampling.
    fn sample(&self) -> Self::Action {
        (self.logits.clone() + self.gumbel_noise()).argmax(1).squeeze(1)
    }

    fn deterministic_sample(&self) -> Self::Action {
        self.logits.clone().argmax(1).squeeze(1)
    }

    fn logp(&self, actions: &Self::Action) -> Tensor<B, 1> {
        self.log_probs()
            .gather(1, actions.clone().unsqueeze_dim(1))
            .squeeze(1)
    }

    fn entropy(&self) -> Tensor<B, 1> {
        let log_probs = self.log_probs();
        (log_probs.clone().exp() * log_probs)
            .sum_dim(1)
            .squeeze::<1>(1)
            .neg()
    }

    fn kl(&self, other: &Self) -> Tensor<B, 1> {
        let log_p = self.log_probs();
        let log_q = other.log_probs();
        (log_p.clone().exp() * (log_p - log_q)).sum_dim(1).squeeze(1)
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;

    use super::*;

    type B = NdArray;

    fn distribution() -> Categorical<B> {
        Categorical::from_inputs(Tensor::from_floats(
            [[0.0, 0.0, 0.0, 0.0], [1.0, 3.0, -2.0, 0.5]],
            &Default::default(),
        ))
    }

    #[test]
    fn test_uniform_logits_have_maximal_entropy() {
        let entropy = distribution().entropy().into_data().to_vec::<f32>().unwrap();
        assert!((entropy[0] - 4.0f32.ln()).abs() < 1e-5);
        assert!(entropy[1] < entropy[0]);
    }

    #[test]
    fn test_deterministic_sample_is_argmax() {
        let actions = distribution().deterministic_sample();
        assert_eq!(actions.into_data().to_vec::<i64>().unwrap()[1], 1);
    }

    #[test]
    fn test_logp_is_normalized() {
        let dist = distribution();
        let device = &Default::default();
        let total: f32 = (0..4)
            .map(|a| {
                let actions = Tensor::<B, 1, Int>::from_ints([a, a], device);
                dist.logp(&actions).exp().into_data().to_vec::<f32>().unwrap()[1]
            })
            .sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_samples_are_valid_actions() {
        let device = &Default::default();
        let dist = Categorical::<B>::from_inputs(Tensor::from_floats(
            [[0.0, 0.0, -1e9], [0.0, 0.0, -1e9]],
            device,
        ));
        for _ in 0..20 {
            let actions = dist.sample().into_data().to_vec::<i64>().unwrap();
            assert!(actions.iter().all(|a| (0..2).contains(a)));
        }
    }

    #[test]
    fn test_gumbel_noise_is_finite() {
        assert!((UNIFORM_HIGH as f32) < 1.0);
        let dist = Categorical::<B>::from_inputs(Tensor::zeros([256, 64], &Default::default()));
        let noise = dist.gumbel_noise().into_data().to_vec::<f32>().unwrap();
        assert!(noise.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_kl_with_itself_is_zero() {
        let dist = distribution();
        let kl = dist.kl(&dist).into_data().to_vec::<f32>().unwrap();
        assert!(kl.iter().all(|v| v.abs() < 1e-6));
    }
}
