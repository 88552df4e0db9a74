use std::marker::PhantomData;

use burn::prelude::*;

use crate::columns;
use crate::data::{Batch, StateMap};
use crate::error::Result;
use crate::logging::output_shapes;
use crate::module::component::{Encoder, PolicyHead, ValueFunction, ValueHead};
use crate::module::output::{ForwardMode, ModuleOutput};

/// PPO actor-critic: an encoder feeding a policy head and a value head.
#[derive(Module, Debug)]
pub struct PpoModule<B: Backend, E: Module<B>, P: Module<B>, V: Module<B>> {
    encoder: E,
    pi: P,
    vf: V,
    /// Set on modules that only act, never learn. Exploration then skips
    /// the value head.
    inference_only: bool,
    uses_new_env_runners: bool,
    backend: PhantomData<B>,
}

impl<B, E, P, V> PpoModule<B, E, P, V>
where
    B: Backend,
    E: Module<B> + Encoder<B>,
    P: Module<B> + PolicyHead<B>,
    V: Module<B> + ValueHead<B>,
{
    pub fn new(encoder: E, pi: P, vf: V) -> Self {
        Self {
            encoder,
            pi,
            vf,
            inference_only: false,
            uses_new_env_runners: false,
            backend: PhantomData,
        }
    }

    pub fn with_inference_only(mut self, inference_only: bool) -> Self {
        self.inference_only = inference_only;
        self
    }

    pub fn with_uses_new_env_runners(mut self, uses_new_env_runners: bool) -> Self {
        self.uses_new_env_runners = uses_new_env_runners;
        self
    }

    pub fn inference_only(&self) -> bool {
        self.inference_only
    }

    pub fn uses_new_env_runners(&self) -> bool {
        self.uses_new_env_runners
    }

    pub fn encoder(&self) -> &E {
        &self.encoder
    }

    pub fn pi(&self) -> &P {
        &self.pi
    }

    pub fn vf(&self) -> &V {
        &self.vf
    }

    pub fn forward(&self, mode: ForwardMode, batch: &Batch<B>) -> Result<ModuleOutput<B>> {
        let output = match mode {
            ForwardMode::Inference => self.forward_inference(batch),
            ForwardMode::Exploration => self.forward_exploration(batch),
            ForwardMode::Train => self.forward_train(batch),
        }?;
        tracing::trace!(?mode, shapes = ?output_shapes(&output), "forward pass");
        Ok(output)
    }

    pub fn forward_inference(&self, batch: &Batch<B>) -> Result<ModuleOutput<B>> {
        let encoder_outs = self.encoder.encode(batch)?;
        Ok(ModuleOutput {
            state_out: encoder_outs.state_out,
            vf_preds: None,
            action_dist_inputs: self.pi.action_dist_inputs(encoder_outs.actor),
        })
    }

    /// Besides the action distribution inputs, returns value predictions so
    /// the rollout can be bootstrapped, unless this module is inference-only.
    pub fn forward_exploration(&self, batch: &Batch<B>) -> Result<ModuleOutput<B>> {
        if self.uses_new_env_runners {
            return self.forward_inference(batch);
        }

        let encoder_outs = self.encoder.encode(batch)?;
        let vf_preds = match self.inference_only {
            true => None,
            false => Some(self.squeezed_values(encoder_outs.critic)),
        };
        Ok(ModuleOutput {
            state_out: encoder_outs.state_out,
            vf_preds,
            action_dist_inputs: self.pi.action_dist_inputs(encoder_outs.actor),
        })
    }

    pub fn forward_train(&self, batch: &Batch<B>) -> Result<ModuleOutput<B>> {
        let encoder_outs = self.encoder.encode(batch)?;
        Ok(ModuleOutput {
            state_out: encoder_outs.state_out,
            vf_preds: Some(self.squeezed_values(encoder_outs.critic)),
            action_dist_inputs: self.pi.action_dist_inputs(encoder_outs.actor),
        })
    }

    pub fn initial_state(&self, batch_size: usize, device: &B::Device) -> Option<StateMap<B>> {
        self.encoder.initial_state(batch_size, device)
    }

    pub fn is_stateful(&self) -> bool {
        self.initial_state(1, &self.device()).is_some()
    }

    fn squeezed_values(&self, latent: Tensor<B, 2>) -> Tensor<B, 1> {
        // Single value node.
        self.vf.values(latent).squeeze(1)
    }

    fn device(&self) -> B::Device {
        self.vf.devices().into_iter().next().unwrap_or_default()
    }
}

impl<B, E, P, V> ValueFunction<B> for PpoModule<B, E, P, V>
where
    B: Backend,
    E: Module<B> + Encoder<B>,
    P: Module<B> + PolicyHead<B>,
    V: Module<B> + ValueHead<B>,
{
    /// Infos may hold arbitrary per-example data, so they are held out of the
    /// conversion and put back untouched.
    fn compute_values(&self, batch: &mut Batch<B>) -> Result<Tensor<B, 1>> {
        let infos = batch.remove(columns::INFOS);
        let converted = batch
            .to_tensors(&self.device())
            .map(|converted| *batch = converted);
        if let Some(infos) = infos {
            batch.insert(columns::INFOS, infos);
        }
        converted?;

        let latent = match self.encoder.critic_encoder() {
            Some(critic_encoder) => critic_encoder.encode_critic(batch)?,
            None => self.encoder.encode(batch)?.critic,
        };
        Ok(self.squeezed_values(latent))
    }
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::TensorData;
    use expect_test::expect;
    use serde_json::json;

    use super::*;
    use crate::data::BatchValue;
    use crate::error::ModuleError;
    use crate::module::component::{CriticEncoder, EncoderOutput};

    type B = NdArray;

    /// Actor latent is the observation itself, the shared critic latent too.
    /// The dedicated critic path doubles it. Stateful stubs add one to the
    /// incoming state.
    #[derive(Module, Debug)]
    struct StubEncoder<B: Backend> {
        stateful: bool,
        dedicated_critic: bool,
        backend: PhantomData<B>,
    }

    impl<B: Backend> StubEncoder<B> {
        fn new(stateful: bool, dedicated_critic: bool) -> Self {
            Self {
                stateful,
                dedicated_critic,
                backend: PhantomData,
            }
        }
    }

    impl<B: Backend> Encoder<B> for StubEncoder<B> {
        fn encode(&self, batch: &Batch<B>) -> Result<EncoderOutput<B>> {
            let obs = batch.observations()?.clone().into_batch_matrix();
            let state_out = match self.stateful {
                true => {
                    let state = batch
                        .state_in()?
                        .ok_or_else(|| ModuleError::MissingColumn(columns::STATE_IN.to_string()))?;
                    Some(state.into_iter().map(|(k, t)| (k, t + 1.0)).collect())
                }
                false => None,
            };
            Ok(EncoderOutput {
                actor: obs.clone(),
                critic: obs,
                state_out,
            })
        }

        fn critic_encoder(&self) -> Option<&dyn CriticEncoder<B>> {
            match self.dedicated_critic {
                true => Some(self),
                false => None,
            }
        }

        fn initial_state(&self, batch_size: usize, device: &B::Device) -> Option<StateMap<B>> {
            match self.stateful {
                true => Some(StateMap::from([(
                    columns::HIDDEN.to_string(),
                    Tensor::zeros([batch_size, 2], device),
                )])),
                false => None,
            }
        }
    }

    impl<B: Backend> CriticEncoder<B> for StubEncoder<B> {
        fn encode_critic(&self, batch: &Batch<B>) -> Result<Tensor<B, 2>> {
            Ok(batch.observations()?.clone().into_batch_matrix() * 2.0)
        }
    }

    /// Identity policy head.
    #[derive(Module, Debug)]
    struct StubPolicy<B: Backend> {
        backend: PhantomData<B>,
    }

    impl<B: Backend> PolicyHead<B> for StubPolicy<B> {
        fn action_dist_inputs(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
            latent
        }
    }

    /// Sums the latent into a single value node.
    #[derive(Module, Debug)]
    struct StubValue<B: Backend> {
        backend: PhantomData<B>,
    }

    impl<B: Backend> ValueHead<B> for StubValue<B> {
        fn values(&self, latent: Tensor<B, 2>) -> Tensor<B, 2> {
            latent.sum_dim(1)
        }
    }

    type StubModule = PpoModule<B, StubEncoder<B>, StubPolicy<B>, StubValue<B>>;

    fn stub_module(stateful: bool, dedicated_critic: bool) -> StubModule {
        PpoModule::new(
            StubEncoder::new(stateful, dedicated_critic),
            StubPolicy {
                backend: PhantomData,
            },
            StubValue {
                backend: PhantomData,
            },
        )
    }

    fn observations() -> Tensor<B, 2> {
        Tensor::from_floats([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], &Default::default())
    }

    fn stateful_batch() -> Batch<B> {
        let mut batch = Batch::<B>::new().with(columns::OBS, observations());
        batch.set_state_in(StateMap::from([(
            columns::HIDDEN.to_string(),
            Tensor::from_floats([[0.5, -0.5], [1.5, 2.5]], &Default::default()),
        )]));
        batch
    }

    fn all_modes() -> [ForwardMode; 3] {
        [
            ForwardMode::Inference,
            ForwardMode::Exploration,
            ForwardMode::Train,
        ]
    }

    fn to_vec<const D: usize>(tensor: Tensor<B, D>) -> Vec<f32> {
        tensor.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_stateless_encoder_never_emits_state_out() {
        let module = stub_module(false, false);
        let batch = Batch::<B>::new().with(columns::OBS, observations());
        for mode in all_modes() {
            let output = module.forward(mode, &batch).unwrap();
            assert!(!output.contains(columns::STATE_OUT), "{mode:?}");
        }
    }

    #[test]
    fn test_state_out_is_passed_through_unchanged() {
        let module = stub_module(true, false);
        let batch = stateful_batch();
        let expected = module.encoder().encode(&batch).unwrap().state_out.unwrap();
        for mode in all_modes() {
            let output = module.forward(mode, &batch).unwrap();
            let state_out = output.state_out.expect("stateful encoder emits state_out");
            assert_eq!(
                to_vec(state_out[columns::HIDDEN].clone()),
                to_vec(expected[columns::HIDDEN].clone()),
                "{mode:?}"
            );
        }
        assert_eq!(
            to_vec(expected[columns::HIDDEN].clone()),
            vec![1.5, 0.5, 2.5, 3.5]
        );
    }

    #[test]
    fn test_exploration_matches_inference_under_new_env_runners() {
        let module = stub_module(true, false).with_uses_new_env_runners(true);
        let batch = stateful_batch();
        let inference = module.forward_inference(&batch).unwrap();
        let exploration = module.forward_exploration(&batch).unwrap();

        assert_eq!(inference.keys(), exploration.keys());
        assert_eq!(
            to_vec(inference.action_dist_inputs),
            to_vec(exploration.action_dist_inputs)
        );
        assert_eq!(
            to_vec(inference.state_out.unwrap()[columns::HIDDEN].clone()),
            to_vec(exploration.state_out.unwrap()[columns::HIDDEN].clone())
        );
    }

    #[test]
    fn test_exploration_value_predictions_follow_inference_only() {
        let batch = Batch::<B>::new().with(columns::OBS, observations());

        let learner = stub_module(false, false);
        let output = learner.forward_exploration(&batch).unwrap();
        let vf_preds = output.vf_preds.expect("learner module predicts values");
        assert_eq!(vf_preds.dims(), [2]);
        assert_eq!(to_vec(vf_preds), vec![6.0, 15.0]);

        let actor = stub_module(false, false).with_inference_only(true);
        let output = actor.forward_exploration(&batch).unwrap();
        assert!(!output.contains(columns::VF_PREDS));
        assert!(output.contains(columns::ACTION_DIST_INPUTS));
    }

    #[test]
    fn test_train_always_predicts_values() {
        let batch = Batch::<B>::new().with(columns::OBS, observations());
        for inference_only in [false, true] {
            let module = stub_module(false, false).with_inference_only(inference_only);
            let output = module.forward_train(&batch).unwrap();
            assert!(output.contains(columns::VF_PREDS));
            assert!(output.contains(columns::ACTION_DIST_INPUTS));
            assert_eq!(to_vec(output.action_dist_inputs), to_vec(observations()));
        }
    }

    #[test]
    fn test_output_keys() {
        let module = stub_module(true, false);
        let output = module.forward_exploration(&stateful_batch()).unwrap();
        expect![[r#"
            [
                "state_out",
                "vf_preds",
                "action_dist_inputs",
            ]
        "#]]
        .assert_debug_eq(&output.keys());

        let output = module.forward_inference(&stateful_batch()).unwrap();
        expect![[r#"
            [
                "state_out",
                "action_dist_inputs",
            ]
        "#]]
        .assert_debug_eq(&output.keys());
    }

    #[test]
    fn test_compute_values_is_squeezed() {
        let module = stub_module(false, false);
        let mut batch = Batch::<B>::new().with(columns::OBS, observations());
        let values = module.compute_values(&mut batch).unwrap();
        assert_eq!(values.dims(), [2]);
        assert_eq!(to_vec(values), vec![6.0, 15.0]);
    }

    #[test]
    fn test_compute_values_prefers_dedicated_critic_encoder() {
        let module = stub_module(false, true);
        let mut batch = Batch::<B>::new().with(columns::OBS, observations());
        let values = module.compute_values(&mut batch).unwrap();
        assert_eq!(to_vec(values), vec![12.0, 30.0]);
    }

    #[test]
    fn test_compute_values_converts_batch_and_keeps_infos() {
        let module = stub_module(false, false);
        let infos = vec![json!({"lives": 3}), json!({"lives": 1})];
        let mut batch = Batch::<B>::new()
            .with(
                columns::OBS,
                TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [2, 3]),
            )
            .with(columns::INFOS, infos.clone());

        let values = module.compute_values(&mut batch).unwrap();
        assert_eq!(to_vec(values), vec![6.0, 15.0]);
        assert!(matches!(batch.get(columns::OBS), Some(BatchValue::Tensor(_))));
        match batch.get(columns::INFOS) {
            Some(BatchValue::Infos(kept)) => assert_eq!(kept, &infos),
            other => panic!("infos should be kept unconverted, got {other:?}"),
        }
    }

    #[test]
    fn test_compute_values_does_not_add_infos() {
        let module = stub_module(false, false);
        let mut batch = Batch::<B>::new().with(columns::OBS, observations());
        module.compute_values(&mut batch).unwrap();
        assert!(!batch.contains(columns::INFOS));
    }

    #[test]
    fn test_compute_values_propagates_conversion_errors() {
        let module = stub_module(false, false);
        let mut batch = Batch::<B>::new()
            .with(columns::OBS, observations())
            .with("env_meta", vec![json!("not a tensor")])
            .with(columns::INFOS, vec![json!({})]);

        let error = module.compute_values(&mut batch).unwrap_err();
        assert_eq!(
            error.to_string(),
            "entry `env_meta` cannot be converted to a tensor"
        );
        assert!(batch.contains(columns::INFOS));
    }

    #[test]
    fn test_collaborator_errors_propagate() {
        let module = stub_module(false, false);
        let batch = Batch::<B>::new();
        for mode in all_modes() {
            assert!(matches!(
                module.forward(mode, &batch),
                Err(ModuleError::MissingColumn(column)) if column == columns::OBS
            ));
        }
    }

    #[test]
    fn test_statefulness_follows_encoder() {
        assert!(stub_module(true, false).is_stateful());
        assert!(!stub_module(false, false).is_stateful());
        let state = stub_module(true, false)
            .initial_state(4, &Default::default())
            .unwrap();
        assert_eq!(state[columns::HIDDEN].dims(), [4, 2]);
    }
}
