use burn::config::Config;
use burn::prelude::*;
use burn::tensor::{ElementConversion, TensorData};
use burn_ppo::{
    columns,
    distribution::{ActionDistribution, Categorical, DiagGaussian},
    module::component::{Encoder, PolicyHead, ValueHead},
    ActionSpace, Batch, ForwardMode, PpoModule, ValueFunction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde_json::json;
use tqdm::tqdm;

#[derive(Config)]
pub struct ModuleDriverConfig {
    pub n_steps: usize,
    /// Number of parallel observations per step.
    pub batch_size: usize,
    #[config(default = 0)]
    pub seed: u64,
    /// Run exploration passes. Inference passes otherwise.
    #[config(default = true)]
    pub explore: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DriverStats {
    pub steps: usize,
    pub mean_entropy: f32,
    pub mean_logp: f32,
    /// `None` when no pass returned value predictions.
    pub mean_vf_pred: Option<f32>,
    /// Mean value of the observations following the last step.
    pub bootstrap_value: f32,
}

/// Feeds synthetic observations through a module, the way a rollout worker
/// calls it, and threads recurrent state between steps.
pub struct ModuleDriver<B: Backend> {
    cfg: ModuleDriverConfig,
    observation_size: usize,
    action_space: ActionSpace,
    rng: StdRng,
    device: B::Device,
}

impl ModuleDriverConfig {
    pub fn init<B: Backend>(
        &self,
        observation_size: usize,
        action_space: ActionSpace,
        device: &B::Device,
    ) -> ModuleDriver<B> {
        B::seed(self.seed);
        ModuleDriver {
            cfg: self.clone(),
            observation_size,
            action_space,
            rng: StdRng::seed_from_u64(self.seed),
            device: device.clone(),
        }
    }
}

impl<B: Backend> ModuleDriver<B> {
    pub fn run<E, P, V>(
        &mut self,
        module: &PpoModule<B, E, P, V>,
    ) -> burn_ppo::Result<DriverStats>
    where
        E: Module<B> + Encoder<B>,
        P: Module<B> + PolicyHead<B>,
        V: Module<B> + ValueHead<B>,
    {
        let mode = match self.cfg.explore {
            true => ForwardMode::Exploration,
            false => ForwardMode::Inference,
        };
        let mut state = module.initial_state(self.cfg.batch_size, &self.device);
        let mut entropies = Vec::with_capacity(self.cfg.n_steps);
        let mut logps = Vec::with_capacity(self.cfg.n_steps);
        let mut vf_preds = Vec::new();

        for _ in tqdm(0..self.cfg.n_steps) {
            let mut batch = self.observation_batch().to_tensors(&self.device)?;
            if let Some(state) = state.take() {
                batch.set_state_in(state);
            }

            let output = module.forward(mode, &batch)?;
            let (entropy, logp) = self.score(output.action_dist_inputs);
            entropies.push(entropy);
            logps.push(logp);
            if let Some(values) = output.vf_preds {
                vf_preds.push(mean(values));
            }
            state = output.state_out;
        }

        let infos = (0..self.cfg.batch_size)
            .map(|env| json!({ "env": env }))
            .collect::<Vec<_>>();
        let mut batch = self.observation_batch().with(columns::INFOS, infos);
        if let Some(state) = state {
            batch.set_state_in(state);
        }
        let bootstrap_value = mean(module.compute_values(&mut batch)?);

        let stats = DriverStats {
            steps: self.cfg.n_steps,
            mean_entropy: average(&entropies),
            mean_logp: average(&logps),
            mean_vf_pred: (!vf_preds.is_empty()).then(|| average(&vf_preds)),
            bootstrap_value,
        };
        tracing::info!(?mode, ?stats, "driver finished");
        Ok(stats)
    }

    fn observation_batch(&mut self) -> Batch<B> {
        let len = self.cfg.batch_size * self.observation_size;
        let observations: Vec<f32> = (0..len).map(|_| self.rng.gen_range(-1.0..1.0)).collect();
        Batch::new().with(
            columns::OBS,
            TensorData::new(observations, [self.cfg.batch_size, self.observation_size]),
        )
    }

    /// Mean entropy and mean log-likelihood of freshly sampled actions.
    fn score(&self, inputs: Tensor<B, 2>) -> (f32, f32) {
        match self.action_space {
            ActionSpace::Discrete(_) => score_with::<B, Categorical<B>>(inputs),
            ActionSpace::Continuous(_) => score_with::<B, DiagGaussian<B>>(inputs),
        }
    }
}

fn score_with<B: Backend, D: ActionDistribution<B>>(inputs: Tensor<B, 2>) -> (f32, f32) {
    let dist = D::from_inputs(inputs);
    let actions = dist.sample();
    (mean(dist.entropy()), mean(dist.logp(&actions)))
}

fn mean<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.mean().into_scalar().elem::<f32>()
}

fn average(values: &[f32]) -> f32 {
    match values.len() {
        0 => 0.0,
        n => values.iter().sum::<f32>() / n as f32,
    }
}
