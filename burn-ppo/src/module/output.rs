use burn::prelude::*;

use crate::columns;
use crate::data::StateMap;

/// Which forward pass to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardMode {
    Inference,
    Exploration,
    Train,
}

/// Named outputs of a forward pass.
///
/// Only `action_dist_inputs` is always present; the other columns depend on
/// the pass and on the encoder.
#[derive(Clone, Debug)]
pub struct ModuleOutput<B: Backend> {
    pub state_out: Option<StateMap<B>>,
    /// Squeezed value predictions, `[batch]`.
    pub vf_preds: Option<Tensor<B, 1>>,
    pub action_dist_inputs: Tensor<B, 2>,
}

impl<B: Backend> ModuleOutput<B> {
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::with_capacity(3);
        if self.state_out.is_some() {
            keys.push(columns::STATE_OUT);
        }
        if self.vf_preds.is_some() {
            keys.push(columns::VF_PREDS);
        }
        keys.push(columns::ACTION_DIST_INPUTS);
        keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }
}
