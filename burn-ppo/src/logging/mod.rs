use burn::prelude::Backend;
use tracing_subscriber::EnvFilter;

use crate::columns;
use crate::module::ModuleOutput;

/// Installs a formatting subscriber filtered by `RUST_LOG`, or by
/// `default_filter` when the variable is unset.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Another subscriber may already be installed, e.g. by a test harness.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Shape of every column present in `output`. For `state_out` the first
/// state component is reported.
pub fn output_shapes<B: Backend>(output: &ModuleOutput<B>) -> Vec<(&'static str, Vec<usize>)> {
    let mut shapes = Vec::with_capacity(3);
    if let Some(state) = output.state_out.as_ref().and_then(|s| s.values().next()) {
        shapes.push((columns::STATE_OUT, state.dims().to_vec()));
    }
    if let Some(vf_preds) = &output.vf_preds {
        shapes.push((columns::VF_PREDS, vf_preds.dims().to_vec()));
    }
    shapes.push((
        columns::ACTION_DIST_INPUTS,
        output.action_dist_inputs.dims().to_vec(),
    ));
    shapes
}

#[cfg(test)]
mod tests {
    use burn::backend::NdArray;
    use burn::tensor::Tensor;
    use expect_test::expect;

    use super::*;
    use crate::data::StateMap;

    #[test]
    fn test_output_shapes() {
        let device = &Default::default();
        let output = ModuleOutput::<NdArray> {
            state_out: Some(StateMap::from([(
                columns::HIDDEN.to_string(),
                Tensor::zeros([2, 8], device),
            )])),
            vf_preds: None,
            action_dist_inputs: Tensor::zeros([2, 3], device),
        };
        expect![[r#"
            [
                (
                    "state_out",
                    [
                        2,
                        8,
                    ],
                ),
                (
                    "action_dist_inputs",
                    [
                        2,
                        3,
                    ],
                ),
            ]
        "#]]
        .assert_debug_eq(&output_shapes(&output));
    }
}
