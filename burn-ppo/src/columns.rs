//! Column names shared by batches and module outputs.

pub const OBS: &str = "obs";
pub const STATE_IN: &str = "state_in";
pub const INFOS: &str = "infos";

pub const STATE_OUT: &str = "state_out";
pub const VF_PREDS: &str = "vf_preds";
pub const ACTION_DIST_INPUTS: &str = "action_dist_inputs";

/// Hidden state of a recurrent encoder.
pub const HIDDEN: &str = "h";
/// Cell state of an LSTM encoder.
pub const CELL: &str = "c";
