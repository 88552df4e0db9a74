//! PPO actor-critic module for `burn`.
//!
//! A [`PpoModule`] routes a named [`Batch`] through an encoder and into a
//! policy head and a value head. It exposes the three forward passes used by
//! a driver (inference, exploration, training) and value computation for
//! bootstrapping.

pub mod columns;
pub mod data;
pub mod distribution;
pub mod error;
pub mod logging;
pub mod module;

pub use data::{AnyTensor, Batch, BatchValue, StateMap};
pub use error::{ModuleError, Result};
pub use module::component::{
    CriticEncoder, Encoder, EncoderOutput, PolicyHead, ValueFunction, ValueHead,
};
pub use module::{ActionSpace, ForwardMode, ModuleOutput, PpoModule, PpoModuleConfig};
