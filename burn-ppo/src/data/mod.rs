pub mod batch;

pub use batch::{AnyTensor, Batch, BatchValue, StateMap};
