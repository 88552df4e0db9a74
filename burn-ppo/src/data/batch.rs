use std::collections::BTreeMap;

use burn::{prelude::*, tensor::TensorData};
use serde_json::Value;

use crate::columns;
use crate::error::{ModuleError, Result};

/// Recurrent state keyed by component name (`h`, `c`, ...), each `[batch, size]`.
pub type StateMap<B> = BTreeMap<String, Tensor<B, 2>>;

/// A float tensor whose rank is only known at runtime.
#[derive(Clone, Debug)]
pub enum AnyTensor<B: Backend> {
    Rank1(Tensor<B, 1>),
    Rank2(Tensor<B, 2>),
    Rank3(Tensor<B, 3>),
    Rank4(Tensor<B, 4>),
}

impl<B: Backend> AnyTensor<B> {
    pub fn from_data(data: TensorData, device: &B::Device) -> Result<Self> {
        match data.shape.len() {
            1 => Ok(Self::Rank1(Tensor::from_data(data, device))),
            2 => Ok(Self::Rank2(Tensor::from_data(data, device))),
            3 => Ok(Self::Rank3(Tensor::from_data(data, device))),
            4 => Ok(Self::Rank4(Tensor::from_data(data, device))),
            rank => Err(ModuleError::UnsupportedRank(rank)),
        }
    }

    pub fn rank(&self) -> usize {
        match self {
            Self::Rank1(_) => 1,
            Self::Rank2(_) => 2,
            Self::Rank3(_) => 3,
            Self::Rank4(_) => 4,
        }
    }

    /// Leading dimension.
    pub fn batch_size(&self) -> usize {
        match self {
            Self::Rank1(tensor) => tensor.dims()[0],
            Self::Rank2(tensor) => tensor.dims()[0],
            Self::Rank3(tensor) => tensor.dims()[0],
            Self::Rank4(tensor) => tensor.dims()[0],
        }
    }

    pub fn device(&self) -> B::Device {
        match self {
            Self::Rank1(tensor) => tensor.device(),
            Self::Rank2(tensor) => tensor.device(),
            Self::Rank3(tensor) => tensor.device(),
            Self::Rank4(tensor) => tensor.device(),
        }
    }

    /// Flattens every trailing dimension into one, giving `[batch, features]`.
    pub fn into_batch_matrix(self) -> Tensor<B, 2> {
        match self {
            Self::Rank1(tensor) => tensor.unsqueeze_dim(1),
            Self::Rank2(tensor) => tensor,
            Self::Rank3(tensor) => tensor.flatten(1, 2),
            Self::Rank4(tensor) => tensor.flatten(1, 3),
        }
    }
}

/// One entry of a [`Batch`].
#[derive(Clone, Debug)]
pub enum BatchValue<B: Backend> {
    /// Tensor already living on the backend.
    Tensor(AnyTensor<B>),
    /// Host data that has not been moved to the backend yet.
    Data(TensorData),
    Nested(BTreeMap<String, BatchValue<B>>),
    /// Per-example environment infos. Never converted.
    Infos(Vec<Value>),
}

impl<B: Backend> BatchValue<B> {
    /// Rebuilds the structure, replacing every leaf by the result of `f`.
    ///
    /// `path` names the current entry; nested entries are reported as
    /// `parent/child`.
    pub fn map_structure<F>(&self, path: &str, f: &mut F) -> Result<Self>
    where
        F: FnMut(&str, &Self) -> Result<Self>,
    {
        match self {
            Self::Nested(children) => {
                let mut mapped = BTreeMap::new();
                for (key, child) in children {
                    let child_path = format!("{path}/{key}");
                    mapped.insert(key.clone(), child.map_structure(&child_path, f)?);
                }
                Ok(Self::Nested(mapped))
            }
            leaf => f(path, leaf),
        }
    }

    /// Moves every host leaf to `device`. Tensors are kept as they are.
    pub fn to_tensors(&self, path: &str, device: &B::Device) -> Result<Self> {
        self.map_structure(path, &mut |path: &str, leaf: &BatchValue<B>| match leaf {
            Self::Tensor(tensor) => Ok(Self::Tensor(tensor.clone())),
            Self::Data(data) => AnyTensor::from_data(data.clone(), device).map(Self::Tensor),
            Self::Infos(_) | Self::Nested(_) => Err(ModuleError::NotConvertible(path.to_string())),
        })
    }

    pub fn from_state(state: StateMap<B>) -> Self {
        Self::Nested(
            state
                .into_iter()
                .map(|(key, tensor)| (key, Self::Tensor(AnyTensor::Rank2(tensor))))
                .collect(),
        )
    }
}

macro_rules! impl_from_tensor {
    ($($rank:literal => $variant:ident),*) => {$(
        impl<B: Backend> From<Tensor<B, $rank>> for AnyTensor<B> {
            fn from(tensor: Tensor<B, $rank>) -> Self {
                Self::$variant(tensor)
            }
        }

        impl<B: Backend> From<Tensor<B, $rank>> for BatchValue<B> {
            fn from(tensor: Tensor<B, $rank>) -> Self {
                Self::Tensor(AnyTensor::$variant(tensor))
            }
        }
    )*};
}

impl_from_tensor!(1 => Rank1, 2 => Rank2, 3 => Rank3, 4 => Rank4);

impl<B: Backend> From<AnyTensor<B>> for BatchValue<B> {
    fn from(tensor: AnyTensor<B>) -> Self {
        Self::Tensor(tensor)
    }
}

impl<B: Backend> From<TensorData> for BatchValue<B> {
    fn from(data: TensorData) -> Self {
        Self::Data(data)
    }
}

impl<B: Backend> From<Vec<Value>> for BatchValue<B> {
    fn from(infos: Vec<Value>) -> Self {
        Self::Infos(infos)
    }
}

/// Named inputs for one step, owned by the caller.
#[derive(Clone, Debug)]
pub struct Batch<B: Backend> {
    columns: BTreeMap<String, BatchValue<B>>,
}

impl<B: Backend> Default for Batch<B> {
    fn default() -> Self {
        Self {
            columns: BTreeMap::new(),
        }
    }
}

impl<B: Backend> Batch<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<BatchValue<B>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<BatchValue<B>>,
    ) -> Option<BatchValue<B>> {
        self.columns.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<BatchValue<B>> {
        self.columns.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&BatchValue<B>> {
        self.columns.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.columns.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn tensor(&self, key: &str) -> Result<&AnyTensor<B>> {
        match self.columns.get(key) {
            Some(BatchValue::Tensor(tensor)) => Ok(tensor),
            Some(_) => Err(ModuleError::NotATensor {
                column: key.to_string(),
            }),
            None => Err(ModuleError::MissingColumn(key.to_string())),
        }
    }

    pub fn observations(&self) -> Result<&AnyTensor<B>> {
        self.tensor(columns::OBS)
    }

    /// Incoming recurrent state, if the batch carries one.
    pub fn state_in(&self) -> Result<Option<StateMap<B>>> {
        let entries = match self.columns.get(columns::STATE_IN) {
            None => return Ok(None),
            Some(BatchValue::Nested(entries)) => entries,
            Some(_) => {
                return Err(ModuleError::NotATensor {
                    column: columns::STATE_IN.to_string(),
                })
            }
        };
        let mut state = StateMap::new();
        for (key, value) in entries {
            let column = format!("{}/{key}", columns::STATE_IN);
            match value {
                BatchValue::Tensor(AnyTensor::Rank2(tensor)) => {
                    state.insert(key.clone(), tensor.clone());
                }
                BatchValue::Tensor(other) => {
                    return Err(ModuleError::RankMismatch {
                        column,
                        expected: 2,
                        actual: other.rank(),
                    })
                }
                _ => return Err(ModuleError::NotATensor { column }),
            }
        }
        Ok(Some(state))
    }

    pub fn set_state_in(&mut self, state: StateMap<B>) {
        self.columns
            .insert(columns::STATE_IN.to_string(), BatchValue::from_state(state));
    }

    /// Copy of the batch with every entry moved to `device`.
    ///
    /// Fails on entries that are not tensor data, such as infos.
    pub fn to_tensors(&self, device: &B::Device) -> Result<Self> {
        let mut columns = BTreeMap::new();
        for (key, value) in &self.columns {
            columns.insert(key.clone(), value.to_tensors(key, device)?);
        }
        Ok(Self { columns })
    }
}
