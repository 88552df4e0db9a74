use thiserror::Error;

/// Errors raised while routing a batch through a module or building one.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("batch has no column `{0}`")]
    MissingColumn(String),
    #[error("column `{column}` is not a tensor")]
    NotATensor { column: String },
    #[error("column `{column}` expected rank {expected}, got rank {actual}")]
    RankMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("entry `{0}` cannot be converted to a tensor")]
    NotConvertible(String),
    #[error("tensors of rank {0} are not supported")]
    UnsupportedRank(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ModuleError>;
