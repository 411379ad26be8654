use crate::error::ModelError;

/// Common Result type alias
pub type ModelResult<T> = Result<T, ModelError>;
