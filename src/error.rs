//! Crate-level error.

use thiserror::Error;

use crate::data::DataError;
use crate::model::{ModelLoadError, PersistError};
use crate::report::ReportError;
use crate::schema::SchemaError;
use crate::training::{ConfigError, EvalError, TrainError};

/// Any failure surfaced by the public API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Load(#[from] ModelLoadError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
