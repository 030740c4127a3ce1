// src/props/error.rs

/// Everything a detail layer can refuse or skip. None of these are fatal:
/// the frame loop carries on and the layer simply renders nothing new.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetailError {
    #[error("detail layer is not attached to a terrain")]
    MissingHost,
    #[error("terrain has no heightmap data yet")]
    MissingData,
    #[error("terrain data is locked for editing; update deferred")]
    DataLocked,
    #[error("detail layer index {index} out of range ({available} detail maps available)")]
    LayerIndexOutOfRange { index: usize, available: usize },
    #[error("shader parameter '{0}' is reserved")]
    ReservedParam(String),
    #[error("at most {max} custom shader parameters fit the detail material")]
    TooManyParams { max: usize },
}
