#![forbid(unsafe_code)]

use bitladder_abr::AbrError;
use thiserror::Error;

/// Errors raised while resolving a video and building its session.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown video `{0}`")]
    UnknownVideo(String),

    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),

    #[error("no video selected")]
    MissingVideo,

    #[error("invalid video `{video}`: {reason}")]
    InvalidVideo { video: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("selection error: {0}")]
    Abr(#[from] AbrError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
