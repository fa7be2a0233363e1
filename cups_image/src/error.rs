use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CupsImageError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("unknown printer: {0}")]
    UnknownPrinter(String),
    #[error("print service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("print service error: {0}")]
    ServiceError(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("png encoding error: {0}")]
    Png(#[from] png::EncodingError),
}

pub type Result<T> = std::result::Result<T, CupsImageError>;
