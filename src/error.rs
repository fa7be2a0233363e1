use cups_image::CupsImageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Print(#[from] CupsImageError),
    #[error("--options is not valid JSON: {0}")]
    OptionsJson(#[from] serde_json::Error),
    #[error("--options {0}")]
    InvalidOptions(String),
    #[error("no image file given, see --help")]
    MissingFile,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// 2 for bad input (an undecodable image included), 1 for everything that went wrong after parsing.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Print(CupsImageError::InvalidArgument(_))
            | AppError::Print(CupsImageError::Image(_))
            | AppError::OptionsJson(_)
            | AppError::InvalidOptions(_)
            | AppError::MissingFile => 2,
            _ => 1,
        }
    }
}
