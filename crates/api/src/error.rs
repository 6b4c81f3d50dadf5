#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid aspect definition: {0}")]
    InvalidDefinition(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
