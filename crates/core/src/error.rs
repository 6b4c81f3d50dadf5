use thiserror::Error;
use weavescope_api::ProjectId;

#[derive(Error, Debug)]
pub enum WeavescopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Parsing error: {0}")]
    Parsing(String),
    #[error("Build cancelled for project {0}")]
    Cancelled(ProjectId),
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<weavescope_java::JavaParseError> for WeavescopeError {
    fn from(err: weavescope_java::JavaParseError) -> Self {
        WeavescopeError::Parsing(err.to_string())
    }
}

impl From<notify::Error> for WeavescopeError {
    fn from(err: notify::Error) -> Self {
        WeavescopeError::Internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, WeavescopeError>;
