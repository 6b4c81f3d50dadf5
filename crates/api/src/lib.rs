pub mod error;
pub mod markers;
pub mod model;
pub mod models;
pub mod source;

pub use error::{ApiError, ApiResult};
pub use markers::{MarkerFilter, MarkerSink};
pub use model::{AopModelListener, AopModelQuery};
pub use models::*;
pub use source::AspectDefinitionSource;
