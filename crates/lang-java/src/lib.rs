pub mod aspect;
pub mod error;
pub mod model;
pub mod naming;
pub mod parser;

pub use aspect::AnnotationAspectSource;
pub use error::{JavaParseError, Result};
pub use model::*;
pub use parser::JavaParser;
