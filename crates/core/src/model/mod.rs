pub mod project;
pub mod registry;

pub use project::AopProject;
pub use registry::{AopReferenceModel, ListenerId};
