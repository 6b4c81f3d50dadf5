pub mod error;
pub mod logging;

pub mod advisor;
pub mod builder;
pub mod config;
pub mod engine;
pub mod enumerate;
pub mod markers;
pub mod matcher;
pub mod model;
pub mod pointcut;
pub mod runtime;
pub mod scanner;
pub mod source;
pub mod universe;

pub use builder::{BuildKind, BuildReport, BuildRequest, ReferenceModelBuilder};
pub use config::EngineConfig;
pub use engine::WeaveEngine;
pub use error::{Result, WeavescopeError};
pub use markers::InMemoryMarkerSink;
pub use model::{AopProject, AopReferenceModel, ListenerId};
pub use runtime::{BuildState, DeltaKind, ResourceDelta};
