//! Background build execution: scheduling, delta routing and file watching.

mod coordinator;
mod scheduler;
mod watch;

pub use coordinator::{DeltaKind, IncrementalBuildCoordinator, ResourceDelta};
pub use scheduler::{BuildScheduler, BuildState};
pub use watch::start_watch;
