pub mod advice;
pub mod definition;
pub mod diagnostic;
pub mod element;
pub mod parsed;
pub mod project;
pub mod reference;

pub use advice::*;
pub use definition::*;
pub use diagnostic::*;
pub use element::*;
pub use parsed::*;
pub use project::*;
pub use reference::*;
