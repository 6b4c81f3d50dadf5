pub mod xml;

pub use xml::{AopElement, XmlAspectSource};
