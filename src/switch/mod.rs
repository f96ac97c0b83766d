#[allow(clippy::module_inception)]
mod switch;
mod registry;

pub use registry::*;
pub use switch::*;
