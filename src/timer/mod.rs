mod deadline;
mod engine;

pub use deadline::*;
pub use engine::*;
