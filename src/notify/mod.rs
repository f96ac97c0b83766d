mod dispatcher;
pub(crate) mod email;
mod event;
mod notifier;

pub use dispatcher::*;
pub use event::*;
pub use notifier::*;
