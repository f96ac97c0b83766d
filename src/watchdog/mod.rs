mod builder;
#[allow(clippy::module_inception)]
mod watchdog;

pub use builder::*;
pub use watchdog::*;

#[cfg(test)]
mod watchdog_test;
