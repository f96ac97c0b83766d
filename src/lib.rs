//! deadswitch: a dead man's switch watchdog.
//!
//! Monitored jobs ping a switch id; a switch that stays silent for longer
//! than its interval trips and alerts its notification targets, then keeps
//! re-alerting on the retrigger cadence until it is pinged again.
//!
//! ```text
//! gateway ──> Watchdog ──> TimerEngine ──> SwitchRegistry
//!                              │
//!                              └──(trip)──> NotificationDispatcher ──> Notifier
//! ```
mod config;
mod errors;
pub mod gateway;
pub mod metrics;
mod notify;
mod switch;
mod timer;
pub mod utils;
mod watchdog;

pub use config::*;
pub use errors::*;
pub use notify::*;
pub use switch::*;
pub use timer::*;
pub use watchdog::*;
