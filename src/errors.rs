//! Watchdog Error Hierarchy
//!
//! Errors are grouped by the layer that raises them: the switch registry, the
//! timer engine, the notification dispatcher and startup configuration. Only
//! configuration errors are fatal; everything else is isolated to one switch
//! id or one delivery attempt.

use std::time::Duration;

use config::ConfigError;

use crate::SwitchId;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Registry lookups and capacity failures
    #[error(transparent)]
    Switch(#[from] SwitchError),

    /// Deadline could not be armed
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),

    /// A single notification delivery failed
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Configuration could not be loaded or violates a constraint
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SwitchError {
    /// Ping or lookup against an id the registry never issued (or already removed)
    #[error("Switch {0} not found")]
    NotFound(SwitchId),

    /// Registry refuses new switches once `max_switches` is reached
    #[error("Switch capacity exhausted ({max} switches registered)")]
    CapacityExhausted { max: usize },

    /// Creation parameters rejected before any state was touched
    #[error("Invalid switch parameters: {0}")]
    InvalidSpec(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    /// Engine stopped accepting deadlines (shutdown in progress)
    #[error("Timer engine is shut down")]
    EngineStopped,

    /// Pending deadline budget is used up
    #[error("Pending deadline capacity exhausted ({max} deadlines pending)")]
    CapacityExhausted { max: usize },

    /// Called outside of a tokio runtime
    #[error("No async runtime available to schedule deadline")]
    NoRuntime,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// One attempt exceeded the per-delivery timeout
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Transport level failure talking to the channel endpoint
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// SMTP relay refused the message or could not be reached
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Email could not be composed from the configured addresses
    #[error("Invalid email: {0}")]
    Email(String),

    /// Channel endpoint answered with a non-success status
    #[error("Channel rejected notification with status {status}")]
    Rejected { status: u16 },

    /// Bounded retries used up; carries the last error message
    #[error("Delivery failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },

    /// Retries abandoned because the switch was removed
    #[error("Delivery cancelled after {attempts} attempts")]
    Cancelled { attempts: usize },
}

impl Error {
    /// True for client mistakes (unknown id, bad parameters), false for server side failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::Switch(SwitchError::NotFound(_)) | Error::Switch(SwitchError::InvalidSpec(_))
        )
    }
}
