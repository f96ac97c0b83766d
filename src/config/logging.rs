use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Log output settings.
///
/// Logs go to stdout unless `log_dir` is set, in which case they are appended
/// to `<log_dir>/deadswitch.log` through a non-blocking writer. `RUST_LOG`
/// takes precedence over `filter`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: None,
            filter: default_filter(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.filter.trim().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "logging.filter cannot be empty".into(),
            )));
        }

        if let Some(dir) = &self.log_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(Error::Config(ConfigError::Message(format!(
                    "logging.log_dir {} is not a directory",
                    dir.display()
                ))));
            }
        }

        Ok(())
    }
}

fn default_filter() -> String {
    "info".to_string()
}
