use std::path::PathBuf;
use std::time::Duration;

use crate::database::default_data_file;

pub const DEFAULT_POLL_SECS: u64 = 60;

/// Runtime settings, resolved from command-line flags and the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_file: PathBuf,
    pub user: Option<String>,
    pub poll_interval: Duration,
    pub notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_file: default_data_file(),
            user: None,
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECS),
            notifications: true,
        }
    }
}

impl Config {
    /// Flags win; anything not given falls back to the defaults.
    pub fn resolve(
        data_file: Option<PathBuf>,
        user: Option<String>,
        poll_secs: Option<u64>,
        notifications: Option<&str>,
    ) -> Self {
        let defaults = Config::default();
        Config {
            data_file: data_file.unwrap_or(defaults.data_file),
            user: user.filter(|u| !u.trim().is_empty()),
            poll_interval: poll_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.poll_interval),
            notifications: notifications.map_or(defaults.notifications, switch_is_on),
        }
    }
}

fn switch_is_on(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "off" | "0" | "false" | "no" | "disabled"
    )
}
