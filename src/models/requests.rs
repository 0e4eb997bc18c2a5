//! Request DTOs for the stats exposition API

use std::time::Duration;

use serde::Deserialize;

/// Longest window accepted by the stats endpoints (24 hours)
pub const MAX_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Query string of the stats endpoints (`?window_secs=N`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WindowQuery {
    /// Optional window in seconds for windowed metrics
    #[serde(default)]
    pub window_secs: Option<u64>,
}

impl WindowQuery {
    /// Validates the query
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match self.window_secs {
            Some(0) => Some("window_secs must be positive".to_string()),
            Some(secs) if secs > MAX_WINDOW_SECS => Some(format!(
                "window_secs exceeds maximum of {} seconds",
                MAX_WINDOW_SECS
            )),
            _ => None,
        }
    }

    pub fn window(&self) -> Option<Duration> {
        self.window_secs.map(Duration::from_secs)
    }
}
