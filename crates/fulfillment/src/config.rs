use std::time::Duration;

/// Default caller-side wait bound for order placement.
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long a caller waits for order placement before giving up.
    /// `None` waits indefinitely. The placement itself always runs to
    /// commit or rollback.
    pub create_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            create_timeout: Some(DEFAULT_CREATE_TIMEOUT),
        }
    }
}

impl EngineConfig {
    pub fn with_create_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.create_timeout = timeout;
        self
    }
}
