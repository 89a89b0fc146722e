//! Tunables for the update manager.
//!
//! Only the remote manifest URL comes from outside the process; everything
//! here has a working default.

use std::time::Duration;

/// Default number of extra attempts after the first failure.
pub const DEFAULT_RETRIES: u32 = 2;

/// Default base delay for linear retry backoff.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Default cap on followed HTTP redirects.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Default whole-request timeout. Large artifacts need a generous value.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Default TCP/TLS connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by the transport, retry policy, and updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Base delay for linear backoff.
    pub retry_delay: Duration,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: crate::USER_AGENT.to_string(),
        }
    }
}

impl UpdaterConfig {
    /// Override the retry count.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Override the retry base delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Override the redirect cap.
    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = UpdaterConfig::default();
        assert_eq!(cfg.retries, 2);
        assert_eq!(cfg.retry_delay, Duration::from_millis(250));
        assert_eq!(cfg.max_redirects, 10);
        assert!(cfg.user_agent.starts_with("modelup/"));
    }

    #[test]
    fn test_builders() {
        let cfg = UpdaterConfig::default()
            .with_retries(5)
            .with_retry_delay(Duration::from_millis(10))
            .with_max_redirects(3);
        assert_eq!(cfg.retries, 5);
        assert_eq!(cfg.retry_delay, Duration::from_millis(10));
        assert_eq!(cfg.max_redirects, 3);
    }
}
