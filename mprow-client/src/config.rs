//! Client configuration
//!
//! `ClientConfig` collects every knob the session recognizes, with the
//! defaults the protocol was tuned for. Options are set through `with_*`
//! methods so call sites read like a builder chain:
//!
//! ```rust
//! use mprow_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::new("ws://localhost:8080")
//!     .with_default_timeout(Duration::from_secs(5))
//!     .with_max_reconnect_attempts(3);
//! ```

use std::time::Duration;

/// Configuration for an [`MprowClient`](crate::MprowClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Endpoint the transport connects to.
    pub url: String,
    /// Sub-protocol hint passed to the transport.
    pub protocols: Vec<String>,
    /// Whether a dropped connection schedules reconnect attempts.
    pub auto_reconnect: bool,
    /// Delay before each reconnect attempt.
    pub reconnect_interval: Duration,
    /// Consecutive reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Fallback per-request timeout.
    pub default_timeout: Duration,
    /// Heartbeat notification period; zero disables the heartbeat.
    pub heartbeat_interval: Duration,
    /// Method name of the heartbeat notification.
    pub heartbeat_method: String,
    /// Install a diagnostic log sink on connect.
    pub debug: bool,
}

impl ClientConfig {
    /// Configuration with protocol defaults for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            protocols: Vec::new(),
            auto_reconnect: true,
            reconnect_interval: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
            default_timeout: Duration::from_millis(15_000),
            heartbeat_interval: Duration::from_millis(30_000),
            heartbeat_method: "ping".to_string(),
            debug: false,
        }
    }

    /// Set the sub-protocol list offered to the server.
    pub fn with_protocols(mut self, protocols: Vec<String>) -> Self {
        self.protocols = protocols;
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the delay between reconnect attempts.
    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// Set the reconnect attempt budget.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the fallback per-request timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the heartbeat period. `Duration::ZERO` disables the heartbeat.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the heartbeat notification method name.
    pub fn with_heartbeat_method(mut self, method: impl Into<String>) -> Self {
        self.heartbeat_method = method.into();
        self
    }

    /// Enable the diagnostic log sink.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}
