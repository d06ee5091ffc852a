use std::time::Duration;

/// The configuration of the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How long a single delivery may take before the connection is considered dead
    pub send_timeout: Duration,
    /// How many undelivered messages a connection's outbox can hold
    pub outbox_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            // Anything slower than this is a stalled socket
            send_timeout: Duration::from_millis(2000),
            outbox_capacity: 64,
        }
    }
}
