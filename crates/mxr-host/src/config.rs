use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory holding the durable records.
    pub state_dir: PathBuf,
    /// Back-off after a failed transport receive.
    pub poll_interval: Duration,
    /// Capacity of the consumer's control channel.
    pub control_capacity: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".mxr"),
            poll_interval: Duration::from_millis(500),
            control_capacity: 64,
        }
    }
}

impl HostConfig {
    /// Defaults overridden by `MXR_STATE_DIR`, `MXR_POLL_INTERVAL_MS` and
    /// `MXR_CONTROL_CAPACITY`. Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(dir) = std::env::var_os("MXR_STATE_DIR") {
            cfg.state_dir = PathBuf::from(dir);
        }
        if let Some(ms) = env_parse::<u64>("MXR_POLL_INTERVAL_MS") {
            cfg.poll_interval = Duration::from_millis(ms);
        }
        if let Some(capacity) = env_parse::<usize>("MXR_CONTROL_CAPACITY").filter(|c| *c > 0) {
            cfg.control_capacity = capacity;
        }
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
