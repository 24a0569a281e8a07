use std::time::Duration;

use hostserver_protocol::ccsid::CCSID_EBCDIC_37;

/// Environment variable holding the list wait timeout in seconds. `0` waits without limit.
pub const LIST_WAIT_TIMEOUT_ENV: &str = "HOSTSERVER_LIST_WAIT_TIMEOUT";

#[derive(Debug, Clone)]
pub struct Config {
    /// CCSID of object names and texts sent to the host.
    pub host_ccsid: u16,
    pub read_write_timeout: Duration,
    /// Longest time to wait for a list to complete. Zero waits without limit.
    pub list_wait_timeout: Duration,
    pub list_poll_interval: Duration,
    pub max_buffer_growth_attempts: u32,
    pub max_receiver_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_ccsid: CCSID_EBCDIC_37,
            read_write_timeout: Duration::from_secs(30),
            list_wait_timeout: Duration::from_secs(60),
            list_poll_interval: Duration::from_secs(1),
            max_buffer_growth_attempts: 16,
            max_receiver_length: 16 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Defaults, with the list wait timeout taken from [`LIST_WAIT_TIMEOUT_ENV`] if it is set.
    pub fn from_env() -> Config {
        let value = std::env::var(LIST_WAIT_TIMEOUT_ENV).ok();
        Config::default().with_list_wait_timeout(value.as_deref())
    }

    fn with_list_wait_timeout(mut self, value: Option<&str>) -> Config {
        if let Some(value) = value {
            match value.trim().parse::<u64>() {
                Ok(seconds) => self.list_wait_timeout = Duration::from_secs(seconds),
                Err(e) => log::warn!(
                    "Ignoring {}={:?}: {}, waiting at most {:?}",
                    LIST_WAIT_TIMEOUT_ENV,
                    value,
                    e,
                    self.list_wait_timeout
                ),
            }
        }
        self
    }
}

/// Builder to modify client configuration options
///
/// # Example
///
/// ```
/// use hostserver_client::config::Builder;
/// use std::time::Duration;
///
/// let config = Builder::new()
///     .list_wait_timeout(Duration::ZERO)
///     .list_poll_interval(Duration::from_millis(250))
///     .build();
/// assert!(config.list_wait_timeout.is_zero());
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Start from [`Config::from_env`] instead of the defaults.
    pub fn from_env() -> Builder {
        Builder {
            config: Config::from_env(),
        }
    }

    pub fn host_ccsid(mut self, ccsid: u16) -> Self {
        self.config.host_ccsid = ccsid;
        self
    }

    /// Set the TCP read and write timeout
    pub fn rw_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_write_timeout = timeout;
        self
    }

    pub fn list_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config.list_wait_timeout = timeout;
        self
    }

    pub fn list_poll_interval(mut self, interval: Duration) -> Self {
        self.config.list_poll_interval = interval;
        self
    }

    /// Set how often a list page request may be repeated with a larger receiver.
    pub fn max_buffer_growth_attempts(mut self, attempts: u32) -> Self {
        self.config.max_buffer_growth_attempts = attempts;
        self
    }

    pub fn max_receiver_length(mut self, len: usize) -> Self {
        self.config.max_receiver_length = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
