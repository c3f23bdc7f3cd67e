use std::sync::Arc;
use std::time::Duration;

use smart_default::SmartDefault;

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL};
use crate::error::Error;

/// Connection options
///
/// The session behind the socket is expected to be authenticated already;
/// these options only cover how the socket is reached and driven.
///
/// ```rs
/// let mut opts1 = Opts::default();
/// opts1.port = 5000;
///
/// let opts2 = Opts::try_from("mysql://localhost:3307?poll_interval_ms=250")?;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct Opts {
    /// Hostname or IP address
    pub host: Option<String>,

    /// Port number for the MySQL server
    #[default = 3306]
    pub port: u16,

    /// Unix socket path. Takes precedence over `host`.
    pub socket: Option<String>,

    /// Enable TCP_NODELAY socket option to disable Nagle's algorithm
    /// Unix socket is not affected
    #[default = true]
    pub tcp_nodelay: bool,

    /// Upper bound of a single readiness wait. `None` waits indefinitely.
    ///
    /// Expiry is not an error: the wait is simply retried.
    #[default(Some(Duration::from_secs(1)))]
    pub poll_interval: Option<Duration>,

    /// Bytes requested from the socket per read call
    #[default = 16384]
    pub read_chunk_size: usize,

    #[default(Arc::clone(&GLOBAL_BUFFER_POOL))]
    pub buffer_pool: Arc<BufferPool>,
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::BadConfigError(format!("Failed to parse MySQL URL: {}", e)))?;

        if parsed.scheme() != "mysql" {
            return Err(Error::BadConfigError(format!(
                "Invalid URL scheme '{}', expected 'mysql'",
                parsed.scheme()
            )));
        }

        let mut opts = Self {
            host: parsed
                .host_str()
                .filter(|h| !h.is_empty())
                .map(ToString::to_string),
            port: parsed.port().unwrap_or(3306),
            ..Default::default()
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "socket" => opts.socket = Some(value.into_owned()),
                "tcp_nodelay" => opts.tcp_nodelay = parse_value(&key, &value)?,
                "poll_interval_ms" => {
                    let ms: u64 = parse_value(&key, &value)?;
                    opts.poll_interval = (ms > 0).then(|| Duration::from_millis(ms));
                }
                "read_chunk_size" => {
                    let size: usize = parse_value(&key, &value)?;
                    if size == 0 {
                        return Err(Error::BadConfigError(
                            "read_chunk_size must be positive".to_string(),
                        ));
                    }
                    opts.read_chunk_size = size;
                }
                _ => {
                    return Err(Error::BadConfigError(format!(
                        "Unknown URL parameter '{}'",
                        key
                    )));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<String> for Opts {
    type Error = Error;

    fn try_from(url: String) -> Result<Self, Self::Error> {
        Self::try_from(url.as_str())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::BadConfigError(format!("Invalid value '{}' for '{}'", value, key)))
}
