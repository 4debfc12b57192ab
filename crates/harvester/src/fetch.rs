//! Bounded-timeout HTTP retrieval with an explicit retry loop.
//!
//! Retrieval is split in two layers:
//!
//! - A [`Transport`] performs exactly one GET and returns the body bytes or a [`FetchError`].
//!   [`HttpTransport`] is the `reqwest` implementation used in production; tests substitute
//!   scripted transports.
//! - A [`Fetcher`] drives a transport through a [`RetryPolicy`]: up to `max_attempts` attempts,
//!   sleeping for the next entry of a fixed backoff table after each failed one.
//!
//! The backoff table is plain data, so the schedule is deterministic:
//!
//! ```
//! use std::time::Duration;
//!
//! use harvester::fetch::RetryPolicy;
//!
//! let policy = RetryPolicy::new(3, vec![2, 4, 8]);
//! assert_eq!(policy.delay_after(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_after(2), Duration::from_secs(4));
//! ```

use super::*;

/// Backoff table used when retries are enabled without an explicit schedule.
pub const DEFAULT_BACKOFF_SECS: [u64; 5] = [2, 4, 8, 16, 32];

/// A single-attempt HTTP GET.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Retrieves `url`, returning the full response body on a 2xx status.
  async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError>;
}

/// [`Transport`] backed by a shared `reqwest` connection pool.
///
/// The client is safe to share between tasks; its idle pool per host is sized to the permit
/// budget so that every admitted download can hold a connection.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  /// Pooled HTTP client
  client: reqwest::Client,
}

impl HttpTransport {
  /// Builds a transport with the timeouts, user agent and pool size from `config`.
  pub fn new(config: &Config) -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(config.user_agent.as_str())
      .connect_timeout(config.timeouts.connect())
      .read_timeout(config.timeouts.read())
      .timeout(config.timeouts.total())
      .pool_max_idle_per_host(config.concurrency)
      .build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
    let response = self.client.get(url).send().await.map_err(|e| classify(url, e))?;

    let status = response.status();
    if !status.is_success() {
      trace!("{url} response: {response:?}");
      return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
    }

    let bytes = response.bytes().await.map_err(|e| classify(url, e))?;
    Ok(bytes.to_vec())
  }
}

/// Maps a `reqwest` error onto the [`FetchError`] taxonomy.
fn classify(url: &str, error: reqwest::Error) -> FetchError {
  if error.is_timeout() {
    FetchError::Timeout { url: url.to_string() }
  } else if error.is_connect() {
    FetchError::Connect { url: url.to_string(), reason: error.to_string() }
  } else {
    FetchError::Request { url: url.to_string(), reason: error.to_string() }
  }
}

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
  /// Total number of attempts, the first one included
  pub max_attempts: usize,
  /// Seconds to wait after the first, second, ... failed attempt
  pub backoff_secs: Vec<u64>,
}

impl Default for RetryPolicy {
  fn default() -> Self { Self::single() }
}

impl RetryPolicy {
  /// Creates a policy with `max_attempts` attempts and the given backoff table.
  pub fn new(max_attempts: usize, backoff_secs: Vec<u64>) -> Self {
    Self { max_attempts, backoff_secs }
  }

  /// One attempt, no retries.
  pub fn single() -> Self { Self::new(1, DEFAULT_BACKOFF_SECS.to_vec()) }

  /// Delay to wait after the `attempt`-th (1-based) failed attempt.
  ///
  /// Attempts beyond the end of the table reuse its last entry; an empty table means no delay.
  pub fn delay_after(&self, attempt: usize) -> Duration {
    let index = attempt.saturating_sub(1);
    self
      .backoff_secs
      .get(index)
      .or_else(|| self.backoff_secs.last())
      .map_or(Duration::ZERO, |secs| Duration::from_secs(*secs))
  }
}

/// Drives a [`Transport`] through a [`RetryPolicy`].
#[derive(Debug)]
pub struct Fetcher<T = HttpTransport> {
  /// Underlying single-attempt transport
  transport: T,
  /// Attempt budget and backoff table
  retry:     RetryPolicy,
}

impl<T: Transport> Fetcher<T> {
  /// Wraps `transport` with `retry`.
  pub fn new(transport: T, retry: RetryPolicy) -> Self { Self { transport, retry } }

  /// The wrapped transport.
  pub fn transport(&self) -> &T { &self.transport }

  /// Retrieves `url`, retrying failed attempts according to the policy.
  ///
  /// Returns the body of the first successful attempt, or the error of the last attempt once
  /// the budget is exhausted. At most `max_attempts` requests are ever sent.
  pub async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchError> {
    let max_attempts = self.retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
      debug!("GET {url} (attempt {attempt}/{max_attempts})");
      match self.transport.get(url).await {
        Ok(bytes) => return Ok(bytes),
        Err(e) if attempt < max_attempts => {
          let delay = self.retry.delay_after(attempt);
          warn!("Attempt {attempt} failed: {e}; retrying in {delay:?}");
          tokio::time::sleep(delay).await;
          attempt += 1;
        },
        Err(e) => {
          if max_attempts > 1 {
            warn!("All {max_attempts} attempts failed for {url}");
          }
          return Err(e);
        },
      }
    }
  }

  /// Retrieves `url` and decodes the body as (lossy) UTF-8.
  pub async fn fetch_text(&self, url: &str) -> std::result::Result<String, FetchError> {
    let bytes = self.fetch(url).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
  }
}
