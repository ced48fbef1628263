use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::TryStreamExt as _;
use tracing::{debug, warn};

use crate::config::LettaConfig;
use crate::errors::{ClientError, TransportError};
use crate::request::StreamRequest;

/// Raw body chunks of an established streaming response.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static>>;

/// Capability to open a streaming POST and deliver its body chunks.
///
/// Implementations own connection details; the run loop only sees bytes.
/// Dropping the returned stream must release the underlying connection, on
/// every exit path.
#[async_trait::async_trait]
pub trait ByteTransport: Send + Sync {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError>;
}

/// Exponential backoff policy for connection establishment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    /// Total connection attempts, first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff before the first retry.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Exponential multiplier per retry step.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Lower bound for computed backoff.
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,
    /// Upper bound for computed backoff.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_backoff_factor() -> f64 {
    2.0
}

const fn default_min_backoff_ms() -> u64 {
    4_000
}

const fn default_max_backoff_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: default_initial_backoff_ms(),
            backoff_factor: default_backoff_factor(),
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }

    pub fn exponential(max_attempts: u32, initial_backoff_ms: u64, backoff_factor: f64) -> Self {
        let initial = if initial_backoff_ms == 0 {
            default_initial_backoff_ms()
        } else {
            initial_backoff_ms
        };
        let factor = if backoff_factor <= 0.0 {
            default_backoff_factor()
        } else {
            backoff_factor
        };
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff_ms: initial,
            backoff_factor: factor,
            min_backoff_ms: default_min_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }

    pub fn with_min_backoff_ms(mut self, min_backoff_ms: u64) -> Self {
        self.min_backoff_ms = min_backoff_ms;
        self
    }

    pub fn with_max_backoff_ms(mut self, max_backoff_ms: u64) -> Self {
        self.max_backoff_ms = max_backoff_ms.max(1);
        self
    }

    pub fn can_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Backoff before the next attempt, after `retries_done` failed retries.
    pub fn backoff_duration(&self, retries_done: u32) -> Duration {
        if self.max_attempts <= 1 {
            return Duration::ZERO;
        }
        let exp = self.backoff_factor.powi(retries_done as i32);
        let base = (self.initial_backoff_ms as f64 * exp).round() as u64;
        let clamped = base.max(self.min_backoff_ms).min(self.max_backoff_ms.max(1));
        Duration::from_millis(clamped)
    }
}

/// HTTP transport backed by a shared reqwest client.
///
/// Only connection establishment is bounded by a timeout; the stream itself
/// is open-ended.
pub struct HttpTransport {
    client: reqwest::Client,
    password: String,
}

impl HttpTransport {
    pub fn new(config: &LettaConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            password: config.password.clone(),
        })
    }
}

#[async_trait::async_trait]
impl ByteTransport for HttpTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError> {
        debug!(url = %request.url, "opening agent message stream");
        let response = self
            .client
            .post(&request.url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header("X-BARE-PASSWORD", format!("password {}", self.password))
            .json(&request.body())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(e.to_string())
                } else {
                    TransportError::Connect(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(response.bytes_stream().map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(e.to_string())
            } else {
                TransportError::Read(e.to_string())
            }
        })))
    }
}

/// Retries stream establishment on transient failures with bounded backoff.
///
/// Retries never apply past establishment: once a stream is handed out, read
/// errors belong to the caller, since frames already delivered must not be
/// replayed.
pub struct RetryingTransport {
    inner: Arc<dyn ByteTransport>,
    policy: RetryPolicy,
}

impl RetryingTransport {
    pub fn new(inner: Arc<dyn ByteTransport>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait::async_trait]
impl ByteTransport for RetryingTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.inner.open(request).await {
                Ok(stream) => return Ok(stream),
                Err(err) if err.is_transient() && self.policy.can_retry(attempts) => {
                    let delay = self.policy.backoff_duration(attempts - 1);
                    warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient connect failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) if err.is_transient() => {
                    return Err(TransportError::Exhausted {
                        attempts,
                        last: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::stream;

    fn request() -> StreamRequest {
        StreamRequest {
            url: "http://test/v1/agents/a/messages/stream".into(),
            messages: Vec::new(),
            stream_steps: true,
            stream_tokens: true,
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::exponential(max_attempts, 1, 2.0)
            .with_min_backoff_ms(1)
            .with_max_backoff_ms(2)
    }

    struct FlakyTransport {
        attempts: AtomicUsize,
        failures: Mutex<Vec<TransportError>>,
    }

    impl FlakyTransport {
        fn failing_with(failures: Vec<TransportError>) -> Self {
            Self {
                attempts: AtomicUsize::new(0),
                failures: Mutex::new(failures),
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ByteTransport for FlakyTransport {
        async fn open(&self, _request: &StreamRequest) -> Result<ByteStream, TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let next = self.failures.lock().expect("lock").pop();
            match next {
                Some(err) => Err(err),
                None => Ok(Box::pin(stream::empty())),
            }
        }
    }

    #[test]
    fn backoff_grows_between_floor_and_cap() {
        let policy = RetryPolicy::exponential(4, 1_000, 2.0)
            .with_min_backoff_ms(4_000)
            .with_max_backoff_ms(10_000);
        assert_eq!(policy.backoff_duration(0).as_millis(), 4_000);
        assert_eq!(policy.backoff_duration(2).as_millis(), 4_000);
        assert_eq!(policy.backoff_duration(3).as_millis(), 8_000);
        assert_eq!(policy.backoff_duration(4).as_millis(), 10_000);
    }

    #[test]
    fn single_attempt_policy_never_waits() {
        let policy = RetryPolicy::none();
        assert!(!policy.can_retry(1));
        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
    }

    #[tokio::test]
    async fn two_transient_failures_then_success_takes_three_attempts() {
        let inner = Arc::new(FlakyTransport::failing_with(vec![
            TransportError::Connect("refused".into()),
            TransportError::Timeout("deadline".into()),
        ]));
        let transport = RetryingTransport::new(inner.clone(), fast_policy(3));
        let result = transport.open(&request()).await;
        assert!(result.is_ok());
        assert_eq!(inner.attempts(), 3);
    }

    #[tokio::test]
    async fn transient_failures_exhaust_after_max_attempts() {
        let inner = Arc::new(FlakyTransport::failing_with(vec![
            TransportError::Timeout("1".into()),
            TransportError::Timeout("2".into()),
            TransportError::Timeout("3".into()),
            TransportError::Timeout("never reached".into()),
        ]));
        let transport = RetryingTransport::new(inner.clone(), fast_policy(3));
        let err = transport.open(&request()).await.err().expect("should exhaust");
        assert!(matches!(
            err,
            TransportError::Exhausted { attempts: 3, .. }
        ));
        assert_eq!(inner.attempts(), 3, "no attempt after exhaustion");
    }

    #[tokio::test]
    async fn non_transient_failures_are_not_retried() {
        let inner = Arc::new(FlakyTransport::failing_with(vec![TransportError::Status {
            status: 422,
            body: "validation".into(),
        }]));
        let transport = RetryingTransport::new(inner.clone(), fast_policy(3));
        let err = transport.open(&request()).await.err().expect("should fail");
        assert!(matches!(err, TransportError::Status { status: 422, .. }));
        assert_eq!(inner.attempts(), 1);
    }
}
