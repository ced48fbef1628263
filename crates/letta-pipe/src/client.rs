use std::sync::Arc;

use crate::config::LettaConfig;
use crate::diagnostics::DiagnosticLog;
use crate::errors::ClientError;
use crate::message::Message;
use crate::run::RunBuilder;
use crate::transport::{ByteTransport, HttpTransport, RetryPolicy, RetryingTransport};

pub(crate) struct ClientInner {
    pub(crate) config: LettaConfig,
    pub(crate) transport: Arc<dyn ByteTransport>,
    pub(crate) diagnostics: Option<Arc<DiagnosticLog>>,
    custom_transport: Option<Arc<dyn ByteTransport>>,
    retry_policy: RetryPolicy,
}

/// Entry point for streaming agent conversations.
///
/// A client is an immutable snapshot of configuration plus a transport;
/// cloning is cheap and runs started from one client never observe later
/// configuration changes.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Starts a builder for configuring and creating a `Client`.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Creates a client with the default HTTP transport and retry policy.
    pub fn new(config: LettaConfig) -> Result<Self, ClientError> {
        Self::builder().config(config).build()
    }

    /// Creates a client from `LETTA_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(LettaConfig::from_env()?)
    }

    /// The configuration snapshot this client was built with.
    pub fn config(&self) -> &LettaConfig {
        &self.inner.config
    }

    /// Starts building a run over the given conversation history.
    pub fn run(&self, conversation: Vec<Message>) -> RunBuilder {
        RunBuilder::new(self.inner.clone(), conversation)
    }

    /// Builds a new client from a replacement configuration snapshot.
    ///
    /// Runs already in flight keep the old snapshot. An injected transport
    /// is carried over; the default HTTP transport is rebuilt so credential
    /// and timeout changes take effect.
    pub fn with_config(&self, config: LettaConfig) -> Result<Client, ClientError> {
        let mut builder = Client::builder()
            .config(config)
            .retry_policy(self.inner.retry_policy.clone());
        if let Some(custom) = &self.inner.custom_transport {
            builder = builder.transport(custom.clone());
        }
        builder.build()
    }
}

/// Builder used to assemble a `Client`.
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<LettaConfig>,
    transport: Option<Arc<dyn ByteTransport>>,
    retry_policy: Option<RetryPolicy>,
}

impl ClientBuilder {
    /// Sets the configuration snapshot. Required.
    pub fn config(mut self, config: LettaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the HTTP transport, e.g. with a fake for tests. The
    /// replacement is still wrapped in the retrying transport.
    pub fn transport(mut self, transport: Arc<dyn ByteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Overrides the connection retry policy.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Validates the configuration and builds the client.
    pub fn build(self) -> Result<Client, ClientError> {
        let config = self
            .config
            .ok_or_else(|| ClientError::Config("client config is required".into()))?;
        config.validate()?;

        let diagnostics = match &config.diagnostics {
            Some(diag) => Some(Arc::new(DiagnosticLog::open(&diag.log_path)?)),
            None => None,
        };

        let retry_policy = self.retry_policy.unwrap_or_default();
        let base: Arc<dyn ByteTransport> = match &self.transport {
            Some(custom) => custom.clone(),
            None => Arc::new(HttpTransport::new(&config)?),
        };
        let transport: Arc<dyn ByteTransport> =
            Arc::new(RetryingTransport::new(base, retry_policy.clone()));

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                transport,
                diagnostics,
                custom_transport: self.transport,
                retry_policy,
            }),
        })
    }
}
