//! Fire-and-forget delivery of metric points.
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::builder::{build_point, PointError};
use crate::clock::{Clock, SystemClock};
use crate::config::{EndpointError, Env, ProcessEnv, SinkConfig};
use crate::transport::{HttpTransport, Transport, TransportError, WriteRequest};
use crate::types::point::{FieldSet, MetricPoint, TagSet};
use crate::types::serialisable::LineProtocol;

/// Receives a message for every point that couldn't be delivered.
pub trait ErrorLogger: Send + Sync {
    fn error(&self, message: &str);
}

/// Forwards delivery failures to `tracing` at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl ErrorLogger for TracingLogger {
    fn error(&self, message: &str) {
        error!(error = message, "metric point dropped");
    }
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("resolving InfluxDB endpoint: {0}")]
    Endpoint(#[from] EndpointError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// What happened to a point handed to [`MetricSink::emit`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Delivery {
    Sent,
    /// Delivery failed and has already been reported to the error logger.
    Dropped,
}

/// Writes single points to InfluxDB.
///
/// Failures are reported to the configured [`ErrorLogger`] once and then
/// discarded: nothing is retried, and nothing here should ever be allowed to
/// affect the job being measured.
pub struct MetricSink<T = HttpTransport> {
    config: SinkConfig,
    transport: T,
    logger: Option<Arc<dyn ErrorLogger>>,
    clock: Arc<dyn Clock>,
    env: Arc<dyn Env>,
}

impl MetricSink<HttpTransport> {
    /// Creates a sink writing over HTTP, with the transport options taken
    /// from `config`.
    pub fn new(config: SinkConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config.ssl, config.timeout_ms)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> MetricSink<T> {
    pub fn with_transport(config: SinkConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            logger: None,
            clock: Arc::new(SystemClock::new()),
            env: Arc::new(ProcessEnv),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ErrorLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_env(mut self, env: Arc<dyn Env>) -> Self {
        self.env = env;
        self
    }

    pub fn config(&self) -> &SinkConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Builds a point under the configured measurement and default tags,
    /// stamped with the current time, and sends it.
    ///
    /// A malformed point is a bug in the caller and comes back as an error;
    /// a delivery failure does not.
    pub async fn emit(
        &self,
        fields: FieldSet,
        tags: TagSet,
    ) -> Result<Delivery, PointError> {
        let point = build_point(
            &self.config.measurement,
            fields,
            tags,
            &self.config.default_tags,
            self.clock.now_nanos(),
        )?;

        Ok(match self.send(&point).await {
            Ok(()) => Delivery::Sent,
            Err(_) => Delivery::Dropped,
        })
    }

    /// Makes exactly one attempt to write `point`.
    pub async fn send(&self, point: &MetricPoint) -> Result<(), SinkError> {
        let result = self.deliver(point).await;

        if let Err(error) = &result {
            warn!(%error, measurement = point.measurement(), "send failed");
            if let Some(logger) = &self.logger {
                logger.error(&error.to_string());
            }
        }

        result
    }

    async fn deliver(&self, point: &MetricPoint) -> Result<(), SinkError> {
        let endpoint = self.config.resolve(self.env.as_ref())?;
        let line = point.serialise_line_protocol();
        debug!(host = %endpoint.host, port = endpoint.port, %line, "sending");

        let request = WriteRequest {
            endpoint,
            database: self.config.database.clone(),
            retention_policy: self.config.retention_policy.clone(),
            body: Bytes::from(line),
        };

        self.transport.write(&request).await?;
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for MetricSink<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MetricSink")
            .field("config", &self.config)
            .field("transport", &self.transport)
            .field("has_logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}
