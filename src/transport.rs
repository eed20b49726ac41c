//! Delivery of serialised points to InfluxDB's HTTP write endpoint.
use std::future::Future;
use std::io;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Endpoint;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("invalid write URL {url:?}: {reason}")]
    Url { url: String, reason: String },
    #[error("writing to {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("InfluxDB rejected write with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("writing point: {0}")]
    Io(#[from] io::Error),
}

/// One write of line-protocol text at nanosecond precision.
#[derive(Clone, Debug)]
pub struct WriteRequest {
    pub endpoint: Endpoint,
    pub database: String,
    /// `None` writes to the database's default retention policy.
    pub retention_policy: Option<String>,
    pub body: Bytes,
}

impl WriteRequest {
    /// Query parameters for `/write`, in the order InfluxDB documents them.
    pub fn query(&self) -> Vec<(&'static str, &str)> {
        let mut query = vec![("db", self.database.as_str()), ("precision", "n")];
        if let Some(rp) = &self.retention_policy {
            query.push(("rp", rp.as_str()));
        }
        query
    }
}

/// Something that can carry a `WriteRequest` to the metrics store.
pub trait Transport: Send + Sync {
    fn write(
        &self,
        request: &WriteRequest,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Writes over HTTP(S) with `reqwest`, using basic auth when a username is
/// set.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    scheme: &'static str,
}

impl HttpTransport {
    /// `timeout_ms` of 0 means no request timeout.
    pub fn new(ssl: bool, timeout_ms: u64) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder();
        if timeout_ms > 0 {
            builder = builder.timeout(Duration::from_millis(timeout_ms));
        }

        Ok(Self {
            client: builder.build().map_err(TransportError::Client)?,
            scheme: if ssl { "https" } else { "http" },
        })
    }

    fn write_url(&self, request: &WriteRequest) -> Result<Url, TransportError> {
        let Endpoint { host, port, .. } = &request.endpoint;

        // IPv6 literals need brackets inside a URL authority.
        let base = if host.contains(':') && !host.starts_with('[') {
            format!("{}://[{host}]:{port}/write", self.scheme)
        } else {
            format!("{}://{host}:{port}/write", self.scheme)
        };

        Url::parse_with_params(&base, request.query()).map_err(|e| {
            TransportError::Url {
                url: base.clone(),
                reason: e.to_string(),
            }
        })
    }
}

impl Transport for HttpTransport {
    #[instrument(name = "influx_write", skip_all, fields(db = %request.database))]
    async fn write(&self, request: &WriteRequest) -> Result<(), TransportError> {
        let url = self.write_url(request)?;
        debug!(%url, bytes = request.body.len(), "writing point");

        let mut req = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(request.body.clone());

        let Endpoint {
            username, password, ..
        } = &request.endpoint;
        if !username.is_empty() {
            req = req.basic_auth(username, Some(password));
        }

        let response = req.send().await.map_err(|source| {
            TransportError::Request {
                url: url.to_string(),
                source,
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        // The body usually carries InfluxDB's JSON error message; losing it
        // isn't worth failing over.
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected {
            status: status.as_u16(),
            body: body.trim().to_owned(),
        })
    }
}
