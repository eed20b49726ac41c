//! Sink configuration and endpoint resolution.
use std::path::Path;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;

use crate::types::point::TagSet;

pub const ENV_HOST: &str = "INFLUXDB_HOST";
pub const ENV_PORT: &str = "INFLUXDB_PORT";
pub const ENV_USERNAME: &str = "INFLUXDB_USERNAME";
pub const ENV_PASSWORD: &str = "INFLUXDB_PASSWORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("parsing {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Where and how points are written. Explicit setter calls and YAML files
/// provide the base values; the `INFLUXDB_*` environment variables are
/// overlaid on top at send time by [`SinkConfig::resolve`].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub retention_policy: Option<String>,
    pub measurement: String,
    pub default_tags: TagSet,
    /// Talk HTTPS rather than HTTP.
    pub ssl: bool,
    /// Request timeout in milliseconds; 0 leaves it to the HTTP client.
    pub timeout_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8086,
            username: String::new(),
            password: String::new(),
            database: "resque".into(),
            retention_policy: None,
            measurement: "resque".into(),
            default_tags: TagSet::new(),
            ssl: false,
            timeout_ms: 0,
        }
    }
}

impl SinkConfig {
    pub fn from_yaml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.display().to_string(),
                source,
            })?;

        serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn set_host(
        &mut self,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) {
        self.host = host.into();
        self.port = port;
        self.username = username.into();
        self.password = password.into();
    }

    pub fn set_database(&mut self, database: impl Into<String>) {
        self.database = database.into();
    }

    pub fn set_retention_policy(&mut self, policy: impl Into<String>) {
        self.retention_policy = Some(policy.into());
    }

    pub fn set_measurement(&mut self, name: impl Into<String>) {
        self.measurement = name.into();
    }

    pub fn set_default_tags(&mut self, tags: TagSet) {
        self.default_tags = tags;
    }

    /// Overlays non-empty `INFLUXDB_*` variables from `env` onto the
    /// configured connection settings.
    ///
    /// A host containing exactly one colon is taken as `host:port`. Hosts
    /// with more colons (bare IPv6 literals) are passed through untouched.
    pub fn resolve(&self, env: &dyn Env) -> Result<Endpoint, EndpointError> {
        let lookup = |name: &str| env.var(name).filter(|v| !v.is_empty());

        let mut host = lookup(ENV_HOST).unwrap_or_else(|| self.host.clone());
        let mut port = match lookup(ENV_PORT) {
            Some(port) => parse_port(&port)?,
            None => self.port,
        };
        let username =
            lookup(ENV_USERNAME).unwrap_or_else(|| self.username.clone());
        let password =
            lookup(ENV_PASSWORD).unwrap_or_else(|| self.password.clone());

        if host.matches(':').count() == 1 {
            if let Some((h, p)) = host.split_once(':') {
                port = parse_port(p)?;
                host = h.to_owned();
            }
        }

        if host.is_empty() {
            return Err(EndpointError::EmptyHost);
        }

        Ok(Endpoint {
            host,
            port,
            username,
            password,
        })
    }
}

fn parse_port(value: &str) -> Result<u16, EndpointError> {
    value
        .trim()
        .parse()
        .map_err(|_| EndpointError::BadPort(value.to_owned()))
}

#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum EndpointError {
    #[error("no InfluxDB host configured")]
    EmptyHost,
    #[error("{0:?} is not a valid port")]
    BadPort(String),
}

/// Connection details after the environment has been applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Looks up environment variables. Injected so tests don't have to mutate
/// the real process environment.
pub trait Env: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl Env for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

/// A fixed set of variables, for tests and embedding.
impl Env for Vec<(&'static str, String)> {
    fn var(&self, name: &str) -> Option<String> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v.clone())
    }
}
