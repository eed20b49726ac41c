use std::any;
use std::error::Error;

use serde::Deserialize;

/// The view of a popped job that metrics are derived from. All timestamps are
/// epoch integers in whatever unit the hosting framework records them in.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub class: String,
    pub queue: String,
    /// When the job was first pushed. Older payloads don't carry this, and
    /// the framework names it `queue_time` on the wire.
    #[serde(default, alias = "queue_time")]
    pub enqueue_time: Option<i64>,
    #[serde(default)]
    pub pop_time: Option<i64>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
}

impl JobRecord {
    pub fn new(
        id: impl Into<String>,
        class: impl Into<String>,
        queue: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            queue: queue.into(),
            ..Default::default()
        }
    }
}

/// Describes why a job failed: `kind` becomes the `exception` tag and
/// `message` the `error` field.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Captures an error's message, naming it after its concrete type with
    /// any module path and generic arguments stripped.
    pub fn from_error<E: Error>(error: &E) -> Self {
        Self::new(short_type_name::<E>(), error.to_string())
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
