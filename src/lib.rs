//! Reports job-queue worker lifecycle metrics to InfluxDB.
//!
//! A worker calls the [`hooks::JobHooks`] methods on an
//! [`hooks::InfluxLogger`] as jobs move through it. Finished and failed jobs
//! become one line-protocol point each, written through a
//! [`sink::MetricSink`].
pub mod builder;
pub mod clock;
pub mod config;
pub mod fields;
pub mod hooks;
pub mod sink;
pub mod transport;

pub mod types {
    pub mod job;
    pub mod point;
    pub mod serialisable;
    pub mod states;
}
