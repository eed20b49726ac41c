//! Job lifecycle callbacks for the worker to invoke.
use std::future::Future;

use tracing::{instrument, trace};

use crate::builder::PointError;
use crate::clock::NANOS_PER_SEC;
use crate::fields::job_fields;
use crate::sink::{Delivery, MetricSink};
use crate::transport::{HttpTransport, Transport};
use crate::types::job::{JobFailure, JobRecord};
use crate::types::point::TagSet;
use crate::types::states::JobStatus;

/// The lifecycle events a worker reports, in the order they happen to a job.
///
/// The enqueue, schedule and fork hooks default to doing nothing. The two
/// terminal hooks return an error only for a malformed point, never because
/// delivery failed.
pub trait JobHooks: Send + Sync {
    /// A job was pushed onto `queue`.
    fn after_enqueue(&self, _class: &str, _queue: &str) {}

    /// A job was scheduled to be enqueued at `at` (epoch seconds).
    fn after_schedule(&self, _at: i64, _queue: &str, _class: &str) {}

    /// The worker is about to fork to run `job`.
    fn before_fork(&self, _job: &mut JobRecord) {}

    /// `job` ran to completion.
    fn after_perform(
        &self,
        job: &JobRecord,
    ) -> impl Future<Output = Result<Delivery, PointError>> + Send;

    /// `job` failed with `failure`.
    fn on_failure(
        &self,
        failure: &JobFailure,
        job: &JobRecord,
    ) -> impl Future<Output = Result<Delivery, PointError>> + Send;
}

/// Reports finished and failed jobs to InfluxDB through a [`MetricSink`].
#[derive(Debug)]
pub struct InfluxLogger<T = HttpTransport> {
    sink: MetricSink<T>,
}

impl<T: Transport> InfluxLogger<T> {
    pub fn new(sink: MetricSink<T>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &MetricSink<T> {
        &self.sink
    }
}

fn job_tags(job: &JobRecord) -> TagSet {
    let mut tags = TagSet::new();
    tags.insert("class", job.class.as_str());
    tags.insert("queue", job.queue.as_str());
    tags
}

impl<T: Transport> JobHooks for InfluxLogger<T> {
    fn after_enqueue(&self, class: &str, queue: &str) {
        trace!(class, queue, "enqueued, nothing to report");
    }

    fn after_schedule(&self, at: i64, queue: &str, class: &str) {
        trace!(at, class, queue, "scheduled, nothing to report");
    }

    /// Stamps the start time, in seconds, unless the framework already did.
    /// Starting here means forking and any pre-perform hooks count towards
    /// the execution time.
    fn before_fork(&self, job: &mut JobRecord) {
        let clock = self.sink.clock();
        let start = *job
            .start_time
            .get_or_insert_with(|| clock.now_nanos() / NANOS_PER_SEC);
        trace!(job_id = %job.id, start, "job starting");
    }

    #[instrument(skip_all, fields(job_id = %job.id))]
    async fn after_perform(
        &self,
        job: &JobRecord,
    ) -> Result<Delivery, PointError> {
        let mut tags = job_tags(job);
        tags.insert("status", JobStatus::Finished.as_str());

        self.sink.emit(job_fields(job, None), tags).await
    }

    #[instrument(skip_all, fields(job_id = %job.id))]
    async fn on_failure(
        &self,
        failure: &JobFailure,
        job: &JobRecord,
    ) -> Result<Delivery, PointError> {
        let mut tags = job_tags(job);
        tags.insert("exception", failure.kind.as_str());
        tags.insert("status", JobStatus::Failed.as_str());

        self.sink.emit(job_fields(job, Some(failure)), tags).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::FixedClock;
    use crate::config::SinkConfig;
    use crate::sink::tests::{FakeTransport, RecordingLogger};

    const NOW: i64 = 1_552_482_605_000_000_000;

    fn logger(
        transport: Arc<FakeTransport>,
        errors: Arc<RecordingLogger>,
    ) -> InfluxLogger<Arc<FakeTransport>> {
        let sink = MetricSink::with_transport(SinkConfig::default(), transport)
            .with_clock(Arc::new(FixedClock(NOW)))
            .with_env(Arc::new(Vec::<(&'static str, String)>::new()))
            .with_logger(errors);
        InfluxLogger::new(sink)
    }

    fn job() -> JobRecord {
        JobRecord {
            pop_time: Some(1552481650),
            start_time: Some(1552481660),
            end_time: Some(1552481960),
            ..JobRecord::new("abc123", "SomeClass", "queue")
        }
    }

    #[test]
    fn test_enqueue_and_schedule_send_nothing() {
        let transport = Arc::new(FakeTransport::default());
        let hooks = logger(transport.clone(), Arc::default());

        hooks.after_enqueue("SomeClass", "queue");
        hooks.after_schedule(10000, "queue", "SomeClass");

        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_before_fork_stamps_start_time_once() {
        let transport = Arc::new(FakeTransport::default());
        let hooks = logger(transport.clone(), Arc::default());

        let mut fresh = JobRecord::new("id", "C", "q");
        hooks.before_fork(&mut fresh);
        assert_eq!(fresh.start_time, Some(1552482605));

        let mut stamped = job();
        hooks.before_fork(&mut stamped);
        assert_eq!(stamped.start_time, Some(1552481660));

        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_after_perform() {
        let transport = Arc::new(FakeTransport::default());
        let hooks = logger(transport.clone(), Arc::default());

        assert_eq!(hooks.after_perform(&job()).await, Ok(Delivery::Sent));
        assert_eq!(
            transport.bodies(),
            vec![
                "resque,class=SomeClass,queue=queue,status=finished \
                 start_time=1552481660i,end_time=1552481960i,\
                 pop_time=1552481650i,execution_time=300i,\
                 job_id=\"abc123\" 1552482605000000000"
            ]
        );
    }

    #[tokio::test]
    async fn test_on_failure() {
        let transport = Arc::new(FakeTransport::default());
        let hooks = logger(transport.clone(), Arc::default());
        let job = JobRecord {
            enqueue_time: Some(1552480650),
            ..job()
        };

        let delivery = hooks
            .on_failure(&JobFailure::new("Exception", "FAILURE"), &job)
            .await;

        assert_eq!(delivery, Ok(Delivery::Sent));
        assert_eq!(
            transport.bodies(),
            vec![
                "resque,class=SomeClass,queue=queue,exception=Exception,\
                 status=failed start_time=1552481660i,end_time=1552481960i,\
                 pop_time=1552481650i,execution_time=300i,queue_time=1000i,\
                 job_id=\"abc123\",error=\"FAILURE\" 1552482605000000000"
            ]
        );
    }

    #[tokio::test]
    async fn test_delivery_failure_leaves_job_outcome_alone() {
        let transport = Arc::new(FakeTransport::failing(500));
        let errors = Arc::new(RecordingLogger::default());
        let hooks = logger(transport, errors.clone());

        let delivery = hooks
            .on_failure(&JobFailure::new("Exception", "FAILURE"), &job())
            .await;

        assert_eq!(delivery, Ok(Delivery::Dropped));
        assert_eq!(errors.messages.lock().unwrap().len(), 1);
    }
}
