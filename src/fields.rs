//! Derives metric fields from a job's lifecycle timestamps.
use crate::types::job::{JobFailure, JobRecord};
use crate::types::point::FieldSet;

/// Computes the fields reported for a job that has just finished or failed.
///
/// Every entry is optional on its source being present: `execution_time`
/// needs both a start and end time, `queue_time` both an enqueue and pop
/// time. Durations are not clamped, so a negative value means the framework
/// recorded its timestamps out of order. Subtraction wraps rather than
/// panicking on absurd inputs.
pub fn job_fields(job: &JobRecord, failure: Option<&JobFailure>) -> FieldSet {
    let mut fields = FieldSet::new();

    if let Some(start) = job.start_time {
        fields.insert("start_time", start);
    }
    if let Some(end) = job.end_time {
        fields.insert("end_time", end);
    }
    if let Some(pop) = job.pop_time {
        fields.insert("pop_time", pop);
    }
    if let (Some(start), Some(end)) = (job.start_time, job.end_time) {
        fields.insert("execution_time", end.wrapping_sub(start));
    }
    if let (Some(enqueued), Some(pop)) = (job.enqueue_time, job.pop_time) {
        fields.insert("queue_time", pop.wrapping_sub(enqueued));
    }

    fields.insert("job_id", job.id.as_str());

    if let Some(failure) = failure {
        fields.insert("error", failure.message.as_str());
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::point::FieldValue;

    fn job() -> JobRecord {
        JobRecord {
            pop_time: Some(1552481650),
            start_time: Some(1552481660),
            end_time: Some(1552481960),
            ..JobRecord::new("abc123", "SomeClass", "queue")
        }
    }

    #[test]
    fn test_finished_job_without_enqueue_time() {
        let expected: FieldSet = [
            ("start_time", FieldValue::Integer(1552481660)),
            ("end_time", FieldValue::Integer(1552481960)),
            ("pop_time", FieldValue::Integer(1552481650)),
            ("execution_time", FieldValue::Integer(300)),
            ("job_id", FieldValue::String("abc123".into())),
        ]
        .into_iter()
        .collect();

        let fields = job_fields(&job(), None);
        assert_eq!(fields, expected);
        assert!(!fields.contains_key("queue_time"));
    }

    #[test]
    fn test_failed_job_with_enqueue_time() {
        let job = JobRecord {
            enqueue_time: Some(1552480650),
            ..job()
        };
        let failure = JobFailure::new("Exception", "FAILURE");

        let fields = job_fields(&job, Some(&failure));
        assert_eq!(fields.get("queue_time"), Some(&FieldValue::Integer(1000)));
        assert_eq!(
            fields.get("error"),
            Some(&FieldValue::String("FAILURE".into()))
        );
        assert_eq!(fields.len(), 7);
    }

    #[test]
    fn test_execution_time_is_exact_and_unclamped() {
        for (start, end) in [(0, 0), (10, 11), (1552481660, 1552482605)] {
            let job = JobRecord {
                start_time: Some(start),
                end_time: Some(end),
                ..job()
            };
            assert_eq!(
                job_fields(&job, None).get("execution_time"),
                Some(&FieldValue::Integer(end - start))
            );
        }

        let backwards = JobRecord {
            start_time: Some(20),
            end_time: Some(5),
            ..job()
        };
        assert_eq!(
            job_fields(&backwards, None).get("execution_time"),
            Some(&FieldValue::Integer(-15))
        );
    }

    #[test]
    fn test_missing_timestamps_are_omitted() {
        let bare = JobRecord::new("id", "C", "q");
        let fields = job_fields(&bare, None);

        let keys: Vec<_> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["job_id"]);

        let no_start = JobRecord {
            start_time: None,
            ..job()
        };
        assert!(!job_fields(&no_start, None).contains_key("execution_time"));
    }

    #[test]
    fn test_extreme_timestamps_do_not_panic() {
        let job = JobRecord {
            start_time: Some(i64::MIN),
            end_time: Some(1),
            ..job()
        };
        assert_eq!(
            job_fields(&job, None).get("execution_time"),
            Some(&FieldValue::Integer(1i64.wrapping_sub(i64::MIN)))
        );

        let yaml = "id: x\nclass: C\nqueue: q\n\
                    queue_time: -9223372036854775808\npop_time: 10\n";
        let job: JobRecord = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            job_fields(&job, None).get("queue_time"),
            Some(&FieldValue::Integer(10i64.wrapping_sub(i64::MIN)))
        );
    }
}
