use serde_json::Value;

use crate::error::EnrichmentError;
use crate::record::{JobRecord, FINISH_TIME};
use crate::traits::Enricher;

const START_TIME: &str = "startTime";
const SUBMIT_TIME: &str = "submitTime";

/// Derives `durationMs` (run time) and `queueWaitMs` (time between submit
/// and start) from the server's epoch-millisecond timestamps.
#[derive(Debug, Default)]
pub struct DurationEnricher;

impl DurationEnricher {
    pub const NAME: &'static str = "duration";

    fn millis(&self, record: &JobRecord, field: &str) -> Result<Option<i64>, EnrichmentError> {
        match record.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| EnrichmentError::Failed {
                enricher: Self::NAME.to_string(),
                job_id: record.id().unwrap_or_default().to_string(),
                reason: format!("{} is not an integer: {}", field, value),
            }),
        }
    }
}

impl Enricher for DurationEnricher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enrich(&self, record: &mut JobRecord) -> Result<(), EnrichmentError> {
        let start = self.millis(record, START_TIME)?;
        let submit = self.millis(record, SUBMIT_TIME)?;
        let finish = record.finish_time();

        // The server reports 0 for phases that never happened.
        if let (Some(start), Some(finish)) = (start, finish) {
            if start > 0 && finish >= start {
                record.insert("durationMs", finish - start);
            }
        }
        if let (Some(submit), Some(start)) = (submit, start) {
            if submit > 0 && start >= submit {
                record.insert("queueWaitMs", start - submit);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> JobRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_derives_durations() {
        let mut job = record(json!({
            "id": "job_1",
            "submitTime": 1000,
            "startTime": 1500,
            FINISH_TIME: 4500
        }));

        DurationEnricher.enrich(&mut job).unwrap();

        assert_eq!(job.get("durationMs"), Some(&json!(3000)));
        assert_eq!(job.get("queueWaitMs"), Some(&json!(500)));
    }

    #[test]
    fn test_skips_missing_or_zero_times() {
        let mut job = record(json!({"id": "job_1", "startTime": 0, FINISH_TIME: 4500}));

        DurationEnricher.enrich(&mut job).unwrap();

        assert_eq!(job.get("durationMs"), None);
        assert_eq!(job.get("queueWaitMs"), None);
    }

    #[test]
    fn test_rejects_non_integer_times() {
        let mut job = record(json!({"id": "job_1", "startTime": "noon"}));

        let err = DurationEnricher.enrich(&mut job).unwrap_err();

        assert!(matches!(err, EnrichmentError::Failed { job_id, .. } if job_id == "job_1"));
    }
}
