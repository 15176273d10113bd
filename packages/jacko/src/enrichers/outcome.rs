use serde_json::Value;

use crate::error::EnrichmentError;
use crate::record::JobRecord;
use crate::traits::Enricher;

/// Flattens a job's final state into `succeeded` and `taskFailures`.
#[derive(Debug, Default)]
pub struct OutcomeEnricher;

impl OutcomeEnricher {
    pub const NAME: &'static str = "outcome";
}

impl Enricher for OutcomeEnricher {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn enrich(&self, record: &mut JobRecord) -> Result<(), EnrichmentError> {
        if let Some(state) = record.get("state").and_then(Value::as_str) {
            let succeeded = state == "SUCCEEDED";
            record.insert("succeeded", succeeded);
        }

        let failed_maps = record.get("failedMapAttempts").and_then(Value::as_i64);
        let failed_reduces = record.get("failedReduceAttempts").and_then(Value::as_i64);
        if failed_maps.is_some() || failed_reduces.is_some() {
            let failures = failed_maps.unwrap_or(0) + failed_reduces.unwrap_or(0);
            record.insert("taskFailures", failures);
        }
        Ok(())
    }
}
