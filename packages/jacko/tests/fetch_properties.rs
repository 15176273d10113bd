//! Property tests for the concurrent detail fetcher.

use jacko::pipeline::DetailFetcher;
use jacko::JobRecord;
use jacko::testing::{job, DetailBehavior, MockHistorySource};
use proptest::prelude::*;

/// Success, or one of the failures a single job may hit.
fn behavior(code: u8) -> Option<DetailBehavior> {
    match code % 4 {
        0 => None,
        1 => Some(DetailBehavior::ConnectionError),
        2 => Some(DetailBehavior::Status(503)),
        _ => Some(DetailBehavior::Record(JobRecord::new())),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_results_bounded_and_identified(
        codes in proptest::collection::vec(any::<u8>(), 0..24),
        concurrency in 1usize..8,
    ) {
        let mut source = MockHistorySource::new();
        let mut ids = Vec::new();
        for (n, code) in codes.iter().enumerate() {
            let id = format!("job_{}", n);
            source = match behavior(*code) {
                None => source.with_job(job(&id, n as i64)),
                Some(failure) => source.with_failing_job(id.clone(), failure),
            };
            ids.push(id);
        }
        let expected_ok = codes.iter().filter(|c| *c % 4 == 0).count();

        let records = tokio_test::block_on(
            DetailFetcher::new(source.clone(), concurrency).fetch_all(ids.clone()),
        )
        .unwrap();

        prop_assert!(records.len() <= ids.len());
        prop_assert_eq!(records.len(), expected_ok);
        for record in &records {
            prop_assert!(record.id().map_or(false, |id| !id.is_empty()));
        }
        for id in &ids {
            prop_assert_eq!(source.fetch_count(id), 1);
        }
        prop_assert!(source.max_in_flight() <= concurrency);
    }
}
