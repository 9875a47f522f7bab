// End-to-end accounting invariants of the sweep pipeline.
//
// For any number of markers, batch size, worker count and set of refused
// keys, every found marker ends up either deleted or failed, the number of
// batches is ceil(found / batch_size), and the success rate matches the
// counts.

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use proptest::prelude::*;

    use crate::pipeline::SweepPipeline;
    use crate::test_utils::{MockStorage, make_markers, make_test_config};
    use crate::types::MarkerRef;
    use crate::types::token::create_pipeline_cancellation_token;

    fn paged(total: usize, page_size: usize) -> Vec<Vec<MarkerRef>> {
        if total == 0 {
            return vec![vec![]];
        }
        make_markers(0, total)
            .chunks(page_size)
            .map(<[MarkerRef]>::to_vec)
            .collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn every_found_marker_is_deleted_or_failed(
            total in 0usize..2500,
            page_size in 1usize..1200,
            batch_size in 1u16..=1000,
            worker_size in 1u16..5,
            failing in proptest::collection::hash_set(0usize..2500, 0..5),
        ) {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            rt.block_on(async {
                let failing_keys: Vec<String> = failing
                    .iter()
                    .filter(|i| **i < total)
                    .map(|i| format!("key{i}"))
                    .collect();
                let failing_refs: Vec<&str> = failing_keys.iter().map(String::as_str).collect();

                let storage = MockStorage::with_pages(paged(total, page_size))
                    .with_failing_keys(&failing_refs);

                let mut config = make_test_config();
                config.batch_size = batch_size;
                config.worker_size = worker_size;

                let mut pipeline = SweepPipeline::with_storage(
                    config,
                    create_pipeline_cancellation_token(),
                    Box::new(storage.clone()),
                );
                pipeline.run().await;

                let summary = pipeline.get_summary().unwrap();
                let expected_batches = total.div_ceil(batch_size as usize);

                prop_assert_eq!(summary.total_found, total as u64);
                prop_assert_eq!(summary.total_errors, failing_keys.len() as u64);
                prop_assert_eq!(summary.total_deleted + summary.total_errors, total as u64);
                prop_assert_eq!(summary.batches, expected_batches);
                prop_assert_eq!(storage.bulk_calls.load(Ordering::SeqCst), expected_batches);
                prop_assert_eq!(pipeline.has_warning(), !failing_keys.is_empty());

                if total == 0 {
                    prop_assert_eq!(summary.success_rate_percent, 0.0);
                } else {
                    let expected_rate = summary.total_deleted as f64 / total as f64 * 100.0;
                    prop_assert!((summary.success_rate_percent - expected_rate).abs() < 1e-9);
                }
                Ok(())
            })?;
        }
    }
}
