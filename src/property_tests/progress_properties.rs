// Progress accountant invariants.
//
// Renders are gated by the interval: between two non-forced renders at least
// `interval` has passed. Counters equal the sum of the deltas, and the
// success rate stays within 0..=1 and is 0 when nothing was processed.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::progress::tests::{ManualClock, RecordingReporter};
    use crate::progress::{ProgressAccountant, success_rate};
    use crate::types::error::Phase;

    // (advance_ms, processed, failed)
    fn arb_updates() -> impl Strategy<Value = Vec<(u64, u64, u64)>> {
        proptest::collection::vec(
            (0u64..3000, 0u64..50).prop_flat_map(|(advance, processed)| {
                (Just(advance), Just(processed), 0..=processed)
            }),
            0..60,
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn renders_are_at_least_one_interval_apart(
            interval_ms in 1u64..5000,
            updates in arb_updates(),
        ) {
            let clock = Arc::new(ManualClock::new());
            let reporter = Arc::new(RecordingReporter::default());
            let mut accountant = ProgressAccountant::new(
                Phase::Deletion,
                Some(10_000),
                Duration::from_millis(interval_ms),
                clock.clone(),
                reporter.clone(),
            );

            let mut elapsed_at_render = vec![];
            for (advance, processed, failed) in &updates {
                clock.advance(Duration::from_millis(*advance));
                let before = reporter.count();
                accountant.update(*processed, *failed);
                if reporter.count() > before {
                    elapsed_at_render.push(reporter.last().unwrap().elapsed);
                }
            }

            prop_assert!(reporter.count() <= updates.len());
            let mut last = Duration::ZERO;
            for elapsed in elapsed_at_render {
                prop_assert!(elapsed - last >= Duration::from_millis(interval_ms));
                last = elapsed;
            }

            let summary = accountant.complete_snapshot();
            let processed: u64 = updates.iter().map(|(_, p, _)| p).sum();
            let failed: u64 = updates.iter().map(|(_, _, f)| f).sum();
            prop_assert_eq!(summary.processed, processed);
            prop_assert_eq!(summary.failed, failed);
            prop_assert_eq!(summary.succeeded, processed - failed);
            prop_assert!(reporter.last().unwrap().completed);
        }

        #[test]
        fn success_rate_is_a_fraction(
            processed in 0u64..10_000,
            failed_ratio in 0.0f64..=1.0,
            total in proptest::option::of(0u64..20_000),
        ) {
            let failed = (processed as f64 * failed_ratio) as u64;
            let succeeded = processed - failed;
            let total = total.map(|t| t.max(processed));

            let rate = success_rate(succeeded, processed, total);
            prop_assert!((0.0..=1.0).contains(&rate));
            if total.unwrap_or(processed) == 0 {
                prop_assert_eq!(rate, 0.0);
            }
        }
    }
}
