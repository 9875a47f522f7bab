// Configuration validation properties.
//
// Batch size and worker count accept exactly their documented ranges, and
// bucket names follow the S3 naming rules.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::config::args::parse_from_args;
    use crate::config::{Config, validate_bucket_name};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn batch_size_accepted_only_within_1_to_1000(batch_size in 0u16..3000) {
            let mut config = Config::for_target("test-bucket", "");
            config.batch_size = batch_size;
            prop_assert_eq!(config.validate().is_ok(), (1..=1000).contains(&batch_size));
        }

        #[test]
        fn worker_size_accepted_from_cli(worker_size in 1u16..=u16::MAX) {
            let worker_size = worker_size.to_string();
            let args = vec![
                "s3unmark",
                "--worker-size",
                worker_size.as_str(),
                "s3://test-bucket/prefix/",
            ];
            let config = Config::try_from(parse_from_args(args).unwrap());
            prop_assert!(config.is_ok());
        }

        #[test]
        fn valid_bucket_names_are_accepted(name in "[a-z0-9][a-z0-9-]{1,61}[a-z0-9]") {
            prop_assert!(validate_bucket_name(&name).is_ok());
        }

        #[test]
        fn uppercase_bucket_names_are_rejected(name in "[a-z0-9]{1,20}[A-Z][a-z0-9]{1,20}") {
            prop_assert!(validate_bucket_name(&name).is_err());
        }

        #[test]
        fn overlong_bucket_names_are_rejected(name in "[a-z]{64,80}") {
            prop_assert!(validate_bucket_name(&name).is_err());
        }
    }
}
