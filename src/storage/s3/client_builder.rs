use aws_config::BehaviorVersion;
use aws_config::retry::RetryConfig as SdkRetryConfig;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region, StalledStreamProtectionConfig};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::types::S3Credentials;

const CREDENTIALS_PROVIDER_NAME: &str = "s3unmark";

impl ClientConfig {
    /// Build an S3 client from this configuration.
    ///
    /// Region and credentials not given explicitly are resolved by the
    /// default AWS provider chains (environment, profile, IMDS).
    pub async fn create_client(&self) -> Client {
        let mut config_loader = aws_config::defaults(BehaviorVersion::latest())
            .retry_config(self.build_retry_config())
            .timeout_config(self.build_timeout_config());

        if let Some(region) = self.region.clone() {
            config_loader = config_loader.region(Region::new(region));
        }

        config_loader = match &self.credential {
            S3Credentials::Profile(profile_name) => config_loader.profile_name(profile_name),
            S3Credentials::Credentials { access_keys } => {
                config_loader.credentials_provider(Credentials::new(
                    access_keys.access_key.clone(),
                    access_keys.secret_access_key.clone(),
                    access_keys.session_token.clone(),
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                ))
            }
            S3Credentials::FromEnvironment => config_loader,
        };

        let sdk_config = config_loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.force_path_style)
            .accelerate(self.accelerate)
            .request_checksum_calculation(self.request_checksum_calculation.clone());

        if let Some(endpoint_url) = self.endpoint_url.clone() {
            builder = builder.endpoint_url(endpoint_url);
        }

        if self.disable_stalled_stream_protection {
            builder = builder.stalled_stream_protection(StalledStreamProtectionConfig::disabled());
        }

        Client::from_conf(builder.build())
    }

    fn build_retry_config(&self) -> SdkRetryConfig {
        SdkRetryConfig::standard()
            .with_max_attempts(self.retry_config.aws_max_attempts)
            .with_initial_backoff(Duration::from_millis(
                self.retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> TimeoutConfig {
        let timeouts = &self.cli_timeout_config;
        let mut builder = TimeoutConfig::builder();
        builder
            .set_operation_timeout(timeouts.operation_timeout_milliseconds.map(Duration::from_millis))
            .set_operation_attempt_timeout(
                timeouts
                    .operation_attempt_timeout_milliseconds
                    .map(Duration::from_millis),
            )
            .set_connect_timeout(timeouts.connect_timeout_milliseconds.map(Duration::from_millis))
            .set_read_timeout(timeouts.read_timeout_milliseconds.map(Duration::from_millis));
        builder.build()
    }
}
