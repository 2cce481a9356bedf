use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::environment::EnvironmentVariableCredentialsProvider;
use aws_config::identity::IdentityCache;
use aws_config::imds::credentials::ImdsCredentialsProvider;
use aws_config::meta::credentials::CredentialsProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::provider_config::ProviderConfig;
use aws_config::web_identity_token::WebIdentityTokenCredentialsProvider;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_s3::config::{Builder, Region, RetryConfigBuilder};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::RetryMode;
use aws_sdk_s3::Client;
use aws_smithy_async::rt::sleep::{AsyncSleep, SharedAsyncSleep, TokioSleep};

use crate::{ObjectStorage, ObjectStorageError, S3Config};

pub struct S3Bucket {
    client: Client,
    bucket_name: String,
    presigned_url_expiry: Duration,
}

impl S3Bucket {
    /// Builds the S3 client, following the AWS SDK's standard credential
    /// chain: environment, then SSO profile, then web identity token,
    /// then the instance metadata service.
    pub fn new(config: &S3Config) -> anyhow::Result<Self> {
        tracing::debug!(
            bucket = %config.bucket_name,
            region = %config.bucket_region,
            "creating S3 outbox client"
        );

        let region = Some(Region::new(config.bucket_region.clone()));
        let provider_conf = ProviderConfig::without_region().with_region(region.clone());

        let credentials_provider = CredentialsProviderChain::first_try(
            "env",
            EnvironmentVariableCredentialsProvider::new(),
        )
        .or_else(
            "profile-sso",
            ProfileFileCredentialsProvider::builder()
                .configure(&provider_conf)
                .build(),
        )
        .or_else(
            "token",
            WebIdentityTokenCredentialsProvider::builder()
                .configure(&provider_conf)
                .build(),
        )
        .or_else("imds", ImdsCredentialsProvider::builder().build());

        let sleep_impl: Arc<dyn AsyncSleep> = Arc::new(TokioSleep::new());

        // We perform our own retries via `backoff::retry`; the SDK's own
        // retry budget only needs to exist so throttling responses engage
        // adaptive rate limiting.
        let mut retry_config = RetryConfigBuilder::new();
        retry_config
            .set_max_attempts(Some(1))
            .set_mode(Some(RetryMode::Adaptive));

        let mut config_builder = Builder::default()
            .behavior_version(BehaviorVersion::v2023_11_09())
            .region(region)
            .identity_cache(IdentityCache::lazy().build())
            .credentials_provider(SharedCredentialsProvider::new(credentials_provider))
            .retry_config(retry_config.build())
            .sleep_impl(SharedAsyncSleep::from(sleep_impl));

        if let Some(endpoint) = &config.endpoint {
            config_builder = config_builder.endpoint_url(endpoint.clone());
        }
        if config.force_path_style {
            config_builder = config_builder.force_path_style(true);
        }

        let client = Client::from_conf(config_builder.build());

        Ok(Self {
            client,
            bucket_name: config.bucket_name.clone(),
            presigned_url_expiry: config.presigned_url_expiry,
        })
    }

}

#[async_trait]
impl ObjectStorage for S3Bucket {
    async fn does_object_exist(&self, object_id: &str) -> Result<bool, ObjectStorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(object_id)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(e)) if matches!(e.err(), HeadObjectError::NotFound(_)) => {
                Ok(false)
            }
            Err(e) => Err(ObjectStorageError::Other(
                anyhow::Error::new(e).context("head_object"),
            )),
        }
    }

    async fn get_object_size(&self, object_id: &str) -> Result<u64, ObjectStorageError> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket_name)
            .key(object_id)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(se) if matches!(se.err(), HeadObjectError::NotFound(_)) => {
                    ObjectStorageError::NotFound(object_id.to_string())
                }
                _ => ObjectStorageError::Other(anyhow::Error::new(e).context("head_object")),
            })?;

        let size = output.content_length().unwrap_or_default();
        u64::try_from(size)
            .map_err(|_| ObjectStorageError::Other(anyhow::anyhow!("negative content-length")))
    }

    async fn get_object_download_url(&self, object_id: &str) -> Result<String, ObjectStorageError> {
        let presigning_config = PresigningConfig::expires_in(self.presigned_url_expiry)
            .map_err(|e| ObjectStorageError::Other(e.into()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(object_id)
            .presigned(presigning_config)
            .await
            .map_err(|e| {
                ObjectStorageError::Other(anyhow::Error::new(e).context("presign get_object"))
            })?;

        Ok(presigned.uri().to_string())
    }

    async fn delete_object(&self, object_id: &str) -> Result<(), ObjectStorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(object_id)
            .send()
            .await
            .map_err(|e| ObjectStorageError::Other(anyhow::Error::new(e).context("delete_object")))?;
        Ok(())
    }

    async fn list_all_object_ids(&self) -> Result<Vec<String>, ObjectStorageError> {
        let mut object_ids = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket_name);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ObjectStorageError::Other(anyhow::Error::new(e).context("list_objects_v2")))?;

            object_ids.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_owned)),
            );

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(object_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_force_path_style_defaults_true() {
        let json = serde_json::json!({
            "bucket_name": "outbox",
            "bucket_region": "eu-central-1",
            "endpoint": null,
            "presigned_url_expiry": {"secs": 30, "nanos": 0},
        });
        let config: S3Config = serde_json::from_value(json).unwrap();
        assert!(config.force_path_style);
        assert_eq!(config.concurrency_limit.get(), 100);
    }
}
