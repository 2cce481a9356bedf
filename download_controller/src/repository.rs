//! The Data Repository (§4.7): the orchestrator that composes the DAO,
//! the outbox, EKSS and the event publisher into the access-control state
//! machine described in §3 and §4.7.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use remote_storage::ObjectStorage;
use uuid::Uuid;

use crate::config::Config;
use crate::dao::{DaoError, DrsObjectDao};
use crate::ekss_client::{EkssError, EnvelopeClient};
use crate::errors::RepositoryError;
use crate::events::publisher::EventPublisher;
use crate::events::{DownloadServed, FileDeleted, FileRegistered, UnstagedDownloadRequested};
use crate::models::{
    AccessTimeDrsObject, DrsObject, DrsObjectBase, DrsObjectResponseModel, DrsObjectWithAccess,
    DrsObjectWithUri,
};

/// One configured S3-compatible outbox endpoint, addressed by alias.
pub struct OutboxEndpoint {
    pub storage: Arc<dyn ObjectStorage>,
}

/// Every long-lived handle the orchestrator needs, built once at process
/// start and shared (via `Arc`) across every request and background task.
pub struct CoreDependencies {
    pub dao: Arc<dyn DrsObjectDao>,
    pub outbox_endpoints: HashMap<String, OutboxEndpoint>,
    pub ekss_client: Arc<dyn EnvelopeClient>,
    pub publisher: Arc<dyn EventPublisher>,
    pub config: Config,
}

#[derive(Clone)]
pub struct DataRepository {
    deps: Arc<CoreDependencies>,
}

impl DataRepository {
    pub fn new(deps: Arc<CoreDependencies>) -> Self {
        Self { deps }
    }

    fn resolve_endpoint(&self, alias: &str) -> Result<&OutboxEndpoint, RepositoryError> {
        self.deps
            .outbox_endpoints
            .get(alias)
            .ok_or_else(|| RepositoryError::StorageAliasNotConfigured(alias.to_string()))
    }

    fn self_uri(&self, file_id: &str) -> String {
        format!("{}{}", self.deps.config.drs_server_uri, file_id)
    }

    /// §4.7 `access_drs_object`.
    pub async fn access_drs_object(
        &self,
        file_id: &str,
    ) -> Result<DrsObjectResponseModel, RepositoryError> {
        let record = self
            .deps
            .dao
            .get_by_id(file_id)
            .await
            .map_err(map_dao_lookup_error)?;

        let endpoint = self.resolve_endpoint(&record.object.s3_endpoint_alias)?;

        let staged = endpoint
            .storage
            .does_object_exist(record.object_id())
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        if !staged {
            self.deps
                .publisher
                .publish_unstaged_download_requested(UnstagedDownloadRequested {
                    file_id: file_id.to_string(),
                    target_bucket_id: self.deps.config.outbox_bucket.clone(),
                    s3_endpoint_alias: record.object.s3_endpoint_alias.clone(),
                })
                .await
                .map_err(|e| RepositoryError::Unexpected(e.into()))?;

            return Err(RepositoryError::RetryAccessLater {
                retry_after: self.deps.config.retry_access_after(),
            });
        }

        let mut updated = record.clone();
        updated.last_accessed = Utc::now();
        self.deps.dao.update(&updated).await.map_err(|e| match e {
            // a concurrent delete raced us; the delete wins.
            DaoError::ResourceNotFound => RepositoryError::DrsObjectNotFound,
            other => RepositoryError::Unexpected(other.into()),
        })?;

        let access_url = endpoint
            .storage
            .get_object_download_url(updated.object_id())
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        let with_uri = DrsObjectWithUri {
            object: updated.object.clone(),
            self_uri: self.self_uri(file_id),
        };
        let with_access = DrsObjectWithAccess {
            object: with_uri,
            access_url,
        };

        self.deps
            .publisher
            .publish_download_served(DownloadServed {
                file_id: file_id.to_string(),
            })
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        let encrypted_size = endpoint
            .storage
            .get_object_size(updated.object_id())
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        Ok(DrsObjectResponseModel::new(with_access, encrypted_size))
    }

    /// §4.7 `serve_envelope`.
    pub async fn serve_envelope(
        &self,
        file_id: &str,
        public_key: &str,
    ) -> Result<String, RepositoryError> {
        let record = self
            .deps
            .dao
            .get_by_id(file_id)
            .await
            .map_err(map_dao_lookup_error)?;

        self.deps
            .ekss_client
            .get_envelope(&record.object.base.decryption_secret_id, public_key)
            .await
            .map_err(|e| match e {
                EkssError::SecretNotFound => {
                    RepositoryError::EnvelopeNotFound
                }
                EkssError::BadResponseCode(_) | EkssError::RequestFailed(_) => {
                    RepositoryError::ApiCommunicationError {
                        api_url: "ekss".to_string(),
                    }
                }
            })
    }

    /// §4.7 `register_new_file`.
    pub async fn register_new_file(
        &self,
        base: DrsObjectBase,
        s3_endpoint_alias: String,
    ) -> Result<(), RepositoryError> {
        let file_id = base.file_id.clone();
        let object = AccessTimeDrsObject {
            object: DrsObject {
                base,
                object_id: Uuid::new_v4().to_string(),
                s3_endpoint_alias,
            },
            last_accessed: Utc::now(),
        };

        self.deps.dao.insert(&object).await.map_err(|e| match e {
            DaoError::ResourceAlreadyExists => RepositoryError::DuplicateEntry,
            other => RepositoryError::Unexpected(other.into()),
        })?;

        self.deps
            .publisher
            .publish_file_registered(FileRegistered {
                file_id: file_id.clone(),
                self_uri: self.self_uri(&file_id),
            })
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        Ok(())
    }

    /// §4.7 `delete_file`. Ordering: secret, then bytes, then the DAO row,
    /// so a partial failure never leaves the DAO as the sole remaining
    /// source of truth.
    pub async fn delete_file(&self, file_id: &str) -> Result<(), RepositoryError> {
        let record = match self.deps.dao.get_by_id(file_id).await {
            Ok(record) => record,
            Err(DaoError::ResourceNotFound) => return Ok(()),
            Err(other) => return Err(RepositoryError::Unexpected(other.into())),
        };

        match self
            .deps
            .ekss_client
            .delete_secret(&record.object.base.decryption_secret_id)
            .await
        {
            Ok(()) | Err(EkssError::SecretNotFound) => {}
            Err(e) => {
                return Err(RepositoryError::ApiCommunicationError {
                    api_url: format!("ekss delete_secret: {e}"),
                })
            }
        }

        let endpoint = self.resolve_endpoint(&record.object.s3_endpoint_alias)?;
        match endpoint.storage.delete_object(record.object_id()).await {
            Ok(()) => {}
            Err(remote_storage::ObjectStorageError::NotFound(_)) => {}
            Err(e) => return Err(RepositoryError::Unexpected(e.into())),
        }

        self.deps
            .dao
            .delete(file_id)
            .await
            .map_err(|e| match e {
                DaoError::ResourceNotFound => RepositoryError::DrsObjectNotFound,
                other => RepositoryError::Unexpected(other.into()),
            })?;

        self.deps
            .publisher
            .publish_file_deleted(FileDeleted {
                file_id: file_id.to_string(),
            })
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        Ok(())
    }

    /// §4.7 `cleanup_outbox`: enumerates the outbox for `alias`, deletes
    /// every object whose DAO `last_accessed` has aged past
    /// `cache_timeout`. DAO rows are always retained.
    pub async fn cleanup_outbox(&self, alias: &str) -> Result<usize, RepositoryError> {
        let endpoint = self.resolve_endpoint(alias)?;
        let threshold = Utc::now() - self.deps.config.cache_timeout();

        let object_ids = endpoint
            .storage
            .list_all_object_ids()
            .await
            .map_err(|e| RepositoryError::Unexpected(e.into()))?;

        let mut removed = 0;
        for object_id in object_ids {
            let record = self
                .deps
                .dao
                .find_by_object_id(&object_id)
                .await
                .map_err(|e| RepositoryError::CleanupError {
                    object_id: object_id.clone(),
                    cause: e.to_string(),
                })?;

            if record.last_accessed <= threshold {
                match endpoint.storage.delete_object(&object_id).await {
                    Ok(()) => removed += 1,
                    Err(remote_storage::ObjectStorageError::NotFound(_)) => {}
                    Err(e) => {
                        return Err(RepositoryError::CleanupError {
                            object_id,
                            cause: e.to_string(),
                        })
                    }
                }
            }
        }

        Ok(removed)
    }
}

fn map_dao_lookup_error(error: DaoError) -> RepositoryError {
    match error {
        DaoError::ResourceNotFound => RepositoryError::DrsObjectNotFound,
        other => RepositoryError::Unexpected(other.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::tests::InMemoryDrsObjectDao;
    use crate::events::publisher::tests::InMemoryEventPublisher;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct InMemoryOutbox {
        objects: Mutex<StdHashMap<String, u64>>,
    }

    impl InMemoryOutbox {
        fn put(&self, object_id: &str, size: u64) {
            self.objects.lock().unwrap().insert(object_id.to_string(), size);
        }
    }

    #[async_trait]
    impl ObjectStorage for InMemoryOutbox {
        async fn does_object_exist(
            &self,
            object_id: &str,
        ) -> Result<bool, remote_storage::ObjectStorageError> {
            Ok(self.objects.lock().unwrap().contains_key(object_id))
        }

        async fn get_object_size(
            &self,
            object_id: &str,
        ) -> Result<u64, remote_storage::ObjectStorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(object_id)
                .copied()
                .ok_or_else(|| remote_storage::ObjectStorageError::NotFound(object_id.to_string()))
        }

        async fn get_object_download_url(
            &self,
            object_id: &str,
        ) -> Result<String, remote_storage::ObjectStorageError> {
            Ok(format!("https://outbox.example.org/{object_id}"))
        }

        async fn delete_object(
            &self,
            object_id: &str,
        ) -> Result<(), remote_storage::ObjectStorageError> {
            self.objects.lock().unwrap().remove(object_id);
            Ok(())
        }

        async fn list_all_object_ids(&self) -> Result<Vec<String>, remote_storage::ObjectStorageError> {
            Ok(self.objects.lock().unwrap().keys().cloned().collect())
        }
    }

    struct FakeEkss {
        envelope: String,
    }

    #[async_trait]
    impl EnvelopeClient for FakeEkss {
        async fn get_envelope(
            &self,
            _secret_id: &str,
            _receiver_public_key: &str,
        ) -> Result<String, EkssError> {
            Ok(self.envelope.clone())
        }

        async fn delete_secret(&self, _secret_id: &str) -> Result<(), EkssError> {
            Ok(())
        }
    }

    fn sample_config() -> Config {
        toml::from_str(
            r#"
                drs_server_uri = "drs://example.org/"
                presigned_url_expires_after_seconds = 30
                ekss_base_url = "http://ekss.local"
                outbox_bucket = "default"
                mongo_uri = "mongodb://localhost:27017"

                [object_storages.default]
                bucket = "default"
                bucket_region = "eu-central-1"

                [kafka]
                bootstrap_servers = "localhost:9092"
                service_group_id = "download-controller"
            "#,
        )
        .unwrap()
    }

    fn test_repository(outbox: Arc<InMemoryOutbox>) -> (DataRepository, Arc<InMemoryEventPublisher>) {
        let dao = Arc::new(InMemoryDrsObjectDao::default());
        let publisher = Arc::new(InMemoryEventPublisher::default());
        let mut outbox_endpoints = HashMap::new();
        outbox_endpoints.insert(
            "default".to_string(),
            OutboxEndpoint { storage: outbox },
        );

        let deps = Arc::new(CoreDependencies {
            dao,
            outbox_endpoints,
            ekss_client: Arc::new(FakeEkss {
                envelope: "ZW52ZWxvcGU=".to_string(),
            }),
            publisher: publisher.clone(),
            config: sample_config(),
        });

        (DataRepository::new(deps), publisher)
    }

    fn base(file_id: &str) -> DrsObjectBase {
        DrsObjectBase {
            file_id: file_id.to_string(),
            decryption_secret_id: "secret-1".to_string(),
            decrypted_sha256: "abc123".to_string(),
            decrypted_size: 100,
            creation_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn registration_then_access_while_unstaged_returns_retry_later() {
        let outbox = Arc::new(InMemoryOutbox::default());
        let (repo, publisher) = test_repository(outbox);

        repo.register_new_file(base("file-1"), "default".to_string())
            .await
            .unwrap();
        assert_eq!(publisher.file_registered.lock().await.len(), 1);

        let err = repo.access_drs_object("file-1").await.unwrap_err();
        match err {
            RepositoryError::RetryAccessLater { retry_after } => {
                assert!(retry_after >= Duration::from_secs(0));
            }
            other => panic!("expected RetryAccessLater, got {other:?}"),
        }
        assert_eq!(publisher.unstaged_download_requested.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn access_after_staging_returns_200_with_correct_encrypted_size() {
        let outbox = Arc::new(InMemoryOutbox::default());
        let (repo, publisher) = test_repository(outbox.clone());

        repo.register_new_file(base("file-1"), "default".to_string())
            .await
            .unwrap();

        let record = {
            let dao = &repo.deps.dao;
            dao.get_by_id("file-1").await.unwrap()
        };
        outbox.put(record.object_id(), 555);

        let response = repo.access_drs_object("file-1").await.unwrap();
        assert_eq!(response.size, 555);
        assert_eq!(publisher.download_served.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn delete_on_unknown_file_is_a_no_op() {
        let outbox = Arc::new(InMemoryOutbox::default());
        let (repo, publisher) = test_repository(outbox);
        repo.delete_file("never-registered").await.unwrap();
        assert_eq!(publisher.file_deleted.lock().await.len(), 0);
    }

    #[tokio::test]
    async fn delete_on_known_file_removes_everything_and_emits_once() {
        let outbox = Arc::new(InMemoryOutbox::default());
        let (repo, publisher) = test_repository(outbox.clone());

        repo.register_new_file(base("file-1"), "default".to_string())
            .await
            .unwrap();
        let object_id = repo.deps.dao.get_by_id("file-1").await.unwrap().object_id().to_string();
        outbox.put(&object_id, 10);

        repo.delete_file("file-1").await.unwrap();

        assert!(repo.deps.dao.get_by_id("file-1").await.is_err());
        assert!(!outbox.does_object_exist(&object_id).await.unwrap());
        assert_eq!(publisher.file_deleted.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn cleanup_removes_only_aged_objects_and_keeps_dao_rows() {
        let outbox = Arc::new(InMemoryOutbox::default());
        let (repo, _publisher) = test_repository(outbox.clone());

        for (file_id, age_days) in [("file-old", 8), ("file-mid", 6), ("file-new", 1)] {
            repo.register_new_file(base(file_id), "default".to_string())
                .await
                .unwrap();
            let mut record = repo.deps.dao.get_by_id(file_id).await.unwrap();
            record.last_accessed = Utc::now() - chrono::Duration::days(age_days);
            repo.deps.dao.update(&record).await.unwrap();
            outbox.put(record.object_id(), 1);
        }

        let removed = repo.cleanup_outbox("default").await.unwrap();
        assert_eq!(removed, 1);

        assert!(repo.deps.dao.get_by_id("file-old").await.is_ok());
        assert!(repo.deps.dao.get_by_id("file-mid").await.is_ok());
        assert!(repo.deps.dao.get_by_id("file-new").await.is_ok());
    }

    #[tokio::test]
    async fn envelope_not_found_maps_from_ekss_secret_not_found() {
        struct NotFoundEkss;
        #[async_trait]
        impl EnvelopeClient for NotFoundEkss {
            async fn get_envelope(
                &self,
                _secret_id: &str,
                _receiver_public_key: &str,
            ) -> Result<String, EkssError> {
                Err(EkssError::SecretNotFound)
            }
            async fn delete_secret(&self, _secret_id: &str) -> Result<(), EkssError> {
                Ok(())
            }
        }

        let outbox = Arc::new(InMemoryOutbox::default());
        let (repo, _publisher) = test_repository(outbox);
        repo.register_new_file(base("file-1"), "default".to_string())
            .await
            .unwrap();

        let deps = Arc::new(CoreDependencies {
            dao: repo.deps.dao.clone(),
            outbox_endpoints: {
                let mut map = HashMap::new();
                map.insert(
                    "default".to_string(),
                    OutboxEndpoint {
                        storage: repo.deps.outbox_endpoints["default"].storage.clone(),
                    },
                );
                map
            },
            ekss_client: Arc::new(NotFoundEkss),
            publisher: repo.deps.publisher.clone(),
            config: repo.deps.config.clone(),
        });
        let repo_with_missing_secret = DataRepository::new(deps);

        let err = repo_with_missing_secret
            .serve_envelope("file-1", "pubkey")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::EnvelopeNotFound));
    }
}
