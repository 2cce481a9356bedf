//! Typed persistence for registered file records (§4.1), backed by a
//! MongoDB collection named `drs_objects`, keyed by `file_id`.

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::{IndexOptions, ReplaceOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use crate::models::AccessTimeDrsObject;

const COLLECTION_NAME: &str = "drs_objects";

#[derive(Debug, thiserror::Error)]
pub enum DaoError {
    #[error("no document found for this key")]
    ResourceNotFound,
    #[error("a document with this key already exists")]
    ResourceAlreadyExists,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[async_trait]
pub trait DrsObjectDao: Send + Sync {
    async fn insert(&self, object: &AccessTimeDrsObject) -> Result<(), DaoError>;
    async fn update(&self, object: &AccessTimeDrsObject) -> Result<(), DaoError>;
    async fn get_by_id(&self, file_id: &str) -> Result<AccessTimeDrsObject, DaoError>;
    async fn find_by_object_id(
        &self,
        object_id: &str,
    ) -> Result<AccessTimeDrsObject, DaoError>;
    async fn delete(&self, file_id: &str) -> Result<(), DaoError>;
}

pub struct MongoDrsObjectDao {
    collection: Collection<AccessTimeDrsObject>,
}

impl MongoDrsObjectDao {
    pub async fn connect(mongo_uri: &str, db_name: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(mongo_uri).await?;
        let db: Database = client.database(db_name);
        let collection = db.collection::<AccessTimeDrsObject>(COLLECTION_NAME);

        // Guards `object_id` uniqueness; `file_id` is already unique by
        // virtue of being the document's `_id`... we instead key on
        // `file_id` as a plain unique field so lookups don't have to
        // shadow Mongo's `_id` semantics.
        let index = IndexModel::builder()
            .keys(doc! { "file_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(index, None).await?;

        let object_id_index = IndexModel::builder()
            .keys(doc! { "object_id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        collection.create_index(object_id_index, None).await?;

        Ok(Self { collection })
    }
}

#[async_trait]
impl DrsObjectDao for MongoDrsObjectDao {
    async fn insert(&self, object: &AccessTimeDrsObject) -> Result<(), DaoError> {
        match self.collection.insert_one(object, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key_error(&e) => Err(DaoError::ResourceAlreadyExists),
            Err(e) => Err(DaoError::Other(e.into())),
        }
    }

    async fn update(&self, object: &AccessTimeDrsObject) -> Result<(), DaoError> {
        let filter = doc! { "file_id": object.file_id() };
        let result = self
            .collection
            .replace_one(filter, object, ReplaceOptions::default())
            .await
            .map_err(|e| DaoError::Other(e.into()))?;
        if result.matched_count == 0 {
            return Err(DaoError::ResourceNotFound);
        }
        Ok(())
    }

    async fn get_by_id(&self, file_id: &str) -> Result<AccessTimeDrsObject, DaoError> {
        let filter = doc! { "file_id": file_id };
        self.collection
            .find_one(filter, None)
            .await
            .map_err(|e| DaoError::Other(e.into()))?
            .ok_or(DaoError::ResourceNotFound)
    }

    async fn find_by_object_id(
        &self,
        object_id: &str,
    ) -> Result<AccessTimeDrsObject, DaoError> {
        let filter = doc! { "object_id": object_id };
        self.collection
            .find_one(filter, None)
            .await
            .map_err(|e| DaoError::Other(e.into()))?
            .ok_or(DaoError::ResourceNotFound)
    }

    async fn delete(&self, file_id: &str) -> Result<(), DaoError> {
        let filter = doc! { "file_id": file_id };
        let result = self
            .collection
            .delete_one(filter, None)
            .await
            .map_err(|e| DaoError::Other(e.into()))?;
        if result.deleted_count == 0 {
            return Err(DaoError::ResourceNotFound);
        }
        Ok(())
    }
}

fn is_duplicate_key_error(error: &mongodb::error::Error) -> bool {
    use mongodb::error::ErrorKind;
    matches!(error.kind.as_ref(), ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) if we.code == 11000)
}
