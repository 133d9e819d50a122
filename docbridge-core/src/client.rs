// docbridge-core/src/client.rs
// DocumentStoreClient - identity-oriented CRUD over the MongoDB driver
//
// FILE STRUCTURE:
// ├── Construction (new, connect, lazy)
// ├── Insert (insert_one, insert_many)
// ├── Update (update_by_id, update_one, update_many, replace_by_id)
// ├── Delete (delete_by_id, delete_by_ids, delete_one, delete_many)
// ├── Query (find_by_id, find_by_ids, find_one, find_all_by_id, find_many,
// │          exists_by_id, exists, count, aggregate)
// ├── Administration (create_id_index, list_collections, drop_*, ping)
// ├── Handles (collection, database, raw_client)
// └── Lifecycle (close, is_connected, state, connection_info)
//
// Every operation validates its arguments first, then acquires the shared
// driver client and forwards the driver's result or error unchanged.

use std::sync::Arc;

use futures::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::options::{CountOptions, IndexOptions, UpdateOptions};
use mongodb::results::{DeleteResult, InsertManyResult, InsertOneResult, UpdateResult};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::config::{ClientConfig, ConnectMode};
use crate::connection::{Connection, ConnectionInfo, ConnectionState};
use crate::error::{DocBridgeError, Result};
use crate::find_options::FindOptions;
use crate::identity::{IdField, Identifier};
use crate::validate;

/// Name MongoDB gives the built-in `_id` index
const NATIVE_ID_INDEX: &str = "_id_";

/// Client for a single database, looking documents up by an
/// application-chosen id field.
///
/// Cloning is cheap; clones share one connection.
///
/// ```rust,no_run
/// use docbridge_core::DocumentStoreClient;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> docbridge_core::Result<()> {
/// let client = DocumentStoreClient::connect("mongodb://localhost:27017", "test").await?;
///
/// client
///     .insert_one("users", &User { id: "1".into(), name: "Akshay".into() })
///     .await?;
///
/// let user: Option<User> = client.find_by_id("users", "1").await?;
/// assert_eq!(user.map(|u| u.name).as_deref(), Some("Akshay"));
///
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DocumentStoreClient {
    connection: Arc<Connection>,
    id_field: IdField,
}

impl DocumentStoreClient {
    // ========== CONSTRUCTION ==========

    /// Create a client from `config`, connecting immediately when
    /// `connect_mode` is [`ConnectMode::Eager`].
    pub async fn new(config: ClientConfig) -> Result<Self> {
        let eager = config.connect_mode == ConnectMode::Eager;
        let client = Self::build(config)?;
        if eager {
            client.connection.connect().await?;
        }
        Ok(client)
    }

    /// Connect eagerly with default settings.
    pub async fn connect(url: &str, database: &str) -> Result<Self> {
        Self::new(ClientConfig::new(url, database).with_connect_mode(ConnectMode::Eager)).await
    }

    /// Client that connects on its first operation. Performs no I/O.
    pub fn lazy(url: &str, database: &str) -> Result<Self> {
        Self::build(ClientConfig::new(url, database).with_connect_mode(ConnectMode::Lazy))
    }

    fn build(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let id_field = IdField::new(config.id_field.clone())?;
        debug!(
            database = %config.database_name,
            id_field = %id_field,
            mode = ?config.connect_mode,
            "creating document store client"
        );
        Ok(Self {
            connection: Arc::new(Connection::new(config)),
            id_field,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        self.connection.config()
    }

    pub fn id_field(&self) -> &IdField {
        &self.id_field
    }

    pub fn database_name(&self) -> &str {
        &self.config().database_name
    }

    // ========== INSERT ==========

    pub async fn insert_one<T>(&self, collection: &str, data: &T) -> Result<InsertOneResult>
    where
        T: Serialize + Send + Sync,
    {
        let coll = self.typed_collection::<T>(collection).await?;
        debug!(collection, "insert_one");
        Ok(coll.insert_one(data).await?)
    }

    pub async fn insert_many<T>(&self, collection: &str, data: &[T]) -> Result<InsertManyResult>
    where
        T: Serialize + Send + Sync,
    {
        validate::documents(data)?;
        let coll = self.typed_collection::<T>(collection).await?;
        debug!(collection, count = data.len(), "insert_many");
        Ok(coll.insert_many(data.iter()).await?)
    }

    // ========== UPDATE ==========

    /// `$set` the fields of `data` on the document whose id field equals `id`.
    pub async fn update_by_id<T>(
        &self,
        collection: &str,
        id: impl Into<Identifier>,
        data: &T,
    ) -> Result<UpdateResult>
    where
        T: Serialize,
    {
        let filter = self.id_filter(id.into())?;
        let update = set_update(data)?;
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "update_by_id");
        Ok(coll.update_one(filter, update).await?)
    }

    /// `$set` the fields of `data` on the first document matching `filter`.
    pub async fn update_one<T>(
        &self,
        collection: &str,
        filter: Document,
        data: &T,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Result<UpdateResult>
    where
        T: Serialize,
    {
        let update = set_update(data)?;
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "update_one");
        Ok(coll.update_one(filter, update).with_options(options).await?)
    }

    pub async fn update_many<T>(
        &self,
        collection: &str,
        filter: Document,
        data: &T,
    ) -> Result<UpdateResult>
    where
        T: Serialize,
    {
        let update = set_update(data)?;
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "update_many");
        Ok(coll.update_many(filter, update).await?)
    }

    /// Replace the whole document whose id field equals `id`.
    pub async fn replace_by_id<T>(
        &self,
        collection: &str,
        id: impl Into<Identifier>,
        data: &T,
    ) -> Result<UpdateResult>
    where
        T: Serialize + Send + Sync,
    {
        let filter = self.id_filter(id.into())?;
        let coll = self.typed_collection::<T>(collection).await?;
        debug!(collection, filter = %filter, "replace_by_id");
        Ok(coll.replace_one(filter, data).await?)
    }

    // ========== DELETE ==========

    pub async fn delete_by_id(
        &self,
        collection: &str,
        id: impl Into<Identifier>,
    ) -> Result<DeleteResult> {
        let filter = self.id_filter(id.into())?;
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "delete_by_id");
        Ok(coll.delete_one(filter).await?)
    }

    /// Delete every document whose id is in `ids`.
    pub async fn delete_by_ids(&self, collection: &str, ids: &[Identifier]) -> Result<DeleteResult> {
        let filter = self.ids_filter(ids)?;
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, count = ids.len(), "delete_by_ids");
        Ok(coll.delete_many(filter).await?)
    }

    pub async fn delete_one(&self, collection: &str, filter: Document) -> Result<DeleteResult> {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "delete_one");
        Ok(coll.delete_one(filter).await?)
    }

    pub async fn delete_many(&self, collection: &str, filter: Document) -> Result<DeleteResult> {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "delete_many");
        Ok(coll.delete_many(filter).await?)
    }

    // ========== QUERY ==========

    pub async fn find_by_id<T>(&self, collection: &str, id: impl Into<Identifier>) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let filter = self.id_filter(id.into())?;
        self.find_one(collection, filter).await
    }

    pub async fn find_by_ids<T>(&self, collection: &str, ids: &[Identifier]) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let filter = self.ids_filter(ids)?;
        self.find_many(collection, filter, None).await
    }

    pub async fn find_one<T>(&self, collection: &str, filter: Document) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "find_one");
        match coll.find_one(filter).await? {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// All documents sharing the id `id` (the id field is not required to be unique).
    pub async fn find_all_by_id<T>(&self, collection: &str, id: impl Into<Identifier>) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let filter = self.id_filter(id.into())?;
        self.find_many(collection, filter, None).await
    }

    pub async fn find_many<T>(
        &self,
        collection: &str,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let options = options.map(FindOptions::into_driver).transpose()?;
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "find_many");
        let cursor = coll.find(filter).with_options(options).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        decode_all(docs)
    }

    pub async fn exists_by_id(&self, collection: &str, id: impl Into<Identifier>) -> Result<bool> {
        let filter = self.id_filter(id.into())?;
        self.exists(collection, filter).await
    }

    pub async fn exists(&self, collection: &str, filter: Document) -> Result<bool> {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "exists");
        let found = coll
            .count_documents(filter)
            .with_options(CountOptions::builder().limit(1_u64).build())
            .await?;
        Ok(found > 0)
    }

    pub async fn count(&self, collection: &str, filter: Document) -> Result<u64> {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, filter = %filter, "count");
        Ok(coll.count_documents(filter).await?)
    }

    pub async fn aggregate<T>(&self, collection: &str, pipeline: Vec<Document>) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, stages = pipeline.len(), "aggregate");
        let cursor = coll.aggregate(pipeline).await?;
        let docs: Vec<Document> = cursor.try_collect().await?;
        decode_all(docs)
    }

    // ========== ADMINISTRATION ==========

    /// Ascending index on the id field; returns the index name.
    ///
    /// With the native `_id` field the built-in index is reused.
    pub async fn create_id_index(&self, collection: &str, unique: bool) -> Result<String> {
        if self.id_field.is_native() {
            validate::collection_name(collection)?;
            return Ok(NATIVE_ID_INDEX.to_string());
        }

        let mut keys = Document::new();
        keys.insert(self.id_field.as_str(), 1);
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().unique(unique).build())
            .build();

        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, field = %self.id_field, unique, "create_id_index");
        Ok(coll.create_index(model).await?.index_name)
    }

    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let db = self.database().await?;
        debug!(database = %db.name(), "list_collections");
        Ok(db.list_collection_names().await?)
    }

    pub async fn drop_collection(&self, collection: &str) -> Result<()> {
        let coll = self.typed_collection::<Document>(collection).await?;
        debug!(collection, "drop_collection");
        Ok(coll.drop().await?)
    }

    /// Drop the configured database with everything in it.
    pub async fn drop_database(&self) -> Result<()> {
        let db = self.database().await?;
        debug!(database = %db.name(), "drop_database");
        Ok(db.drop().await?)
    }

    pub async fn ping(&self) -> Result<()> {
        let db = self.database().await?;
        debug!(database = %db.name(), "ping");
        db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    // ========== HANDLES ==========

    /// Typed driver collection for operations this client does not wrap.
    pub async fn collection<T>(&self, name: &str) -> Result<Collection<T>>
    where
        T: Send + Sync,
    {
        self.typed_collection(name).await
    }

    pub async fn database(&self) -> Result<Database> {
        let client = self.connection.acquire().await?;
        debug!(database = self.database_name(), "database");
        Ok(client.database(self.database_name()))
    }

    /// The shared driver client. Closing this wrapper also shuts it down.
    pub async fn raw_client(&self) -> Result<Client> {
        debug!(database = self.database_name(), "raw_client");
        self.connection.acquire().await
    }

    // ========== LIFECYCLE ==========

    /// Connect now instead of on the next operation.
    pub async fn ensure_connected(&self) -> Result<()> {
        self.connection.connect().await
    }

    pub async fn close(&self) {
        self.connection.close().await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection_info(&self) -> ConnectionInfo {
        self.connection.info()
    }

    // ========== PRIVATE HELPERS ==========

    async fn typed_collection<T>(&self, name: &str) -> Result<Collection<T>>
    where
        T: Send + Sync,
    {
        validate::collection_name(name)?;
        let client = self.connection.acquire().await?;
        Ok(client.database(self.database_name()).collection::<T>(name))
    }

    fn id_filter(&self, id: Identifier) -> Result<Document> {
        id.validate()?;
        Ok(self.id_field.filter(&id))
    }

    fn ids_filter(&self, ids: &[Identifier]) -> Result<Document> {
        validate::documents(ids)
            .map_err(|_| DocBridgeError::invalid("ids must not be empty"))?;
        for id in ids {
            id.validate()?;
        }
        Ok(self.id_field.filter_any(ids))
    }
}

/// `{ "$set": <data> }`
fn set_update<T: Serialize>(data: &T) -> Result<Document> {
    let fields = bson::to_document(data)?;
    validate::update_document(&fields)?;
    Ok(doc! { "$set": fields })
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>> {
    docs.into_iter()
        .map(|doc| bson::from_document(doc).map_err(DocBridgeError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Person {
        id: String,
        name: String,
    }

    // Port 1 never answers; every test here must fail before any I/O or
    // without touching the network at all.
    fn offline_client() -> DocumentStoreClient {
        DocumentStoreClient::lazy("mongodb://127.0.0.1:1", "test").unwrap()
    }

    #[test]
    fn test_set_update_wraps_fields() {
        let update = set_update(&Person {
            id: "1".into(),
            name: "Akshay".into(),
        })
        .unwrap();
        assert_eq!(update, doc! { "$set": { "id": "1", "name": "Akshay" } });
    }

    #[test]
    fn test_set_update_rejects_empty_and_scalars() {
        assert!(matches!(
            set_update(&doc! {}),
            Err(DocBridgeError::InvalidArgument(_))
        ));
        assert!(matches!(
            set_update(&42),
            Err(DocBridgeError::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_all() {
        let docs = vec![
            doc! { "_id": 1, "id": "a", "name": "Akshay" },
            doc! { "_id": 2, "id": "b", "name": "Raj" },
        ];
        let people: Vec<Person> = decode_all(docs).unwrap();
        assert_eq!(people[1].name, "Raj");

        let bad = vec![doc! { "id": 3 }];
        assert!(matches!(
            decode_all::<Person>(bad),
            Err(DocBridgeError::Deserialization(_))
        ));
    }

    #[test]
    fn test_lazy_client_does_no_io() {
        let client = offline_client();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.id_field().as_str(), "id");
        assert_eq!(client.database_name(), "test");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(DocumentStoreClient::lazy("localhost:27017", "test").is_err());
        assert!(DocumentStoreClient::lazy("mongodb://localhost", "").is_err());
    }

    #[tokio::test]
    async fn test_arguments_validated_before_connecting() {
        let client = offline_client();
        let person = Person {
            id: "1".into(),
            name: "x".into(),
        };

        let err = client.insert_one("", &person).await.unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        let err = client.find_by_id::<Person>("people", "").await.unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        let err = client.update_by_id("people", "1", &doc! {}).await.unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        let err = client.insert_many::<Person>("people", &[]).await.unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        let err = client.delete_by_ids("people", &[]).await.unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        let err = client.exists_by_id("bad$name", 1).await.unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        let bad_sort = FindOptions::new().with_sort(vec![("name".into(), 0)]);
        let err = client
            .find_many::<Person>("people", doc! {}, Some(bad_sort))
            .await
            .unwrap_err();
        assert!(matches!(err, DocBridgeError::InvalidArgument(_)));

        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_custom_id_field_drives_filters() {
        let config = ClientConfig::new("mongodb://127.0.0.1:1", "test").with_id_field("sku");
        let client = DocumentStoreClient::new(config).await.unwrap();

        let filter = client.id_filter(Identifier::from("A-100")).unwrap();
        assert_eq!(filter, doc! { "sku": "A-100" });
        assert!(!filter.contains_key("id"));

        let filter = client.id_filter(Identifier::from(7)).unwrap();
        assert_eq!(filter, doc! { "sku": 7_i64 });

        let ids = [Identifier::from("A-1"), Identifier::from("A-2")];
        assert_eq!(
            client.ids_filter(&ids).unwrap(),
            doc! { "sku": { "$in": ["A-1", "A-2"] } }
        );
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handles_and_admin_calls_emit_debug_events() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let config = ClientConfig::new("mongodb://127.0.0.1:1", "test")
            .with_verify_connection(false)
            .with_server_selection_timeout(std::time::Duration::from_millis(100));
        let client = DocumentStoreClient::new(config).await.unwrap();

        client.database().await.unwrap();
        client.raw_client().await.unwrap();
        assert!(client.list_collections().await.is_err());
        assert!(client.ping().await.is_err());
        client.close().await;

        let output = String::from_utf8(logs.0.lock().clone()).unwrap();
        for event in ["database", "raw_client", "list_collections", "ping"] {
            assert!(
                output
                    .lines()
                    .any(|line| line.contains("DEBUG") && line.contains(&format!("client: {} ", event))),
                "missing debug event '{}' in:\n{}",
                event,
                output
            );
        }
    }

    #[tokio::test]
    async fn test_native_id_index_needs_no_server() {
        let config = ClientConfig::new("mongodb://127.0.0.1:1", "test").with_id_field("_id");
        let client = DocumentStoreClient::new(config).await.unwrap();
        assert_eq!(client.create_id_index("people", true).await.unwrap(), "_id_");
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }
}
