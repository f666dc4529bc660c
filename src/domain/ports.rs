use crate::domain::model::{Collection, Document, Versioned};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Field-equality filter for scans. An empty filter matches every document.
pub type Filter = Document;

/// Document collections keyed by domain identity.
///
/// Every stored document carries a revision that increases on each write;
/// `replace_many` uses it for optimistic concurrency across documents.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find(&self, collection: Collection, key: &str) -> Result<Option<Versioned<Document>>>;

    async fn scan(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>>;

    async fn count(&self, collection: Collection) -> Result<usize>;

    /// Fails with `DuplicateRecord` if the key already exists.
    async fn insert(&self, collection: Collection, document: Document) -> Result<()>;

    /// Shallow merge of `patch` into the stored document. Returns false when
    /// no document has the key.
    async fn update(&self, collection: Collection, key: &str, patch: Document) -> Result<bool>;

    /// Appends `value` to the array stored under `field`, creating it if absent.
    async fn append(
        &self,
        collection: Collection,
        key: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<bool>;

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool>;

    /// Writes every document or none. Each entry's revision must still be
    /// current, otherwise `RevisionConflict` is returned.
    async fn replace_many(
        &self,
        collection: Collection,
        documents: Vec<Versioned<Document>>,
    ) -> Result<()>;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &str) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn bind_address(&self) -> &str;
    fn snapshot_path(&self) -> Option<&str>;
    fn link_attempts(&self) -> u32;
}
