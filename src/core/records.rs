use crate::core::graph::{from_document, to_document};
use crate::core::links::DEFAULT_LINK_ATTEMPTS;
use crate::core::schema::SchemaRegistry;
use crate::domain::model::{Cable, CableTemplate, Collection, Crate, Document, Module, Versioned};
use crate::domain::ports::{EntityStore, Filter};
use crate::utils::error::{InventoryError, Result};
use serde_json::Value;
use std::sync::Arc;

/// Generic CRUD over the inventory collections, guarded by schema validation.
pub struct RecordService<S: EntityStore> {
    store: Arc<S>,
    schemas: SchemaRegistry,
    max_attempts: u32,
}

impl<S: EntityStore> RecordService<S> {
    pub fn new(store: Arc<S>, schemas: SchemaRegistry) -> Self {
        Self {
            store,
            schemas,
            max_attempts: DEFAULT_LINK_ATTEMPTS,
        }
    }

    /// Commit attempts for `update` when another writer races it.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub async fn list(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        self.store.scan(collection, filter).await
    }

    pub async fn get(&self, collection: Collection, key: &str) -> Result<Document> {
        self.store
            .find(collection, key)
            .await?
            .map(|versioned| versioned.value)
            .ok_or_else(|| InventoryError::RecordNotFound {
                collection,
                key: key.to_string(),
            })
    }

    pub async fn create(&self, collection: Collection, document: Document) -> Result<()> {
        let document = self.check(collection, document)?;
        let key = document
            .get(collection.key_field())
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.store.insert(collection, document).await?;
        tracing::info!("➕ {} {} inserted", collection.noun(), key);
        Ok(())
    }

    /// Merges `patch` into the stored record. The merged result must still
    /// satisfy the collection schema and is committed against the revision it
    /// was read at, so a concurrent writer is never overwritten by a stale copy.
    pub async fn update(&self, collection: Collection, key: &str, patch: Document) -> Result<()> {
        if let Some(new_key) = patch.get(collection.key_field()) {
            if new_key.as_str() != Some(key) {
                return Err(InventoryError::InvalidDocument {
                    message: format!("'{}' cannot be changed", collection.key_field()),
                });
            }
        }

        for attempt in 1..=self.max_attempts {
            let current = self.store.find(collection, key).await?.ok_or_else(|| {
                InventoryError::RecordNotFound {
                    collection,
                    key: key.to_string(),
                }
            })?;
            let mut merged = current.value;
            merged.extend(patch.clone());
            let merged = self.check(collection, merged)?;

            match self
                .store
                .replace_many(
                    collection,
                    vec![Versioned {
                        revision: current.revision,
                        value: merged,
                    }],
                )
                .await
            {
                Ok(()) => {
                    tracing::info!("✏️ {} {} updated", collection.noun(), key);
                    return Ok(());
                }
                Err(InventoryError::RevisionConflict { .. }) => {
                    tracing::warn!(
                        "{} {} changed while updating (attempt {}/{}), retrying",
                        collection.noun(),
                        key,
                        attempt,
                        self.max_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(InventoryError::ConcurrentModification {
            attempts: self.max_attempts,
        })
    }

    pub async fn delete(&self, collection: Collection, key: &str) -> Result<()> {
        if !self.store.delete(collection, key).await? {
            return Err(InventoryError::RecordNotFound {
                collection,
                key: key.to_string(),
            });
        }
        tracing::info!("🗑️ {} {} deleted", collection.noun(), key);
        Ok(())
    }

    /// Inserts a test run and appends its `testID` to the `tests` list of every
    /// module named in `modules_list`. Unknown modules are skipped.
    pub async fn add_test(&self, document: Document) -> Result<()> {
        let document = self.check(Collection::Tests, document)?;
        let test_id = document
            .get("testID")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let modules: Vec<String> = document
            .get("modules_list")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        self.store.insert(Collection::Tests, document).await?;

        for module_id in &modules {
            let linked = self
                .store
                .append(
                    Collection::Modules,
                    module_id,
                    "tests",
                    Value::String(test_id.clone()),
                )
                .await?;
            if !linked {
                tracing::warn!("Test {} lists unknown module {}", test_id, module_id);
            }
        }
        tracing::info!("🧪 Test {} recorded for {} modules", test_id, modules.len());
        Ok(())
    }

    /// Schema validation followed by the typed checks of each collection.
    /// Cable and template documents come back with ports normalized.
    fn check(&self, collection: Collection, document: Document) -> Result<Document> {
        self.schemas
            .validate(collection, &Value::Object(document.clone()))?;

        match collection {
            Collection::Cables => to_document(&from_document::<Cable>(collection, document)?),
            Collection::CableTemplates => {
                to_document(&from_document::<CableTemplate>(collection, document)?)
            }
            Collection::Modules => {
                from_document::<Module>(collection, document.clone())?;
                Ok(document)
            }
            Collection::Crates => {
                from_document::<Crate>(collection, document.clone())?;
                Ok(document)
            }
            Collection::Logbook => {
                let timestamp = document
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                chrono::DateTime::parse_from_rfc3339(timestamp).map_err(|e| {
                    InventoryError::SchemaViolation {
                        collection,
                        message: format!("timestamp '{}' is not RFC 3339: {}", timestamp, e),
                    }
                })?;
                Ok(document)
            }
            Collection::Tests => Ok(document),
        }
    }
}
