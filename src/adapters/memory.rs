use crate::adapters::storage::LocalStorage;
use crate::domain::model::{Collection, Document, Versioned};
use crate::domain::ports::{EntityStore, Filter, Storage};
use crate::utils::error::{InventoryError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

type Collections = HashMap<Collection, BTreeMap<String, Stored>>;

#[derive(Debug, Clone)]
struct Stored {
    revision: u64,
    document: Document,
}

struct Snapshot<P> {
    storage: P,
    file: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(rename = "savedAt")]
    saved_at: DateTime<Utc>,
    collections: BTreeMap<String, Vec<Document>>,
}

/// Entity store kept in memory, optionally mirrored to a JSON snapshot file
/// after every successful write.
pub struct MemoryStore<P: Storage = LocalStorage> {
    collections: RwLock<Collections>,
    snapshot: Option<Snapshot<P>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            snapshot: None,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Storage> MemoryStore<P> {
    /// Opens a store persisted under `file`, loading the previous snapshot if
    /// one exists.
    pub async fn open(storage: P, file: impl Into<String>) -> Result<Self> {
        let file = file.into();
        let mut collections = Collections::new();

        if storage.exists(&file).await {
            let bytes = storage.read_file(&file).await?;
            let snapshot: SnapshotFile = serde_json::from_slice(&bytes)?;
            for (name, documents) in snapshot.collections {
                let collection: Collection = name
                    .parse()
                    .map_err(|message| InventoryError::InvalidDocument { message })?;
                let entries = collections.entry(collection).or_default();
                for document in documents {
                    let key = key_of(collection, &document)?;
                    entries.insert(
                        key,
                        Stored {
                            revision: 1,
                            document,
                        },
                    );
                }
            }
            tracing::info!(
                "📂 Loaded snapshot {} saved at {} ({} documents)",
                file,
                snapshot.saved_at,
                collections.values().map(BTreeMap::len).sum::<usize>()
            );
        } else {
            tracing::info!("📂 No snapshot at {}, starting empty", file);
        }

        Ok(Self {
            collections: RwLock::new(collections),
            snapshot: Some(Snapshot { storage, file }),
        })
    }

    async fn persist(&self, collections: &Collections) -> Result<()> {
        let Some(snapshot) = &self.snapshot else {
            return Ok(());
        };

        let file = SnapshotFile {
            saved_at: Utc::now(),
            collections: collections
                .iter()
                .map(|(collection, entries)| {
                    (
                        collection.as_str().to_string(),
                        entries.values().map(|s| s.document.clone()).collect(),
                    )
                })
                .collect(),
        };
        let data = serde_json::to_vec_pretty(&file)?;
        snapshot.storage.write_file(&snapshot.file, &data).await.map_err(|e| {
            tracing::error!("Failed to write snapshot {}: {}", snapshot.file, e);
            e
        })
    }

    /// Runs `edit` against the collections. With a snapshot configured the
    /// edit works on a staged copy that replaces the live state only once
    /// the snapshot write succeeded. `edit` returns its result and whether it
    /// changed anything.
    async fn write<T>(
        &self,
        edit: impl FnOnce(&mut Collections) -> Result<(T, bool)>,
    ) -> Result<T> {
        let mut collections = self.collections.write().await;
        if self.snapshot.is_none() {
            return edit(&mut *collections).map(|(out, _)| out);
        }

        let mut staged = collections.clone();
        let (out, changed) = edit(&mut staged)?;
        if changed {
            self.persist(&staged).await?;
            *collections = staged;
        }
        Ok(out)
    }
}

fn key_of(collection: Collection, document: &Document) -> Result<String> {
    match document.get(collection.key_field()) {
        Some(serde_json::Value::String(key)) if !key.is_empty() => Ok(key.clone()),
        _ => Err(InventoryError::InvalidDocument {
            message: format!(
                "{} document needs a non-empty string '{}'",
                collection,
                collection.key_field()
            ),
        }),
    }
}

fn matches(document: &Document, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|(field, expected)| document.get(field) == Some(expected))
}

#[async_trait]
impl<P: Storage> EntityStore for MemoryStore<P> {
    async fn find(&self, collection: Collection, key: &str) -> Result<Option<Versioned<Document>>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|entries| entries.get(key))
            .map(|stored| Versioned {
                revision: stored.revision,
                value: stored.document.clone(),
            }))
    }

    async fn scan(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .map(|entries| {
                entries
                    .values()
                    .filter(|stored| matches(&stored.document, filter))
                    .map(|stored| stored.document.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self, collection: Collection) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).map_or(0, BTreeMap::len))
    }

    async fn insert(&self, collection: Collection, document: Document) -> Result<()> {
        let key = key_of(collection, &document)?;
        self.write(|collections| {
            let entries = collections.entry(collection).or_default();
            if entries.contains_key(&key) {
                return Err(InventoryError::DuplicateRecord {
                    collection,
                    key: key.clone(),
                });
            }
            tracing::debug!("Inserting {} record {}", collection, key);
            entries.insert(
                key.clone(),
                Stored {
                    revision: 1,
                    document,
                },
            );
            Ok(((), true))
        })
        .await
    }

    async fn update(&self, collection: Collection, key: &str, patch: Document) -> Result<bool> {
        if let Some(new_key) = patch.get(collection.key_field()) {
            if new_key.as_str() != Some(key) {
                return Err(InventoryError::InvalidDocument {
                    message: format!("'{}' cannot be changed", collection.key_field()),
                });
            }
        }

        self.write(|collections| {
            let Some(stored) = collections
                .get_mut(&collection)
                .and_then(|entries| entries.get_mut(key))
            else {
                return Ok((false, false));
            };
            stored.document.extend(patch);
            stored.revision += 1;
            tracing::debug!("Updated {} record {} to revision {}", collection, key, stored.revision);
            Ok((true, true))
        })
        .await
    }

    async fn append(
        &self,
        collection: Collection,
        key: &str,
        field: &str,
        value: serde_json::Value,
    ) -> Result<bool> {
        self.write(|collections| {
            let Some(stored) = collections
                .get_mut(&collection)
                .and_then(|entries| entries.get_mut(key))
            else {
                return Ok((false, false));
            };

            let slot = stored
                .document
                .entry(field.to_string())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            let Some(items) = slot.as_array_mut() else {
                return Err(InventoryError::InvalidDocument {
                    message: format!("{} record {} field '{}' is not an array", collection, key, field),
                });
            };
            items.push(value);
            stored.revision += 1;
            Ok((true, true))
        })
        .await
    }

    async fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
        self.write(|collections| {
            let removed = collections
                .get_mut(&collection)
                .and_then(|entries| entries.remove(key))
                .is_some();
            if removed {
                tracing::debug!("Deleted {} record {}", collection, key);
            }
            Ok((removed, removed))
        })
        .await
    }

    async fn replace_many(
        &self,
        collection: Collection,
        documents: Vec<Versioned<Document>>,
    ) -> Result<()> {
        let keyed = documents
            .into_iter()
            .map(|versioned| Ok((key_of(collection, &versioned.value)?, versioned)))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::new();
        if let Some((key, _)) = keyed.iter().find(|(key, _)| !seen.insert(key.as_str())) {
            return Err(InventoryError::InvalidDocument {
                message: format!("{} record {} appears twice in one commit", collection, key),
            });
        }

        self.write(|collections| {
            let entries = collections.entry(collection).or_default();

            for (key, versioned) in &keyed {
                let current = entries.get(key).map(|stored| stored.revision);
                if current != Some(versioned.revision) {
                    tracing::debug!(
                        "Revision conflict on {} record {}: expected {}, found {:?}",
                        collection,
                        key,
                        versioned.revision,
                        current
                    );
                    return Err(InventoryError::RevisionConflict {
                        collection,
                        key: key.clone(),
                    });
                }
            }

            for (key, versioned) in keyed {
                entries.insert(
                    key,
                    Stored {
                        revision: versioned.revision + 1,
                        document: versioned.value,
                    },
                );
            }
            Ok(((), true))
        })
        .await
    }
}
