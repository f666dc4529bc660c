use crate::core::graph::{to_document, ConnectivityGraph};
use crate::domain::model::{Cable, CableLink, Collection, Connection, Document, Side, Versioned};
use crate::domain::ports::EntityStore;
use crate::utils::error::{InventoryError, Result};
use std::sync::Arc;

pub const DEFAULT_LINK_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkEdit {
    Add,
    Remove,
}

/// Creates and removes mirrored cable-to-cable connections.
///
/// Both halves of a link are committed in one `replace_many` call guarded by
/// the revisions the cables were read at. A conflicting writer causes a fresh
/// read and another attempt, up to `max_attempts`.
pub struct CableLinkManager<S: EntityStore> {
    graph: ConnectivityGraph<S>,
    max_attempts: u32,
}

impl<S: EntityStore> CableLinkManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            graph: ConnectivityGraph::new(store),
            max_attempts: DEFAULT_LINK_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Appends `{port1 -> cable2}` on cable1's side and `{port2 -> cable1}` on
    /// cable2's opposite side. Connecting the same pair twice leaves two
    /// parallel edges.
    pub async fn connect(&self, link: &CableLink) -> Result<()> {
        self.commit(link, LinkEdit::Add).await?;
        tracing::info!(
            "🔌 Connected {}:{}@{} <-> {}:{}@{}",
            link.cable1_name,
            link.cable1_port,
            link.cable1_side,
            link.cable2_name,
            link.cable2_port,
            link.cable2_side()
        );
        Ok(())
    }

    /// Removes every matching mirrored tuple. Missing tuples are not an error.
    pub async fn disconnect(&self, link: &CableLink) -> Result<()> {
        let changed = self.commit(link, LinkEdit::Remove).await?;
        if changed {
            tracing::info!(
                "✂️ Disconnected {}:{}@{} <-> {}:{}@{}",
                link.cable1_name,
                link.cable1_port,
                link.cable1_side,
                link.cable2_name,
                link.cable2_port,
                link.cable2_side()
            );
        } else {
            tracing::debug!(
                "No connection between {} and {} to remove",
                link.cable1_name,
                link.cable2_name
            );
        }
        Ok(())
    }

    async fn commit(&self, link: &CableLink, edit: LinkEdit) -> Result<bool> {
        let near = Connection::to_cable(link.cable1_port, &link.cable2_name);
        let far = Connection::to_cable(link.cable2_port, &link.cable1_name);

        for attempt in 1..=self.max_attempts {
            let mut first = self.load(&link.cable1_name).await?;

            let (changed, writes) = if link.cable1_name == link.cable2_name {
                let a = apply(&mut first.value, link.cable1_side, &near, edit);
                let b = apply(&mut first.value, link.cable2_side(), &far, edit);
                (a || b, vec![into_write(first)?])
            } else {
                let mut second = self.load(&link.cable2_name).await?;
                let a = apply(&mut first.value, link.cable1_side, &near, edit);
                let b = apply(&mut second.value, link.cable2_side(), &far, edit);
                (a || b, vec![into_write(first)?, into_write(second)?])
            };

            if !changed {
                return Ok(false);
            }

            match self
                .graph
                .store()
                .replace_many(Collection::Cables, writes)
                .await
            {
                Ok(()) => return Ok(true),
                Err(InventoryError::RevisionConflict { key, .. }) => {
                    tracing::warn!(
                        "Cable {} changed while linking (attempt {}/{}), retrying",
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

    async fn load(&self, name: &str) -> Result<Versioned<Cable>> {
        self.graph
            .cable_versioned(name)
            .await?
            .ok_or_else(|| InventoryError::CableNotFound {
                name: name.to_string(),
            })
    }
}

fn apply(cable: &mut Cable, side: Side, connection: &Connection, edit: LinkEdit) -> bool {
    let connections = cable.side_mut(side);
    match edit {
        LinkEdit::Add => {
            connections.push(connection.clone());
            true
        }
        LinkEdit::Remove => {
            let before = connections.len();
            connections.retain(|c| c != connection);
            connections.len() != before
        }
    }
}

fn into_write(cable: Versioned<Cable>) -> Result<Versioned<Document>> {
    Ok(Versioned {
        revision: cable.revision,
        value: to_document(&cable.value)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::core::graph::from_document;
    use crate::domain::model::Port;
    use crate::domain::ports::Filter;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn port(n: u32) -> Port {
        Port::new(n).unwrap()
    }

    fn link(c1: &str, p1: u32, side: Side, c2: &str, p2: u32) -> CableLink {
        CableLink {
            cable1_name: c1.to_string(),
            cable1_port: port(p1),
            cable1_side: side,
            cable2_name: c2.to_string(),
            cable2_port: port(p2),
        }
    }

    async fn store_with_cables(names: &[&str]) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for name in names {
            let doc = json!({"name": name, "type": "extfib", "detSide": [], "crateSide": []});
            store
                .insert(Collection::Cables, doc.as_object().unwrap().clone())
                .await
                .unwrap();
        }
        store
    }

    async fn cable(store: &MemoryStore, name: &str) -> Cable {
        let doc = store.find(Collection::Cables, name).await.unwrap().unwrap();
        from_document(Collection::Cables, doc.value).unwrap()
    }

    #[tokio::test]
    async fn test_connect_writes_mirrored_pair() {
        let store = store_with_cables(&["Cable 3", "Cable 4"]).await;
        let manager = CableLinkManager::new(store.clone());

        manager
            .connect(&link("Cable 3", 2, Side::CrateSide, "Cable 4", 1))
            .await
            .unwrap();

        let c3 = cable(&store, "Cable 3").await;
        let c4 = cable(&store, "Cable 4").await;
        assert_eq!(c3.crate_side, vec![Connection::to_cable(port(2), "Cable 4")]);
        assert!(c3.det_side.is_empty());
        assert_eq!(c4.det_side, vec![Connection::to_cable(port(1), "Cable 3")]);
        assert!(c4.crate_side.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_restores_topology() {
        let store = store_with_cables(&["A", "B"]).await;
        let manager = CableLinkManager::new(store.clone());
        manager
            .connect(&link("A", 5, Side::DetSide, "B", 6))
            .await
            .unwrap();
        let before_a = cable(&store, "A").await;
        let before_b = cable(&store, "B").await;

        let l = link("A", 1, Side::CrateSide, "B", 3);
        manager.connect(&l).await.unwrap();
        manager.disconnect(&l).await.unwrap();

        assert_eq!(cable(&store, "A").await, before_a);
        assert_eq!(cable(&store, "B").await, before_b);
    }

    #[tokio::test]
    async fn test_connect_twice_creates_parallel_edges() {
        let store = store_with_cables(&["A", "B"]).await;
        let manager = CableLinkManager::new(store.clone());
        let l = link("A", 1, Side::CrateSide, "B", 1);

        manager.connect(&l).await.unwrap();
        manager.connect(&l).await.unwrap();
        assert_eq!(cable(&store, "A").await.crate_side.len(), 2);
        assert_eq!(cable(&store, "B").await.det_side.len(), 2);

        manager.disconnect(&l).await.unwrap();
        assert!(cable(&store, "A").await.crate_side.is_empty());
        assert!(cable(&store, "B").await.det_side.is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_missing_tuple_is_noop() {
        let store = store_with_cables(&["A", "B"]).await;
        let manager = CableLinkManager::new(store.clone());

        manager
            .disconnect(&link("A", 4, Side::DetSide, "B", 4))
            .await
            .unwrap();

        let found = store.find(Collection::Cables, "A").await.unwrap().unwrap();
        assert_eq!(found.revision, 1);
    }

    #[tokio::test]
    async fn test_unknown_cable_is_reported() {
        let store = store_with_cables(&["A"]).await;
        let manager = CableLinkManager::new(store.clone());

        let err = manager
            .connect(&link("A", 1, Side::CrateSide, "Ghost", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::CableNotFound { ref name } if name == "Ghost"));

        let err = manager
            .disconnect(&link("Ghost", 1, Side::CrateSide, "A", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::CableNotFound { .. }));

        assert!(cable(&store, "A").await.crate_side.is_empty());
    }

    #[tokio::test]
    async fn test_self_link_updates_both_faces() {
        let store = store_with_cables(&["Loop"]).await;
        let manager = CableLinkManager::new(store.clone());
        let l = link("Loop", 1, Side::CrateSide, "Loop", 1);

        manager.connect(&l).await.unwrap();
        let looped = cable(&store, "Loop").await;
        assert_eq!(looped.crate_side, vec![Connection::to_cable(port(1), "Loop")]);
        assert_eq!(looped.det_side, vec![Connection::to_cable(port(1), "Loop")]);

        manager.disconnect(&l).await.unwrap();
        let looped = cable(&store, "Loop").await;
        assert!(looped.crate_side.is_empty() && looped.det_side.is_empty());
    }

    /// Reports a revision conflict on the first `conflicts` commits.
    struct ContendedStore {
        inner: MemoryStore,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl EntityStore for ContendedStore {
        async fn find(&self, collection: Collection, key: &str) -> Result<Option<Versioned<Document>>> {
            self.inner.find(collection, key).await
        }

        async fn scan(&self, collection: Collection, filter: &Filter) -> Result<Vec<Document>> {
            self.inner.scan(collection, filter).await
        }

        async fn count(&self, collection: Collection) -> Result<usize> {
            self.inner.count(collection).await
        }

        async fn insert(&self, collection: Collection, document: Document) -> Result<()> {
            self.inner.insert(collection, document).await
        }

        async fn update(&self, collection: Collection, key: &str, patch: Document) -> Result<bool> {
            self.inner.update(collection, key, patch).await
        }

        async fn append(
            &self,
            collection: Collection,
            key: &str,
            field: &str,
            value: serde_json::Value,
        ) -> Result<bool> {
            self.inner.append(collection, key, field, value).await
        }

        async fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
            self.inner.delete(collection, key).await
        }

        async fn replace_many(
            &self,
            collection: Collection,
            documents: Vec<Versioned<Document>>,
        ) -> Result<()> {
            let left = self.conflicts.load(Ordering::SeqCst);
            if left > 0 {
                self.conflicts.store(left - 1, Ordering::SeqCst);
                return Err(InventoryError::RevisionConflict {
                    collection,
                    key: "contended".to_string(),
                });
            }
            self.inner.replace_many(collection, documents).await
        }
    }

    async fn contended(conflicts: u32) -> Arc<ContendedStore> {
        let inner = MemoryStore::new();
        for name in ["A", "B"] {
            let doc = json!({"name": name, "type": "extfib"});
            inner
                .insert(Collection::Cables, doc.as_object().unwrap().clone())
                .await
                .unwrap();
        }
        Arc::new(ContendedStore {
            inner,
            conflicts: AtomicU32::new(conflicts),
        })
    }

    #[tokio::test]
    async fn test_conflict_is_retried() {
        let store = contended(2).await;
        let manager = CableLinkManager::new(store.clone()).with_max_attempts(3);

        manager
            .connect(&link("A", 1, Side::CrateSide, "B", 2))
            .await
            .unwrap();

        let b = store.find(Collection::Cables, "B").await.unwrap().unwrap();
        let b: Cable = from_document(Collection::Cables, b.value).unwrap();
        assert_eq!(b.det_side, vec![Connection::to_cable(port(2), "A")]);
    }

    #[tokio::test]
    async fn test_persistent_conflict_gives_up() {
        let store = contended(10).await;
        let manager = CableLinkManager::new(store.clone()).with_max_attempts(2);

        let err = manager
            .connect(&link("A", 1, Side::CrateSide, "B", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, InventoryError::ConcurrentModification { attempts: 2 }));

        let a = store.find(Collection::Cables, "A").await.unwrap().unwrap();
        assert_eq!(a.revision, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_connects_keep_every_edge() {
        let store = store_with_cables(&["Hub", "Spoke"]).await;
        let manager = Arc::new(CableLinkManager::new(store.clone()).with_max_attempts(100));

        let handles: Vec<_> = (1..=8)
            .map(|p| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move {
                    manager
                        .connect(&link("Hub", p, Side::CrateSide, "Spoke", p))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(cable(&store, "Hub").await.crate_side.len(), 8);
        assert_eq!(cable(&store, "Spoke").await.det_side.len(), 8);
    }
}
