//! Typed views of the cabling documents held in the entity store.

use crate::domain::model::{
    Cable, CableTemplate, Collection, Crate, Document, Module, PeerKind, Versioned,
};
use crate::domain::ports::{EntityStore, Filter};
use crate::utils::error::{InventoryError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

pub fn from_document<T: DeserializeOwned>(collection: Collection, document: Document) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(document)).map_err(|e| {
        InventoryError::InvalidDocument {
            message: format!("{} document: {}", collection, e),
        }
    })
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(InventoryError::InvalidDocument {
            message: format!("expected an object, got {}", other),
        }),
    }
}

/// Templates loaded once per traversal, keyed by cable type. Stored
/// templates that fail to parse are remembered with their error.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: HashMap<String, CableTemplate>,
    unreadable: HashMap<String, String>,
}

impl TemplateCatalog {
    pub fn new(templates: impl IntoIterator<Item = CableTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.cable_type.clone(), t))
                .collect(),
            unreadable: HashMap::new(),
        }
    }

    pub fn get(&self, cable_type: &str) -> Option<&CableTemplate> {
        self.templates.get(cable_type)
    }

    pub fn unreadable(&self, cable_type: &str) -> Option<&str> {
        self.unreadable.get(cable_type).map(String::as_str)
    }

    pub fn mark_unreadable(&mut self, cable_type: impl Into<String>, message: impl Into<String>) {
        self.unreadable.insert(cable_type.into(), message.into());
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// A module, crate or cable found by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Module(Module),
    Crate(Crate),
    Cable(Cable),
}

impl Entity {
    pub fn kind(&self) -> PeerKind {
        match self {
            Entity::Module(_) => PeerKind::Module,
            Entity::Crate(_) => PeerKind::Crate,
            Entity::Cable(_) => PeerKind::Cable,
        }
    }

    pub fn identity(&self) -> &str {
        match self {
            Entity::Module(m) => &m.module_id,
            Entity::Crate(c) => &c.name,
            Entity::Cable(c) => &c.name,
        }
    }
}

pub struct ConnectivityGraph<S: EntityStore> {
    store: Arc<S>,
}

impl<S: EntityStore> Clone for ConnectivityGraph<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: EntityStore> ConnectivityGraph<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn module(&self, module_id: &str) -> Result<Option<Module>> {
        self.load(Collection::Modules, module_id).await
    }

    pub async fn crate_by_name(&self, name: &str) -> Result<Option<Crate>> {
        self.load(Collection::Crates, name).await
    }

    pub async fn cable(&self, name: &str) -> Result<Option<Cable>> {
        self.load(Collection::Cables, name).await
    }

    pub async fn cable_versioned(&self, name: &str) -> Result<Option<Versioned<Cable>>> {
        match self.store.find(Collection::Cables, name).await? {
            Some(Versioned { revision, value }) => Ok(Some(Versioned {
                revision,
                value: from_document(Collection::Cables, value)?,
            })),
            None => Ok(None),
        }
    }

    /// Looks up `name` in one namespace.
    pub async fn entity(&self, kind: PeerKind, name: &str) -> Result<Option<Entity>> {
        Ok(match kind {
            PeerKind::Module => self.module(name).await?.map(Entity::Module),
            PeerKind::Crate => self.crate_by_name(name).await?.map(Entity::Crate),
            PeerKind::Cable => self.cable(name).await?.map(Entity::Cable),
        })
    }

    pub async fn cable_count(&self) -> Result<usize> {
        self.store.count(Collection::Cables).await
    }

    pub async fn templates(&self) -> Result<TemplateCatalog> {
        let documents = self
            .store
            .scan(Collection::CableTemplates, &Filter::new())
            .await?;
        let mut parsed = Vec::with_capacity(documents.len());
        let mut unreadable = Vec::new();
        for doc in documents {
            let cable_type = doc
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or_default()
                .to_string();
            match from_document::<CableTemplate>(Collection::CableTemplates, doc) {
                Ok(template) => parsed.push(template),
                Err(e) => {
                    tracing::warn!("Unreadable cable template '{}': {}", cable_type, e);
                    unreadable.push((cable_type, e.to_string()));
                }
            }
        }

        let mut catalog = TemplateCatalog::new(parsed);
        for (cable_type, message) in unreadable {
            catalog.mark_unreadable(cable_type, message);
        }
        Ok(catalog)
    }

    async fn load<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
        match self.store.find(collection, key).await? {
            Some(versioned) => Ok(Some(from_document(collection, versioned.value)?)),
            None => Ok(None),
        }
    }
}
