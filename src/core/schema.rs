use crate::domain::model::Collection;
use crate::utils::error::{InventoryError, Result};
use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;

const EMBEDDED_SCHEMAS: &str = include_str!("../../schemas/all_schemas.json");

fn schema_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Modules => "module",
        Collection::Crates => "crates",
        Collection::Cables => "cables",
        Collection::CableTemplates => "cable_templates",
        Collection::Tests => "tests",
        Collection::Logbook => "logbook",
    }
}

/// Compiled JSON schemas, one per collection.
pub struct SchemaRegistry {
    validators: HashMap<Collection, Validator>,
}

impl SchemaRegistry {
    pub fn embedded() -> Result<Self> {
        let all: Value = serde_json::from_str(EMBEDDED_SCHEMAS)?;
        Self::from_value(&all)
    }

    /// Builds validators from an object keyed by schema name. Collections
    /// without an entry are accepted as-is.
    pub fn from_value(all: &Value) -> Result<Self> {
        let mut validators = HashMap::new();
        for collection in Collection::ALL {
            let Some(schema) = all.get(schema_name(collection)) else {
                tracing::warn!("No schema for {}, documents will not be validated", collection);
                continue;
            };
            let validator = jsonschema::validator_for(schema).map_err(|e| {
                InventoryError::ConfigValidationError {
                    field: format!("schemas.{}", schema_name(collection)),
                    message: e.to_string(),
                }
            })?;
            validators.insert(collection, validator);
        }
        Ok(Self { validators })
    }

    pub fn validate(&self, collection: Collection, document: &Value) -> Result<()> {
        let Some(validator) = self.validators.get(&collection) else {
            return Ok(());
        };

        let errors: Vec<String> = validator
            .iter_errors(document)
            .map(|e| format!("{}: {}", e.instance_path, e))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(InventoryError::SchemaViolation {
                collection,
                message: errors.join("; "),
            })
        }
    }
}
