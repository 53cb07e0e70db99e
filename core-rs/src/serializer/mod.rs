//! Resource serialization
//!
//! Stored documents carry a `$class` discriminator naming their
//! fully-qualified type; every other field is a property. Relationship
//! properties stay as `resource:<type>#<id>` strings on both sides of the
//! conversion.

use crate::errors::{Result, StoreError};
use crate::model::{ModelRegistry, Resource};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Property naming the type of a stored document.
pub const CLASS_PROPERTY: &str = "$class";

/// Converts between stored JSON documents and typed resources.
pub trait Serializer: Send + Sync {
    /// Inflate a stored document into a typed resource.
    fn from_json(&self, json: &Value) -> Result<Resource>;

    /// Flatten a resource back into its stored document.
    fn to_json(&self, resource: &Resource) -> Result<Value>;
}

/// Serializer backed by the declared type model.
pub struct JsonSerializer {
    models: Arc<ModelRegistry>,
}

impl JsonSerializer {
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        JsonSerializer { models }
    }
}

impl Serializer for JsonSerializer {
    fn from_json(&self, json: &Value) -> Result<Resource> {
        let object = json.as_object().ok_or_else(|| {
            StoreError::Serialization("expected a JSON object".to_string())
        })?;

        let class = object
            .get(CLASS_PROPERTY)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StoreError::Serialization(format!(
                    "document has no '{}' property",
                    CLASS_PROPERTY
                ))
            })?;

        let mut properties = Map::new();
        for (key, value) in object {
            if key != CLASS_PROPERTY {
                properties.insert(key.clone(), value.clone());
            }
        }

        self.models.instantiate(class, properties)
    }

    fn to_json(&self, resource: &Resource) -> Result<Value> {
        let mut object = Map::new();
        object.insert(
            CLASS_PROPERTY.to_string(),
            Value::String(resource.fully_qualified_type().to_string()),
        );
        for (key, value) in resource.properties() {
            object.insert(key.clone(), value.clone());
        }
        Ok(Value::Object(object))
    }
}
