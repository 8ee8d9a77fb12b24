//! Object types and attribute definitions of the configured schema.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;

use crate::client::InsightClient;
use crate::endpoint::Endpoint;
use crate::entity::normalize_attribute;
use crate::error::InsightResult;
use crate::types::{ObjectTypeAttribute, ObjectTypeSchema};

/// Snapshot of the schema, replaced wholesale on reload. Readers keep the
/// snapshot they loaded even while a reload is swapping in a new one.
pub struct SchemaCache {
    snapshot: ArcSwap<Vec<ObjectTypeSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<Vec<ObjectTypeSchema>> {
        self.snapshot.load_full()
    }

    pub fn replace(&self, schemas: Vec<ObjectTypeSchema>) {
        self.snapshot.store(Arc::new(schemas));
    }

    /// Object type by exact name.
    pub fn object_type(&self, name: &str) -> Option<ObjectTypeSchema> {
        self.snapshot.load().iter().find(|schema| schema.name == name).cloned()
    }

    pub fn is_loaded(&self) -> bool {
        !self.snapshot.load().is_empty()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaCache")
            .field("object_types", &self.snapshot.load().len())
            .finish()
    }
}

impl ObjectTypeSchema {
    /// Attribute definition whose name equals `name` once both sides are
    /// normalized.
    pub fn attribute(&self, name: &str) -> Option<&ObjectTypeAttribute> {
        let name = normalize_attribute(name);
        self.attributes
            .iter()
            .find(|attribute| normalize_attribute(&attribute.name) == name)
    }
}

/// One listing call for the object types, then one call per type for its
/// attributes. Any failure aborts the whole load.
pub(crate) fn load(client: &InsightClient, schema_id: i64) -> InsightResult<Vec<ObjectTypeSchema>> {
    let mut schemas: Vec<ObjectTypeSchema> = client.fetch_json(&Endpoint::object_types(schema_id))?;
    for schema in &mut schemas {
        schema.attributes = client.fetch_json(&Endpoint::object_type_attributes(schema.id))?;
        debug!(object_type = %schema.name, attributes = schema.attributes.len(), "loaded attributes");
    }
    Ok(schemas)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::{InsightError, RemoteError};
    use crate::testing::{config, json_response, schema_responder, ScriptedTransport};

    #[test]
    fn reload_fetches_types_then_attributes() {
        let transport = ScriptedTransport::new(schema_responder);
        let client = InsightClient::with_transport(config(), transport.clone());
        client.reload_schema().unwrap();

        let company = client.schema().object_type("Company").unwrap();
        assert_eq!(company.id, 2);
        assert_eq!(company.attribute("Country").unwrap().id, 21);
        assert!(company.attribute("ShortName").is_none());
        assert!(client.schema().object_type("Nope").is_none());

        let urls: Vec<String> = transport.requests().iter().map(|r| r.url.clone()).collect();
        assert_eq!(urls[0], "http://insight.test/rest/insight/1.0/objectschema/1/objecttypes/flat");
        assert!(urls[1..].iter().all(|url| url.ends_with("/attributes")));
    }

    #[test]
    fn failed_reload_keeps_previous_snapshot() {
        let broken = Arc::new(AtomicBool::new(false));
        let flag = broken.clone();
        let transport = ScriptedTransport::new(move |request| {
            if flag.load(Ordering::SeqCst) && request.url.ends_with("/attributes") {
                json_response(500, &json!({}))
            } else {
                schema_responder(request)
            }
        });
        let client = InsightClient::with_transport(config(), transport);
        client.reload_schema().unwrap();
        let before = client.schemas();

        broken.store(true, Ordering::SeqCst);
        let err = client.reload_schema().unwrap_err();
        assert!(matches!(err, InsightError::Remote(RemoteError::Server { status: 500, .. })));
        assert_eq!(*client.schemas(), *before);
    }

    #[test]
    fn attribute_lookup_normalizes_first_letter() {
        let schema = ObjectTypeSchema {
            id: 1,
            name: "Country".to_string(),
            parent_object_type_id: None,
            attributes: vec![ObjectTypeAttribute {
                id: 11,
                name: "shortName".to_string(),
                reference_object_type_id: None,
                reference_object_type: None,
            }],
        };
        assert_eq!(schema.attribute("ShortName").map(|a| a.id), Some(11));
        assert_eq!(schema.attribute("shortName").map(|a| a.id), Some(11));
        assert!(schema.attribute("shortname").is_none());
    }
}
