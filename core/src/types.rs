//! Wire DTOs of the Insight REST API.
//!
//! # Design
//! These types mirror the service's JSON but are defined independently of
//! the mock server; integration tests catch schema drift between the two.
//! Inbound types default every field the service may omit.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of an IQL listing. `page_size` is the number of pages, not the
/// number of entries per page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntries {
    #[serde(default)]
    pub object_entries: Vec<InsightObject>,
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub total_filter_count: Option<u64>,
}

/// A stored object as returned with `includeTypeAttributes=true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightObject {
    pub id: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_key: String,
    #[serde(default)]
    pub object_type: Option<ObjectType>,
    #[serde(default)]
    pub attributes: Vec<InsightAttribute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectType {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub object_schema_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightAttribute {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub object_type_attribute: Option<ObjectTypeAttribute>,
    #[serde(default)]
    pub object_type_attribute_id: i64,
    #[serde(default)]
    pub object_attribute_values: Vec<ObjectAttributeValue>,
}

impl InsightAttribute {
    /// Name of the referenced object type when this attribute holds
    /// references.
    pub fn reference_type(&self) -> Option<&str> {
        self.object_type_attribute
            .as_ref()
            .and_then(|a| a.reference_object_type.as_ref())
            .map(|t| t.name.as_str())
    }
}

/// Attribute definition, both inside objects and in the schema listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeAttribute {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub reference_object_type_id: Option<i64>,
    #[serde(default)]
    pub reference_object_type: Option<ObjectType>,
}

/// A single value: either a scalar in `value` or a reference payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributeValue {
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub display_value: Option<Value>,
    #[serde(default)]
    pub referenced_object: Option<ReferencedObject>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedObject {
    pub id: i64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub object_key: String,
}

/// An object type of the configured schema with its attribute definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeSchema {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_object_type_id: Option<i64>,
    #[serde(default)]
    pub attributes: Vec<ObjectTypeAttribute>,
}

/// Create/update payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEditItem {
    pub object_type_id: i64,
    pub attributes: Vec<ObjectEditItemAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEditItemAttribute {
    pub object_type_attribute_id: i64,
    pub object_attribute_values: Vec<ObjectEditItemAttributeValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectEditItemAttributeValue {
    pub value: Value,
}

/// The part of a create/update response the client reads back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedObject {
    pub id: i64,
    #[serde(default)]
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    pub id: i64,
    #[serde(default)]
    pub affected_attribute: Option<String>,
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(rename = "type", default)]
    pub kind: i32,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub object_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub filesize: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBody {
    pub object_id: i64,
    pub comment: String,
}

/// Error body the service sends with 4xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    #[serde(default)]
    pub error_messages: Vec<String>,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

impl ErrorResponse {
    pub fn summary(&self) -> String {
        self.error_messages
            .iter()
            .cloned()
            .chain(self.errors.iter().map(|(k, v)| format!("{k}: {v}")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_parses_with_reference_attribute() {
        let json = r#"{
            "id": 7, "label": "Test Gmbh", "objectKey": "CMDB-7",
            "objectType": {"id": 2, "name": "Company", "objectSchemaId": 1},
            "attributes": [{
                "id": 70,
                "objectTypeAttributeId": 21,
                "objectTypeAttribute": {
                    "id": 21, "name": "Country", "referenceObjectTypeId": 1,
                    "referenceObjectType": {"id": 1, "name": "Country", "objectSchemaId": 1}
                },
                "objectAttributeValues": [{
                    "displayValue": "Germany",
                    "referencedObject": {"id": 1, "label": "Germany", "objectKey": "CMDB-1"}
                }]
            }]
        }"#;
        let object: InsightObject = serde_json::from_str(json).unwrap();
        assert_eq!(object.attributes[0].reference_type(), Some("Country"));
        let value = &object.attributes[0].object_attribute_values[0];
        assert!(value.value.is_null());
        assert_eq!(value.referenced_object.as_ref().unwrap().id, 1);
    }

    #[test]
    fn edit_item_serializes_in_service_shape() {
        let item = ObjectEditItem {
            object_type_id: 1,
            attributes: vec![ObjectEditItemAttribute {
                object_type_attribute_id: 11,
                object_attribute_values: vec![ObjectEditItemAttributeValue { value: "DE".into() }],
            }],
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["objectTypeId"], 1);
        assert_eq!(json["attributes"][0]["objectTypeAttributeId"], 11);
        assert_eq!(json["attributes"][0]["objectAttributeValues"][0]["value"], "DE");
    }

    #[test]
    fn error_response_summary_joins_messages_and_fields() {
        let body: ErrorResponse =
            serde_json::from_str(r#"{"errorMessages":["bad"],"errors":{"Name":"required"}}"#).unwrap();
        assert_eq!(body.summary(), "bad; Name: required");
    }

    #[test]
    fn listing_defaults_missing_fields() {
        let entries: ObjectEntries = serde_json::from_str("{}").unwrap();
        assert!(entries.object_entries.is_empty());
        assert_eq!(entries.page_size, 0);
    }
}
