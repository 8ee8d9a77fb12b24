//! JSON shapes the mock speaks, modelled on the Insight REST API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeDto {
    pub id: i64,
    pub name: String,
    pub object_schema_id: i64,
    pub parent_object_type_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDto {
    pub id: i64,
    pub name: String,
    pub reference_object_type_id: Option<i64>,
    pub reference_object_type: Option<ObjectTypeDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferencedObjectDto {
    pub id: i64,
    pub label: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValueDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub display_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_object: Option<ReferencedObjectDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectAttributeDto {
    pub id: i64,
    pub object_type_attribute_id: i64,
    pub object_type_attribute: AttributeDto,
    pub object_attribute_values: Vec<AttributeValueDto>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDto {
    pub id: i64,
    pub label: String,
    pub object_key: String,
    pub object_type: ObjectTypeDto,
    pub attributes: Vec<ObjectAttributeDto>,
}

/// `page_size` is the page count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntriesDto {
    pub object_entries: Vec<ObjectDto>,
    pub page_size: u32,
    pub page_number: u32,
    pub total_filter_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditItem {
    pub object_type_id: i64,
    #[serde(default)]
    pub attributes: Vec<EditAttribute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditAttribute {
    pub object_type_attribute_id: i64,
    #[serde(default)]
    pub object_attribute_values: Vec<EditValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditValue {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorDto {
    pub name: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDto {
    pub id: i64,
    pub object_id: i64,
    #[serde(rename = "type")]
    pub kind: i32,
    pub affected_attribute: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub actor: ActorDto,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentInput {
    pub object_id: i64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDto {
    pub id: i64,
    pub object_id: i64,
    pub comment: String,
    pub actor: ActorDto,
    pub created: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDto {
    pub id: i64,
    pub author: String,
    pub mime_type: String,
    pub filename: String,
    pub filesize: String,
    pub created: String,
    pub comment: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error_messages: Vec<String>,
    pub errors: BTreeMap<String, String>,
}
