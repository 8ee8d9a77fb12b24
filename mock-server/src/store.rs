//! In-memory state behind the mock: one object schema with its object
//! types, attributes, objects, history, comments and attachments, plus a
//! log of every request received.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;

use crate::dto::{
    ActorDto, AttachmentDto, AttributeDto, AttributeValueDto, CommentDto, CommentInput, EditAttribute, EditItem,
    EditValue, HistoryDto, ObjectAttributeDto, ObjectDto, ObjectEntriesDto, ObjectTypeDto, ReferencedObjectDto,
};
use crate::iql::{self, Clause, IqlError};

/// The only object schema the mock serves.
pub const SCHEMA_ID: i64 = 1;
pub const KEY_PREFIX: &str = "CMDB";
pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

const HISTORY_CREATED: i32 = 0;
const HISTORY_UPDATED: i32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("object schema {0} does not exist")]
    UnknownSchema(i64),

    #[error("object type {0} does not exist")]
    UnknownObjectType(String),

    #[error("object {0} does not exist")]
    ObjectNotFound(i64),

    #[error("attachment {0} does not exist")]
    AttachmentNotFound(i64),

    #[error("attribute {attribute} is not defined on object type {object_type}")]
    UnknownAttribute { object_type: String, attribute: String },

    #[error("{attribute}: no object matches '{value}'")]
    UnknownReference { attribute: String, value: String },

    #[error("{0}: a value is required")]
    MissingValue(String),

    #[error("invalid IQL: {0}")]
    Iql(#[from] IqlError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownSchema(_) | StoreError::ObjectNotFound(_) | StoreError::AttachmentNotFound(_)
        )
    }

    /// Attribute and message for field-level error bodies.
    pub fn field_error(&self) -> Option<(&str, String)> {
        match self {
            StoreError::UnknownReference { attribute, value } => {
                Some((attribute, format!("no object matches '{value}'")))
            }
            StoreError::MissingValue(attribute) => Some((attribute, "a value is required".to_string())),
            _ => None,
        }
    }
}

/// A request as the mock saw it, for assertions on call patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
struct ObjectTypeRecord {
    id: i64,
    name: String,
    parent: Option<i64>,
}

#[derive(Debug, Clone)]
struct AttributeRecord {
    id: i64,
    object_type_id: i64,
    name: String,
    reference: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredValue {
    Text(String),
    Reference(i64),
}

#[derive(Debug, Clone)]
struct StoredObject {
    id: i64,
    object_type_id: i64,
    values: BTreeMap<i64, Vec<StoredValue>>,
}

#[derive(Debug, Clone)]
struct StoredAttachment {
    id: i64,
    object_id: i64,
    filename: String,
    mime_type: String,
    comment: String,
    created: String,
    bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct Store {
    next_id: i64,
    username: String,
    password: String,
    types: Vec<ObjectTypeRecord>,
    attributes: Vec<AttributeRecord>,
    objects: BTreeMap<i64, StoredObject>,
    history: Vec<HistoryDto>,
    comments: Vec<CommentDto>,
    attachments: BTreeMap<i64, StoredAttachment>,
    requests: Vec<RecordedRequest>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Empty schema, default credentials.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            types: Vec::new(),
            attributes: Vec::new(),
            objects: BTreeMap::new(),
            history: Vec::new(),
            comments: Vec::new(),
            attachments: BTreeMap::new(),
            requests: Vec::new(),
        }
    }

    /// Country, Company and Partner (a child of Company), with Germany and
    /// one company located there.
    pub fn seeded() -> Self {
        let mut store = Self::new();
        let country = store.add_object_type("Country", None);
        let country_name = store.add_attribute(country, "Name", None);
        let short_name = store.add_attribute(country, "ShortName", None);

        let company = store.add_object_type("Company", None);
        let partner = store.add_object_type("Partner", Some(company));
        let mut company_attributes = Vec::new();
        for object_type in [company, partner] {
            company_attributes.push((
                store.add_attribute(object_type, "Name", None),
                store.add_attribute(object_type, "Country", Some(country)),
                store.add_attribute(object_type, "Tags", None),
            ));
        }

        let germany = store.insert(
            country,
            BTreeMap::from([
                (country_name, vec![StoredValue::Text("Germany".to_string())]),
                (short_name, vec![StoredValue::Text("DE".to_string())]),
            ]),
        );
        let (name, located_in, tags) = company_attributes[0];
        store.insert(
            company,
            BTreeMap::from([
                (name, vec![StoredValue::Text("Test Gmbh".to_string())]),
                (located_in, vec![StoredValue::Reference(germany)]),
                (
                    tags,
                    vec![
                        StoredValue::Text("customer".to_string()),
                        StoredValue::Text("eu".to_string()),
                    ],
                ),
            ]),
        );
        store
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn add_object_type(&mut self, name: &str, parent: Option<i64>) -> i64 {
        let id = self.allocate();
        self.types.push(ObjectTypeRecord {
            id,
            name: name.to_string(),
            parent,
        });
        id
    }

    pub fn add_attribute(&mut self, object_type_id: i64, name: &str, reference: Option<i64>) -> i64 {
        let id = self.allocate();
        self.attributes.push(AttributeRecord {
            id,
            object_type_id,
            name: name.to_string(),
            reference,
        });
        id
    }

    /// Creates an object from attribute names and string values; reference
    /// attributes take object keys. Goes through the same validation as
    /// `POST object/create`.
    pub fn add_object(&mut self, object_type_id: i64, values: &[(&str, &[&str])]) -> Result<i64, StoreError> {
        let mut attributes = Vec::with_capacity(values.len());
        for (name, entries) in values {
            let attribute = self
                .attributes
                .iter()
                .find(|a| a.object_type_id == object_type_id && a.name == *name)
                .ok_or_else(|| StoreError::UnknownAttribute {
                    object_type: object_type_id.to_string(),
                    attribute: name.to_string(),
                })?;
            attributes.push(EditAttribute {
                object_type_attribute_id: attribute.id,
                object_attribute_values: entries
                    .iter()
                    .map(|entry| EditValue {
                        value: Value::String(entry.to_string()),
                    })
                    .collect(),
            });
        }
        let created = self.create_object(&EditItem {
            object_type_id,
            attributes,
        })?;
        Ok(created.id)
    }

    pub fn object_type_id(&self, name: &str) -> Option<i64> {
        self.types.iter().find(|t| t.name == name).map(|t| t.id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn record(&mut self, request: RecordedRequest) {
        self.requests.push(request);
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    /// Checks an `Authorization: Basic ...` header value.
    pub fn authorizes(&self, authorization: Option<&str>) -> bool {
        let Some(encoded) = authorization.and_then(|value| value.strip_prefix("Basic ")) else {
            return false;
        };
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        let Ok(credentials) = String::from_utf8(decoded) else {
            return false;
        };
        credentials.split_once(':') == Some((self.username.as_str(), self.password.as_str()))
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn object_types(&self, schema_id: i64) -> Result<Vec<ObjectTypeDto>, StoreError> {
        if schema_id != SCHEMA_ID {
            return Err(StoreError::UnknownSchema(schema_id));
        }
        Ok(self.types.iter().map(type_dto).collect())
    }

    pub fn attributes_of(&self, object_type_id: i64) -> Result<Vec<AttributeDto>, StoreError> {
        self.object_type(object_type_id)?;
        Ok(self
            .attributes
            .iter()
            .filter(|a| a.object_type_id == object_type_id)
            .map(|a| self.attribute_dto(a))
            .collect())
    }

    /// IQL listing. Pages are 1-based; `page_size` in the result is the
    /// number of pages.
    pub fn query(&self, iql: &str, result_per_page: usize, page: usize) -> Result<ObjectEntriesDto, StoreError> {
        let clauses = iql::parse(iql)?;
        let matched: Vec<&StoredObject> = self
            .objects
            .values()
            .filter(|object| clauses.iter().all(|clause| self.matches(object, clause)))
            .collect();

        let per_page = result_per_page.max(1);
        let page = page.max(1);
        let total = matched.len();
        Ok(ObjectEntriesDto {
            object_entries: matched
                .into_iter()
                .skip((page - 1) * per_page)
                .take(per_page)
                .map(|object| self.render(object))
                .collect(),
            page_size: total.div_ceil(per_page) as u32,
            page_number: page as u32,
            total_filter_count: total,
        })
    }

    pub fn object(&self, id: i64) -> Result<ObjectDto, StoreError> {
        self.objects
            .get(&id)
            .map(|object| self.render(object))
            .ok_or(StoreError::ObjectNotFound(id))
    }

    pub fn create_object(&mut self, item: &EditItem) -> Result<ObjectDto, StoreError> {
        let object_type = self.object_type(item.object_type_id)?.clone();
        let values: BTreeMap<i64, Vec<StoredValue>> = self
            .resolve_values(&object_type, &item.attributes)?
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .collect();
        self.require_name(&object_type, &values)?;

        let id = self.insert(object_type.id, values);
        self.object(id)
    }

    /// Replaces the values of the attributes present in `item`; others keep
    /// their values. An empty value list clears the attribute.
    pub fn update_object(&mut self, id: i64, item: &EditItem) -> Result<ObjectDto, StoreError> {
        let current = self.objects.get(&id).cloned().ok_or(StoreError::ObjectNotFound(id))?;
        let object_type = self.object_type(current.object_type_id)?.clone();
        let changes = self.resolve_values(&object_type, &item.attributes)?;

        let mut values = current.values.clone();
        for (attribute, new_values) in &changes {
            if new_values.is_empty() {
                values.remove(attribute);
            } else {
                values.insert(*attribute, new_values.clone());
            }
        }
        self.require_name(&object_type, &values)?;

        for (attribute, new_values) in changes {
            let old_values = current.values.get(&attribute).cloned().unwrap_or_default();
            if old_values != new_values {
                let name = self.attribute_name(attribute);
                let old_value = self.display(&old_values);
                let new_value = self.display(&new_values);
                self.push_history(id, HISTORY_UPDATED, Some(name), non_empty(old_value), non_empty(new_value));
            }
        }
        if let Some(object) = self.objects.get_mut(&id) {
            object.values = values;
        }
        self.object(id)
    }

    /// Removes the object, its attachments and history, and every reference
    /// other objects hold to it.
    pub fn delete_object(&mut self, id: i64) -> Result<(), StoreError> {
        self.objects.remove(&id).ok_or(StoreError::ObjectNotFound(id))?;
        for object in self.objects.values_mut() {
            for values in object.values.values_mut() {
                values.retain(|value| *value != StoredValue::Reference(id));
            }
            object.values.retain(|_, values| !values.is_empty());
        }
        self.attachments.retain(|_, attachment| attachment.object_id != id);
        self.history.retain(|entry| entry.object_id != id);
        self.comments.retain(|comment| comment.object_id != id);
        Ok(())
    }

    pub fn history(&self, object_id: i64) -> Result<Vec<HistoryDto>, StoreError> {
        self.ensure_object(object_id)?;
        Ok(self
            .history
            .iter()
            .filter(|entry| entry.object_id == object_id)
            .cloned()
            .collect())
    }

    pub fn add_comment(&mut self, input: &CommentInput) -> Result<CommentDto, StoreError> {
        self.ensure_object(input.object_id)?;
        let comment = CommentDto {
            id: self.allocate(),
            object_id: input.object_id,
            comment: input.comment.clone(),
            actor: self.actor(),
            created: now(),
        };
        self.comments.push(comment.clone());
        Ok(comment)
    }

    pub fn comments(&self, object_id: i64) -> Vec<CommentDto> {
        self.comments
            .iter()
            .filter(|comment| comment.object_id == object_id)
            .cloned()
            .collect()
    }

    /// `base_url` prefixes the download URL of each attachment.
    pub fn attachments(&self, object_id: i64, base_url: &str) -> Result<Vec<AttachmentDto>, StoreError> {
        self.ensure_object(object_id)?;
        Ok(self
            .attachments
            .values()
            .filter(|attachment| attachment.object_id == object_id)
            .map(|attachment| self.attachment_dto(attachment, base_url))
            .collect())
    }

    pub fn add_attachment(
        &mut self,
        object_id: i64,
        filename: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        comment: &str,
        base_url: &str,
    ) -> Result<AttachmentDto, StoreError> {
        self.ensure_object(object_id)?;
        let attachment = StoredAttachment {
            id: self.allocate(),
            object_id,
            filename: filename.to_string(),
            mime_type: mime_type.to_string(),
            comment: comment.to_string(),
            created: now(),
            bytes,
        };
        let dto = self.attachment_dto(&attachment, base_url);
        self.attachments.insert(attachment.id, attachment);
        Ok(dto)
    }

    /// Mime type and content of an attachment.
    pub fn attachment_content(&self, id: i64) -> Result<(String, Vec<u8>), StoreError> {
        self.attachments
            .get(&id)
            .map(|attachment| (attachment.mime_type.clone(), attachment.bytes.clone()))
            .ok_or(StoreError::AttachmentNotFound(id))
    }

    pub fn delete_attachment(&mut self, id: i64) -> Result<(), StoreError> {
        self.attachments
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::AttachmentNotFound(id))
    }

    fn allocate(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, object_type_id: i64, values: BTreeMap<i64, Vec<StoredValue>>) -> i64 {
        let id = self.allocate();
        self.objects.insert(
            id,
            StoredObject {
                id,
                object_type_id,
                values,
            },
        );
        self.push_history(id, HISTORY_CREATED, None, None, None);
        id
    }

    fn push_history(
        &mut self,
        object_id: i64,
        kind: i32,
        affected_attribute: Option<String>,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        let entry = HistoryDto {
            id: self.allocate(),
            object_id,
            kind,
            affected_attribute,
            old_value,
            new_value,
            actor: self.actor(),
            created: now(),
        };
        self.history.push(entry);
    }

    fn actor(&self) -> ActorDto {
        ActorDto {
            name: self.username.clone(),
            display_name: self.username.clone(),
        }
    }

    fn ensure_object(&self, id: i64) -> Result<(), StoreError> {
        if self.objects.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::ObjectNotFound(id))
        }
    }

    fn object_type(&self, id: i64) -> Result<&ObjectTypeRecord, StoreError> {
        self.types
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::UnknownObjectType(id.to_string()))
    }

    fn type_name(&self, id: i64) -> &str {
        self.types.iter().find(|t| t.id == id).map(|t| t.name.as_str()).unwrap_or_default()
    }

    fn attribute_name(&self, id: i64) -> String {
        self.attributes
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.name.clone())
            .unwrap_or_default()
    }

    /// `true` when `object_type_id` is `ancestor` or one of its children.
    fn descends_from(&self, object_type_id: i64, ancestor: i64) -> bool {
        let mut current = Some(object_type_id);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.types.iter().find(|t| t.id == id).and_then(|t| t.parent);
        }
        false
    }

    fn resolve_values(
        &self,
        object_type: &ObjectTypeRecord,
        attributes: &[EditAttribute],
    ) -> Result<BTreeMap<i64, Vec<StoredValue>>, StoreError> {
        let mut resolved = BTreeMap::new();
        for edit in attributes {
            let attribute = self
                .attributes
                .iter()
                .find(|a| a.id == edit.object_type_attribute_id && a.object_type_id == object_type.id)
                .ok_or_else(|| StoreError::UnknownAttribute {
                    object_type: object_type.name.clone(),
                    attribute: edit.object_type_attribute_id.to_string(),
                })?;

            let mut values = Vec::with_capacity(edit.object_attribute_values.len());
            for entry in &edit.object_attribute_values {
                let text = match &entry.value {
                    Value::Null => continue,
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                let value = match attribute.reference {
                    Some(target_type) => {
                        StoredValue::Reference(self.find_reference(target_type, &text).ok_or_else(|| {
                            StoreError::UnknownReference {
                                attribute: attribute.name.clone(),
                                value: text.clone(),
                            }
                        })?)
                    }
                    None => StoredValue::Text(text),
                };
                values.push(value);
            }
            resolved.insert(attribute.id, values);
        }
        Ok(resolved)
    }

    /// Reference targets are addressed by object key, or by id.
    fn find_reference(&self, target_type: i64, value: &str) -> Option<i64> {
        self.objects
            .values()
            .filter(|object| self.descends_from(object.object_type_id, target_type))
            .find(|object| object_key(object.id) == value || object.id.to_string() == value)
            .map(|object| object.id)
    }

    fn require_name(
        &self,
        object_type: &ObjectTypeRecord,
        values: &BTreeMap<i64, Vec<StoredValue>>,
    ) -> Result<(), StoreError> {
        let name = self
            .attributes
            .iter()
            .find(|a| a.object_type_id == object_type.id && a.name == "Name");
        match name {
            Some(name) if values.get(&name.id).map_or(true, Vec::is_empty) => {
                Err(StoreError::MissingValue(name.name.clone()))
            }
            _ => Ok(()),
        }
    }

    fn matches(&self, object: &StoredObject, clause: &Clause) -> bool {
        match clause {
            Clause::TypeIs(name) => self.type_name(object.object_type_id) == name.as_str(),
            Clause::TypeAndChildren(name) => self
                .object_type_id(name)
                .is_some_and(|ancestor| self.descends_from(object.object_type_id, ancestor)),
            Clause::IdIs(id) => object.id == *id,
            Clause::IdIn(ids) => ids.contains(&object.id),
            Clause::AttributeIs { attribute, value } => self
                .attributes
                .iter()
                .filter(|a| a.object_type_id == object.object_type_id && a.name.eq_ignore_ascii_case(attribute))
                .filter_map(|a| object.values.get(&a.id))
                .flatten()
                .any(|stored| match stored {
                    StoredValue::Text(text) => text == value,
                    StoredValue::Reference(id) => self.label(*id) == *value || object_key(*id) == *value,
                }),
        }
    }

    fn label(&self, id: i64) -> String {
        let Some(object) = self.objects.get(&id) else {
            return String::new();
        };
        self.attributes
            .iter()
            .filter(|a| a.object_type_id == object.object_type_id && a.name == "Name")
            .filter_map(|a| object.values.get(&a.id))
            .flatten()
            .find_map(|value| match value {
                StoredValue::Text(text) => Some(text.clone()),
                StoredValue::Reference(_) => None,
            })
            .unwrap_or_default()
    }

    fn display(&self, values: &[StoredValue]) -> String {
        values
            .iter()
            .map(|value| match value {
                StoredValue::Text(text) => text.clone(),
                StoredValue::Reference(id) => self.label(*id),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render(&self, object: &StoredObject) -> ObjectDto {
        let attributes = self
            .attributes
            .iter()
            .filter(|a| a.object_type_id == object.object_type_id)
            .filter_map(|a| object.values.get(&a.id).map(|values| (a, values)))
            .map(|(attribute, values)| ObjectAttributeDto {
                id: object.id * 1000 + attribute.id,
                object_type_attribute_id: attribute.id,
                object_type_attribute: self.attribute_dto(attribute),
                object_attribute_values: values.iter().map(|value| self.value_dto(value)).collect(),
            })
            .collect();
        let object_type = self
            .types
            .iter()
            .find(|t| t.id == object.object_type_id)
            .map(type_dto)
            .unwrap_or_else(|| ObjectTypeDto {
                id: object.object_type_id,
                name: String::new(),
                object_schema_id: SCHEMA_ID,
                parent_object_type_id: None,
            });
        ObjectDto {
            id: object.id,
            label: self.label(object.id),
            object_key: object_key(object.id),
            object_type,
            attributes,
        }
    }

    fn value_dto(&self, value: &StoredValue) -> AttributeValueDto {
        match value {
            StoredValue::Text(text) => AttributeValueDto {
                value: Some(text.clone()),
                display_value: text.clone(),
                referenced_object: None,
            },
            StoredValue::Reference(id) => {
                let label = self.label(*id);
                AttributeValueDto {
                    value: None,
                    display_value: label.clone(),
                    referenced_object: Some(ReferencedObjectDto {
                        id: *id,
                        label,
                        object_key: object_key(*id),
                    }),
                }
            }
        }
    }

    fn attribute_dto(&self, attribute: &AttributeRecord) -> AttributeDto {
        AttributeDto {
            id: attribute.id,
            name: attribute.name.clone(),
            reference_object_type_id: attribute.reference,
            reference_object_type: attribute
                .reference
                .and_then(|id| self.types.iter().find(|t| t.id == id))
                .map(type_dto),
        }
    }

    fn attachment_dto(&self, attachment: &StoredAttachment, base_url: &str) -> AttachmentDto {
        AttachmentDto {
            id: attachment.id,
            author: self.username.clone(),
            mime_type: attachment.mime_type.clone(),
            filename: attachment.filename.clone(),
            filesize: format!("{} B", attachment.bytes.len()),
            created: attachment.created.clone(),
            comment: attachment.comment.clone(),
            url: format!(
                "{}/rest/insight/1.0/attachments/{}/download",
                base_url.trim_end_matches('/'),
                attachment.id
            ),
        }
    }
}

pub fn object_key(id: i64) -> String {
    format!("{KEY_PREFIX}-{id}")
}

fn type_dto(record: &ObjectTypeRecord) -> ObjectTypeDto {
    ObjectTypeDto {
        id: record.id,
        name: record.name.clone(),
        object_schema_id: SCHEMA_ID,
        parent_object_type_id: record.parent,
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn now() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company_type(store: &Store) -> i64 {
        store.object_type_id("Company").unwrap()
    }

    #[test]
    fn seeded_store_has_germany_and_a_company() {
        let store = Store::seeded();
        let countries = store.query("objectType=\"Country\"", 25, 1).unwrap();
        assert_eq!(countries.total_filter_count, 1);
        assert_eq!(countries.object_entries[0].label, "Germany");

        let company = store.query("objectType=\"Company\"", 25, 1).unwrap().object_entries.remove(0);
        let country = &company.attributes[1].object_attribute_values[0];
        assert_eq!(country.referenced_object.as_ref().unwrap().label, "Germany");
        assert_eq!(company.attributes[2].object_attribute_values.len(), 2);
    }

    #[test]
    fn children_are_included_only_when_asked() {
        let mut store = Store::seeded();
        let partner = store.object_type_id("Partner").unwrap();
        store.add_object(partner, &[("Name", &["Partner AG"])]).unwrap();

        let exact = store.query("objectType=\"Company\"", 25, 1).unwrap();
        let family = store
            .query("objectType in objectTypeAndChildren(\"Company\")", 25, 1)
            .unwrap();
        assert_eq!(exact.total_filter_count, 1);
        assert_eq!(family.total_filter_count, 2);
    }

    #[test]
    fn pages_split_results() {
        let mut store = Store::seeded();
        let country = store.object_type_id("Country").unwrap();
        for name in ["France", "Spain", "Italy", "Poland"] {
            store.add_object(country, &[("Name", &[name])]).unwrap();
        }
        let second = store.query("objectType=\"Country\"", 2, 2).unwrap();
        assert_eq!(second.page_size, 3);
        assert_eq!(second.page_number, 2);
        let labels: Vec<&str> = second.object_entries.iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["Spain", "Italy"]);
    }

    #[test]
    fn references_are_written_by_key_and_matched_by_label() {
        let mut store = Store::seeded();
        let germany = store.query("Name=\"Germany\"", 25, 1).unwrap().object_entries[0].object_key.clone();
        let id = store
            .add_object(company_type(&store), &[("Name", &["Other AG"]), ("Country", &[germany.as_str()])])
            .unwrap();
        let found = store
            .query("objectType=\"Company\" and Country=\"Germany\"", 25, 1)
            .unwrap();
        assert!(found.object_entries.iter().any(|o| o.id == id));
    }

    #[test]
    fn unknown_reference_is_rejected() {
        let mut store = Store::seeded();
        let err = store
            .add_object(company_type(&store), &[("Name", &["Ghost"]), ("Country", &["CMDB-999"])])
            .unwrap_err();
        assert_eq!(err.field_error().map(|(attribute, _)| attribute), Some("Country"));
    }

    #[test]
    fn name_is_required() {
        let mut store = Store::seeded();
        let err = store.add_object(company_type(&store), &[("Tags", &["x"])]).unwrap_err();
        assert_eq!(err, StoreError::MissingValue("Name".to_string()));
    }

    #[test]
    fn update_records_history_per_changed_attribute() {
        let mut store = Store::seeded();
        let country = store.object_type_id("Country").unwrap();
        let id = store.add_object(country, &[("Name", &["Englnd"])]).unwrap();
        let name = store.attributes_of(country).unwrap()[0].id;
        let item = EditItem {
            object_type_id: country,
            attributes: vec![EditAttribute {
                object_type_attribute_id: name,
                object_attribute_values: vec![EditValue {
                    value: Value::String("England".to_string()),
                }],
            }],
        };
        store.update_object(id, &item).unwrap();
        store.update_object(id, &item).unwrap();

        let history = store.history(id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].old_value.as_deref(), Some("Englnd"));
        assert_eq!(history[1].new_value.as_deref(), Some("England"));
    }

    #[test]
    fn delete_drops_references_to_the_object() {
        let mut store = Store::seeded();
        let germany = store.query("Name=\"Germany\"", 25, 1).unwrap().object_entries[0].id;
        store.delete_object(germany).unwrap();
        let company = store.query("objectType=\"Company\"", 25, 1).unwrap().object_entries.remove(0);
        assert!(company.attributes.iter().all(|a| a.object_type_attribute.name != "Country"));
        assert_eq!(store.delete_object(germany), Err(StoreError::ObjectNotFound(germany)));
    }

    #[test]
    fn basic_credentials_are_checked() {
        let store = Store::new().with_credentials("user", "secret");
        // "user:secret"
        assert!(store.authorizes(Some("Basic dXNlcjpzZWNyZXQ=")));
        assert!(!store.authorizes(Some("Basic dXNlcjp3cm9uZw==")));
        assert!(!store.authorizes(None));
    }
}
