//! Entity records to create/update payloads.

use serde_json::Value;
use tracing::trace;

use crate::entity::{EntityDescriptor, EntityRecord, FieldDescriptor, FieldValue};
use crate::error::MappingError;
use crate::types::{ObjectEditItem, ObjectEditItemAttribute, ObjectEditItemAttributeValue, ObjectTypeSchema};

/// One attribute entry per declared field the schema knows. Fields without
/// a schema attribute are dropped; null fields clear the attribute.
/// References are written as the referenced object's key.
pub fn build_edit_item(
    record: &EntityRecord,
    descriptor: &EntityDescriptor,
    schema: &ObjectTypeSchema,
) -> Result<ObjectEditItem, MappingError> {
    let mut attributes = Vec::with_capacity(descriptor.fields().len());
    for field in descriptor.fields() {
        let Some(attribute) = schema.attribute(field.attribute()) else {
            trace!(
                entity = descriptor.short_name(),
                field = field.field(),
                object_type = %schema.name,
                "no schema attribute for field, skipping"
            );
            continue;
        };
        let values = field_values(record, descriptor, field)?;
        attributes.push(ObjectEditItemAttribute {
            object_type_attribute_id: attribute.id,
            object_attribute_values: values
                .into_iter()
                .map(|value| ObjectEditItemAttributeValue { value })
                .collect(),
        });
    }
    Ok(ObjectEditItem {
        object_type_id: schema.id,
        attributes,
    })
}

fn field_values(
    record: &EntityRecord,
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
) -> Result<Vec<Value>, MappingError> {
    match record.get(field.field()) {
        None | Some(FieldValue::Null) => Ok(Vec::new()),
        Some(FieldValue::Value(Value::Array(items))) => {
            Ok(items.iter().filter(|item| !item.is_null()).cloned().collect())
        }
        Some(FieldValue::Value(value)) => Ok(vec![value.clone()]),
        Some(FieldValue::Entity(nested)) => Ok(vec![reference_key(descriptor, field, nested)?]),
        Some(FieldValue::Entities(nested)) => nested
            .iter()
            .map(|nested| reference_key(descriptor, field, nested))
            .collect(),
    }
}

fn reference_key(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    nested: &EntityRecord,
) -> Result<Value, MappingError> {
    let key = &nested.identity().key;
    if key.is_empty() {
        return Err(MappingError::UnpersistedReference {
            entity: descriptor.short_name().to_string(),
            field: field.field().to_string(),
        });
    }
    Ok(Value::String(key.clone()))
}
