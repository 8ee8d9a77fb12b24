//! Remote objects to declared entities.
//!
//! # Design
//! Mapping a batch runs in two passes. The first pass walks every object
//! and collects the referenced ids per reference field, so each referenced
//! type is fetched once per batch (in chunks) instead of once per object.
//! The second pass assembles one `EntityRecord` per object from its own
//! attribute values and the resolved references, then converts it with
//! `Entity::from_record`.
//!
//! Declared reference targets are mapped recursively with the same engine.
//! The entity types on the current path are tracked, so a graph that
//! reaches back into itself fails instead of recursing forever.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::{debug, trace};

use crate::client::InsightClient;
use crate::entity::{
    normalize_attribute, Entity, EntityDescriptor, EntityRecord, EntityTarget, FieldDescriptor, FieldKind,
    FieldValue, Identity, ScalarType, SimpleEntity,
};
use crate::error::{InsightError, InsightResult, MappingError};
use crate::resolver::ReferenceResolver;
use crate::types::{InsightAttribute, InsightObject, ReferencedObject};

/// Referenced objects of one reference field across a batch.
struct ReferenceGroup {
    object_type: String,
    targets: IndexMap<i64, ReferencedObject>,
}

/// Resolved records per attribute, indexed by object id.
type Resolved = HashMap<String, IndexMap<i64, EntityRecord>>;

/// Raw attribute values of one object, split into plain values and the
/// ids of references that feed entity fields.
#[derive(Default)]
struct ObjectValues {
    raw: HashMap<String, Vec<Value>>,
    references: HashMap<String, Vec<i64>>,
}

pub struct ObjectMapper<'a> {
    client: &'a InsightClient,
    resolver: ReferenceResolver<'a>,
}

impl<'a> ObjectMapper<'a> {
    pub fn new(client: &'a InsightClient) -> Self {
        Self {
            client,
            resolver: ReferenceResolver::new(client),
        }
    }

    pub fn map<T: Entity>(&self, objects: &[InsightObject]) -> InsightResult<Vec<T>> {
        let descriptor = T::descriptor();
        self.map_records(&descriptor, objects, &mut Vec::new())?
            .into_iter()
            .map(|record| T::from_record(record).map_err(InsightError::from))
            .collect()
    }

    /// Maps `objects` to records of `descriptor`'s type. `path` holds the
    /// entity types currently being mapped further up the graph.
    pub fn map_records(
        &self,
        descriptor: &EntityDescriptor,
        objects: &[InsightObject],
        path: &mut Vec<&'static str>,
    ) -> InsightResult<Vec<EntityRecord>> {
        if objects.is_empty() {
            return Ok(Vec::new());
        }
        path.push(descriptor.entity());
        let records = self.map_batch(descriptor, objects, path);
        path.pop();
        records
    }

    fn map_batch(
        &self,
        descriptor: &EntityDescriptor,
        objects: &[InsightObject],
        path: &mut Vec<&'static str>,
    ) -> InsightResult<Vec<EntityRecord>> {
        let entity = descriptor.short_name();
        debug!(entity, count = objects.len(), "collecting references");
        let groups = reference_groups(descriptor, objects);
        let resolved = self.resolve(descriptor, &groups, path)?;

        debug!(entity, count = objects.len(), "parsing objects");
        objects
            .iter()
            .map(|object| self.assemble(descriptor, object, &resolved, path))
            .collect()
    }

    fn resolve(
        &self,
        descriptor: &EntityDescriptor,
        groups: &IndexMap<String, ReferenceGroup>,
        path: &mut Vec<&'static str>,
    ) -> InsightResult<Resolved> {
        let mut resolved = Resolved::new();
        for (attribute, group) in groups {
            let Some(field) = descriptor.field_by_attribute(attribute) else {
                continue;
            };
            let records = match field.kind().target() {
                Some(EntityTarget::Simple) => group.targets.values().map(simple_record).collect(),
                Some(EntityTarget::Declared(nested)) => {
                    let nested = nested();
                    ensure_acyclic(descriptor, field, &nested, path)?;
                    let ids: IndexSet<i64> = group.targets.keys().copied().collect();
                    let objects = self.resolver.resolve_many(&group.object_type, &ids)?;
                    self.map_records(&nested, &objects, path)?
                }
                None => continue,
            };
            trace!(attribute = %attribute, count = records.len(), "resolved references");
            resolved.insert(
                attribute.clone(),
                records
                    .into_iter()
                    .map(|record| (record.identity().id, record))
                    .collect(),
            );
        }
        Ok(resolved)
    }

    fn assemble(
        &self,
        descriptor: &EntityDescriptor,
        object: &InsightObject,
        resolved: &Resolved,
        path: &mut Vec<&'static str>,
    ) -> InsightResult<EntityRecord> {
        trace!(label = %object.label, "parsing object");
        let values = object_values(descriptor, object);
        let mut record = EntityRecord::new(descriptor.entity(), Identity::new(object.id, object.object_key.clone()))
            .with_label(object.label.clone());

        for field in descriptor.fields() {
            let attribute = field.attribute();
            let value = match field.kind() {
                FieldKind::Scalar(scalar) => match values.raw.get(attribute) {
                    Some(raw) => scalar_value(descriptor, field, *scalar, raw)?,
                    None => FieldValue::Null,
                },
                FieldKind::ScalarList(scalar) => match values.raw.get(attribute) {
                    Some(raw) => scalar_list_value(descriptor, field, *scalar, raw)?,
                    None => FieldValue::Null,
                },
                FieldKind::EntityRef(target) | FieldKind::EntityRefList(target) => {
                    match (values.references.get(attribute), values.raw.get(attribute)) {
                        (Some(ids), _) => reference_value(field, ids, resolved.get(attribute)),
                        (None, Some(raw)) => self.inline_value(descriptor, field, target, raw, path)?,
                        (None, None) => FieldValue::Null,
                    }
                }
            };

            if field.is_required() && value == FieldValue::Null {
                return Err(MappingError::MissingField {
                    entity: descriptor.short_name().to_string(),
                    object: object.label.clone(),
                    field: field.field().to_string(),
                }
                .into());
            }
            record.set(field.field(), value);
        }
        Ok(record)
    }

    /// Entity fields whose attribute carries embedded objects instead of
    /// references. Only registered declared targets can be mapped this way.
    fn inline_value(
        &self,
        descriptor: &EntityDescriptor,
        field: &FieldDescriptor,
        target: &EntityTarget,
        raw: &[Value],
        path: &mut Vec<&'static str>,
    ) -> InsightResult<FieldValue> {
        let raw: Vec<&Value> = raw.iter().filter(|value| !value.is_null()).collect();
        if raw.is_empty() {
            return Ok(FieldValue::Null);
        }

        let nested = match target {
            EntityTarget::Declared(nested) => Some(nested()),
            EntityTarget::Simple => None,
        };
        let embedded = nested
            .as_ref()
            .filter(|nested| self.client.registry().is_registered(nested.entity()))
            .and_then(|nested| {
                raw.iter()
                    .map(|value| serde_json::from_value::<InsightObject>((*value).clone()).ok())
                    .collect::<Option<Vec<_>>>()
                    .map(|objects| (nested, objects))
            });

        let Some((nested, objects)) = embedded else {
            return Err(MappingError::Unhandled {
                entity: descriptor.short_name().to_string(),
                field: field.field().to_string(),
                kind: field.kind().describe(),
                raw: render(&raw),
                reference_expected: true,
            }
            .into());
        };

        ensure_acyclic(descriptor, field, nested, path)?;
        let records = self.map_records(nested, &objects, path)?;
        Ok(if field.kind().is_list() {
            FieldValue::Entities(records)
        } else {
            records
                .into_iter()
                .next()
                .map(|record| FieldValue::Entity(Box::new(record)))
                .unwrap_or(FieldValue::Null)
        })
    }
}

/// First pass: referenced objects per entity-typed field, deduplicated by
/// id in first-seen order.
fn reference_groups(descriptor: &EntityDescriptor, objects: &[InsightObject]) -> IndexMap<String, ReferenceGroup> {
    let mut groups: IndexMap<String, ReferenceGroup> = IndexMap::new();
    for object in objects {
        for attribute in &object.attributes {
            let Some(object_type) = attribute.reference_type() else {
                continue;
            };
            let Some(name) = attribute_name_of(attribute) else {
                continue;
            };
            if !feeds_entity_field(descriptor, &name) {
                continue;
            }
            let group = groups.entry(name).or_insert_with(|| ReferenceGroup {
                object_type: object_type.to_string(),
                targets: IndexMap::new(),
            });
            for value in &attribute.object_attribute_values {
                if let Some(referenced) = &value.referenced_object {
                    group.targets.entry(referenced.id).or_insert_with(|| referenced.clone());
                }
            }
        }
    }
    groups
}

fn object_values(descriptor: &EntityDescriptor, object: &InsightObject) -> ObjectValues {
    let mut values = ObjectValues::default();
    for attribute in &object.attributes {
        let Some(name) = attribute_name_of(attribute) else {
            continue;
        };
        let entries = &attribute.object_attribute_values;
        if attribute.reference_type().is_none() {
            values
                .raw
                .entry(name)
                .or_default()
                .extend(entries.iter().map(|entry| entry.value.clone()));
        } else if feeds_entity_field(descriptor, &name) {
            values
                .references
                .entry(name)
                .or_default()
                .extend(entries.iter().filter_map(|entry| entry.referenced_object.as_ref().map(|r| r.id)));
        } else {
            // Scalar field over a reference attribute: expose the labels.
            values.raw.entry(name).or_default().extend(
                entries
                    .iter()
                    .filter_map(|entry| entry.referenced_object.as_ref())
                    .map(|r| Value::String(r.label.clone())),
            );
        }
    }
    values
}

fn attribute_name_of(attribute: &InsightAttribute) -> Option<String> {
    attribute
        .object_type_attribute
        .as_ref()
        .map(|definition| normalize_attribute(&definition.name))
}

fn feeds_entity_field(descriptor: &EntityDescriptor, attribute: &str) -> bool {
    descriptor
        .field_by_attribute(attribute)
        .is_some_and(|field| field.kind().target().is_some())
}

fn ensure_acyclic(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    nested: &EntityDescriptor,
    path: &[&'static str],
) -> Result<(), MappingError> {
    if path.contains(&nested.entity()) {
        return Err(MappingError::CyclicGraph {
            entity: descriptor.short_name().to_string(),
            field: field.field().to_string(),
        });
    }
    Ok(())
}

fn simple_record(referenced: &ReferencedObject) -> EntityRecord {
    SimpleEntity::new(referenced.id, referenced.object_key.clone(), referenced.label.clone())
        .to_record()
        .with_label(referenced.label.clone())
}

/// Picks the resolved records for one object's reference ids, keeping the
/// object's order.
fn reference_value(
    field: &FieldDescriptor,
    ids: &[i64],
    resolved: Option<&IndexMap<i64, EntityRecord>>,
) -> FieldValue {
    let picked: Vec<EntityRecord> = match resolved {
        Some(resolved) => ids.iter().filter_map(|id| resolved.get(id)).cloned().collect(),
        None => Vec::new(),
    };
    if field.kind().is_list() {
        FieldValue::Entities(picked)
    } else {
        picked
            .into_iter()
            .next()
            .map(|record| FieldValue::Entity(Box::new(record)))
            .unwrap_or(FieldValue::Null)
    }
}

fn scalar_value(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    scalar: ScalarType,
    raw: &[Value],
) -> Result<FieldValue, MappingError> {
    match raw.iter().find(|value| !value.is_null()) {
        Some(value) => Ok(FieldValue::Value(coerce(descriptor, field, scalar, value)?)),
        None => Ok(FieldValue::Null),
    }
}

fn scalar_list_value(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    scalar: ScalarType,
    raw: &[Value],
) -> Result<FieldValue, MappingError> {
    let items = raw
        .iter()
        .filter(|value| !value.is_null())
        .map(|value| coerce(descriptor, field, scalar, value))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FieldValue::Value(Value::Array(items)))
}

/// Converts a raw attribute value to the field's primitive type. The
/// service sends most values as strings.
fn coerce(
    descriptor: &EntityDescriptor,
    field: &FieldDescriptor,
    scalar: ScalarType,
    raw: &Value,
) -> Result<Value, MappingError> {
    let text = match raw {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    let coerced = match scalar {
        ScalarType::Text => Some(Value::String(text.clone())),
        ScalarType::Integer => text.trim().parse::<i64>().ok().map(Value::from),
        ScalarType::Float => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        ScalarType::Boolean => Some(Value::Bool(text.trim().eq_ignore_ascii_case("true"))),
    };
    coerced.ok_or_else(|| MappingError::Coercion {
        entity: descriptor.short_name().to_string(),
        field: field.field().to_string(),
        expected: scalar.as_str().to_string(),
        raw: text,
    })
}

fn render(raw: &[&Value]) -> String {
    raw.iter().map(|value| value.to_string()).collect::<Vec<_>>().join(", ")
}
