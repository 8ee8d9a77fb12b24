//! Declared entities and their mapping descriptors.
//!
//! # Design
//! A declared entity describes itself once through an `EntityDescriptor`:
//! which fields it has, the attribute name each field binds to, and the
//! shape of each field (`FieldKind`). The mapping engine never touches the
//! typed struct directly. It assembles an `EntityRecord` (identity plus
//! field values keyed by attribute name) and hands it to
//! `Entity::from_record`; writes go the other way through
//! `Entity::to_record`.
//!
//! Field names are Rust `snake_case`; the bound attribute name is the
//! `PascalCase` form (`short_name` binds to `ShortName`).

use std::any::type_name;
use std::collections::HashSet;

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ConfigurationError, MappingError};

/// Object id of an entity that has never been saved.
pub const UNSAVED_ID: i64 = -1;

/// Remote identity of an entity: integer id and business key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub id: i64,
    pub key: String,
}

impl Identity {
    pub fn new(id: i64, key: impl Into<String>) -> Self {
        Self { id, key: key.into() }
    }

    /// `true` until the entity has been created remotely.
    pub fn is_unsaved(&self) -> bool {
        self.id == UNSAVED_ID
    }

    /// `true` when either half of the identity is missing.
    pub fn is_incomplete(&self) -> bool {
        self.id == UNSAVED_ID || self.key.is_empty()
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            id: UNSAVED_ID,
            key: String::new(),
        }
    }
}

/// Primitive target of a scalar field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ScalarType {
    pub fn as_str(self) -> &'static str {
        match self {
            ScalarType::Integer => "integer",
            ScalarType::Float => "float",
            ScalarType::Boolean => "boolean",
            ScalarType::Text => "text",
        }
    }
}

pub type DescriptorFn = fn() -> EntityDescriptor;

/// What a reference field is parsed into.
#[derive(Debug, Clone, Copy)]
pub enum EntityTarget {
    /// Id/label placeholder built straight from the reference payload.
    Simple,
    /// A declared entity, parsed recursively from the fetched objects.
    Declared(DescriptorFn),
}

impl EntityTarget {
    pub fn descriptor(&self) -> EntityDescriptor {
        match self {
            EntityTarget::Simple => SimpleEntity::descriptor(),
            EntityTarget::Declared(descriptor) => descriptor(),
        }
    }
}

/// Shape of a declared field, decided once when the descriptor is built.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Scalar(ScalarType),
    ScalarList(ScalarType),
    EntityRef(EntityTarget),
    EntityRefList(EntityTarget),
}

impl FieldKind {
    pub fn target(&self) -> Option<&EntityTarget> {
        match self {
            FieldKind::EntityRef(target) | FieldKind::EntityRefList(target) => Some(target),
            FieldKind::Scalar(_) | FieldKind::ScalarList(_) => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::ScalarList(_) | FieldKind::EntityRefList(_))
    }

    pub fn describe(&self) -> String {
        match self {
            FieldKind::Scalar(t) => t.as_str().to_string(),
            FieldKind::ScalarList(t) => format!("list<{}>", t.as_str()),
            FieldKind::EntityRef(target) => target.descriptor().short_name().to_string(),
            FieldKind::EntityRefList(target) => format!("list<{}>", target.descriptor().short_name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    field: &'static str,
    attribute: String,
    kind: FieldKind,
    required: bool,
}

impl FieldDescriptor {
    pub fn new(field: &'static str, kind: FieldKind) -> Self {
        Self {
            field,
            attribute: attribute_name(field),
            kind,
            required: false,
        }
    }

    /// A required field raises `MappingError::MissingField` when the remote
    /// object has no value for it; optional fields fall back to the type's
    /// default.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Binds the field to a remote attribute whose name is not the
    /// PascalCase form of the field name, e.g. `IPAddress` or `Serial No.`.
    pub fn bound_to(mut self, attribute: &str) -> Self {
        self.attribute = normalize_attribute(attribute);
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }
}

/// Per-type mapping table. Every descriptor starts with the required
/// `name` field.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    entity: &'static str,
    fields: Vec<FieldDescriptor>,
}

impl EntityDescriptor {
    pub fn of<T: 'static>() -> Self {
        Self {
            entity: type_name::<T>(),
            fields: vec![FieldDescriptor::new("name", FieldKind::Scalar(ScalarType::Text)).required()],
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    pub fn scalar(self, field: &'static str, scalar: ScalarType) -> Self {
        self.field(FieldDescriptor::new(field, FieldKind::Scalar(scalar)))
    }

    pub fn scalar_list(self, field: &'static str, scalar: ScalarType) -> Self {
        self.field(FieldDescriptor::new(field, FieldKind::ScalarList(scalar)))
    }

    pub fn reference<T: Entity>(self, field: &'static str) -> Self {
        self.field(FieldDescriptor::new(field, FieldKind::EntityRef(T::target())))
    }

    pub fn references<T: Entity>(self, field: &'static str) -> Self {
        self.field(FieldDescriptor::new(field, FieldKind::EntityRefList(T::target())))
    }

    /// Fully qualified type name; unique per declared type.
    pub fn entity(&self) -> &'static str {
        self.entity
    }

    /// Type name without its module path, for messages.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.entity)
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_by_attribute(&self, attribute: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.attribute == attribute)
    }

    /// Rejects duplicate attribute bindings and entity graphs that reach
    /// back into a type already on the current path.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_path(&mut Vec::new())
    }

    fn validate_path(&self, path: &mut Vec<&'static str>) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.attribute.as_str()) {
                return Err(ConfigurationError::DuplicateField {
                    entity: self.short_name().to_string(),
                    field: field.field.to_string(),
                });
            }
        }

        path.push(self.entity);
        for field in &self.fields {
            if let Some(EntityTarget::Declared(nested)) = field.kind.target() {
                let nested = nested();
                if path.contains(&nested.entity) {
                    return Err(ConfigurationError::CyclicGraph {
                        entity: self.short_name().to_string(),
                        field: field.field.to_string(),
                    });
                }
                nested.validate_path(path)?;
            }
        }
        path.pop();
        Ok(())
    }
}

/// A caller-defined type bound to a remote object type.
///
/// ```
/// use insight_core::{Entity, EntityDescriptor, EntityRecord, Identity, MappingError, ScalarType};
///
/// #[derive(Debug, Default)]
/// struct Country {
///     identity: Identity,
///     name: String,
///     short_name: String,
/// }
///
/// impl Entity for Country {
///     fn descriptor() -> EntityDescriptor {
///         EntityDescriptor::of::<Self>().scalar("short_name", ScalarType::Text)
///     }
///
///     fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
///         Ok(Self {
///             identity: record.identity().clone(),
///             name: record.take_value("name")?,
///             short_name: record.take_value("short_name")?,
///         })
///     }
///
///     fn to_record(&self) -> EntityRecord {
///         EntityRecord::of(self)
///             .with_value("name", &self.name)
///             .with_value("short_name", &self.short_name)
///     }
///
///     fn identity(&self) -> &Identity {
///         &self.identity
///     }
///
///     fn identity_mut(&mut self) -> &mut Identity {
///         &mut self.identity
///     }
/// }
/// ```
pub trait Entity: Sized + 'static {
    fn descriptor() -> EntityDescriptor;

    fn from_record(record: EntityRecord) -> Result<Self, MappingError>;

    fn to_record(&self) -> EntityRecord;

    fn identity(&self) -> &Identity;

    fn identity_mut(&mut self) -> &mut Identity;

    fn target() -> EntityTarget {
        EntityTarget::Declared(Self::descriptor)
    }
}

/// Reference placeholder carrying only identity and label. Fields typed
/// with it resolve without fetching the referenced objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleEntity {
    pub identity: Identity,
    pub name: String,
}

impl SimpleEntity {
    pub fn new(id: i64, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identity: Identity::new(id, key),
            name: name.into(),
        }
    }
}

impl Entity for SimpleEntity {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self).with_value("name", &self.name)
    }

    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    fn target() -> EntityTarget {
        EntityTarget::Simple
    }
}

/// Value slot of an `EntityRecord`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    /// Scalar, or JSON array for scalar lists.
    Value(Value),
    Entity(Box<EntityRecord>),
    Entities(Vec<EntityRecord>),
}

/// Untyped form of an entity exchanged between the engine and
/// `Entity::from_record` / `Entity::to_record`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRecord {
    entity: &'static str,
    identity: Identity,
    label: String,
    values: IndexMap<String, FieldValue>,
}

impl EntityRecord {
    pub fn new(entity: &'static str, identity: Identity) -> Self {
        Self {
            entity,
            identity,
            label: String::new(),
            values: IndexMap::new(),
        }
    }

    pub fn of<T: Entity>(entity: &T) -> Self {
        Self::new(type_name::<T>(), entity.identity().clone())
    }

    pub(crate) fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn identity_mut(&mut self) -> &mut Identity {
        &mut self.identity
    }

    /// Remote label when mapped from an object, else the `name` value.
    pub fn label(&self) -> &str {
        if self.label.is_empty() {
            self.name().unwrap_or_default()
        } else {
            &self.label
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self.values.get("Name") {
            Some(FieldValue::Value(Value::String(name))) => Some(name),
            _ => None,
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(&attribute_name(field))
    }

    pub fn set(&mut self, field: &str, value: FieldValue) {
        self.values.insert(attribute_name(field), value);
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = (&String, &mut FieldValue)> {
        self.values.iter_mut()
    }

    pub fn with_value<V: Serialize + ?Sized>(mut self, field: &str, value: &V) -> Self {
        let value = match serde_json::to_value(value) {
            Ok(Value::Null) | Err(_) => FieldValue::Null,
            Ok(value) => FieldValue::Value(value),
        };
        self.set(field, value);
        self
    }

    pub fn with_entity<T: Entity>(mut self, field: &str, entity: Option<&T>) -> Self {
        let value = match entity {
            Some(entity) => FieldValue::Entity(Box::new(entity.to_record())),
            None => FieldValue::Null,
        };
        self.set(field, value);
        self
    }

    pub fn with_entities<T: Entity>(mut self, field: &str, entities: &[T]) -> Self {
        self.set(field, FieldValue::Entities(entities.iter().map(Entity::to_record).collect()));
        self
    }

    /// Removes a scalar or scalar-list value; absent and null values yield
    /// `V::default()`.
    pub fn take_value<V: DeserializeOwned + Default>(&mut self, field: &str) -> Result<V, MappingError> {
        match self.values.shift_remove(&attribute_name(field)) {
            None | Some(FieldValue::Null) => Ok(V::default()),
            Some(FieldValue::Value(value)) => {
                serde_json::from_value(value).map_err(|e| self.record_error(field, e.to_string()))
            }
            Some(FieldValue::Entity(_) | FieldValue::Entities(_)) => {
                Err(self.record_error(field, "expected a value, found an entity".to_string()))
            }
        }
    }

    pub fn take_entity<T: Entity>(&mut self, field: &str) -> Result<Option<T>, MappingError> {
        match self.values.shift_remove(&attribute_name(field)) {
            None | Some(FieldValue::Null) => Ok(None),
            Some(FieldValue::Entity(record)) => self.convert::<T>(field, *record).map(Some),
            Some(FieldValue::Entities(records)) => match records.into_iter().next() {
                Some(record) => self.convert::<T>(field, record).map(Some),
                None => Ok(None),
            },
            Some(FieldValue::Value(_)) => Err(self.record_error(field, "expected an entity, found a value".to_string())),
        }
    }

    pub fn take_entities<T: Entity>(&mut self, field: &str) -> Result<Vec<T>, MappingError> {
        match self.values.shift_remove(&attribute_name(field)) {
            None | Some(FieldValue::Null) => Ok(Vec::new()),
            Some(FieldValue::Entity(record)) => Ok(vec![self.convert::<T>(field, *record)?]),
            Some(FieldValue::Entities(records)) => records
                .into_iter()
                .map(|record| self.convert::<T>(field, record))
                .collect(),
            Some(FieldValue::Value(_)) => {
                Err(self.record_error(field, "expected entities, found a value".to_string()))
            }
        }
    }

    fn convert<T: Entity>(&self, field: &str, record: EntityRecord) -> Result<T, MappingError> {
        if record.entity != type_name::<T>() {
            return Err(self.record_error(
                field,
                format!(
                    "expected {}, found {}",
                    short_type_name(type_name::<T>()),
                    short_type_name(record.entity)
                ),
            ));
        }
        T::from_record(record)
    }

    fn record_error(&self, field: &str, reason: String) -> MappingError {
        MappingError::Record {
            entity: short_type_name(self.entity).to_string(),
            field: field.to_string(),
            reason,
        }
    }
}

/// Attribute name a field binds to.
pub fn attribute_name(field: &str) -> String {
    field.to_case(Case::Pascal)
}

/// Schema-side normalization: first letter uppercased, rest untouched.
pub fn normalize_attribute(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
