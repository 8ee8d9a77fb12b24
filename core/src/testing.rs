//! Fixture entities and a scripted transport for unit tests.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use crate::config::InsightConfig;
use crate::entity::{
    Entity, EntityDescriptor, EntityRecord, FieldDescriptor, FieldKind, Identity, ScalarType, SimpleEntity,
};
use crate::error::{MappingError, TransportError};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::types::{
    InsightAttribute, InsightObject, ObjectAttributeValue, ObjectType, ObjectTypeAttribute, ObjectTypeSchema,
    ReferencedObject,
};

macro_rules! identity_accessors {
    () => {
        fn identity(&self) -> &Identity {
            &self.identity
        }

        fn identity_mut(&mut self) -> &mut Identity {
            &mut self.identity
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Country {
    pub identity: Identity,
    pub name: String,
    pub short_name: String,
}

impl Country {
    pub fn new(name: &str, short_name: &str) -> Self {
        Self {
            identity: Identity::default(),
            name: name.to_string(),
            short_name: short_name.to_string(),
        }
    }
}

impl Entity for Country {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>().scalar("short_name", ScalarType::Text)
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            short_name: record.take_value("short_name")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_value("short_name", &self.short_name)
    }

    identity_accessors!();
}

/// Name-only projection of countries.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SimpleCountry {
    pub identity: Identity,
    pub name: String,
}

impl Entity for SimpleCountry {
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

    identity_accessors!();
}

/// Flat view: the country reference is read as its label.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Company {
    pub identity: Identity,
    pub name: String,
    pub country: String,
    pub tags: Vec<String>,
}

impl Entity for Company {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .scalar("country", ScalarType::Text)
            .scalar_list("tags", ScalarType::Text)
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            country: record.take_value("country")?,
            tags: record.take_value("tags")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_value("country", &self.country)
            .with_value("tags", &self.tags)
    }

    identity_accessors!();
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Company2 {
    pub identity: Identity,
    pub name: String,
    pub country: Option<Country>,
}

impl Entity for Company2 {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>().reference::<Country>("country")
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            country: record.take_entity("country")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_entity("country", self.country.as_ref())
    }

    identity_accessors!();
}

/// Country references kept as id/label placeholders.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct CompanyRefs {
    pub identity: Identity,
    pub name: String,
    pub country: Vec<SimpleEntity>,
}

impl Entity for CompanyRefs {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>().references::<SimpleEntity>("country")
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            country: record.take_entities("country")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_entities("country", &self.country)
    }

    identity_accessors!();
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Alliance {
    pub identity: Identity,
    pub name: String,
    pub members: Vec<Country>,
}

impl Entity for Alliance {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>().references::<Country>("members")
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            members: record.take_entities("members")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_entities("members", &self.members)
    }

    identity_accessors!();
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Gauge {
    pub identity: Identity,
    pub name: String,
    pub count: i64,
    pub ratio: f64,
    pub active: bool,
    pub readings: Vec<i64>,
}

impl Entity for Gauge {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .scalar("count", ScalarType::Integer)
            .scalar("ratio", ScalarType::Float)
            .scalar("active", ScalarType::Boolean)
            .scalar_list("readings", ScalarType::Integer)
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            count: record.take_value("count")?,
            ratio: record.take_value("ratio")?,
            active: record.take_value("active")?,
            readings: record.take_value("readings")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_value("count", &self.count)
            .with_value("ratio", &self.ratio)
            .with_value("active", &self.active)
            .with_value("readings", &self.readings)
    }

    identity_accessors!();
}

/// Fields bound to attributes whose names do not follow from the field
/// names.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Host {
    pub identity: Identity,
    pub name: String,
    pub ip_address: String,
    pub serial: String,
}

impl Entity for Host {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>()
            .field(FieldDescriptor::new("ip_address", FieldKind::Scalar(ScalarType::Text)).bound_to("IPAddress"))
            .field(FieldDescriptor::new("serial", FieldKind::Scalar(ScalarType::Text)).bound_to("Serial No."))
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            ip_address: record.take_value("ip_address")?,
            serial: record.take_value("serial")?,
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_value("ip_address", &self.ip_address)
            .with_value("serial", &self.serial)
    }

    identity_accessors!();
}

/// Refers to itself, so it can never be registered.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Loop {
    pub identity: Identity,
    pub name: String,
    pub parent: Option<Box<Loop>>,
}

impl Entity for Loop {
    fn descriptor() -> EntityDescriptor {
        EntityDescriptor::of::<Self>().reference::<Loop>("parent")
    }

    fn from_record(mut record: EntityRecord) -> Result<Self, MappingError> {
        Ok(Self {
            identity: record.identity().clone(),
            name: record.take_value("name")?,
            parent: record.take_entity::<Loop>("parent")?.map(Box::new),
        })
    }

    fn to_record(&self) -> EntityRecord {
        EntityRecord::of(self)
            .with_value("name", &self.name)
            .with_entity("parent", self.parent.as_deref())
    }

    identity_accessors!();
}

/// Never registered with any client.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Unregistered {
    pub identity: Identity,
    pub name: String,
}

impl Entity for Unregistered {
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

    identity_accessors!();
}

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Answers every request with `handler` and records what it was asked.
pub(crate) struct ScriptedTransport {
    handler: Handler,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok((self.handler)(request))
    }
}

pub(crate) fn config() -> InsightConfig {
    InsightConfig::new("http://insight.test", 1, "user", "secret")
}

pub(crate) fn json_response(status: u16, body: &Value) -> HttpResponse {
    HttpResponse {
        status,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: serde_json::to_vec(body).unwrap(),
    }
}

/// One listing page; `pages` is the total page count.
pub(crate) fn listing(entries: Vec<InsightObject>, pages: u32) -> Value {
    let count = entries.len();
    json!({
        "objectEntries": entries,
        "pageSize": pages,
        "pageNumber": 1,
        "totalFilterCount": count,
    })
}

/// Object with key `CMDB-{id}`, labelled by its `Name` attribute.
pub(crate) fn object(id: i64, object_type: &str, attributes: Vec<InsightAttribute>) -> InsightObject {
    let label = attributes
        .iter()
        .find(|a| a.object_type_attribute.as_ref().is_some_and(|d| d.name == "Name"))
        .and_then(|a| a.object_attribute_values.first())
        .and_then(|v| v.value.as_str())
        .unwrap_or_default()
        .to_string();
    InsightObject {
        id,
        label,
        object_key: format!("CMDB-{id}"),
        object_type: Some(ObjectType {
            id: 0,
            name: object_type.to_string(),
            object_schema_id: 1,
        }),
        attributes,
    }
}

pub(crate) fn text_attr(id: i64, name: &str, values: &[&str]) -> InsightAttribute {
    InsightAttribute {
        id,
        object_type_attribute: Some(definition(id, name, None)),
        object_type_attribute_id: id,
        object_attribute_values: values
            .iter()
            .map(|value| ObjectAttributeValue {
                value: Value::String(value.to_string()),
                ..Default::default()
            })
            .collect(),
    }
}

pub(crate) fn ref_attr(id: i64, name: &str, object_type: &str, targets: &[(i64, &str)]) -> InsightAttribute {
    InsightAttribute {
        id,
        object_type_attribute: Some(definition(id, name, Some(object_type))),
        object_type_attribute_id: id,
        object_attribute_values: targets
            .iter()
            .map(|(target, label)| ObjectAttributeValue {
                display_value: Some(Value::String(label.to_string())),
                referenced_object: Some(ReferencedObject {
                    id: *target,
                    label: label.to_string(),
                    object_key: format!("CMDB-{target}"),
                }),
                ..Default::default()
            })
            .collect(),
    }
}

fn definition(id: i64, name: &str, reference: Option<&str>) -> ObjectTypeAttribute {
    ObjectTypeAttribute {
        id,
        name: name.to_string(),
        reference_object_type_id: reference.map(|_| 1),
        reference_object_type: reference.map(|name| ObjectType {
            id: 1,
            name: name.to_string(),
            object_schema_id: 1,
        }),
    }
}

/// Country (1), Company (2) and Partner (3, child of Company).
pub(crate) fn fixture_schemas() -> Vec<ObjectTypeSchema> {
    let schema = |id: i64, name: &str, parent: Option<i64>, attributes: Vec<ObjectTypeAttribute>| ObjectTypeSchema {
        id,
        name: name.to_string(),
        parent_object_type_id: parent,
        attributes,
    };
    let company_attributes = |base: i64| {
        vec![
            definition(base, "Name", None),
            definition(base + 1, "Country", Some("Country")),
            definition(base + 2, "Tags", None),
        ]
    };
    vec![
        schema(
            1,
            "Country",
            None,
            vec![definition(10, "Name", None), definition(11, "ShortName", None)],
        ),
        schema(2, "Company", None, company_attributes(20)),
        schema(3, "Partner", Some(2), company_attributes(30)),
    ]
}

pub(crate) fn fixture_schema(name: &str) -> ObjectTypeSchema {
    fixture_schemas()
        .into_iter()
        .find(|schema| schema.name == name)
        .unwrap()
}

/// Serves the schema endpoints from `fixture_schemas`; 404 otherwise.
pub(crate) fn schema_responder(request: &HttpRequest) -> HttpResponse {
    let schemas = fixture_schemas();
    if request.url.ends_with("/objectschema/1/objecttypes/flat") {
        let types: Vec<Value> = schemas
            .iter()
            .map(|s| json!({"id": s.id, "name": s.name, "parentObjectTypeId": s.parent_object_type_id}))
            .collect();
        return json_response(200, &Value::Array(types));
    }
    let attributes = schemas
        .iter()
        .find(|s| request.url.ends_with(&format!("/objecttype/{}/attributes", s.id)))
        .map(|s| serde_json::to_value(&s.attributes).unwrap());
    match attributes {
        Some(attributes) => json_response(200, &attributes),
        None => json_response(404, &json!({"errorMessages": ["not found"]})),
    }
}
