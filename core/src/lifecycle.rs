//! Writes: create, update and delete of declared entities, plus the
//! per-entity operations of `EntityLifecycle`.
//!
//! # Design
//! Saving an entity first makes every referenced entity persistent: a
//! reference with an incomplete identity is looked up by its own name and
//! created when no object matches, recursively. Only then is the edit item
//! built, since references are written as object keys. A failure part way
//! leaves the objects created so far in place.

use tracing::{debug, info};

use crate::client::InsightClient;
use crate::edit::build_edit_item;
use crate::endpoint::{name_clause, Endpoint};
use crate::entity::{Entity, EntityRecord, FieldValue, Identity};
use crate::error::{ConfigurationError, InsightResult};
use crate::http::HttpMethod;
use crate::registry::RegistryEntry;
use crate::types::{Attachment, HistoryItem, ObjectTypeSchema, SavedObject};

impl InsightClient {
    /// Creates `entity` remotely and reloads it from the stored record,
    /// which carries the new id and key.
    pub fn create_object<T: Entity>(&self, entity: &mut T) -> InsightResult<()> {
        let mut record = entity.to_record();
        self.create_record(&mut record)?;
        *entity = T::from_record(record)?;
        Ok(())
    }

    pub fn update_object<T: Entity>(&self, entity: &mut T) -> InsightResult<()> {
        let mut record = entity.to_record();
        self.update_record(&mut record)?;
        *entity = T::from_record(record)?;
        Ok(())
    }

    /// Create when unsaved, update otherwise.
    pub fn save<T: Entity>(&self, entity: &mut T) -> InsightResult<()> {
        if entity.identity().is_unsaved() {
            self.create_object(entity)
        } else {
            self.update_object(entity)
        }
    }

    fn create_record(&self, record: &mut EntityRecord) -> InsightResult<()> {
        let entry = self.registry_entry(record)?;
        let schema = self.object_type_schema(&entry.object_type)?;
        self.persist_references(record)?;

        let item = build_edit_item(record, &entry.descriptor, &schema)?;
        let saved: SavedObject = self.send_json(HttpMethod::Post, &Endpoint::create_object(), &item)?;
        info!(
            entity = entry.descriptor.short_name(),
            id = saved.id,
            key = %saved.object_key,
            "created object"
        );
        *record.identity_mut() = Identity::new(saved.id, saved.object_key);
        Ok(())
    }

    fn update_record(&self, record: &mut EntityRecord) -> InsightResult<()> {
        let entry = self.registry_entry(record)?;
        let schema = self.object_type_schema(&entry.object_type)?;
        self.persist_references(record)?;

        let id = record.identity().id;
        let item = build_edit_item(record, &entry.descriptor, &schema)?;
        let saved: SavedObject = self.send_json(HttpMethod::Put, &Endpoint::object(id), &item)?;
        info!(entity = entry.descriptor.short_name(), id, "updated object");
        *record.identity_mut() = Identity::new(saved.id, saved.object_key);
        Ok(())
    }

    fn persist_references(&self, record: &mut EntityRecord) -> InsightResult<()> {
        for (_, value) in record.values_mut() {
            match value {
                FieldValue::Entity(nested) => self.persist_reference(nested)?,
                FieldValue::Entities(nested) => {
                    for nested in nested.iter_mut() {
                        self.persist_reference(nested)?;
                    }
                }
                FieldValue::Null | FieldValue::Value(_) => {}
            }
        }
        Ok(())
    }

    /// Completes the identity of a referenced entity: found by name, or
    /// created.
    fn persist_reference(&self, nested: &mut EntityRecord) -> InsightResult<()> {
        if !nested.identity().is_incomplete() {
            return Ok(());
        }
        let entry = self.registry_entry(nested)?;
        let name = nested.name().unwrap_or_default().to_string();
        let existing = self
            .fetch_objects(&entry.object_type, Some(&name_clause(&name)))?
            .into_iter()
            .next();
        match existing {
            Some(found) => {
                debug!(
                    entity = entry.descriptor.short_name(),
                    name = %name,
                    id = found.id,
                    "reference found by name"
                );
                *nested.identity_mut() = Identity::new(found.id, found.object_key);
                Ok(())
            }
            None => self.create_record(nested),
        }
    }

    fn registry_entry(&self, record: &EntityRecord) -> Result<&RegistryEntry, ConfigurationError> {
        self.registry()
            .entry(record.entity())
            .ok_or_else(|| ConfigurationError::UnregisteredType(record.entity().to_string()))
    }

    fn object_type_schema(&self, object_type: &str) -> Result<ObjectTypeSchema, ConfigurationError> {
        self.schema()
            .object_type(object_type)
            .ok_or_else(|| ConfigurationError::UnknownObjectType(object_type.to_string()))
    }
}

/// Operations bound to one entity instance. Every operation on an unsaved
/// entity is a no-op returning an empty result.
pub trait EntityLifecycle: Entity {
    fn save(&mut self, client: &InsightClient) -> InsightResult<()> {
        client.save(self)
    }

    /// `true` when a delete request was sent.
    fn delete(&self, client: &InsightClient) -> InsightResult<bool> {
        if self.identity().is_unsaved() {
            return Ok(false);
        }
        client.delete_object(self.identity().id)?;
        Ok(true)
    }

    fn history(&self, client: &InsightClient) -> InsightResult<Vec<HistoryItem>> {
        if self.identity().is_unsaved() {
            return Ok(Vec::new());
        }
        client.get_history(self.identity().id)
    }

    fn attachments(&self, client: &InsightClient) -> InsightResult<Vec<Attachment>> {
        if self.identity().is_unsaved() {
            return Ok(Vec::new());
        }
        client.get_attachments(self.identity().id)
    }

    fn add_attachment(
        &self,
        client: &InsightClient,
        filename: &str,
        bytes: &[u8],
        comment: &str,
    ) -> InsightResult<Vec<Attachment>> {
        if self.identity().is_unsaved() {
            return Ok(Vec::new());
        }
        client.upload_attachment(self.identity().id, filename, bytes, comment)
    }

    fn comment(&self, client: &InsightClient, message: &str) -> InsightResult<()> {
        if self.identity().is_unsaved() {
            return Ok(());
        }
        client.create_comment(self.identity().id, message)
    }
}

impl<T: Entity> EntityLifecycle for T {}
