//! Batched lookup of referenced objects.

use indexmap::IndexSet;
use tracing::debug;

use crate::client::InsightClient;
use crate::endpoint::{id_set_clause, type_query, Endpoint};
use crate::error::InsightResult;
use crate::types::{InsightObject, ObjectEntries};

/// Ids per lookup request; also the `resultPerPage` of that request.
pub const REFERENCE_BATCH_SIZE: usize = 50;

pub struct ReferenceResolver<'a> {
    client: &'a InsightClient,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(client: &'a InsightClient) -> Self {
        Self { client }
    }

    /// Fetches the objects of `object_type` with the given ids, at most
    /// `REFERENCE_BATCH_SIZE` per request. Fails on the first failing batch.
    pub fn resolve_many(&self, object_type: &str, ids: &IndexSet<i64>) -> InsightResult<Vec<InsightObject>> {
        let config = self.client.config();
        let ids: Vec<i64> = ids.iter().copied().collect();
        debug!(object_type, count = ids.len(), "resolving references");

        let mut objects = Vec::with_capacity(ids.len());
        for batch in ids.chunks(REFERENCE_BATCH_SIZE) {
            let iql = type_query(object_type, config.ignore_subtypes, Some(&id_set_clause(batch)));
            let endpoint = Endpoint::objects_by_iql(&iql, config.schema_id, REFERENCE_BATCH_SIZE as u32, None);
            let entries: ObjectEntries = self.client.fetch_json(&endpoint)?;
            objects.extend(entries.object_entries);
        }
        Ok(objects)
    }
}
