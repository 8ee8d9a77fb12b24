//! REST endpoints and IQL filter strings.
//!
//! Every path lives under `rest/insight/1.0`. IQL strings are produced here
//! and nowhere else, because the listing query must match the service's
//! syntax exactly.

pub const BASE_PATH: &str = "rest/insight/1.0";

/// A path below `BASE_PATH` plus unencoded query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl Endpoint {
    fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        Self {
            segments: segments.into_iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
        }
    }

    fn param(mut self, name: &str, value: impl ToString) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn object_types(schema_id: i64) -> Self {
        Self::new(["objectschema".to_string(), schema_id.to_string(), "objecttypes".into(), "flat".into()])
    }

    pub fn object_type_attributes(object_type_id: i64) -> Self {
        Self::new(["objecttype".to_string(), object_type_id.to_string(), "attributes".into()])
    }

    /// IQL listing. `page` is omitted for single-shot queries such as
    /// reference batches.
    pub fn objects_by_iql(iql: &str, schema_id: i64, result_per_page: u32, page: Option<u32>) -> Self {
        let endpoint = Self::new(["iql", "objects"])
            .param("iql", iql)
            .param("objectSchemaId", schema_id)
            .param("resultPerPage", result_per_page)
            .param("includeTypeAttributes", "true");
        match page {
            Some(page) => endpoint.param("page", page),
            None => endpoint,
        }
    }

    pub fn create_object() -> Self {
        Self::new(["object", "create"])
    }

    pub fn object(id: i64) -> Self {
        Self::new(["object".to_string(), id.to_string()])
    }

    pub fn object_history(id: i64) -> Self {
        Self::new(["object".to_string(), "history".into(), id.to_string()])
    }

    pub fn object_attachments(object_id: i64) -> Self {
        Self::new(["attachments".to_string(), "object".into(), object_id.to_string()])
    }

    pub fn attachment(attachment_id: i64) -> Self {
        Self::new(["attachments".to_string(), attachment_id.to_string()])
    }

    pub fn create_comment() -> Self {
        Self::new(["comment", "create"])
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}/{}", base_url.trim_end_matches('/'), BASE_PATH, self.segments.join("/"))
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }
}

/// Type filter for a listing, optionally narrowed by an extra IQL clause.
///
/// ```
/// use insight_core::endpoint::type_query;
/// assert_eq!(
///     type_query("Country", false, Some("Name=\"Germany\"")),
///     "objectType in objectTypeAndChildren(\"Country\") and Name=\"Germany\"",
/// );
/// assert_eq!(type_query("Country", true, None), "objectType=\"Country\"");
/// ```
pub fn type_query(object_type: &str, ignore_subtypes: bool, extra: Option<&str>) -> String {
    let mut iql = if ignore_subtypes {
        format!("objectType=\"{object_type}\"")
    } else {
        format!("objectType in objectTypeAndChildren(\"{object_type}\")")
    };
    if let Some(extra) = extra {
        iql.push_str(" and ");
        iql.push_str(extra);
    }
    iql
}

pub fn id_clause(id: i64) -> String {
    format!("objectId={id}")
}

pub fn id_set_clause(ids: &[i64]) -> String {
    let joined = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
    format!("objectId in ({joined})")
}

pub fn name_clause(name: &str) -> String {
    format!("Name=\"{}\"", escape(name))
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_endpoint_carries_all_parameters() {
        let endpoint = Endpoint::objects_by_iql("objectType=\"Country\"", 7, 50, Some(2));
        assert_eq!(endpoint.url("http://host/"), "http://host/rest/insight/1.0/iql/objects");
        assert_eq!(
            endpoint.query(),
            &[
                ("iql".to_string(), "objectType=\"Country\"".to_string()),
                ("objectSchemaId".to_string(), "7".to_string()),
                ("resultPerPage".to_string(), "50".to_string()),
                ("includeTypeAttributes".to_string(), "true".to_string()),
                ("page".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn batch_endpoint_has_no_page() {
        let endpoint = Endpoint::objects_by_iql("x", 1, 50, None);
        assert!(endpoint.query().iter().all(|(k, _)| k != "page"));
    }

    #[test]
    fn paths_match_service_layout() {
        let base = "https://insight";
        assert_eq!(
            Endpoint::object_types(3).url(base),
            "https://insight/rest/insight/1.0/objectschema/3/objecttypes/flat"
        );
        assert_eq!(
            Endpoint::object_type_attributes(12).url(base),
            "https://insight/rest/insight/1.0/objecttype/12/attributes"
        );
        assert_eq!(Endpoint::create_object().url(base), "https://insight/rest/insight/1.0/object/create");
        assert_eq!(Endpoint::object(5).url(base), "https://insight/rest/insight/1.0/object/5");
        assert_eq!(
            Endpoint::object_history(5).url(base),
            "https://insight/rest/insight/1.0/object/history/5"
        );
        assert_eq!(
            Endpoint::object_attachments(5).url(base),
            "https://insight/rest/insight/1.0/attachments/object/5"
        );
        assert_eq!(Endpoint::attachment(9).url(base), "https://insight/rest/insight/1.0/attachments/9");
        assert_eq!(Endpoint::create_comment().url(base), "https://insight/rest/insight/1.0/comment/create");
    }

    #[test]
    fn type_query_with_children_and_filter() {
        assert_eq!(
            type_query("Company", false, Some(&id_set_clause(&[1, 2, 3]))),
            "objectType in objectTypeAndChildren(\"Company\") and objectId in (1,2,3)"
        );
    }

    #[test]
    fn type_query_exact_type() {
        assert_eq!(
            type_query("Company", true, Some(&id_clause(4))),
            "objectType=\"Company\" and objectId=4"
        );
    }

    #[test]
    fn name_clause_escapes_quotes() {
        assert_eq!(name_clause("Foo \"Bar\""), "Name=\"Foo \\\"Bar\\\"\"");
    }
}
