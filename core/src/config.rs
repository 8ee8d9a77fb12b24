//! Connection settings for an Insight instance.

use std::fmt;

use serde::Deserialize;

use crate::error::ConfigurationError;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Everything a client needs to reach one object schema.
///
/// Deserializable so it can be embedded in a caller's own config file;
/// `from_env` covers the common deployment case.
#[derive(Clone, Deserialize)]
pub struct InsightConfig {
    pub base_url: String,
    pub schema_id: i64,
    pub username: String,
    pub password: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Match only the exact object type in IQL filters instead of the type
    /// and all its children.
    #[serde(default)]
    pub ignore_subtypes: bool,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl InsightConfig {
    pub fn new(base_url: &str, schema_id: i64, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            schema_id,
            username: username.to_string(),
            password: password.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            ignore_subtypes: false,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_ignore_subtypes(mut self, ignore_subtypes: bool) -> Self {
        self.ignore_subtypes = ignore_subtypes;
        self
    }

    /// Reads `INSIGHT_BASE_URL`, `INSIGHT_SCHEMA_ID`, `INSIGHT_USERNAME`,
    /// `INSIGHT_PASSWORD` and the optional `INSIGHT_PAGE_SIZE` /
    /// `INSIGHT_IGNORE_SUBTYPES`.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigurationError::MissingSetting(name));

        let base_url = required("INSIGHT_BASE_URL")?;
        let schema_id = parse_setting("INSIGHT_SCHEMA_ID", &required("INSIGHT_SCHEMA_ID")?)?;
        let mut config = Self::new(
            &base_url,
            schema_id,
            &required("INSIGHT_USERNAME")?,
            &required("INSIGHT_PASSWORD")?,
        );
        if let Some(raw) = lookup("INSIGHT_PAGE_SIZE") {
            config = config.with_page_size(parse_setting("INSIGHT_PAGE_SIZE", &raw)?);
        }
        if let Some(raw) = lookup("INSIGHT_IGNORE_SUBTYPES") {
            config = config.with_ignore_subtypes(parse_setting("INSIGHT_IGNORE_SUBTYPES", &raw)?);
        }
        Ok(config)
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self.page_size = self.page_size.max(1);
        self
    }
}

fn parse_setting<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigurationError> {
    raw.trim().parse().map_err(|_| ConfigurationError::InvalidSetting {
        name,
        value: raw.to_string(),
    })
}

impl fmt::Debug for InsightConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightConfig")
            .field("base_url", &self.base_url)
            .field("schema_id", &self.schema_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("page_size", &self.page_size)
            .field("ignore_subtypes", &self.ignore_subtypes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&'static str, &str)]) -> impl Fn(&'static str) -> Option<String> {
        let map: HashMap<&'static str, String> = pairs.iter().map(|(k, v)| (*k, v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn env_lookup_fills_defaults() {
        let config = InsightConfig::from_lookup(lookup_from(&[
            ("INSIGHT_BASE_URL", "https://insight.example.com/"),
            ("INSIGHT_SCHEMA_ID", "3"),
            ("INSIGHT_USERNAME", "bot"),
            ("INSIGHT_PASSWORD", "secret"),
        ]))
        .unwrap();
        assert_eq!(config.base_url, "https://insight.example.com");
        assert_eq!(config.schema_id, 3);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(!config.ignore_subtypes);
    }

    #[test]
    fn env_lookup_reads_optional_settings() {
        let config = InsightConfig::from_lookup(lookup_from(&[
            ("INSIGHT_BASE_URL", "http://localhost"),
            ("INSIGHT_SCHEMA_ID", "1"),
            ("INSIGHT_USERNAME", "u"),
            ("INSIGHT_PASSWORD", "p"),
            ("INSIGHT_PAGE_SIZE", "10"),
            ("INSIGHT_IGNORE_SUBTYPES", "true"),
        ]))
        .unwrap();
        assert_eq!(config.page_size, 10);
        assert!(config.ignore_subtypes);
    }

    #[test]
    fn missing_setting_is_named() {
        let err = InsightConfig::from_lookup(lookup_from(&[("INSIGHT_BASE_URL", "http://x")])).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingSetting("INSIGHT_SCHEMA_ID")));
    }

    #[test]
    fn invalid_schema_id_is_rejected() {
        let err = InsightConfig::from_lookup(lookup_from(&[
            ("INSIGHT_BASE_URL", "http://x"),
            ("INSIGHT_SCHEMA_ID", "one"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSetting { name: "INSIGHT_SCHEMA_ID", .. }));
    }

    #[test]
    fn debug_redacts_password() {
        let config = InsightConfig::new("http://x", 1, "user", "hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: InsightConfig = serde_json::from_str(
            r#"{"base_url":"http://x","schema_id":1,"username":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(!config.ignore_subtypes);
    }
}
