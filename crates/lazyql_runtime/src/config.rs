//! Client configuration.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Serve reads from the cache when a value is present.
    pub allow_cache: bool,
    /// Normalization key fields per type.
    pub normalization: Option<NormalizationConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            allow_cache: true,
            normalization: None,
        }
    }
}

impl ClientConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether reads may be served from the cache.
    pub fn allow_cache(mut self, allow_cache: bool) -> Self {
        self.allow_cache = allow_cache;
        self
    }

    /// Enables normalization with the given key fields.
    pub fn normalization(mut self, normalization: NormalizationConfig) -> Self {
        self.normalization = Some(normalization);
        self
    }
}

/// The fields identifying an object of each type, fetched alongside any other field of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationConfig {
    #[serde(default)]
    pub schema_keys: FxHashMap<String, Vec<String>>,
}

impl NormalizationConfig {
    /// Creates an empty normalization config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the key fields of a type.
    pub fn keys<S: Into<String>>(
        mut self,
        type_name: impl Into<String>,
        keys: impl IntoIterator<Item = S>,
    ) -> Self {
        self.schema_keys
            .insert(type_name.into(), keys.into_iter().map(Into::into).collect());
        self
    }

    /// Returns the key fields of a type.
    pub fn keys_for(&self, type_name: &str) -> Option<&[String]> {
        self.schema_keys.get(type_name).map(Vec::as_slice)
    }

    /// Loads the config from JSON, e.g. `{"schemaKeys": {"User": ["id"]}}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
