//! dbt manifest.json parsing
//!
//! Parses dbt-generated manifest.json to extract models, sources, and their
//! declared dependencies. Only the fields the lineage graph needs are modelled.

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// dbt manifest.json structure (subset of fields we care about)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Metadata about the manifest
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,

    /// Models, tests, seeds, snapshots, analyses, operations
    #[serde(default, deserialize_with = "entities")]
    pub nodes: Vec<ManifestEntity>,

    /// Source definitions
    #[serde(default, deserialize_with = "entities")]
    pub sources: Vec<ManifestEntity>,
}

impl Manifest {
    /// Load manifest from file
    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Load manifest from file without blocking the runtime
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ManifestError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_str(&contents)
    }

    /// Parse manifest from JSON string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(json: &str) -> Result<Self, ManifestError> {
        serde_json::from_str(json).map_err(|e| ManifestError::ParseError(e.to_string()))
    }

    /// Nodes followed by sources, in document order
    pub fn entities(&self) -> impl Iterator<Item = &ManifestEntity> {
        self.nodes.iter().chain(self.sources.iter())
    }

    pub fn dbt_version(&self) -> Option<&str> {
        self.metadata.as_ref()?.dbt_version.as_deref()
    }
}

/// Manifest metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub dbt_schema_version: Option<String>,
    #[serde(default)]
    pub dbt_version: Option<String>,
    #[serde(default)]
    pub generated_at: Option<String>,
    #[serde(default)]
    pub invocation_id: Option<String>,
}

/// A node or source in the manifest
///
/// Every field is read leniently: a null or oddly typed value on an entity
/// the graph never draws must not fail the whole manifest. Fields that reach
/// the UI untouched are kept as raw JSON, with an explicit `null` preserved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntity {
    /// Unique identifier (e.g., "model.my_project.users")
    #[serde(default, deserialize_with = "text")]
    pub unique_id: String,

    /// Node name (e.g., "users")
    #[serde(default, deserialize_with = "optional_text")]
    pub name: Option<String>,

    /// Resource type (model, source, test, seed, ...)
    #[serde(default, deserialize_with = "optional_text")]
    pub resource_type: Option<String>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub database: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Fully qualified name
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub fqn: Option<Value>,

    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,

    /// Unix timestamp at which dbt created the node
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,

    /// Raw dependency descriptor (`{"nodes": [...], "macros": [...]}`)
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Value>,
}

impl ManifestEntity {
    /// Whether the lineage graph draws this entity
    pub fn is_renderable(&self) -> bool {
        matches!(self.resource_type.as_deref(), Some("model" | "source"))
    }
}

/// Declared upstream unique ids in a raw `depends_on` descriptor.
///
/// A missing descriptor, a missing or null `nodes` key, or a `nodes` value
/// that is not an array all read as no upstreams. Non-string ids are skipped.
pub fn upstream_ids<'a>(
    depends_on: Option<&'a Value>,
) -> impl Iterator<Item = &'a str> + 'a {
    depends_on
        .and_then(|deps| deps.get("nodes"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

/// Keep a present field as `Some`, including an explicit `null`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// A string field; anything else reads as absent
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    optional_text(deserializer).map(Option::unwrap_or_default)
}

/// Accept dbt's `{ unique_id: entity }` object, a plain array, or null
fn entities<'de, D>(deserializer: D) -> Result<Vec<ManifestEntity>, D::Error>
where
    D: Deserializer<'de>,
{
    struct EntitiesVisitor;

    impl<'de> Visitor<'de> for EntitiesVisitor {
        type Value = Vec<ManifestEntity>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object keyed by unique_id or an array of manifest entities")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((_, entity)) = map.next_entry::<de::IgnoredAny, ManifestEntity>()? {
                out.push(entity);
            }
            Ok(out)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(entity) = seq.next_element::<ManifestEntity>()? {
                out.push(entity);
            }
            Ok(out)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }
    }

    deserializer.deserialize_any(EntitiesVisitor)
}

/// Manifest parsing errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Failed to read manifest file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse manifest JSON: {0}")]
    ParseError(String),
}
