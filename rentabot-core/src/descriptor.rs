//! Resource descriptor loading.
//!
//! The descriptor is a YAML mapping from resource name to an optional record
//! of `description`, `endpoint`, `tags` (comma-separated) and
//! `max_lock_duration`. Resources are numbered 1..N in file order; YAML
//! mappings preserve insertion order so ids are stable across restarts for
//! an unchanged file.

use crate::{DescriptorError, Resource, ResourceId, DEFAULT_MAX_LOCK_DURATION};
use serde::Deserialize;
use std::path::Path;

/// One descriptor record. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptorEntry {
    pub description: Option<String>,
    pub endpoint: Option<String>,
    pub tags: Option<String>,
    pub max_lock_duration: Option<u64>,
}

/// Load and parse a descriptor file into catalog resources.
pub fn load_descriptor(path: impl AsRef<Path>) -> Result<Vec<Resource>, DescriptorError> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let input = std::fs::read_to_string(path).map_err(|source| DescriptorError::Io {
        path: label.clone(),
        source,
    })?;
    parse_descriptor(&input, &label)
}

/// Parse descriptor text. `label` names the source in errors.
pub fn parse_descriptor(input: &str, label: &str) -> Result<Vec<Resource>, DescriptorError> {
    let document: serde_yaml::Value =
        serde_yaml::from_str(input).map_err(|source| DescriptorError::Yaml {
            path: label.to_string(),
            source,
        })?;

    let mapping = match document {
        serde_yaml::Value::Null => {
            return Err(DescriptorError::Empty {
                path: label.to_string(),
            })
        }
        serde_yaml::Value::Mapping(mapping) => mapping,
        other => {
            return Err(DescriptorError::Invalid {
                path: label.to_string(),
                reason: format!("top level must be a mapping of resource names, got {:?}", other),
            })
        }
    };

    if mapping.is_empty() {
        return Err(DescriptorError::Empty {
            path: label.to_string(),
        });
    }

    let mut resources = Vec::with_capacity(mapping.len());
    for (index, (key, value)) in mapping.into_iter().enumerate() {
        let name = match key {
            serde_yaml::Value::String(name) if !name.trim().is_empty() => name,
            other => {
                return Err(DescriptorError::Invalid {
                    path: label.to_string(),
                    reason: format!("resource name must be a non-empty string, got {:?}", other),
                })
            }
        };

        // A bare `name:` line is a valid resource with all defaults.
        let entry: DescriptorEntry = match value {
            serde_yaml::Value::Null => DescriptorEntry::default(),
            value => serde_yaml::from_value(value).map_err(|source| DescriptorError::Yaml {
                path: label.to_string(),
                source,
            })?,
        };

        let mut resource = Resource::new(ResourceId(index as u32 + 1), name);
        resource.description = entry.description;
        resource.endpoint = entry.endpoint;
        resource.tags = entry.tags.unwrap_or_default();
        resource.max_lock_duration =
            entry.max_lock_duration.unwrap_or(DEFAULT_MAX_LOCK_DURATION);
        resources.push(resource);
    }

    Ok(resources)
}
