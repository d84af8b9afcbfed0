use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::{Element, Scene};
use crate::engine::TraceLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid scene file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A TOML run file: an optional `[limits]` table and `[[element]]` tables
/// carrying `id`, `kind`, `position`, `rotation` and the kind's fields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub limits: TraceLimits,
    #[serde(default)]
    pub element: Vec<Element>,
}

impl RunConfig {
    /// parses a run file. keys no field reads are logged and otherwise ignored
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: toml::Value = input.parse()?;
        let config: RunConfig = raw.clone().try_into()?;
        for key in config.unknown_keys(&raw) {
            warn!("ignoring unknown key {} in scene file", key);
        }
        Ok(config)
    }

    /// dotted paths of the keys in `raw` that did not land in a field
    pub fn unknown_keys(&self, raw: &toml::Value) -> Vec<String> {
        let mut unknown = Vec::new();
        let table = match raw.as_table() {
            Some(table) => table,
            None => return unknown,
        };
        unknown.extend(
            table
                .keys()
                .filter(|key| *key != "limits" && *key != "element")
                .cloned(),
        );
        if let Some(limits) = table.get("limits") {
            extra_keys(limits, &self.limits, "limits", &mut unknown);
        }
        if let Some(elements) = table.get("element").and_then(toml::Value::as_array) {
            for (i, (raw, element)) in elements.iter().zip(&self.element).enumerate() {
                extra_keys(raw, element, &format!("element[{}]", i), &mut unknown);
            }
        }
        unknown
    }

    /// sanitized scene built from a copy of the element list
    pub fn scene(&self) -> Scene {
        Scene::new(self.element.clone())
    }
}

/// keys of `raw` missing from the re-serialized `parsed`
fn extra_keys<T: Serialize>(
    raw: &toml::Value,
    parsed: &T,
    prefix: &str,
    unknown: &mut Vec<String>,
) {
    let known = match toml::Value::try_from(parsed) {
        Ok(known) => known,
        Err(_) => return,
    };
    if let (Some(raw), Some(known)) = (raw.as_table(), known.as_table()) {
        unknown.extend(
            raw.keys()
                .filter(|key| !known.contains_key(*key))
                .map(|key| format!("{}.{}", prefix, key)),
        );
    }
}

pub fn load_config(path: impl AsRef<Path>) -> Result<RunConfig, ConfigError> {
    let path = path.as_ref();
    let input = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RunConfig::from_toml_str(&input)
}
