//! Configuration file schema.
//!
//! A config file selects which queries run and defines custom mappings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::mapping::{predefined, CustomKeyMapping};
use crate::query::{Language, QueryEngine, PRIORITY_RANGE};

/// Config file names searched for, in order.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["astquery.yaml", ".astquery.yaml", "astquery.yml"];

/// Starter config written by `astquery init`.
pub const TEMPLATE: &str = include_str!("templates/astquery.yaml");

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Skip queries below this priority.
    #[serde(default)]
    pub min_priority: Option<i32>,
    /// Report unknown query keys and language mismatches as failures.
    #[serde(default)]
    pub strict: bool,
    /// Only analyze these languages (all when empty).
    #[serde(default)]
    pub languages: Vec<Language>,
    /// Glob patterns over query keys, e.g. `"ts-*"` (all when empty).
    #[serde(default)]
    pub queries: Vec<String>,
    /// Name of the mapping to run (config-defined or predefined).
    #[serde(default)]
    pub mapping: Option<String>,
    /// Custom mappings by name. These shadow predefined mappings.
    #[serde(default)]
    pub mappings: BTreeMap<String, CustomKeyMapping>,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::parse_str(&content)
    }

    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Find a config file in a directory.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Compiled query-key filter, or `None` when every key is allowed.
    pub fn query_filter(&self) -> anyhow::Result<Option<GlobSet>> {
        if self.queries.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.queries {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Some(builder.build()?))
    }

    /// The query patterns as exact keys, when none of them uses glob syntax.
    ///
    /// Exact keys run against every file; globs only select queries
    /// registered for each file's language.
    pub fn literal_keys(&self) -> Option<Vec<String>> {
        let is_glob = |p: &String| p.contains(|c| matches!(c, '*' | '?' | '[' | '{'));
        if self.queries.is_empty() || self.queries.iter().any(is_glob) {
            return None;
        }
        Some(self.queries.clone())
    }

    /// A mapping by name; config-defined mappings win over predefined ones.
    pub fn resolve_mapping(&self, name: &str) -> Option<CustomKeyMapping> {
        self.mappings
            .get(name)
            .cloned()
            .or_else(|| predefined::get(name))
    }

    /// Problems with the config's mappings against an engine's registry.
    pub fn mapping_errors(&self, engine: &QueryEngine) -> Vec<String> {
        let mut errors = Vec::new();
        for (name, mapping) in &self.mappings {
            let validation = mapping.create_mapper(engine).validate();
            errors.extend(
                validation
                    .errors
                    .into_iter()
                    .map(|e| format!("mapping '{}': {}", name, e)),
            );
        }
        errors
    }
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if let Some(min) = config.min_priority {
        if !PRIORITY_RANGE.contains(&min) {
            anyhow::bail!(
                "min_priority {} is outside {}..={}",
                min,
                PRIORITY_RANGE.start(),
                PRIORITY_RANGE.end()
            );
        }
    }

    for pattern in &config.queries {
        Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid query pattern {:?}: {}", pattern, e))?;
    }

    if let Some(name) = &config.mapping {
        if config.resolve_mapping(name).is_none() {
            anyhow::bail!("unknown mapping {:?}", name);
        }
    }

    for (name, mapping) in &config.mappings {
        if mapping.is_empty() {
            anyhow::bail!("mapping {:?} is empty", name);
        }
    }

    Ok(())
}
