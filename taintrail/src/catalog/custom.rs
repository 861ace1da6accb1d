//! User-supplied catalog files in TOML.
//!
//! A catalog file holds `[[sources]]`, `[[sinks]]`, and `[[sanitizers]]`
//! tables; all three are optional. Patterns use the same dotted syntax as
//! the built-in catalogs.

use std::fs;
use std::path::Path;

use compact_str::CompactString;
use serde::Deserialize;
use thiserror::Error;

use super::{CatalogSet, Pattern, SanitizerEntry, SinkEntry, SourceEntry};
use crate::ast::Language;
use crate::classify::{Severity, VulnCategory};

/// Errors raised while loading a custom catalog file.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The file could not be read.
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid catalog TOML.
    #[error("failed to parse catalog file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    sources: Vec<SourceDef>,
    #[serde(default)]
    sinks: Vec<SinkDef>,
    #[serde(default)]
    sanitizers: Vec<SanitizerDef>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SourceDef {
    name: CompactString,
    pattern: String,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default)]
    framework: Option<CompactString>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SinkDef {
    name: CompactString,
    pattern: String,
    category: VulnCategory,
    severity: Severity,
    #[serde(default)]
    remediation: String,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default)]
    framework: Option<CompactString>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SanitizerDef {
    name: CompactString,
    pattern: String,
    #[serde(default)]
    categories: Vec<VulnCategory>,
    #[serde(default)]
    language: Option<Language>,
    #[serde(default)]
    framework: Option<CompactString>,
}

/// Parses a catalog from TOML text.
pub fn parse_catalog(text: &str) -> Result<CatalogSet, CatalogError> {
    let file: CatalogFile = toml::from_str(text)?;
    let sources = file
        .sources
        .into_iter()
        .map(|d| SourceEntry {
            name: d.name,
            pattern: Pattern::parse(&d.pattern),
            language: d.language,
            framework: d.framework,
        })
        .collect();
    let sinks = file
        .sinks
        .into_iter()
        .map(|d| SinkEntry {
            name: d.name,
            pattern: Pattern::parse(&d.pattern),
            category: d.category,
            severity: d.severity,
            remediation: d.remediation,
            language: d.language,
            framework: d.framework,
        })
        .collect();
    let sanitizers = file
        .sanitizers
        .into_iter()
        .map(|d| SanitizerEntry {
            name: d.name,
            pattern: Pattern::parse(&d.pattern),
            categories: d.categories,
            language: d.language,
            framework: d.framework,
        })
        .collect();
    Ok(CatalogSet {
        sources,
        sinks,
        sanitizers,
    })
}

/// Loads a catalog file from disk.
pub fn load_catalog(path: &Path) -> Result<CatalogSet, CatalogError> {
    let text = fs::read_to_string(path)?;
    parse_catalog(&text)
}
