//! Source, sink and sanitizer catalogs.
//!
//! Catalogs are external, read-only configuration keyed by qualified
//! dotted patterns. Built-in language cores ship with the engine;
//! framework packs are added only when the tier grants framework-aware
//! analysis; user catalogs load from TOML.

pub(crate) mod builtin;
pub(crate) mod frameworks;
pub mod custom;

pub use custom::CatalogError;

use crate::ast::Language;
use crate::classify::{Severity, VulnCategory};
use compact_str::CompactString;
use serde::Serialize;

/// A qualified dotted pattern.
///
/// `*` as an inner segment matches exactly one segment; `*` as the final
/// segment matches one or more remaining segments (`req.*` matches both
/// `req.id` and `req.user.name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Pattern {
    raw: CompactString,
    #[serde(skip)]
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(CompactString),
    Any,
    Rest,
}

impl Pattern {
    /// Parses a dotted pattern. Parsing is infallible; empty input
    /// matches nothing.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let count = raw.split('.').count();
        let segments = raw
            .split('.')
            .enumerate()
            .map(|(i, seg)| {
                if seg == "*" {
                    if i + 1 == count {
                        Segment::Rest
                    } else {
                        Segment::Any
                    }
                } else {
                    Segment::Literal(CompactString::from(seg))
                }
            })
            .collect();
        Self {
            raw: CompactString::from(raw),
            segments,
        }
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches a concrete dotted path against this pattern.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        if self.raw.is_empty() {
            return false;
        }
        let parts: Vec<&str> = path.split('.').collect();
        let mut i = 0;
        for segment in &self.segments {
            match segment {
                Segment::Literal(lit) => {
                    if parts.get(i).copied() != Some(lit.as_str()) {
                        return false;
                    }
                    i += 1;
                }
                Segment::Any => {
                    if i >= parts.len() {
                        return false;
                    }
                    i += 1;
                }
                Segment::Rest => return i < parts.len(),
            }
        }
        i == parts.len()
    }
}

/// A place where untrusted data enters.
#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    /// Display name.
    pub name: CompactString,
    /// Qualified pattern.
    pub pattern: Pattern,
    /// Language this entry applies to; `None` applies everywhere.
    pub language: Option<Language>,
    /// Framework pack this entry belongs to, if any.
    pub framework: Option<CompactString>,
}

/// An operation where untrusted data causes harm if unsanitized.
#[derive(Debug, Clone, Serialize)]
pub struct SinkEntry {
    /// Display name.
    pub name: CompactString,
    /// Qualified pattern.
    pub pattern: Pattern,
    /// Vulnerability category.
    pub category: VulnCategory,
    /// Severity when reached.
    pub severity: Severity,
    /// Remediation advice.
    pub remediation: String,
    /// Language this entry applies to.
    pub language: Option<Language>,
    /// Framework pack this entry belongs to, if any.
    pub framework: Option<CompactString>,
}

/// A call that neutralizes taint.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizerEntry {
    /// Display name.
    pub name: CompactString,
    /// Qualified pattern.
    pub pattern: Pattern,
    /// Categories this sanitizer addresses; empty means all.
    pub categories: Vec<VulnCategory>,
    /// Language this entry applies to.
    pub language: Option<Language>,
    /// Framework pack this entry belongs to, if any.
    pub framework: Option<CompactString>,
}

/// The catalogs one propagation runs against.
#[derive(Debug, Clone, Default)]
pub struct CatalogSet {
    /// Source entries.
    pub sources: Vec<SourceEntry>,
    /// Sink entries.
    pub sinks: Vec<SinkEntry>,
    /// Sanitizer entries.
    pub sanitizers: Vec<SanitizerEntry>,
}

impl CatalogSet {
    /// Empty catalogs (zero matches, zero findings).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Built-in language-core catalogs.
    #[must_use]
    pub fn language_core() -> Self {
        builtin::language_core()
    }

    /// Appends the framework packs (framework-aware tiers only).
    #[must_use]
    pub fn with_frameworks(mut self) -> Self {
        let packs = frameworks::framework_packs();
        self.sources.extend(packs.sources);
        self.sinks.extend(packs.sinks);
        self.sanitizers.extend(packs.sanitizers);
        self
    }

    /// Merges another catalog set (user TOML entries) into this one.
    pub fn merge(&mut self, other: CatalogSet) {
        self.sources.extend(other.sources);
        self.sinks.extend(other.sinks);
        self.sanitizers.extend(other.sanitizers);
    }

    /// First source entry matching a read path, respecting language tags.
    #[must_use]
    pub fn match_source(&self, path: &str, language: Language) -> Option<&SourceEntry> {
        self.sources
            .iter()
            .find(|e| applies(e.language, language) && e.pattern.matches(path))
    }

    /// First sink entry matching a callee path.
    #[must_use]
    pub fn match_sink(&self, callee: &str, language: Language) -> Option<&SinkEntry> {
        self.sinks
            .iter()
            .find(|e| applies(e.language, language) && e.pattern.matches(callee))
    }

    /// First sanitizer entry matching a callee path.
    #[must_use]
    pub fn match_sanitizer(&self, callee: &str, language: Language) -> Option<&SanitizerEntry> {
        self.sanitizers
            .iter()
            .find(|e| applies(e.language, language) && e.pattern.matches(callee))
    }
}

fn applies(entry: Option<Language>, language: Language) -> bool {
    entry.is_none() || entry == Some(language)
}

/// Heuristic for sanitizer-adjacent call names that did not fully match a
/// catalog entry; such calls lower confidence instead of halting the path.
#[must_use]
pub fn looks_like_sanitizer(callee: &str) -> bool {
    let last = callee.rsplit('.').next().unwrap_or(callee).to_lowercase();
    ["escape", "sanitize", "sanitise", "clean", "quote", "validate"]
        .iter()
        .any(|hint| last.contains(hint))
}
