//! Confidence scoring and vulnerability classification.
//!
//! `classify` is a pure function of the flow it is given: identical flows
//! always yield identical findings. Category and severity come from the
//! matched sink entry's static metadata, never from the flow shape;
//! confidence reflects path length, sanitizer-adjacent evidence and
//! cross-file resolution uncertainty.

use crate::taint::TaintFlow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a detected vulnerability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational finding.
    Info,
    /// Low severity.
    Low,
    /// Medium severity.
    Medium,
    /// High severity.
    High,
    /// Critical severity.
    Critical,
}

/// OWASP-style vulnerability category, carried by sink catalog entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnCategory {
    /// SQL or query-language injection.
    Injection,
    /// OS command injection.
    CommandInjection,
    /// Arbitrary code evaluation.
    CodeExecution,
    /// Cross-site scripting.
    Xss,
    /// Path traversal via file operations.
    PathTraversal,
    /// Unsafe deserialization.
    Deserialization,
    /// Server-side request forgery.
    Ssrf,
    /// Open redirect.
    OpenRedirect,
}

impl fmt::Display for VulnCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VulnCategory::Injection => "injection",
            VulnCategory::CommandInjection => "command injection",
            VulnCategory::CodeExecution => "code execution",
            VulnCategory::Xss => "cross-site scripting",
            VulnCategory::PathTraversal => "path traversal",
            VulnCategory::Deserialization => "unsafe deserialization",
            VulnCategory::Ssrf => "server-side request forgery",
            VulnCategory::OpenRedirect => "open redirect",
        };
        f.write_str(name)
    }
}

/// Overall risk of a response: the maximum severity present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No findings.
    None,
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
    /// Critical.
    Critical,
}

impl RiskLevel {
    /// Maps the maximum severity of a finding set to a risk level.
    #[must_use]
    pub fn from_findings(findings: &[Finding]) -> Self {
        findings
            .iter()
            .map(|f| match f.severity {
                Severity::Info | Severity::Low => RiskLevel::Low,
                Severity::Medium => RiskLevel::Medium,
                Severity::High => RiskLevel::High,
                Severity::Critical => RiskLevel::Critical,
            })
            .max()
            .unwrap_or(RiskLevel::None)
    }
}

/// A classified, scored taint flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Vulnerability category from the sink entry.
    pub category: VulnCategory,
    /// Severity from the sink entry.
    pub severity: Severity,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Human-readable description.
    pub message: String,
    /// Where untrusted data enters.
    pub source: crate::taint::Location,
    /// Where it reaches a dangerous operation.
    pub sink: crate::taint::Location,
    /// Sanitizer-like call sites on the path that did not fully match a
    /// catalog entry.
    pub sanitizers: Vec<crate::taint::Location>,
    /// Every location on the path, source to sink.
    pub path: Vec<crate::taint::Location>,
    /// Whether the flow crosses module boundaries.
    pub cross_file: bool,
    /// Whether deeper analysis was cut off before this finding could be
    /// fully resolved.
    pub tier_limited: bool,
}

const BASE_CONFIDENCE: f64 = 0.92;
const STEP_PENALTY: f64 = 0.02;
const STEP_PENALTY_CAP: f64 = 0.30;
const CROSS_FILE_DISCOUNT: f64 = 0.08;
const PARTIAL_SANITIZER_DISCOUNT: f64 = 0.20;

/// Scores and classifies one completed flow.
#[must_use]
pub fn classify(flow: &TaintFlow) -> Finding {
    let steps = flow.path.len().saturating_sub(1) as f64;
    let mut confidence = BASE_CONFIDENCE - (steps * STEP_PENALTY).min(STEP_PENALTY_CAP);
    if flow.cross_file {
        confidence -= CROSS_FILE_DISCOUNT;
    }
    if !flow.sanitizers.is_empty() {
        confidence -= PARTIAL_SANITIZER_DISCOUNT;
    }
    let confidence = confidence.clamp(0.05, 0.99);

    Finding {
        category: flow.category,
        severity: flow.severity,
        confidence,
        message: format!(
            "untrusted data from `{}` reaches `{}` ({})",
            flow.source_pattern, flow.sink_name, flow.category
        ),
        source: flow.source.clone(),
        sink: flow.sink.clone(),
        sanitizers: flow.sanitizers.clone(),
        path: flow.path.clone(),
        cross_file: flow.cross_file,
        tier_limited: flow.truncated,
    }
}
