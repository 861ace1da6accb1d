//! Non-fatal diagnostic taxonomy.
//!
//! The engine is fail-closed with diagnostics: nothing is silently
//! rewritten or dropped. Every place where coverage degrades — a module
//! the parser rejected, an import that did not resolve, a dynamic call the
//! engine knowingly under-approximates — surfaces here and travels with
//! the response.

use serde::{Deserialize, Serialize};

/// Why an import failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No module in the project satisfies the specifier.
    NotFound,
    /// The re-export chain exceeded the configured depth cap.
    ReexportDepthExceeded,
    /// The requested name is not exported by the resolved module.
    NameNotExported,
}

/// A non-fatal condition recorded during analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// An import specifier could not be resolved to a concrete module.
    UnresolvedImport {
        /// Canonical name of the importing module.
        module: String,
        /// Raw specifier as written.
        specifier: String,
        /// Failure reason.
        reason: UnresolvedReason,
    },
    /// Multiple modules could satisfy a specifier; the most specific path
    /// match was chosen deterministically.
    AmbiguousImport {
        /// Canonical name of the importing module.
        module: String,
        /// Raw specifier as written.
        specifier: String,
        /// Canonical name of the chosen module.
        chosen: String,
        /// Canonical names of the rejected candidates.
        alternatives: Vec<String>,
    },
    /// A place where the engine knowingly under-approximates (dynamic
    /// dispatch, reflection, dynamic imports).
    ApproximationGap {
        /// Canonical name of the module.
        module: String,
        /// Line of the approximated construct.
        line: u32,
        /// What was approximated.
        detail: String,
    },
    /// A module excluded from the run; the rest of the analysis proceeds.
    SkippedModule {
        /// Path of the skipped file.
        module: String,
        /// Why it was skipped.
        reason: String,
    },
}

impl Diagnostic {
    /// Stable sort key so diagnostic order is independent of worker
    /// scheduling.
    #[must_use]
    pub fn sort_key(&self) -> (u8, String, String) {
        match self {
            Diagnostic::SkippedModule { module, reason } => (0, module.clone(), reason.clone()),
            Diagnostic::UnresolvedImport {
                module, specifier, ..
            } => (1, module.clone(), specifier.clone()),
            Diagnostic::AmbiguousImport {
                module, specifier, ..
            } => (2, module.clone(), specifier.clone()),
            Diagnostic::ApproximationGap { module, line, .. } => {
                (3, module.clone(), format!("{line:08}"))
            }
        }
    }
}
