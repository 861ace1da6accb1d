//! taintrail — cross-file taint-flow analysis over normalized ASTs.
//!
//! The engine consumes language-neutral ASTs produced by an external
//! ingestion layer, builds per-file program dependence graphs (control
//! and data dependence), resolves imports and re-exports project-wide,
//! then propagates taint from catalog-matched sources to sinks across
//! resolved module boundaries. Findings are scored, classified, and
//! assembled into a deterministic response; tier entitlements clamp
//! depth, module budget, and feature set.
//!
//! Everything after ingestion is CPU-bound and deterministic: identical
//! inputs and limits produce byte-identical responses, independent of
//! worker scheduling.
//!
//! # Quick start
//!
//! ```
//! use taintrail::ast::{build, Language, NormalizedAst};
//! use taintrail::cancel::CancelFlag;
//! use taintrail::engine::{AnalysisRequest, AstPayload, Engine, GraphCache, ModuleInput};
//! use taintrail::tier::TierLimits;
//!
//! let ast = NormalizedAst {
//!     language: Language::Python,
//!     body: vec![build::call_stmt("os.system", vec![build::name("sys.argv", 1)], 1)],
//! };
//! let request = AnalysisRequest {
//!     project_root: "/proj".into(),
//!     target_modules: None,
//!     requested_depth: None,
//!     include_flows: false,
//!     tier_limits: TierLimits::community(),
//! };
//! let inputs = vec![ModuleInput {
//!     path: "app.py".into(),
//!     payload: AstPayload::Ast(ast),
//! }];
//! let mut cache = GraphCache::new();
//! let response = Engine::new().analyze(&request, inputs, &mut cache, &CancelFlag::new());
//! assert!(response.success);
//! assert!(!response.vulnerabilities.is_empty());
//! ```

pub mod ast;
pub mod cancel;
pub mod catalog;
pub mod classify;
pub mod constants;
pub mod diagnostics;
pub mod engine;
pub mod module;
pub mod pdg;
pub mod resolver;
pub mod taint;
pub mod tier;

pub use cancel::CancelFlag;
pub use classify::{classify, Finding, RiskLevel, Severity, VulnCategory};
pub use engine::{AnalysisRequest, AnalysisResponse, Engine, GraphCache};
pub use taint::TaintFlow;
pub use tier::{Capability, EffectiveLimits, TierLimits};
