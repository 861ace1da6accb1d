//! Request orchestration: PDG construction, resolution, propagation,
//! classification, and response assembly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::ast::{ast_hash, NormalizedAst};
use crate::cancel::CancelFlag;
use crate::catalog::CatalogSet;
use crate::classify::{classify, Finding, RiskLevel};
use crate::constants::DEPTH_CEILING;
use crate::diagnostics::Diagnostic;
use crate::module::ModuleSet;
use crate::pdg::{self, PerFileGraph};
use crate::resolver;
use crate::taint::{self, TaintFlow};
use crate::tier::{Capability, EffectiveLimits, TierLimits};

/// A parse failure recorded by the external ingestion layer. The engine
/// never substitutes content for a failed parse; the module is skipped
/// with a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    /// Parser-supplied description.
    pub message: String,
}

/// What ingestion produced for one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AstPayload {
    /// A successfully normalized AST.
    Ast(NormalizedAst),
    /// The parser rejected the file.
    Failed(ParseError),
}

/// One in-scope file with its ingestion result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleInput {
    /// Project-relative path.
    pub path: PathBuf,
    /// Parse outcome.
    pub payload: AstPayload,
}

/// An analysis request, as supplied by the hosting layer together with
/// the entitlement-resolved [`TierLimits`].
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Root all module paths are relative to.
    pub project_root: PathBuf,
    /// When set, restricts seeding and reporting to these files; the
    /// whole project still participates in resolution.
    pub target_modules: Option<FxHashSet<PathBuf>>,
    /// Requested propagation depth; clamped by the tier.
    pub requested_depth: Option<u32>,
    /// Whether raw flows should be included in the response (requires
    /// the flow-export capability).
    pub include_flows: bool,
    /// Opaque entitlement limits.
    pub tier_limits: TierLimits,
}

/// Response metadata: what was actually applied and how far the run got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseMetadata {
    /// Human-readable label of the applied tier limits.
    pub tier_applied: String,
    /// Effective depth cap.
    pub max_depth_applied: Option<u32>,
    /// Effective module cap.
    pub max_modules_applied: Option<u32>,
    /// Distinct modules propagation touched.
    pub modules_visited: u32,
    /// Whether any budget cut exploration short.
    pub truncated: bool,
    /// Whether cancellation produced a partial result.
    pub truncated_by_timeout: bool,
    /// Whether framework catalogs were active.
    pub framework_aware_enabled: bool,
    /// Whether enterprise-only outputs were active.
    pub enterprise_features_enabled: bool,
}

/// The full response contract. Degraded features yield empty collections
/// or false flags; fields are never omitted.
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    /// False only for an invalid request.
    pub success: bool,
    /// Top-level request error, when `success` is false.
    pub error: Option<String>,
    /// Classified findings, stable order.
    pub vulnerabilities: Vec<Finding>,
    /// Raw flows; populated only when requested and licensed.
    pub taint_flows: Vec<TaintFlow>,
    /// Maximum severity present.
    pub risk_level: RiskLevel,
    /// Applied limits and truncation state.
    pub metadata: ResponseMetadata,
    /// Non-fatal conditions, stable order.
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResponse {
    fn invalid(request: &AnalysisRequest, error: String) -> Self {
        let limits = EffectiveLimits::apply(&request.tier_limits, request.requested_depth);
        Self {
            success: false,
            error: Some(error),
            vulnerabilities: Vec::new(),
            taint_flows: Vec::new(),
            risk_level: RiskLevel::None,
            metadata: ResponseMetadata {
                tier_applied: request.tier_limits.label().to_owned(),
                max_depth_applied: limits.max_depth_applied,
                max_modules_applied: limits.max_modules_applied,
                modules_visited: 0,
                truncated: false,
                truncated_by_timeout: false,
                framework_aware_enabled: false,
                enterprise_features_enabled: false,
            },
            diagnostics: Vec::new(),
        }
    }
}

/// Share cache of built per-file graphs, keyed by path and content hash.
/// A hash mismatch on lookup evicts the stale entry.
#[derive(Debug, Default)]
pub struct GraphCache {
    entries: FxHashMap<PathBuf, (u64, Arc<PerFileGraph>)>,
}

impl GraphCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached graph for a file, if its content hash still matches.
    pub fn get(&mut self, path: &Path, content_hash: u64) -> Option<Arc<PerFileGraph>> {
        match self.entries.get(path) {
            Some((hash, graph)) if *hash == content_hash => Some(Arc::clone(graph)),
            Some(_) => {
                self.entries.remove(path);
                None
            }
            None => None,
        }
    }

    /// Stores a freshly built graph.
    pub fn put(&mut self, path: PathBuf, content_hash: u64, graph: Arc<PerFileGraph>) {
        self.entries.insert(path, (content_hash, graph));
    }

    /// Number of cached graphs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The analysis engine. Holds the catalogs shared by all requests;
/// per-request state never outlives [`Engine::analyze`].
#[derive(Debug)]
pub struct Engine {
    catalogs: CatalogSet,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Engine with the language-core catalogs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            catalogs: CatalogSet::language_core(),
        }
    }

    /// Merges user-supplied catalog entries into the base catalogs.
    #[must_use]
    pub fn with_catalog(mut self, extra: CatalogSet) -> Self {
        self.catalogs.merge(extra);
        self
    }

    /// Runs one analysis request over the ingested files.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        inputs: Vec<ModuleInput>,
        cache: &mut GraphCache,
        cancel: &CancelFlag,
    ) -> AnalysisResponse {
        if request.project_root.as_os_str().is_empty() {
            return AnalysisResponse::invalid(request, "project_root must not be empty".to_owned());
        }
        if let Some(depth) = request.requested_depth {
            if depth > DEPTH_CEILING {
                return AnalysisResponse::invalid(
                    request,
                    format!("requested_depth {depth} exceeds the engine ceiling {DEPTH_CEILING}"),
                );
            }
        }
        if let Some(targets) = &request.target_modules {
            if targets.is_empty() {
                return AnalysisResponse::invalid(
                    request,
                    "target_modules, when set, must name at least one file".to_owned(),
                );
            }
        }

        let mut diagnostics = Vec::new();

        // Input order determines id assignment; sort for determinism.
        let mut inputs = inputs;
        inputs.sort_by(|a, b| a.path.cmp(&b.path));
        inputs.dedup_by(|a, b| a.path == b.path);

        let mut parsed: Vec<(PathBuf, NormalizedAst)> = Vec::new();
        for input in inputs {
            match input.payload {
                AstPayload::Ast(ast) => parsed.push((input.path, ast)),
                AstPayload::Failed(err) => diagnostics.push(Diagnostic::SkippedModule {
                    module: input.path.to_string_lossy().into_owned(),
                    reason: err.message,
                }),
            }
        }

        let files: Vec<(PathBuf, &NormalizedAst)> = parsed
            .iter()
            .map(|(path, ast)| (path.clone(), ast))
            .collect();
        let set = ModuleSet::build(&request.project_root, &files);

        let limits = EffectiveLimits::apply(&request.tier_limits, request.requested_depth);

        // Graph construction: cache lookups first, parallel builds for
        // the misses, failures become skipped modules.
        let mut graphs: FxHashMap<crate::module::ModuleId, Arc<PerFileGraph>> =
            FxHashMap::default();
        let mut misses = Vec::new();
        for (idx, (path, ast)) in parsed.iter().enumerate() {
            let module_id = set.modules[idx].id;
            let hash = ast_hash(ast);
            if let Some(graph) = cache.get(path, hash) {
                graphs.insert(module_id, graph);
            } else {
                misses.push((module_id, path, ast, hash));
            }
        }
        let built: Vec<_> = misses
            .par_iter()
            .map(|(module_id, path, ast, hash)| (*module_id, *hash, pdg::build(path, ast)))
            .collect();
        for ((module_id, hash, result), (_, path, _, _)) in built.into_iter().zip(&misses) {
            match result {
                Ok(graph) => {
                    let graph = Arc::new(graph);
                    cache.put((*path).clone(), hash, Arc::clone(&graph));
                    graphs.insert(module_id, graph);
                }
                Err(err) => diagnostics.push(Diagnostic::SkippedModule {
                    module: path.to_string_lossy().into_owned(),
                    reason: err.to_string(),
                }),
            }
        }

        let module_graph = resolver::resolve(&set, &limits);
        diagnostics.extend(module_graph.diagnostics.iter().cloned());

        for module in &set.modules {
            let Some(graph) = graphs.get(&module.id) else {
                continue;
            };
            for (span, detail) in &graph.gaps {
                diagnostics.push(Diagnostic::ApproximationGap {
                    module: module.canon.clone(),
                    line: span.line,
                    detail: detail.clone(),
                });
            }
        }

        let catalogs = if limits.has(Capability::FrameworkCatalogs) {
            self.catalogs.clone().with_frameworks()
        } else {
            self.catalogs.clone()
        };

        let outcome = taint::propagate(&set, &module_graph, &graphs, &catalogs, &limits, cancel);

        let targeted: Vec<&TaintFlow> = outcome
            .flows
            .iter()
            .filter(|flow| match &request.target_modules {
                Some(targets) => targets.contains(Path::new(&flow.source.file)),
                None => true,
            })
            .collect();

        let vulnerabilities: Vec<Finding> = targeted.iter().map(|flow| classify(flow)).collect();
        let risk_level = RiskLevel::from_findings(&vulnerabilities);

        let flow_export = request.include_flows && limits.has(Capability::FlowExport);
        let taint_flows = if flow_export {
            targeted.into_iter().cloned().collect()
        } else {
            Vec::new()
        };

        diagnostics.sort_by_key(Diagnostic::sort_key);
        diagnostics.dedup();

        AnalysisResponse {
            success: true,
            error: None,
            vulnerabilities,
            taint_flows,
            risk_level,
            metadata: ResponseMetadata {
                tier_applied: request.tier_limits.label().to_owned(),
                max_depth_applied: limits.max_depth_applied,
                max_modules_applied: limits.max_modules_applied,
                modules_visited: outcome.modules_visited,
                truncated: outcome.truncated || outcome.truncated_by_timeout,
                truncated_by_timeout: outcome.truncated_by_timeout,
                framework_aware_enabled: limits.has(Capability::FrameworkCatalogs),
                enterprise_features_enabled: limits.has(Capability::FlowExport),
            },
            diagnostics,
        }
    }
}
