//! Worklist taint propagation across per-file graphs and resolved
//! import edges.
//!
//! Seeds are the nodes matching a source catalog entry. From each seed a
//! depth-first walk follows intra-file data edges and, where a call
//! resolves to a function in another module, steps into that function's
//! parameters. Only those inter-module steps consume depth budget; when
//! the budget runs out the path is recorded as truncated instead of
//! being discarded. A full sanitizer match halts the path; a sink match
//! completes a [`TaintFlow`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use compact_str::CompactString;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use super::{extend_state, GlobalNode, Location, TaintFlow, VisitedPaths};
use crate::cancel::CancelFlag;
use crate::catalog::{looks_like_sanitizer, CatalogSet};
use crate::constants::WORKLIST_STEP_CEILING;
use crate::module::{ModuleId, ModuleSet, SymbolKind};
use crate::pdg::PerFileGraph;
use crate::resolver::ModuleGraph;
use crate::tier::EffectiveLimits;

/// Result of one propagation run.
#[derive(Debug)]
pub struct PropagationOutcome {
    /// Completed flows, sorted by (source, sink) location and
    /// deduplicated by node sequence.
    pub flows: Vec<TaintFlow>,
    /// Distinct modules any path touched.
    pub modules_visited: u32,
    /// Whether a depth, module, or step budget cut exploration short.
    pub truncated: bool,
    /// Whether cancellation stopped the run with partial results.
    pub truncated_by_timeout: bool,
}

/// Shared read-only context plus the cross-worker coordination state.
struct Cx<'a> {
    set: &'a ModuleSet,
    modules: &'a ModuleGraph,
    graphs: &'a FxHashMap<ModuleId, Arc<PerFileGraph>>,
    catalogs: &'a CatalogSet,
    depth_budget: u32,
    /// Modules admitted under the distinct-module budget, fixed before
    /// the parallel phase so admission never depends on worker timing.
    admitted: FxHashSet<ModuleId>,
    cancel: &'a CancelFlag,
    visited: VisitedPaths,
    steps: AtomicUsize,
    touched: Mutex<FxHashSet<ModuleId>>,
}

impl Cx<'_> {
    fn location(&self, node: GlobalNode) -> Location {
        let module = self.set.module(node.module);
        let graph = &self.graphs[&node.module];
        let span = graph.node(node.node).span;
        Location {
            file: module.path.to_string_lossy().into_owned(),
            line: span.line,
            column: span.column,
        }
    }

    /// Records a module as visited; fails when the module fell outside
    /// the precomputed admission set.
    fn enter_module(&self, module: ModuleId) -> bool {
        if !self.admitted.contains(&module) {
            return false;
        }
        let mut touched = match self.touched.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        touched.insert(module);
        true
    }
}

struct Seed {
    node: GlobalNode,
    /// The concrete dotted path that matched a source entry.
    matched: CompactString,
}

/// Runs taint propagation to a fixed point over the whole project.
#[must_use]
pub fn propagate(
    set: &ModuleSet,
    modules: &ModuleGraph,
    graphs: &FxHashMap<ModuleId, Arc<PerFileGraph>>,
    catalogs: &CatalogSet,
    limits: &EffectiveLimits,
    cancel: &CancelFlag,
) -> PropagationOutcome {
    let seeds = collect_seeds(set, graphs, catalogs);
    let admitted = admit_modules(
        modules,
        &seeds,
        limits.module_budget().max(1) as usize,
    );
    let cx = Cx {
        set,
        modules,
        graphs,
        catalogs,
        depth_budget: limits.depth_budget(),
        admitted,
        cancel,
        visited: VisitedPaths::new(),
        steps: AtomicUsize::new(0),
        touched: Mutex::new(FxHashSet::default()),
    };

    let walks: Vec<Walk> = seeds
        .par_iter()
        .map(|seed| {
            let mut walker = Walker::new(&cx, seed);
            if cx.enter_module(seed.node.module) {
                walker.walk(seed.node, 0, 0);
            } else {
                walker.truncated = true;
            }
            walker.finish()
        })
        .collect();

    let mut flows = Vec::new();
    let mut truncated = false;
    let mut truncated_by_timeout = false;
    for walk in walks {
        flows.extend(walk.flows);
        truncated |= walk.truncated;
        truncated_by_timeout |= walk.timed_out;
    }

    // Parallel exploration order is nondeterministic; restore a stable
    // report order and drop duplicate node sequences.
    flows.sort_by(|a, b| {
        (&a.source, &a.sink, &a.path, &a.source_pattern).cmp(&(
            &b.source,
            &b.sink,
            &b.path,
            &b.source_pattern,
        ))
    });
    flows.dedup_by(|a, b| a.path == b.path && a.source_pattern == b.source_pattern);

    let modules_visited = match cx.touched.lock() {
        Ok(t) => t.len(),
        Err(poisoned) => poisoned.into_inner().len(),
    };
    PropagationOutcome {
        flows,
        modules_visited: u32::try_from(modules_visited).unwrap_or(u32::MAX),
        truncated,
        truncated_by_timeout,
    }
}

/// Every node whose reads or calls match a source entry, in module and
/// node order so seed ids are stable run to run. One seed per node: when
/// several reads or calls on a statement match, the first in read order
/// names the source, so the reported pattern never depends on which
/// worker walks the node first.
fn collect_seeds(
    set: &ModuleSet,
    graphs: &FxHashMap<ModuleId, Arc<PerFileGraph>>,
    catalogs: &CatalogSet,
) -> Vec<Seed> {
    let mut seeds = Vec::new();
    for module in &set.modules {
        let Some(graph) = graphs.get(&module.id) else {
            continue;
        };
        for node in &graph.nodes {
            let gnode = GlobalNode {
                module: module.id,
                node: node.id,
            };
            for path in node.reads.iter().chain(node.calls.iter()) {
                if catalogs.match_source(path, module.language).is_some() {
                    seeds.push(Seed {
                        node: gnode,
                        matched: path.clone(),
                    });
                    break;
                }
            }
        }
    }
    seeds
}

/// Modules allowed under the distinct-module budget: a breadth-first
/// pass over resolved import edges, starting from the seed modules in
/// seed order, admits modules in a fixed order until the budget is
/// spent. Cross-module calls only reach modules along these edges, so
/// walks against this set truncate at exactly the same boundary no
/// matter how rayon schedules them.
fn admit_modules(
    modules: &ModuleGraph,
    seeds: &[Seed],
    budget: usize,
) -> FxHashSet<ModuleId> {
    let mut admitted = FxHashSet::default();
    let mut queue = VecDeque::new();
    for seed in seeds {
        if admitted.len() >= budget {
            return admitted;
        }
        if admitted.insert(seed.node.module) {
            queue.push_back(seed.node.module);
        }
    }
    while let Some(module) = queue.pop_front() {
        for &next in modules.imports_of(module) {
            if admitted.len() >= budget {
                return admitted;
            }
            if admitted.insert(next) {
                queue.push_back(next);
            }
        }
    }
    admitted
}

struct Walk {
    flows: Vec<TaintFlow>,
    truncated: bool,
    timed_out: bool,
}

struct Walker<'a, 'c> {
    cx: &'c Cx<'a>,
    seed: &'c Seed,
    source: Location,
    path: Vec<Location>,
    on_path: FxHashSet<GlobalNode>,
    sanitizers: Vec<Location>,
    flows: Vec<TaintFlow>,
    truncated: bool,
    timed_out: bool,
}

impl<'a, 'c> Walker<'a, 'c> {
    fn new(cx: &'c Cx<'a>, seed: &'c Seed) -> Self {
        Self {
            cx,
            seed,
            source: cx.location(seed.node),
            path: Vec::new(),
            on_path: FxHashSet::default(),
            sanitizers: Vec::new(),
            flows: Vec::new(),
            truncated: false,
            timed_out: false,
        }
    }

    fn finish(self) -> Walk {
        Walk {
            flows: self.flows,
            truncated: self.truncated,
            timed_out: self.timed_out,
        }
    }

    fn walk(&mut self, gnode: GlobalNode, state: u64, crossings: u32) {
        if self.timed_out || self.cx.cancel.is_cancelled() {
            self.timed_out = true;
            return;
        }
        if self.cx.steps.fetch_add(1, Ordering::Relaxed) >= WORKLIST_STEP_CEILING {
            self.truncated = true;
            return;
        }
        // Cycles repeat a node on the current path; everything else is
        // deduplicated per path prefix across all workers.
        if self.on_path.contains(&gnode) {
            return;
        }
        let state = extend_state(state, gnode);
        if !self.cx.visited.insert(state) {
            return;
        }
        let Some(graph) = self.cx.graphs.get(&gnode.module) else {
            return;
        };
        let node = graph.node(gnode.node);
        let language = graph.language;
        let location = self.cx.location(gnode);

        self.path.push(location.clone());
        self.on_path.insert(gnode);
        let sanitizer_mark = self.sanitizers.len();

        let mut halted = false;
        let mut sank = false;
        for callee in &node.calls {
            if self.cx.catalogs.match_sanitizer(callee, language).is_some() {
                halted = true;
                break;
            }
            if looks_like_sanitizer(callee) {
                self.sanitizers.push(location.clone());
            }
        }
        if !halted {
            for callee in &node.calls {
                if let Some(sink) = self.cx.catalogs.match_sink(callee, language) {
                    self.flows.push(TaintFlow {
                        source: self.source.clone(),
                        sink: location.clone(),
                        source_pattern: self.seed.matched.clone(),
                        sink_name: sink.name.clone(),
                        category: sink.category,
                        severity: sink.severity,
                        path: self.path.clone(),
                        sanitizers: self.sanitizers.clone(),
                        cross_file: crossings > 0,
                        crossings,
                        // A flow that reached its sink was fully
                        // resolved; budget cuts on other branches
                        // surface on the run outcome, not on it.
                        truncated: false,
                    });
                    sank = true;
                }
            }
        }

        if !halted && !sank {
            for idx in 0..graph.data_successors(gnode.node).len() {
                let next = graph.data_successors(gnode.node)[idx];
                self.walk(
                    GlobalNode {
                        module: gnode.module,
                        node: next,
                    },
                    state,
                    crossings,
                );
            }
            for call_idx in 0..graph.node(gnode.node).calls.len() {
                let callee = graph.node(gnode.node).calls[call_idx].clone();
                self.step_into_call(graph, gnode, &callee, state, crossings);
            }
        }

        self.sanitizers.truncate(sanitizer_mark);
        self.on_path.remove(&gnode);
        self.path.pop();
    }

    /// Follows a call on a tainted node into the callee's parameters:
    /// same-module calls are free, resolved cross-module calls consume
    /// one unit of depth.
    fn step_into_call(
        &mut self,
        graph: &PerFileGraph,
        gnode: GlobalNode,
        callee: &str,
        state: u64,
        crossings: u32,
    ) {
        if let Some(func) = graph.function_named(callee) {
            for idx in 0..graph.function(func).param_nodes.len() {
                let param = graph.function(func).param_nodes[idx];
                self.walk(
                    GlobalNode {
                        module: gnode.module,
                        node: param,
                    },
                    state,
                    crossings,
                );
            }
            return;
        }

        let Some(symbol) = self.cx.modules.resolve_call(self.cx.set, gnode.module, callee) else {
            return;
        };
        debug_assert_eq!(symbol.kind, SymbolKind::Function);
        if symbol.module == gnode.module {
            return;
        }
        if crossings >= self.cx.depth_budget {
            self.truncated = true;
            return;
        }
        if !self.cx.enter_module(symbol.module) {
            self.truncated = true;
            return;
        }
        let Some(target) = self.cx.graphs.get(&symbol.module) else {
            return;
        };
        let Some(func) = target.function_named(&symbol.name) else {
            return;
        };
        for idx in 0..target.function(func).param_nodes.len() {
            let param = target.function(func).param_nodes[idx];
            self.walk(
                GlobalNode {
                    module: symbol.module,
                    node: param,
                },
                state,
                crossings + 1,
            );
        }
    }
}
