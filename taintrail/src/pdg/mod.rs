//! Program Dependence Graph construction.
//!
//! One [`PerFileGraph`] per module: intra-procedural PDGs for every
//! function plus a pseudo-function for top-level statements. Control
//! dependence comes from postdominance frontiers over a structured-lowered
//! CFG; data dependence from a reaching-definitions fixed point.

pub mod builder;
pub(crate) mod cfg;
pub(crate) mod dominance;
pub(crate) mod reaching;

pub use builder::build;

use crate::ast::{Language, Span};
use compact_str::CompactString;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::path::PathBuf;
use thiserror::Error;

/// Identifier of a node within its module's graph (module-scoped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

/// Identifier of a function within its module's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FuncId(pub u32);

/// The module-level pseudo-function.
pub const MODULE_FUNC: FuncId = FuncId(0);

/// Syntactic kind of a PDG node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PdgNodeKind {
    /// Function parameter definition at entry.
    Param,
    /// Assignment statement.
    Assign,
    /// Branch condition (if / switch / while test).
    Branch,
    /// Loop header (for target binding).
    LoopHeader,
    /// Return statement.
    Return,
    /// Raise / throw statement.
    Raise,
    /// Plain statement or expression statement.
    Stmt,
    /// Import statement.
    Import,
    /// Nested function or class binding.
    Def,
}

/// A statement or expression in the dependence graph.
#[derive(Debug, Clone)]
pub struct PdgNode {
    /// Module-scoped id.
    pub id: NodeId,
    /// Syntactic kind.
    pub kind: PdgNodeKind,
    /// Source location.
    pub span: Span,
    /// Owning function.
    pub func: FuncId,
    /// Dotted paths read by this node.
    pub reads: SmallVec<[CompactString; 2]>,
    /// Bindings written by this node.
    pub writes: SmallVec<[CompactString; 1]>,
    /// Dotted callee paths invoked by this node.
    pub calls: SmallVec<[CompactString; 1]>,
}

/// Dependence edge kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Control dependence.
    Control,
    /// Data dependence (reaching definition to read).
    Data,
}

/// Directed dependence edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdgEdge {
    /// Origin node.
    pub from: NodeId,
    /// Target node.
    pub to: NodeId,
    /// Edge kind.
    pub kind: EdgeKind,
}

/// Per-function metadata within a [`PerFileGraph`].
#[derive(Debug, Clone)]
pub struct FunctionInfo {
    /// Function name (methods are `Class.method`, the module pseudo
    /// function is `<module>`).
    pub name: CompactString,
    /// Parameter names.
    pub params: Vec<CompactString>,
    /// Param definition nodes, the function's PDG entry.
    pub param_nodes: Vec<NodeId>,
    /// Async marker.
    pub is_async: bool,
}

/// Intra-file dependence graphs for one module.
#[derive(Debug)]
pub struct PerFileGraph {
    /// File path as supplied by ingestion.
    pub path: PathBuf,
    /// Language tag.
    pub language: Language,
    /// Content hash of the AST this graph was built from.
    pub content_hash: u64,
    /// All nodes, across all functions, indexed by [`NodeId`].
    pub nodes: Vec<PdgNode>,
    /// All edges.
    pub edges: Vec<PdgEdge>,
    /// Functions, indexed by [`FuncId`]. Index 0 is the module level.
    pub functions: Vec<FunctionInfo>,
    /// Nodes unreachable from their function's entry. They keep their
    /// data edges for reporting completeness but carry no control
    /// dependence from the reachable region.
    pub unreachable: Vec<NodeId>,
    /// Approximation gaps (dynamic calls) found during construction.
    pub gaps: Vec<(Span, String)>,
    data_succ: Vec<SmallVec<[NodeId; 4]>>,
    control_succ: Vec<SmallVec<[NodeId; 4]>>,
    func_index: FxHashMap<CompactString, FuncId>,
}

impl PerFileGraph {
    pub(crate) fn new(path: PathBuf, language: Language, content_hash: u64) -> Self {
        Self {
            path,
            language,
            content_hash,
            nodes: Vec::new(),
            edges: Vec::new(),
            functions: Vec::new(),
            unreachable: Vec::new(),
            gaps: Vec::new(),
            data_succ: Vec::new(),
            control_succ: Vec::new(),
            func_index: FxHashMap::default(),
        }
    }

    /// Node accessor.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &PdgNode {
        &self.nodes[id.0 as usize]
    }

    /// Function accessor.
    #[must_use]
    pub fn function(&self, id: FuncId) -> &FunctionInfo {
        &self.functions[id.0 as usize]
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function_named(&self, name: &str) -> Option<FuncId> {
        self.func_index.get(name).copied()
    }

    /// Outgoing data-dependence edges of a node.
    #[must_use]
    pub fn data_successors(&self, id: NodeId) -> &[NodeId] {
        &self.data_succ[id.0 as usize]
    }

    /// Outgoing control-dependence edges of a node.
    #[must_use]
    pub fn control_successors(&self, id: NodeId) -> &[NodeId] {
        &self.control_succ[id.0 as usize]
    }

    pub(crate) fn push_node(
        &mut self,
        kind: PdgNodeKind,
        span: Span,
        func: FuncId,
        reads: SmallVec<[CompactString; 2]>,
        writes: SmallVec<[CompactString; 1]>,
        calls: SmallVec<[CompactString; 1]>,
    ) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(PdgNode {
            id,
            kind,
            span,
            func,
            reads,
            writes,
            calls,
        });
        self.data_succ.push(SmallVec::new());
        self.control_succ.push(SmallVec::new());
        id
    }

    pub(crate) fn push_function(&mut self, info: FunctionInfo) -> FuncId {
        let id = FuncId(u32::try_from(self.functions.len()).unwrap_or(u32::MAX));
        self.func_index.entry(info.name.clone()).or_insert(id);
        self.functions.push(info);
        id
    }

    pub(crate) fn add_edge(&mut self, from: NodeId, to: NodeId, kind: EdgeKind) {
        let adjacency = match kind {
            EdgeKind::Data => &mut self.data_succ[from.0 as usize],
            EdgeKind::Control => &mut self.control_succ[from.0 as usize],
        };
        if adjacency.contains(&to) {
            return;
        }
        adjacency.push(to);
        self.edges.push(PdgEdge { from, to, kind });
    }
}

/// Fatal, per-module construction failure. A build error excludes only the
/// offending module from the run; the rest of the analysis proceeds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    /// The input was already flagged as malformed upstream, or violates
    /// the engine's structural bounds.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}
