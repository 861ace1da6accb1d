//! Taint flow types and the cross-module propagation engine.

pub mod propagation;

pub use propagation::{propagate, PropagationOutcome};

use std::sync::Mutex;

use compact_str::CompactString;
use rustc_hash::{FxHashSet, FxHasher};
use serde::Serialize;
use std::hash::{Hash, Hasher};

use crate::classify::{Severity, VulnCategory};
use crate::constants::VISITED_SHARDS;
use crate::module::ModuleId;
use crate::pdg::NodeId;

/// A source position inside a project file, reported with the file path
/// relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    /// Project-relative file path.
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 0-based column.
    pub column: u32,
}

/// A graph node addressed across the whole project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalNode {
    /// Owning module.
    pub module: ModuleId,
    /// Node within that module's graph.
    pub node: NodeId,
}

/// One complete source-to-sink flow, before scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaintFlow {
    /// Where the untrusted value enters.
    pub source: Location,
    /// The dangerous call it reaches.
    pub sink: Location,
    /// The source catalog pattern that seeded this flow.
    pub source_pattern: CompactString,
    /// The sink catalog entry's name.
    pub sink_name: CompactString,
    /// Category carried from the sink entry.
    pub category: VulnCategory,
    /// Severity carried from the sink entry.
    pub severity: Severity,
    /// Every visited location, source first, sink last.
    pub path: Vec<Location>,
    /// Sanitizer-looking call sites on the path that matched no catalog
    /// entry and therefore did not stop propagation.
    pub sanitizers: Vec<Location>,
    /// Whether the path crosses at least one module boundary.
    pub cross_file: bool,
    /// Number of module boundary crossings on the path.
    pub crossings: u32,
    /// Whether a depth or module budget cut this path short before its
    /// sink was fully resolved. A completed flow was resolved, so this
    /// stays `false` for it; budget cuts elsewhere in the same run are
    /// reported on the run outcome instead.
    pub truncated: bool,
}

/// Sharded set of visited path states, shared across worker threads.
///
/// Each state is the hash of the node sequence walked so far; revisiting a
/// node through the same prefix is pruned, revisiting it through a
/// different prefix is not.
pub(crate) struct VisitedPaths {
    shards: Vec<Mutex<FxHashSet<u64>>>,
}

impl VisitedPaths {
    pub(crate) fn new() -> Self {
        Self {
            shards: (0..VISITED_SHARDS)
                .map(|_| Mutex::new(FxHashSet::default()))
                .collect(),
        }
    }

    /// Records a path state; returns false when it was already present.
    pub(crate) fn insert(&self, state: u64) -> bool {
        let shard = (state as usize) % self.shards.len();
        match self.shards[shard].lock() {
            Ok(mut set) => set.insert(state),
            // A poisoned shard means a sibling worker panicked; treat the
            // state as fresh so the panic surfaces instead of hanging.
            Err(poisoned) => poisoned.into_inner().insert(state),
        }
    }
}

/// Hashes an extension of a path state by one more node.
pub(crate) fn extend_state(state: u64, node: GlobalNode) -> u64 {
    let mut hasher = FxHasher::default();
    state.hash(&mut hasher);
    node.module.hash(&mut hasher);
    node.node.hash(&mut hasher);
    hasher.finish()
}
