//! Reaching-definitions dataflow and data-dependence edges.
//!
//! Storage locations are keyed by the root binding of a dotted path
//! (`req.id` reads storage `req`). The lattice is a finite map from
//! binding to definition-site sets, monotonically non-decreasing, so the
//! fixed point terminates in at most `bindings x blocks` iterations.

use super::cfg::Cfg;
use super::{NodeId, PerFileGraph};
use compact_str::CompactString;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// Root binding of a dotted path (`"req.id"` -> `"req"`).
#[must_use]
pub fn var_root(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

type DefMap = FxHashMap<CompactString, FxHashSet<NodeId>>;

/// Computes write-to-read data edges for one function's CFG.
pub(crate) fn data_edges(graph: &PerFileGraph, cfg: &Cfg) -> Vec<(NodeId, NodeId)> {
    let block_count = cfg.blocks.len();
    let mut gen_maps: Vec<DefMap> = Vec::with_capacity(block_count);
    let mut kill_sets: Vec<FxHashSet<CompactString>> = Vec::with_capacity(block_count);

    for block in &cfg.blocks {
        let mut gen_map = DefMap::default();
        let mut kill = FxHashSet::default();
        for &stmt in &block.stmts {
            for write in &graph.node(stmt).writes {
                let root = CompactString::from(var_root(write));
                gen_map.insert(root.clone(), FxHashSet::from_iter([stmt]));
                kill.insert(root);
            }
        }
        gen_maps.push(gen_map);
        kill_sets.push(kill);
    }

    let mut ins: Vec<DefMap> = vec![DefMap::default(); block_count];
    let mut outs: Vec<DefMap> = vec![DefMap::default(); block_count];
    let mut worklist: VecDeque<usize> = (0..block_count).collect();
    let mut queued = vec![true; block_count];

    while let Some(b) = worklist.pop_front() {
        queued[b] = false;

        let mut in_map = DefMap::default();
        for &p in &cfg.blocks[b].preds {
            for (var, defs) in &outs[p] {
                in_map.entry(var.clone()).or_default().extend(defs.iter());
            }
        }

        let mut out_map = DefMap::default();
        for (var, defs) in &in_map {
            if !kill_sets[b].contains(var) {
                out_map.insert(var.clone(), defs.clone());
            }
        }
        for (var, defs) in &gen_maps[b] {
            out_map.insert(var.clone(), defs.clone());
        }

        ins[b] = in_map;
        if out_map != outs[b] {
            outs[b] = out_map;
            for &s in &cfg.blocks[b].succs {
                if !queued[s] {
                    queued[s] = true;
                    worklist.push_back(s);
                }
            }
        }
    }

    // Walk each block with the computed IN environment, connecting every
    // read to the definitions that reach it without an intervening write.
    let mut edges = Vec::new();
    for (b, block) in cfg.blocks.iter().enumerate() {
        let mut env = ins[b].clone();
        for &stmt in &block.stmts {
            let node = graph.node(stmt);
            for read in &node.reads {
                if let Some(defs) = env.get(var_root(read)) {
                    let mut sorted: Vec<NodeId> = defs.iter().copied().collect();
                    sorted.sort_unstable();
                    for def in sorted {
                        if def != stmt {
                            edges.push((def, stmt));
                        }
                    }
                }
            }
            for write in &node.writes {
                env.insert(
                    CompactString::from(var_root(write)),
                    FxHashSet::from_iter([stmt]),
                );
            }
        }
    }
    edges
}
