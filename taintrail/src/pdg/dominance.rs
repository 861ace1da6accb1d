//! Postdominance-based control dependence.
//!
//! Immediate postdominators are computed with the iterative
//! Cooper-Harvey-Kennedy scheme on the reversed CFG; control dependence
//! follows the standard frontier walk: for each edge `(a, b)` where `b`
//! does not postdominate `a`, every block from `b` up to (excluding)
//! `ipostdom(a)` is control-dependent on `a`.

use super::cfg::Cfg;

/// Blocks reachable from the entry.
pub(crate) fn reachable(cfg: &Cfg) -> Vec<bool> {
    let mut seen = vec![false; cfg.blocks.len()];
    let mut stack = vec![cfg.entry];
    while let Some(b) = stack.pop() {
        if seen[b] {
            continue;
        }
        seen[b] = true;
        for &s in &cfg.blocks[b].succs {
            stack.push(s);
        }
    }
    seen
}

/// Block-level control dependence pairs `(controlling, dependent)`.
pub(crate) fn control_dependence(cfg: &Cfg) -> Vec<(usize, usize)> {
    let ipdom = postdominators(cfg);
    let mut pairs = Vec::new();

    for (a, block) in cfg.blocks.iter().enumerate() {
        let Some(ipdom_a) = ipdom[a] else { continue };
        for &b in &block.succs {
            if ipdom_a == b {
                continue;
            }
            // Walk the postdominator tree from b up to ipdom(a).
            let mut runner = b;
            let mut steps = 0usize;
            while runner != ipdom_a && steps <= cfg.blocks.len() {
                if runner != a {
                    pairs.push((a, runner));
                }
                match ipdom[runner] {
                    Some(next) if next != runner => runner = next,
                    _ => break,
                }
                steps += 1;
            }
        }
    }
    pairs
}

/// Immediate postdominator per block; `None` for blocks with no path to
/// the exit (e.g. detached unreachable regions).
fn postdominators(cfg: &Cfg) -> Vec<Option<usize>> {
    let order = exit_postorder(cfg);
    let mut order_num = vec![usize::MAX; cfg.blocks.len()];
    for (i, &b) in order.iter().enumerate() {
        order_num[b] = i;
    }

    let mut ipdom: Vec<Option<usize>> = vec![None; cfg.blocks.len()];
    ipdom[cfg.exit] = Some(cfg.exit);

    let mut changed = true;
    while changed {
        changed = false;
        // Reverse postorder over the reversed graph.
        for &b in order.iter().rev() {
            if b == cfg.exit {
                continue;
            }
            // Predecessors in the reversed graph are CFG successors.
            let mut new_ipdom: Option<usize> = None;
            for &s in &cfg.blocks[b].succs {
                if ipdom[s].is_none() {
                    continue;
                }
                new_ipdom = Some(match new_ipdom {
                    None => s,
                    Some(cur) => intersect(cur, s, &ipdom, &order_num),
                });
            }
            if new_ipdom.is_some() && ipdom[b] != new_ipdom {
                ipdom[b] = new_ipdom;
                changed = true;
            }
        }
    }
    ipdom
}

fn intersect(
    mut a: usize,
    mut b: usize,
    ipdom: &[Option<usize>],
    order_num: &[usize],
) -> usize {
    while a != b {
        while order_num[a] < order_num[b] {
            match ipdom[a] {
                Some(next) if next != a => a = next,
                _ => return b,
            }
        }
        while order_num[b] < order_num[a] {
            match ipdom[b] {
                Some(next) if next != b => b = next,
                _ => return a,
            }
        }
    }
    a
}

/// Postorder of the reversed graph, rooted at the exit. Exit gets the
/// highest number, matching the dominator iteration's expectations.
fn exit_postorder(cfg: &Cfg) -> Vec<usize> {
    let mut order = Vec::with_capacity(cfg.blocks.len());
    let mut seen = vec![false; cfg.blocks.len()];
    // Iterative DFS over predecessor edges.
    let mut stack: Vec<(usize, usize)> = vec![(cfg.exit, 0)];
    seen[cfg.exit] = true;
    while let Some(&mut (b, ref mut idx)) = stack.last_mut() {
        if *idx < cfg.blocks[b].preds.len() {
            let p = cfg.blocks[b].preds[*idx];
            *idx += 1;
            if !seen[p] {
                seen[p] = true;
                stack.push((p, 0));
            }
        } else {
            order.push(b);
            stack.pop();
        }
    }
    order
}
