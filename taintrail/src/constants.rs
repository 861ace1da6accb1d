//! Engine-wide constants and hard ceilings.
//!
//! The ceilings here are implementation safety valves that bound the
//! propagation search even when a tier grants unlimited limits. They are
//! not tier features and are never reported as tier clamping.

/// Upper bound on module-boundary crossings per path, applied even under
/// an unlimited tier depth.
pub const DEPTH_CEILING: u32 = 32;
/// Upper bound on distinct modules one propagation may touch.
pub const MODULE_CEILING: u32 = 4096;
/// Upper bound on worklist iterations per propagation run.
pub const WORKLIST_STEP_CEILING: usize = 200_000;
/// Default cap on re-export chain length during resolution.
pub const REEXPORT_DEPTH_CAP: u32 = 8;
/// Maximum AST nesting depth accepted by the PDG builder.
pub const MAX_AST_DEPTH: usize = 400;
/// Shard count of the visited-path set shared across propagation workers.
pub const VISITED_SHARDS: usize = 16;
