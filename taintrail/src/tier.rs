//! Capability-gated analysis limits.
//!
//! The engine never inspects license material and never compares tier
//! names. An external entitlement resolver supplies [`TierLimits`]; the
//! gate folds those with the request into an [`EffectiveLimits`] value
//! injected into every component, and feature checks are capability-set
//! membership, so new tiers or custom entitlement bundles need no change
//! to propagation logic.

use crate::constants::{DEPTH_CEILING, MODULE_CEILING, REEXPORT_DEPTH_CAP};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// A feature the current entitlement bundle may grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Framework-specific source/sink/sanitizer catalogs.
    FrameworkCatalogs,
    /// Raw taint-flow export in the response.
    FlowExport,
}

/// Resolved entitlement limits, supplied by the external resolver.
/// `None` denotes unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    /// Maximum module-boundary crossings per path.
    pub max_depth: Option<u32>,
    /// Maximum distinct modules one propagation may touch.
    pub max_modules: Option<u32>,
    /// Framework-aware catalogs enabled.
    pub framework_aware: bool,
    /// Enterprise feature set enabled.
    pub enterprise_features: bool,
}

impl TierLimits {
    /// Community preset (tests and CLI convenience only; the engine
    /// consumes whatever bundle the entitlement resolver produced).
    #[must_use]
    pub fn community() -> Self {
        Self {
            max_depth: Some(2),
            max_modules: Some(50),
            framework_aware: false,
            enterprise_features: false,
        }
    }

    /// Pro preset.
    #[must_use]
    pub fn pro() -> Self {
        Self {
            max_depth: Some(10),
            max_modules: Some(500),
            framework_aware: true,
            enterprise_features: false,
        }
    }

    /// Enterprise preset: unlimited depth and fan-out.
    #[must_use]
    pub fn enterprise() -> Self {
        Self {
            max_depth: None,
            max_modules: None,
            framework_aware: true,
            enterprise_features: true,
        }
    }

    /// Reporting label derived from the granted features. Used only for
    /// response metadata, never for gating.
    #[must_use]
    pub fn label(&self) -> &'static str {
        if self.enterprise_features {
            "enterprise"
        } else if self.framework_aware {
            "pro"
        } else {
            "community"
        }
    }
}

/// Effective limits for one request: tier limits clamped by the request,
/// with the engine's hard ceilings underneath.
#[derive(Debug, Clone)]
pub struct EffectiveLimits {
    /// Depth cap actually applied (`None` = unlimited by entitlement;
    /// the internal ceiling still bounds the search).
    pub max_depth_applied: Option<u32>,
    /// Module cap actually applied.
    pub max_modules_applied: Option<u32>,
    /// Re-export chain cap for resolution.
    pub reexport_depth: u32,
    capabilities: FxHashSet<Capability>,
}

impl EffectiveLimits {
    /// Resolves effective limits as `min(requested, tier_maximum)`.
    #[must_use]
    pub fn apply(limits: &TierLimits, requested_depth: Option<u32>) -> Self {
        let max_depth_applied = min_opt(requested_depth, limits.max_depth);
        let mut capabilities = FxHashSet::default();
        if limits.framework_aware {
            capabilities.insert(Capability::FrameworkCatalogs);
        }
        if limits.enterprise_features {
            capabilities.insert(Capability::FlowExport);
        }
        Self {
            max_depth_applied,
            max_modules_applied: limits.max_modules,
            reexport_depth: REEXPORT_DEPTH_CAP,
            capabilities,
        }
    }

    /// Capability membership check.
    #[must_use]
    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// Depth budget the propagation search actually uses; the hard
    /// ceiling applies even to unlimited entitlements.
    #[must_use]
    pub fn depth_budget(&self) -> u32 {
        self.max_depth_applied
            .unwrap_or(DEPTH_CEILING)
            .min(DEPTH_CEILING)
    }

    /// Module budget with the hard ceiling underneath.
    #[must_use]
    pub fn module_budget(&self) -> u32 {
        self.max_modules_applied
            .unwrap_or(MODULE_CEILING)
            .min(MODULE_CEILING)
    }
}

fn min_opt(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(v), None) | (None, Some(v)) => Some(v),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_depth_is_clamped_by_tier() {
        let limits = EffectiveLimits::apply(&TierLimits::community(), Some(10));
        assert_eq!(limits.max_depth_applied, Some(2));

        let limits = EffectiveLimits::apply(&TierLimits::community(), Some(1));
        assert_eq!(limits.max_depth_applied, Some(1));
    }

    #[test]
    fn unlimited_tier_keeps_requested_depth() {
        let limits = EffectiveLimits::apply(&TierLimits::enterprise(), Some(7));
        assert_eq!(limits.max_depth_applied, Some(7));

        let limits = EffectiveLimits::apply(&TierLimits::enterprise(), None);
        assert_eq!(limits.max_depth_applied, None);
        assert_eq!(limits.depth_budget(), crate::constants::DEPTH_CEILING);
    }

    #[test]
    fn capabilities_follow_flags_not_names() {
        let pro = EffectiveLimits::apply(&TierLimits::pro(), None);
        assert!(pro.has(Capability::FrameworkCatalogs));
        assert!(!pro.has(Capability::FlowExport));

        let custom = TierLimits {
            max_depth: Some(3),
            max_modules: Some(10),
            framework_aware: false,
            enterprise_features: true,
        };
        let custom = EffectiveLimits::apply(&custom, None);
        assert!(custom.has(Capability::FlowExport));
        assert!(!custom.has(Capability::FrameworkCatalogs));
    }
}
