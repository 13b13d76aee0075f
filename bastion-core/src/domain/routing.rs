//! Path-based routing rules layered over the weighted rotation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::RouteRuleConfig;
use crate::domain::backend::{BackendId, SharedBackend};
use crate::domain::pool::BackendPool;
use crate::domain::request::RequestLine;
use crate::error::CoreError;

/// Pins requests whose path starts with a literal prefix to one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRule {
    /// Literal path prefix.
    pub prefix: String,
    /// Preferred backend.
    pub backend: BackendId,
    /// Only match this method when set.
    pub method: Option<String>,
}

impl PathRule {
    /// Whether the rule applies to `line`.
    pub fn matches(&self, line: &RequestLine) -> bool {
        let method_ok = self
            .method
            .as_deref()
            .is_none_or(|m| m.eq_ignore_ascii_case(line.method()));
        method_ok && line.path().starts_with(&self.prefix)
    }
}

/// How a backend was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteVia {
    /// A path rule matched and its backend was alive. No rotation tick was consumed.
    Pinned,
    /// Plain weighted rotation.
    Rotation,
    /// A path rule matched but its backend was dead, so rotation picked instead.
    PinnedFallback {
        /// The backend the rule would have used.
        pinned: BackendId,
    },
}

/// Outcome of a routing decision. Never persisted.
#[derive(Debug, Clone)]
pub enum RoutingDecision {
    /// A live backend was chosen.
    Selected {
        /// The chosen backend.
        backend: SharedBackend,
        /// How it was chosen.
        via: RouteVia,
    },
    /// No backend is alive.
    Unavailable,
}

impl RoutingDecision {
    /// The chosen backend, if any.
    pub fn backend(&self) -> Option<&SharedBackend> {
        match self {
            RoutingDecision::Selected { backend, .. } => Some(backend),
            RoutingDecision::Unavailable => None,
        }
    }
}

/// The ordered rule table plus a count of pinned requests that fell back to rotation.
#[derive(Debug, Default)]
pub struct RoutingPolicy {
    rules: Vec<PathRule>,
    fallbacks: AtomicU64,
}

impl RoutingPolicy {
    /// Create a policy from already validated rules.
    pub fn new(rules: Vec<PathRule>) -> Self {
        Self {
            rules,
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Build the rule table, checking every target against the pool.
    pub fn from_config(configs: &[RouteRuleConfig], pool: &BackendPool) -> Result<Self, CoreError> {
        let rules = configs
            .iter()
            .map(|cfg| {
                if cfg.backend >= pool.len() {
                    return Err(CoreError::UnknownRouteTarget {
                        prefix: cfg.prefix.clone(),
                        index: cfg.backend,
                        available: pool.len(),
                    });
                }
                Ok(PathRule {
                    prefix: cfg.prefix.clone(),
                    backend: BackendId(cfg.backend),
                    method: cfg.method.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// Configured rules in match order.
    pub fn rules(&self) -> &[PathRule] {
        &self.rules
    }

    /// Number of pinned requests redirected into the rotation because their backend was dead.
    pub fn fallback_count(&self) -> u64 {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Pick one backend for `line`.
    ///
    /// The first matching rule wins. If its backend is alive it is returned directly;
    /// otherwise, or when nothing matches, the weighted rotation decides.
    pub fn select(&self, pool: &BackendPool, line: &RequestLine) -> RoutingDecision {
        let mut pinned = None;
        if let Some(rule) = self.rules.iter().find(|r| r.matches(line)) {
            if let Some(backend) = pool.get(rule.backend) {
                if backend.is_alive() {
                    return RoutingDecision::Selected {
                        backend: backend.clone(),
                        via: RouteVia::Pinned,
                    };
                }
            }
            pinned = Some(rule.backend);
        }

        let Some(backend) = pool.pick_by_rotation() else {
            return RoutingDecision::Unavailable;
        };

        let via = match pinned {
            Some(pinned) => {
                self.fallbacks.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    pinned = %pinned,
                    fallback = %backend.address(),
                    path = line.path(),
                    "pinned backend is down, path routed through weighted rotation"
                );
                RouteVia::PinnedFallback { pinned }
            }
            None => RouteVia::Rotation,
        };

        RoutingDecision::Selected { backend, via }
    }
}
