//! The authorization predicate
//!
//! [`AuthorizationChecker::has_permission`] is safe to call on every
//! request: it never fails and has no side effects on authorization
//! state. A resolution failure (e.g. the store is unreachable) is logged
//! and answered with `false`.

use crate::metrics::{CheckOutcome, MetricsCollector};
use crate::principal::Principal;
use crate::resolver::{EffectivePermissionResolver, EffectivePermissions};
use crate::types::normalize_key;
use chrono::{DateTime, Utc};
use std::time::Instant;
use tracing::{debug, warn};

/// Answers "may this principal perform this action on this module?"
#[derive(Clone)]
pub struct AuthorizationChecker {
    resolver: EffectivePermissionResolver,
    wildcard_action: String,
    metrics: Option<MetricsCollector>,
}

impl AuthorizationChecker {
    /// Create a checker honoring `wildcard_action` as "all actions"
    pub fn new(resolver: EffectivePermissionResolver, wildcard_action: &str) -> Self {
        Self {
            resolver,
            wildcard_action: normalize_key(wildcard_action),
            metrics: None,
        }
    }

    /// Record every check in `metrics`
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Whether `principal` may perform `action` on `module`
    pub async fn has_permission(&self, principal: &Principal, module: &str, action: &str) -> bool {
        self.has_permission_at(principal, module, action, Utc::now()).await
    }

    /// [`has_permission`](Self::has_permission) with grant expiry evaluated at `now`
    pub async fn has_permission_at(
        &self,
        principal: &Principal,
        module: &str,
        action: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let start = Instant::now();
        let module = normalize_key(module);
        let action = normalize_key(action);

        let outcome = match self.resolver.compute_at(principal, now).await {
            Ok(EffectivePermissions::Universal) => CheckOutcome::AllowedUniversal,
            Ok(set) if set.allows(&module, &action, &self.wildcard_action) => CheckOutcome::Allowed,
            Ok(_) => CheckOutcome::Denied,
            Err(e) => {
                warn!(
                    "Denying {}.{} for {}: permission resolution failed: {}",
                    module, action, principal.id, e
                );
                CheckOutcome::Failed
            }
        };

        let allowed = matches!(outcome, CheckOutcome::Allowed | CheckOutcome::AllowedUniversal);
        debug!(
            "Check {}.{} for {}: {}",
            module,
            action,
            principal.id,
            if allowed { "ALLOW" } else { "DENY" }
        );

        if let Some(metrics) = &self.metrics {
            metrics.record(outcome, start.elapsed()).await;
        }

        allowed
    }
}
