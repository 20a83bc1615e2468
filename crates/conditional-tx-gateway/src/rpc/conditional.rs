//! eth_sendRawTransactionConditional admission pipeline.
//!
//! Checks run cheapest first and stop at the first failure:
//!
//! 1. endpoint enabled
//! 2. caller authenticated (before any decoding work)
//! 3. transaction decodes
//! 4. target is an allow-listed EntryPoint
//! 5. conditional is well-formed
//! 6. conditional cost within the static maximum
//! 7. cost admitted by the shared limiter (the only step that waits)
//! 8. forwarded to the backend
//!
//! The request counter moves on every call. Each failure moves exactly one
//! failure counter; the cost histogram only sees requests that got past the
//! limiter.

use crate::adapters::InstrumentedBackend;
use crate::domain::conditional::TransactionConditional;
use crate::domain::config::GatewayConfig;
use crate::domain::entrypoints::EntrypointAllowList;
use crate::domain::error::{ApiError, ConditionalError};
use crate::domain::transaction::decode_transaction;
use crate::domain::types::{Bytes, CallerIdentity, Hash};
use crate::middleware::{ConditionalMetrics, CostRateLimiter};
use crate::ports::ConditionalBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Static knobs of the pipeline
#[derive(Debug, Clone)]
pub struct ConditionalSettings {
    pub enabled: bool,
    pub max_cost: u64,
    pub admission_timeout: Duration,
}

impl From<&GatewayConfig> for ConditionalSettings {
    fn from(config: &GatewayConfig) -> Self {
        Self {
            enabled: config.conditional.enabled,
            max_cost: config.conditional.max_cost,
            admission_timeout: config.conditional.admission_timeout,
        }
    }
}

/// Conditional transaction admission service
pub struct ConditionalTxService {
    settings: ConditionalSettings,
    entrypoints: EntrypointAllowList,
    limiter: Arc<CostRateLimiter>,
    backend: Arc<dyn ConditionalBackend>,
    metrics: ConditionalMetrics,
}

impl ConditionalTxService {
    pub fn new(
        settings: ConditionalSettings,
        entrypoints: EntrypointAllowList,
        limiter: Arc<CostRateLimiter>,
        backend: Arc<dyn ConditionalBackend>,
        metrics: ConditionalMetrics,
    ) -> Self {
        Self {
            settings,
            entrypoints,
            limiter,
            backend,
            metrics,
        }
    }

    /// Wire the service from configuration. Backend calls are instrumented
    /// on `metrics`' registry.
    pub fn from_config(
        config: &GatewayConfig,
        backend: Arc<dyn ConditionalBackend>,
        metrics: ConditionalMetrics,
    ) -> Self {
        Self::new(
            ConditionalSettings::from(config),
            EntrypointAllowList::with_extra(config.conditional.extra_entrypoints.iter().copied()),
            Arc::new(CostRateLimiter::from_config(&config.rate_limit)),
            Arc::new(InstrumentedBackend::new(backend, metrics.backend().clone())),
            metrics,
        )
    }

    pub fn metrics(&self) -> &ConditionalMetrics {
        &self.metrics
    }

    pub fn limiter(&self) -> &Arc<CostRateLimiter> {
        &self.limiter
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// eth_sendRawTransactionConditional
    ///
    /// `cancel` aborts a pending limiter wait; the request then fails as
    /// rate limited.
    pub async fn send_raw_transaction_conditional(
        &self,
        cancel: &CancellationToken,
        caller: Option<CallerIdentity>,
        tx: Bytes,
        condition: TransactionConditional,
    ) -> Result<Hash, ConditionalError> {
        self.metrics.record_request();

        if !self.settings.enabled {
            return Err(self.reject(ConditionalError::EndpointDisabled));
        }

        let caller = match caller {
            Some(caller) => caller,
            None => return Err(self.reject(ConditionalError::MissingAuthentication)),
        };

        match self.send_conditional(cancel, &caller, &tx, &condition).await {
            Ok(hash) => Ok(hash),
            Err(e) => {
                error!(caller = %caller, reason = %e.reason(), error = %e, "failed transaction conditional");
                Err(self.reject(e))
            }
        }
    }

    async fn send_conditional(
        &self,
        cancel: &CancellationToken,
        caller: &CallerIdentity,
        tx: &Bytes,
        condition: &TransactionConditional,
    ) -> Result<Hash, ConditionalError> {
        let decoded = decode_transaction(tx.as_slice())
            .map_err(|e| ConditionalError::MalformedTransaction(e.to_string()))?;
        let hash = decoded.hash;

        if !self.entrypoints.permits(decoded.to.as_ref()) {
            return Err(ConditionalError::UnsupportedTarget);
        }

        condition
            .validate()
            .map_err(|e| ConditionalError::ConditionalValidationFailed(e.to_string()))?;

        let cost = condition.cost();
        if cost > self.settings.max_cost {
            return Err(ConditionalError::CostExceedsMaximum {
                cost,
                max: self.settings.max_cost,
            });
        }

        if let Err(e) = self
            .limiter
            .acquire(cost, self.settings.admission_timeout, cancel)
            .await
        {
            debug!(caller = %caller, hash = ?hash, cost, error = %e, "Cost limiter refused admission");
            return Err(ConditionalError::RateLimited);
        }

        self.metrics.observe_cost(cost);
        info!(caller = %caller, hash = ?hash, cost, "broadcasting conditional transaction");

        self.backend
            .send_raw_transaction_conditional(tx, condition)
            .await
            .map_err(|e| ConditionalError::Backend(ApiError::from(e)))?;

        Ok(hash)
    }

    fn reject(&self, e: ConditionalError) -> ConditionalError {
        self.metrics.record_failure(e.reason());
        e
    }
}

impl std::fmt::Debug for ConditionalTxService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalTxService")
            .field("settings", &self.settings)
            .field("entrypoints", &self.entrypoints.len())
            .field("limiter", &self.limiter)
            .finish()
    }
}
