//! Middleware and shared admission machinery.
//!
//! Layer order: Request → BodyLimit → Tracing → Auth → Handler
//!
//! The cost limiter and metrics are not tower layers: they are shared by
//! every admission and consulted from inside the pipeline, because the cost
//! of a request is only known after its conditional has been decoded.

pub mod auth;
pub mod metrics;
pub mod rate_limit;
pub mod tracing;

pub use auth::{AuthConfig, AuthError, AuthLayer};
pub use metrics::ConditionalMetrics;
pub use rate_limit::{AcquireError, CostRateLimiter};
pub use self::tracing::TracingLayer;
