//! Outbound adapters implementing domain ports for external infrastructure.
//!
//! - **openai**: reqwest-backed image edit provider
//! - **metrics**: Prometheus-backed metrics exporters (feature-gated)
//!
//! Adapters are thin translators that convert between domain types and
//! infrastructure-specific representations. They contain no business logic.

#[cfg(feature = "metrics")]
pub mod metrics;
pub mod openai;
