//! Overload classification consulted before each non-final attempt.

use std::sync::{Mutex, PoisonError};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Decision returned by an [`OverloadClassifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverloadDecision {
    /// Call the provider.
    Proceed,
    /// Treat this attempt as a transient overload without calling the
    /// provider.
    Overloaded,
}

/// Pre-call overload signal.
///
/// Only consulted while retries remain, so a classifier can never cause a
/// terminal failure on its own.
#[cfg_attr(test, mockall::automock)]
pub trait OverloadClassifier: Send + Sync {
    /// Classify the attempt numbered `attempt` (starting at 1).
    fn classify(&self, attempt: u32) -> OverloadDecision;
}

/// Production classifier: overload is detected from the provider's own error
/// signal, never ahead of the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProviderSignalClassifier;

impl OverloadClassifier for ProviderSignalClassifier {
    fn classify(&self, _attempt: u32) -> OverloadDecision {
        OverloadDecision::Proceed
    }
}

/// Randomly flags attempts as overloaded with a fixed probability.
///
/// Useful for exercising the retry path against a real provider.
#[derive(Debug)]
pub struct SimulatedOverload {
    rate: f64,
    rng: Mutex<SmallRng>,
}

impl SimulatedOverload {
    /// Flag attempts with probability `rate`, clamped to `[0, 1]`.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{OverloadClassifier, OverloadDecision, SimulatedOverload};
    ///
    /// let never = SimulatedOverload::new(0.0);
    /// assert_eq!(never.classify(1), OverloadDecision::Proceed);
    /// ```
    pub fn new(rate: f64) -> Self {
        Self::with_rng(rate, SmallRng::from_entropy())
    }

    /// Deterministic variant for reproducible runs.
    pub fn seeded(rate: f64, seed: u64) -> Self {
        Self::with_rng(rate, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rate: f64, rng: SmallRng) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            rate,
            rng: Mutex::new(rng),
        }
    }

    /// Effective probability after clamping.
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

impl OverloadClassifier for SimulatedOverload {
    fn classify(&self, _attempt: u32) -> OverloadDecision {
        let flagged = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.rate);
        if flagged {
            OverloadDecision::Overloaded
        } else {
            OverloadDecision::Proceed
        }
    }
}
