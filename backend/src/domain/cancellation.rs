//! Per-request cancellation gate.
//!
//! A [`CancellationGate`] is a single-shot abort signal shared by the HTTP
//! boundary and every suspending operation of one edit request. Once aborted
//! it never resets. Waiters are woken by the same call that aborts the gate,
//! and listeners registered with [`CancellationGate::on_abort`] fire exactly
//! once.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

type AbortCallback = Box<dyn FnOnce() + Send + 'static>;

/// Marker returned when cancellation wins a race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation aborted by cancellation gate")]
pub struct Aborted;

#[derive(Default)]
struct ListenerRegistry {
    aborted: bool,
    next_id: u64,
    listeners: BTreeMap<u64, AbortCallback>,
}

struct GateInner {
    token: CancellationToken,
    registry: Mutex<ListenerRegistry>,
}

impl GateInner {
    fn registry(&self) -> MutexGuard<'_, ListenerRegistry> {
        // Callbacks run outside the lock, so a poisoned registry still holds
        // consistent data.
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-shot, cloneable abort signal.
///
/// Clones share state: aborting any clone aborts them all.
///
/// # Examples
/// ```
/// use backend::domain::CancellationGate;
///
/// let gate = CancellationGate::new();
/// let observer = gate.clone();
/// assert!(!observer.is_aborted());
/// gate.abort();
/// assert!(observer.is_aborted());
/// ```
#[derive(Clone)]
pub struct CancellationGate {
    inner: Arc<GateInner>,
}

impl CancellationGate {
    /// Create an active gate.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GateInner {
                token: CancellationToken::new(),
                registry: Mutex::new(ListenerRegistry::default()),
            }),
        }
    }

    /// Abort the gate. Only the first call has an effect.
    pub fn abort(&self) {
        self.inner.token.cancel();

        let drained = {
            let mut registry = self.inner.registry();
            if registry.aborted {
                return;
            }
            registry.aborted = true;
            std::mem::take(&mut registry.listeners)
        };

        for (_, callback) in drained {
            callback();
        }
    }

    /// Whether the gate has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Register `callback` to run once when the gate aborts.
    ///
    /// Runs `callback` immediately when the gate is already aborted. The
    /// returned listener deregisters the callback when dropped unless
    /// [`AbortListener::detach`] is called.
    pub fn on_abort<F>(&self, callback: F) -> AbortListener
    where
        F: FnOnce() + Send + 'static,
    {
        let mut registry = self.inner.registry();
        if registry.aborted {
            drop(registry);
            callback();
            return AbortListener {
                gate: Arc::downgrade(&self.inner),
                id: None,
            };
        }

        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.listeners.insert(id, Box::new(callback));
        AbortListener {
            gate: Arc::downgrade(&self.inner),
            id: Some(id),
        }
    }

    /// Resolve once the gate is aborted.
    pub async fn aborted(&self) {
        self.inner.token.cancelled().await;
    }

    /// Race `fut` against the gate. Cancellation is polled first, so it wins
    /// when both are ready; the losing future is dropped.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::{Aborted, CancellationGate};
    ///
    /// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
    /// let gate = CancellationGate::new();
    /// assert_eq!(gate.guard(async { 7 }).await, Ok(7));
    /// gate.abort();
    /// assert_eq!(gate.guard(async { 7 }).await, Err(Aborted));
    /// # });
    /// ```
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output, Aborted>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            () = self.inner.token.cancelled() => Err(Aborted),
            output = fut => Ok(output),
        }
    }

    /// Return a guard that aborts this gate when dropped.
    ///
    /// Holding the guard inside a request future ties the gate to that
    /// future's lifetime, so a dropped connection aborts the request.
    #[must_use = "the gate aborts as soon as the guard is dropped"]
    pub fn abort_on_drop(&self) -> AbortOnDrop {
        AbortOnDrop {
            gate: Some(self.clone()),
        }
    }
}

impl Default for CancellationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationGate")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// Registration handle returned by [`CancellationGate::on_abort`].
#[derive(Debug)]
#[must_use = "dropping the listener deregisters the callback"]
pub struct AbortListener {
    gate: std::sync::Weak<GateInner>,
    id: Option<u64>,
}

impl AbortListener {
    /// Keep the callback registered for the gate's lifetime.
    pub fn detach(mut self) {
        self.id = None;
    }
}

impl Drop for AbortListener {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        let Some(inner) = self.gate.upgrade() else {
            return;
        };
        let removed = inner.registry().listeners.remove(&id);
        drop(removed);
    }
}

/// Aborts the owning gate on drop unless disarmed.
#[derive(Debug)]
pub struct AbortOnDrop {
    gate: Option<CancellationGate>,
}

impl AbortOnDrop {
    /// Disarm the guard after the request completed normally.
    pub fn disarm(mut self) {
        self.gate = None;
    }
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if let Some(gate) = self.gate.take() {
            gate.abort();
        }
    }
}
