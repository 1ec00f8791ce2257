//! Lifecycle notification
//!
//! Keeps dependent subsystems (search indexes, UI metadata caches, workflow
//! engines) coherent across registry reloads. A reload cycle runs
//! `Idle -> PreInit -> Swapping -> PostInit -> Idle`; a teardown cycle runs
//! `Idle -> Destroying -> PostDestroy -> Idle`. No listener observes the
//! post-init phase before the swap is fully visible, and a pre-init failure
//! aborts the swap entirely.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{DictionaryError, Result};

/// Listener callback result; failures are isolated per listener
pub type ListenerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A dependent subsystem observing registry lifecycle cycles.
///
/// Callbacks are dispatched in registration order within each phase.
pub trait RegistryListener: Send + Sync {
    /// Stable identifier, used for deregistration and failure reports
    fn id(&self) -> &str;

    /// Before a reload swaps registry state. A failure here aborts the swap.
    fn before_reload(&self) -> ListenerResult {
        Ok(())
    }

    /// After a reload's new state is fully visible. Failures are collected and
    /// reported, not fatal.
    fn after_reload(&self) -> ListenerResult {
        Ok(())
    }

    /// After a teardown's removal is fully visible. Failures are collected and
    /// reported, not fatal.
    fn after_teardown(&self) -> ListenerResult {
        Ok(())
    }
}

/// Explicit cycle phase; transitions are strictly sequential
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Idle = 0,
    PreInit = 1,
    Swapping = 2,
    PostInit = 3,
    Destroying = 4,
    PostDestroy = 5,
}

impl Phase {
    fn from_u8(value: u8) -> Phase {
        match value {
            1 => Phase::PreInit,
            2 => Phase::Swapping,
            3 => Phase::PostInit,
            4 => Phase::Destroying,
            5 => Phase::PostDestroy,
            _ => Phase::Idle,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::PreInit => "pre-init",
            Phase::Swapping => "swapping",
            Phase::PostInit => "post-init",
            Phase::Destroying => "destroying",
            Phase::PostDestroy => "post-destroy",
        };
        write!(f, "{label}")
    }
}

/// One listener's failure in one phase
#[derive(Debug, Clone)]
pub struct ListenerFailure {
    pub listener: String,
    pub phase: Phase,
    pub message: String,
}

impl fmt::Display for ListenerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "listener '{}' failed during {}: {}",
            self.listener, self.phase, self.message
        )
    }
}

/// Phase-tagged dispatch over the ordered listener set
pub struct LifecycleNotifier {
    listeners: RwLock<Vec<Arc<dyn RegistryListener>>>,
    phase: AtomicU8,
}

impl Default for LifecycleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleNotifier {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            phase: AtomicU8::new(Phase::Idle as u8),
        }
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Registration is only permitted while idle.
    ///
    /// The phase check runs under the listeners write lock: a cycle publishes
    /// its phase before snapshotting the listener set, so a registration
    /// cannot slip in between the check and the push.
    pub fn register(&self, listener: Arc<dyn RegistryListener>) -> Result<()> {
        let mut listeners = self.listeners.write();
        if self.phase() != Phase::Idle {
            return Err(DictionaryError::RegistryBusy);
        }
        listeners.push(listener);
        Ok(())
    }

    /// Deregistration is only permitted while idle; returns whether a listener
    /// with that id was present
    pub fn deregister(&self, id: &str) -> Result<bool> {
        let mut listeners = self.listeners.write();
        if self.phase() != Phase::Idle {
            return Err(DictionaryError::RegistryBusy);
        }
        let before = listeners.len();
        listeners.retain(|l| l.id() != id);
        Ok(listeners.len() != before)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Run one full reload cycle around `swap`.
    ///
    /// All pre-init callbacks run even if one fails; any pre-init failure
    /// aborts the cycle before the swap, leaving the registry untouched.
    /// Post-init failures are collected and returned, non-fatal.
    pub fn run_reload(&self, swap: impl FnOnce()) -> Result<Vec<ListenerFailure>> {
        // Phase first, listener snapshot second; see `register`.
        self.set_phase(Phase::PreInit);
        let listeners = self.listeners.read().clone();

        let pre_failures = dispatch(&listeners, Phase::PreInit, |l| l.before_reload());
        if !pre_failures.is_empty() {
            self.set_phase(Phase::Idle);
            return Err(DictionaryError::ReloadAborted {
                failures: pre_failures,
            });
        }

        self.set_phase(Phase::Swapping);
        swap();

        self.set_phase(Phase::PostInit);
        let post_failures = dispatch(&listeners, Phase::PostInit, |l| l.after_reload());
        for failure in &post_failures {
            tracing::warn!(%failure, "post-init listener failure (non-fatal)");
        }

        self.set_phase(Phase::Idle);
        Ok(post_failures)
    }

    /// Run one teardown cycle around `swap`. Post-destroy failures are
    /// collected and returned, non-fatal.
    pub fn run_teardown(&self, swap: impl FnOnce()) -> Result<Vec<ListenerFailure>> {
        self.set_phase(Phase::Destroying);
        let listeners = self.listeners.read().clone();

        swap();

        self.set_phase(Phase::PostDestroy);
        let failures = dispatch(&listeners, Phase::PostDestroy, |l| l.after_teardown());
        for failure in &failures {
            tracing::warn!(%failure, "post-destroy listener failure (non-fatal)");
        }

        self.set_phase(Phase::Idle);
        Ok(failures)
    }
}

fn dispatch(
    listeners: &[Arc<dyn RegistryListener>],
    phase: Phase,
    callback: impl Fn(&Arc<dyn RegistryListener>) -> ListenerResult,
) -> Vec<ListenerFailure> {
    let mut failures = Vec::new();
    for listener in listeners {
        if let Err(error) = callback(listener) {
            failures.push(ListenerFailure {
                listener: listener.id().to_string(),
                phase,
                message: error.to_string(),
            });
        }
    }
    failures
}
