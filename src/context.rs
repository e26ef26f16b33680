//! Shared application context.
//!
//! Holds the orchestrator slot that RPC proxies read on every call. Components
//! that need to react when an orchestrator becomes available register a
//! [`ContextObserver`].

use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex};

use crate::load_balancer::Orchestrator;

pub trait ContextObserver: Send + Sync {
    fn on_orchestrator(&self, orchestrator: &Arc<Orchestrator>);
}

#[derive(Default)]
pub struct Context {
    orchestrator: ArcSwapOption<Orchestrator>,
    observers: Mutex<Vec<Arc<dyn ContextObserver>>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with an orchestrator already installed.
    pub fn with_orchestrator(orchestrator: Arc<Orchestrator>) -> Self {
        let context = Self::new();
        context.orchestrator.store(Some(orchestrator));
        context
    }

    /// The installed orchestrator, if any.
    pub fn orchestrator(&self) -> Option<Arc<Orchestrator>> {
        self.orchestrator.load_full()
    }

    /// Install an orchestrator and notify observers. Returns the one it replaced.
    pub fn set_orchestrator(&self, orchestrator: Arc<Orchestrator>) -> Option<Arc<Orchestrator>> {
        let previous = self.orchestrator.swap(Some(Arc::clone(&orchestrator)));
        tracing::info!(replaced = previous.is_some(), "Orchestrator installed");

        // Notify outside the lock so observers may register further observers
        let observers = self.observers().clone();
        for observer in observers {
            observer.on_orchestrator(&orchestrator);
        }
        previous
    }

    /// Register an observer. It is called at once if an orchestrator is installed.
    pub fn observe(&self, observer: Arc<dyn ContextObserver>) {
        self.observers().push(Arc::clone(&observer));
        if let Some(orchestrator) = self.orchestrator() {
            observer.on_orchestrator(&orchestrator);
        }
    }

    /// Remove the orchestrator and stop its background tasks.
    pub fn clear(&self) -> Option<Arc<Orchestrator>> {
        let previous = self.orchestrator.swap(None);
        if let Some(orchestrator) = &previous {
            orchestrator.shutdown();
        }
        previous
    }

    fn observers(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn ContextObserver>>> {
        self.observers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("orchestrator", &self.orchestrator.load().is_some())
            .field("observers", &self.observers().len())
            .finish()
    }
}
