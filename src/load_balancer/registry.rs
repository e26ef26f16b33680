//! Rule registry.
//!
//! Maps rule identifiers to constructors. Built-in rules are registered by
//! `with_builtins`; applications add their own with `register` before the
//! orchestrator is initialized.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{LbError, LbResult};
use crate::load_balancer::{
    random::{Random, WeightedRandom},
    round_robin::RoundRobin,
    Rule,
};

pub const ROUND_ROBIN: &str = "round_robin";
pub const RANDOM: &str = "random";
pub const WEIGHTED_RANDOM: &str = "weighted_random";

/// Constructor for a fresh rule instance.
pub type RuleFactory = Arc<dyn Fn() -> Box<dyn Rule> + Send + Sync>;

#[derive(Clone, Default)]
pub struct RuleRegistry {
    factories: HashMap<String, RuleFactory>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `round_robin`, `random` and `weighted_random`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(ROUND_ROBIN, || Box::new(RoundRobin::new()));
        registry.register(RANDOM, || Box::new(Random::new()));
        registry.register(WEIGHTED_RANDOM, || Box::new(WeightedRandom::new()));
        registry
    }

    /// Register (or replace) a rule constructor.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Rule> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn resolve(&self, id: &str) -> LbResult<RuleFactory> {
        self.factories
            .get(id)
            .cloned()
            .ok_or_else(|| LbError::UnknownRule(id.to_string()))
    }

    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.identifiers())
            .finish()
    }
}
