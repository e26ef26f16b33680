//! Endpoint health state machine.
//!
//! # States
//! - Passing: endpoint reported or probed healthy
//! - Warning: endpoint degraded according to discovery
//! - Critical: endpoint failing according to discovery
//!
//! # State Transitions
//! ```text
//! Critical/Warning → Passing: successful probe
//! any → reported status:      discovery update for the endpoint
//! failed probe:               no transition
//! ```
//!
//! # Design Decisions
//! - State lives in a shared cell addressed by endpoint identity, so pool
//!   rebuilds hand the same cell to the replacement endpoint
//! - Probing never demotes; only discovery can move a node away from Passing

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Health status of a single endpoint.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Passing = 0,
    Warning = 1,
    Critical = 2,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Passing => "passing",
            HealthState::Warning => "warning",
            HealthState::Critical => "critical",
        }
    }

    /// Gauge value used for metrics: 1 passing, 0.5 warning, 0 critical.
    pub fn as_gauge(&self) -> f64 {
        match self {
            HealthState::Passing => 1.0,
            HealthState::Warning => 0.5,
            HealthState::Critical => 0.0,
        }
    }
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            0 => HealthState::Passing,
            1 => HealthState::Warning,
            _ => HealthState::Critical,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HealthState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "passing" => Ok(HealthState::Passing),
            "warning" => Ok(HealthState::Warning),
            "critical" => Ok(HealthState::Critical),
            other => Err(format!("unknown health status: {}", other)),
        }
    }
}

/// Mutable health slot shared by every `Endpoint` value with the same identity.
#[derive(Debug)]
pub struct HealthCell {
    state: AtomicU8,
}

impl HealthCell {
    pub fn new(state: HealthState) -> Self {
        Self {
            state: AtomicU8::new(state as u8),
        }
    }

    pub fn get(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one.
    pub fn set(&self, state: HealthState) -> HealthState {
        HealthState::from(self.state.swap(state as u8, Ordering::AcqRel))
    }

    /// Apply a successful probe. Returns true if the state changed.
    pub fn probe_succeeded(&self) -> bool {
        self.set(HealthState::Passing) != HealthState::Passing
    }
}
