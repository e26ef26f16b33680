//! Random selection rules.

use rand::Rng;
use std::sync::Arc;

use crate::health::state::HealthState;
use crate::load_balancer::{endpoint::Endpoint, Rule};

/// Uniform random selector. Health is not considered.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl Rule for Random {
    fn choose(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..endpoints.len());
        Some(endpoints[index].clone())
    }
}

/// Weighted random selector.
///
/// Each endpoint weighs `weights.passing` while Passing, `weights.warning`
/// while Warning and nothing while Critical, so critical endpoints are only
/// picked when every endpoint weighs zero (then the choice is uniform).
#[derive(Debug, Default)]
pub struct WeightedRandom;

impl WeightedRandom {
    pub fn new() -> Self {
        Self
    }

    fn weight(endpoint: &Endpoint) -> u64 {
        let weights = endpoint.weights();
        match endpoint.status() {
            HealthState::Passing => weights.passing as u64,
            HealthState::Warning => weights.warning as u64,
            HealthState::Critical => 0,
        }
    }
}

impl Rule for WeightedRandom {
    fn choose(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }

        // Status may change between the two passes; read it once.
        let weights: Vec<u64> = endpoints.iter().map(|e| Self::weight(e)).collect();
        let total: u64 = weights.iter().sum();

        let mut rng = rand::thread_rng();
        if total == 0 {
            return Some(endpoints[rng.gen_range(0..endpoints.len())].clone());
        }

        let mut point = rng.gen_range(0..total);
        for (endpoint, weight) in endpoints.iter().zip(weights) {
            if point < weight {
                return Some(endpoint.clone());
            }
            point -= weight;
        }
        endpoints.last().cloned()
    }
}
