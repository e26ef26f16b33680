//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Discovery reports (orchestrator rebuild):
//!     node status → state.rs (overwrite)
//!
//! Active probing (active.rs):
//!     Periodic timer (owned by the orchestrator)
//!     → Collect non-passing endpoints of every pool
//!     → Probe each concurrently
//!     → Success: state.rs → Passing; failure: nothing
//! ```
//!
//! # Design Decisions
//! - Probing only promotes; demotion comes from discovery alone
//! - Probe failures are swallowed, never reported to callers
//! - Health state is per endpoint identity, not per pool

pub mod active;
pub mod state;

pub use active::{HealthProbe, HttpProbe};
pub use state::{HealthCell, HealthState};
