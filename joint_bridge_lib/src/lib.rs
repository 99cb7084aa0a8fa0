//! # Joint Bridge Library
//!
//! Shared types and plumbing for feeding externally published joint targets
//! into a simulated articulated robot. Used by the `sim_listener` and
//! `joint_publisher` nodes.

pub mod bridge;
pub mod broker;
pub mod sim;
pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use bridge::*;
pub use broker::*;
pub use sim::*;
pub use types::*;
pub use utils::*;
