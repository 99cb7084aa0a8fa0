//! Capability interfaces for the simulation host and its robots.
//!
//! The bridge loop only ever talks to these traits, so it can run against
//! a urdf-viz viewer, the in-process mock, or any other host that can step
//! a scene and accept joint targets.

pub mod mock;
pub mod urdf_viz;

pub use mock::*;
pub use urdf_viz::*;

use eyre::Result;

/// The application that owns the scene and its render/physics loop.
pub trait SimulationHost {
    type Robot: RobotHandle;

    /// False once the host has been asked to stop or has been closed.
    fn is_running(&self) -> bool;

    fn add_default_ground_plane(&mut self) -> Result<()>;

    /// Scene-graph lookup by path.
    fn entity_exists(&self, path: &str) -> bool;

    /// Wrap the articulation at `path` in a handle and add it to the scene.
    fn add_robot(&mut self, path: &str, name: &str) -> Result<Self::Robot>;

    /// Restore the scene to its initial state.
    fn reset(&mut self) -> Result<()>;

    /// Advance the scene by one tick, optionally rendering it.
    fn step(&mut self, render: bool) -> Result<()>;

    /// Shut the host down. Idempotent.
    fn close(&mut self);
}

/// Non-owning reference to an articulated robot inside a host's scene.
pub trait RobotHandle {
    /// Attach the handle to the live simulation entity. Must be called
    /// after the host has been reset and before any target is submitted.
    fn initialize(&mut self) -> Result<()>;

    /// Number of actuated joints, or 0 while uninitialized.
    fn num_dof(&self) -> usize;

    /// Submit a new joint-position target.
    fn set_joint_positions(&mut self, positions: &[f32]) -> Result<()>;
}
