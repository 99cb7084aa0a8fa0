use super::{RobotHandle, SimulationHost};
use crate::utils::{RunningFlag, TickPacer};
use eyre::Result;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
struct MockEntity {
    dof: usize,
    initial_positions: Vec<f32>,
    positions: Vec<f32>,
    initialized: bool,
    set_calls: usize,
    reject_targets: bool,
}

#[derive(Debug, Default)]
struct MockWorld {
    entities: BTreeMap<String, MockEntity>,
    /// (name, path) of every robot added to the scene
    scene: Vec<(String, String)>,
    ground_plane: bool,
    steps: u64,
    renders: u64,
    resets: u64,
    closed: bool,
}

/// In-process kinematic scene.
///
/// Joint targets are applied instantly, the way a teleporting
/// `set_joint_positions` behaves in a physics host. Clones share the same
/// world, so a test can keep one clone to observe what the bridge did with
/// the other.
#[derive(Debug, Clone)]
pub struct MockSimulation {
    world: Rc<RefCell<MockWorld>>,
    running: RunningFlag,
    max_ticks: Option<u64>,
    pacer: Option<TickPacer>,
}

impl MockSimulation {
    pub fn new() -> Self {
        Self {
            world: Rc::new(RefCell::new(MockWorld::default())),
            running: RunningFlag::new(),
            max_ticks: None,
            pacer: None,
        }
    }

    /// Place an articulation with `dof` joints, all at zero, at `path`.
    pub fn with_articulation(self, path: &str, dof: usize) -> Self {
        self.with_articulation_at(path, vec![0.0; dof])
    }

    /// Place an articulation at `path` starting from `initial_positions`.
    pub fn with_articulation_at(self, path: &str, initial_positions: Vec<f32>) -> Self {
        self.world.borrow_mut().entities.insert(
            path.to_string(),
            MockEntity {
                dof: initial_positions.len(),
                positions: initial_positions.clone(),
                initial_positions,
                initialized: false,
                set_calls: 0,
                reject_targets: false,
            },
        );
        self
    }

    /// Report not-running once `max_ticks` steps have been taken.
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn with_running_flag(mut self, running: RunningFlag) -> Self {
        self.running = running;
        self
    }

    /// Pace `step` to wall-clock time instead of running flat out.
    pub fn with_tick_rate(mut self, rate_hz: f64) -> Result<Self> {
        self.pacer = Some(TickPacer::new(rate_hz)?);
        Ok(self)
    }

    pub fn stop(&self) {
        self.running.stop();
    }

    /// Make the host refuse every target submitted for `path`.
    pub fn reject_targets(&self, path: &str, reject: bool) {
        if let Some(entity) = self.world.borrow_mut().entities.get_mut(path) {
            entity.reject_targets = reject;
        }
    }

    pub fn steps(&self) -> u64 {
        self.world.borrow().steps
    }

    pub fn renders(&self) -> u64 {
        self.world.borrow().renders
    }

    pub fn resets(&self) -> u64 {
        self.world.borrow().resets
    }

    pub fn has_ground_plane(&self) -> bool {
        self.world.borrow().ground_plane
    }

    pub fn is_closed(&self) -> bool {
        self.world.borrow().closed
    }

    /// Names of the robots added to the scene, in insertion order.
    pub fn scene_robots(&self) -> Vec<String> {
        self.world
            .borrow()
            .scene
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn joint_positions(&self, path: &str) -> Option<Vec<f32>> {
        self.world
            .borrow()
            .entities
            .get(path)
            .map(|e| e.positions.clone())
    }

    /// How many targets have been accepted for `path`.
    pub fn set_calls(&self, path: &str) -> usize {
        self.world
            .borrow()
            .entities
            .get(path)
            .map_or(0, |e| e.set_calls)
    }
}

impl Default for MockSimulation {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationHost for MockSimulation {
    type Robot = MockArticulation;

    fn is_running(&self) -> bool {
        let world = self.world.borrow();
        let under_limit = self.max_ticks.map_or(true, |max| world.steps < max);
        !world.closed && self.running.is_running() && under_limit
    }

    fn add_default_ground_plane(&mut self) -> Result<()> {
        self.world.borrow_mut().ground_plane = true;
        Ok(())
    }

    fn entity_exists(&self, path: &str) -> bool {
        self.world.borrow().entities.contains_key(path)
    }

    fn add_robot(&mut self, path: &str, name: &str) -> Result<MockArticulation> {
        let mut world = self.world.borrow_mut();
        if !world.entities.contains_key(path) {
            return Err(eyre::eyre!("No articulation at {}", path));
        }
        if world.scene.iter().any(|(existing, _)| existing == name) {
            return Err(eyre::eyre!("Scene already holds an object named {}", name));
        }
        world.scene.push((name.to_string(), path.to_string()));

        Ok(MockArticulation {
            path: path.to_string(),
            name: name.to_string(),
            world: Rc::clone(&self.world),
            dof: 0,
        })
    }

    fn reset(&mut self) -> Result<()> {
        let mut world = self.world.borrow_mut();
        if world.closed {
            return Err(eyre::eyre!("Simulation is closed"));
        }
        for entity in world.entities.values_mut() {
            entity.positions = entity.initial_positions.clone();
        }
        world.steps = 0;
        world.resets += 1;
        drop(world);

        if let Some(pacer) = self.pacer.as_mut() {
            pacer.reset();
        }
        Ok(())
    }

    fn step(&mut self, render: bool) -> Result<()> {
        {
            let mut world = self.world.borrow_mut();
            if world.closed {
                return Err(eyre::eyre!("Simulation is closed"));
            }
            world.steps += 1;
            if render {
                world.renders += 1;
            }
        }

        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait();
        }
        Ok(())
    }

    fn close(&mut self) {
        self.world.borrow_mut().closed = true;
    }
}

/// Handle to an articulation in a [`MockSimulation`].
#[derive(Debug)]
pub struct MockArticulation {
    path: String,
    name: String,
    world: Rc<RefCell<MockWorld>>,
    dof: usize,
}

impl MockArticulation {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl RobotHandle for MockArticulation {
    fn initialize(&mut self) -> Result<()> {
        let mut world = self.world.borrow_mut();
        let entity = world
            .entities
            .get_mut(&self.path)
            .ok_or_else(|| eyre::eyre!("Articulation {} disappeared from the scene", self.path))?;
        entity.initialized = true;
        self.dof = entity.dof;
        Ok(())
    }

    fn num_dof(&self) -> usize {
        self.dof
    }

    fn set_joint_positions(&mut self, positions: &[f32]) -> Result<()> {
        if self.dof == 0 {
            return Err(eyre::eyre!("Articulation {} is not initialized", self.name));
        }
        if positions.len() != self.dof {
            return Err(eyre::eyre!(
                "Expected {} joint positions for {}, got {}",
                self.dof,
                self.name,
                positions.len()
            ));
        }

        let mut world = self.world.borrow_mut();
        let entity = world
            .entities
            .get_mut(&self.path)
            .ok_or_else(|| eyre::eyre!("Articulation {} disappeared from the scene", self.path))?;
        if entity.reject_targets {
            return Err(eyre::eyre!("Articulation {} refused the target", self.name));
        }
        entity.positions = positions.to_vec();
        entity.set_calls += 1;
        Ok(())
    }
}
