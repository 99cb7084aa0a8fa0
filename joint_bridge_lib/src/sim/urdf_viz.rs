use super::{RobotHandle, SimulationHost};
use crate::types::SimulationConfig;
use crate::utils::{RunningFlag, TickPacer};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::runtime::Handle;

/// Joint names and positions as exchanged with urdf-viz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointNamesAndPositions {
    pub names: Vec<String>,
    pub positions: Vec<f32>,
}

// urdf-viz response structure
#[derive(Deserialize, Debug)]
struct UrdfVizResponse {
    pub is_ok: bool,
    pub reason: String,
}

/// Blocking client for the urdf-viz web API.
///
/// Requests run on the given tokio runtime. Call it from a plain thread,
/// never from inside an async task.
#[derive(Debug, Clone)]
pub struct UrdfVizClient {
    url: String,
    client: reqwest::Client,
    runtime: Handle,
}

impl UrdfVizClient {
    pub fn new(url: &str, timeout: Duration, runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| eyre::eyre!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
            runtime,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn get_joint_positions(&self) -> Result<JointNamesAndPositions> {
        let endpoint = format!("{}/get_joint_positions", self.url);

        self.runtime.block_on(async {
            let response = self
                .client
                .get(&endpoint)
                .header("Accept", "application/json")
                .send()
                .await?;

            if !response.status().is_success() {
                eyre::bail!("HTTP error: {}", response.status());
            }
            Ok::<_, eyre::Report>(response.json::<JointNamesAndPositions>().await?)
        })
    }

    pub fn set_joint_positions(&self, state: &JointNamesAndPositions) -> Result<()> {
        let endpoint = format!("{}/set_joint_positions", self.url);

        self.runtime.block_on(async {
            let response = self
                .client
                .post(&endpoint)
                .header("Accept", "application/json")
                .header("Content-Type", "application/json")
                .json(state)
                .send()
                .await?;

            if !response.status().is_success() {
                eyre::bail!("HTTP error: {}", response.status());
            }

            let result: UrdfVizResponse = response.json().await?;
            if !result.is_ok {
                eyre::bail!("urdf-viz error: {}", result.reason);
            }
            Ok::<_, eyre::Report>(())
        })
    }
}

/// Simulation host backed by a running urdf-viz viewer.
///
/// The viewer shows exactly one robot and renders on its own, so `step`
/// only paces the loop and `render` has no effect. The configured entity
/// path names the robot for logging; the viewer's robot "exists" when it
/// reports at least one joint.
pub struct UrdfVizHost {
    client: UrdfVizClient,
    pacer: TickPacer,
    running: RunningFlag,
    closed: bool,
}

impl UrdfVizHost {
    pub fn new(config: &SimulationConfig, runtime: Handle, running: RunningFlag) -> Result<Self> {
        let client = UrdfVizClient::new(
            &config.urdf_viz_url,
            Duration::from_millis(config.request_timeout_ms),
            runtime,
        )?;

        tracing::info!("Connecting to urdf-viz at {}", client.url());

        Ok(Self {
            client,
            pacer: TickPacer::new(config.tick_rate_hz)?,
            running,
            closed: false,
        })
    }
}

impl SimulationHost for UrdfVizHost {
    type Robot = UrdfVizRobot;

    fn is_running(&self) -> bool {
        !self.closed && self.running.is_running()
    }

    fn add_default_ground_plane(&mut self) -> Result<()> {
        // urdf-viz always draws its own floor grid
        Ok(())
    }

    fn entity_exists(&self, path: &str) -> bool {
        match self.client.get_joint_positions() {
            Ok(state) => !state.names.is_empty(),
            Err(e) => {
                tracing::debug!("urdf-viz lookup for {} failed: {}", path, e);
                false
            }
        }
    }

    fn add_robot(&mut self, path: &str, name: &str) -> Result<UrdfVizRobot> {
        Ok(UrdfVizRobot {
            path: path.to_string(),
            name: name.to_string(),
            client: self.client.clone(),
            joint_names: Vec::new(),
        })
    }

    fn reset(&mut self) -> Result<()> {
        self.pacer.reset();
        Ok(())
    }

    fn step(&mut self, _render: bool) -> Result<()> {
        if self.closed {
            eyre::bail!("urdf-viz host is closed");
        }
        self.pacer.wait();
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            tracing::info!("Releasing urdf-viz at {}", self.client.url());
        }
        self.closed = true;
    }
}

/// The single robot shown by a urdf-viz viewer.
pub struct UrdfVizRobot {
    path: String,
    name: String,
    client: UrdfVizClient,
    joint_names: Vec<String>,
}

impl UrdfVizRobot {
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }
}

impl RobotHandle for UrdfVizRobot {
    fn initialize(&mut self) -> Result<()> {
        let state = self
            .client
            .get_joint_positions()
            .map_err(|e| eyre::eyre!("Failed to read joints of {}: {}", self.path, e))?;

        tracing::info!("{} has {} joints", self.name, state.names.len());
        for (name, position) in state.names.iter().zip(&state.positions) {
            tracing::debug!("{}: {:.3} rad ({:.1}°)", name, position, position.to_degrees());
        }

        self.joint_names = state.names;
        Ok(())
    }

    fn num_dof(&self) -> usize {
        self.joint_names.len()
    }

    fn set_joint_positions(&mut self, positions: &[f32]) -> Result<()> {
        if self.joint_names.is_empty() {
            eyre::bail!("{} is not initialized", self.name);
        }
        if positions.len() != self.joint_names.len() {
            eyre::bail!(
                "Expected {} joint positions for {}, got {}",
                self.joint_names.len(),
                self.name,
                positions.len()
            );
        }

        let state = JointNamesAndPositions {
            names: self.joint_names.clone(),
            positions: positions.to_vec(),
        };
        self.client.set_joint_positions(&state)
    }
}
