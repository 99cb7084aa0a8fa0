use crate::utils::tick_period;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable naming the TOML configuration file.
pub const CONFIG_PATH_ENV: &str = "BRIDGE_CONFIG";

/// Complete bridge configuration. Every section falls back to its defaults
/// when absent from the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub broker: BrokerConfig,
    pub robot: RobotConfig,
    pub simulation: SimulationConfig,
    pub diagnostics: DiagnosticsConfig,
}

/// Where the joint feed is published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Router host (default "localhost")
    pub host: String,
    /// Router port (default 7447)
    pub port: u16,
    /// Channel carrying the joint targets (default "isaac_feed")
    pub channel: String,
    /// Session mode, "client" or "peer" (default "client")
    pub mode: String,
}

/// Which entity in the scene receives the targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    /// Scene path of the articulation (default "/World/fairino5_v6_robot")
    pub prim_path: String,
    /// Name the robot is registered under (default "fr5_cobot")
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimBackend {
    /// A running urdf-viz viewer, driven over HTTP
    UrdfViz,
    /// In-process kinematic scene
    Mock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub backend: SimBackend,
    pub urdf_viz_url: String,
    pub tick_rate_hz: f64,
    pub render: bool,
    pub request_timeout_ms: u64,
    /// Joint count of the robot the mock backend places at `prim_path`
    pub mock_dof: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Log each dropped payload at debug level (off by default)
    pub log_dropped_messages: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 7447,
            channel: "isaac_feed".to_string(),
            mode: "client".to_string(),
        }
    }
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            prim_path: "/World/fairino5_v6_robot".to_string(),
            name: "fr5_cobot".to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            backend: SimBackend::UrdfViz,
            urdf_viz_url: "http://127.0.0.1:7777".to_string(),
            tick_rate_hz: 60.0,
            render: true,
            request_timeout_ms: 200,
            mock_dof: 6,
        }
    }
}

impl BrokerConfig {
    /// Endpoint in zenoh locator form, e.g. `tcp/localhost:7447`.
    pub fn endpoint(&self) -> String {
        format!("tcp/{}:{}", self.host, self.port)
    }
}

impl BridgeConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from `$BRIDGE_CONFIG` if it points at a file, then apply
    /// environment overrides. A missing file means defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if Path::new(&path).exists() => {
                tracing::info!("Loading bridge config from: {}", path);
                Self::load_from_file(&path)
                    .map_err(|e| eyre::eyre!("Failed to load bridge config from {}: {}", path, e))?
            }
            Ok(path) => {
                tracing::warn!("Config file not found at {}, using defaults", path);
                Self::default()
            }
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override individual fields from `lookup` (normally the process
    /// environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BROKER_HOST") {
            self.broker.host = host;
        }
        if let Some(port) = lookup("BROKER_PORT") {
            self.broker.port = port
                .parse()
                .map_err(|e| eyre::eyre!("Invalid BROKER_PORT '{}': {}", port, e))?;
        }
        if let Some(channel) = lookup("BROKER_CHANNEL") {
            self.broker.channel = channel;
        }
        if let Some(mode) = lookup("ZENOH_MODE") {
            self.broker.mode = mode;
        }
        if let Some(path) = lookup("ROBOT_PRIM_PATH") {
            self.robot.prim_path = path;
        }
        if let Some(name) = lookup("ROBOT_NAME") {
            self.robot.name = name;
        }
        if let Some(backend) = lookup("SIM_BACKEND") {
            self.simulation.backend = match backend.as_str() {
                "urdf_viz" | "urdf-viz" => SimBackend::UrdfViz,
                "mock" => SimBackend::Mock,
                other => return Err(eyre::eyre!("Unknown SIM_BACKEND '{}'", other)),
            };
        }
        if let Some(url) = lookup("URDFVIZ_URL") {
            self.simulation.urdf_viz_url = url;
        }
        if let Some(rate) = lookup("TICK_RATE_HZ") {
            self.simulation.tick_rate_hz = rate
                .parse()
                .map_err(|e| eyre::eyre!("Invalid TICK_RATE_HZ '{}': {}", rate, e))?;
        }
        if let Some(dof) = lookup("MOCK_DOF") {
            self.simulation.mock_dof = dof
                .parse()
                .map_err(|e| eyre::eyre!("Invalid MOCK_DOF '{}': {}", dof, e))?;
        }
        if let Some(flag) = lookup("LOG_DROPPED_MESSAGES") {
            self.diagnostics.log_dropped_messages = matches!(
                flag.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.broker.host.is_empty() {
            return Err(eyre::eyre!("Broker host is empty"));
        }
        if self.broker.port == 0 {
            return Err(eyre::eyre!("Broker port must be non-zero"));
        }
        if self.broker.channel.is_empty() {
            return Err(eyre::eyre!("Broker channel is empty"));
        }
        if !matches!(self.broker.mode.as_str(), "client" | "peer") {
            return Err(eyre::eyre!(
                "Broker mode '{}' must be \"client\" or \"peer\"",
                self.broker.mode
            ));
        }
        if !self.robot.prim_path.starts_with('/') {
            return Err(eyre::eyre!(
                "Robot prim path '{}' must be absolute",
                self.robot.prim_path
            ));
        }

        tick_period(self.simulation.tick_rate_hz)?;
        if self.simulation.backend == SimBackend::Mock && self.simulation.mock_dof == 0 {
            return Err(eyre::eyre!("Mock robot needs at least one joint"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.channel, "isaac_feed");
        assert_eq!(config.robot.prim_path, "/World/fairino5_v6_robot");
        assert_eq!(config.broker.endpoint(), "tcp/localhost:7447");
        assert!(!config.diagnostics.log_dropped_messages);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[broker]
channel = "fr5_targets"
port = 7448

[simulation]
backend = "mock"
mock_dof = 7
"#
        )
        .unwrap();

        let config = BridgeConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.broker.channel, "fr5_targets");
        assert_eq!(config.broker.port, 7448);
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.simulation.backend, SimBackend::Mock);
        assert_eq!(config.simulation.mock_dof, 7);
        assert_eq!(config.robot, RobotConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[broker\nport = ").unwrap();
        assert!(BridgeConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BridgeConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("BROKER_HOST", "10.0.0.5"),
                ("BROKER_PORT", "7500"),
                ("ROBOT_PRIM_PATH", "/World/arm"),
                ("SIM_BACKEND", "mock"),
                ("LOG_DROPPED_MESSAGES", "true"),
            ]))
            .unwrap();

        assert_eq!(config.broker.host, "10.0.0.5");
        assert_eq!(config.broker.port, 7500);
        assert_eq!(config.robot.prim_path, "/World/arm");
        assert_eq!(config.simulation.backend, SimBackend::Mock);
        assert!(config.diagnostics.log_dropped_messages);
        assert_eq!(config.broker.channel, "isaac_feed");
    }

    #[test]
    fn test_env_override_bad_port() {
        let mut config = BridgeConfig::default();
        assert!(config
            .apply_overrides(lookup_from(&[("BROKER_PORT", "redis")]))
            .is_err());
        assert!(config
            .apply_overrides(lookup_from(&[("SIM_BACKEND", "isaac")]))
            .is_err());
    }

    #[test]
    fn test_validate() {
        let mut config = BridgeConfig::default();
        config.robot.prim_path = "World/robot".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.broker.channel.clear();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.simulation.tick_rate_hz = 0.0;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.simulation.tick_rate_hz = 1e-30;
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.simulation.tick_rate_hz = 0.5;
        assert!(config.validate().is_ok());

        let mut config = BridgeConfig::default();
        config.broker.mode = "router".to_string();
        assert!(config.validate().is_err());

        let mut config = BridgeConfig::default();
        config.simulation.backend = SimBackend::Mock;
        config.simulation.mock_dof = 0;
        assert!(config.validate().is_err());
    }
}
