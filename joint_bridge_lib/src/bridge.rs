//! The tick loop that carries joint targets from the feed into the scene.
//!
//! Setup is all-or-nothing: any failure closes the simulation host and is
//! returned as a [`BridgeError`]. Once running, a payload that cannot be
//! decoded or applied is dropped and the loop carries on; the optional
//! diagnostic hook is the only place such drops become visible.

use crate::broker::MessageSource;
use crate::sim::{RobotHandle, SimulationHost};
use crate::types::{BridgeConfig, BrokerConfig, DropReason, JointCommand, MessageKind};
use tracing::{error, info};

/// Fatal bridge failure. The host has already been closed when one of
/// these is returned.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("robot not found at '{path}'")]
    RobotNotFound { path: String },

    #[error("broker error: {0}")]
    Broker(eyre::Report),

    #[error("simulation error: {0}")]
    Simulation(eyre::Report),
}

/// What a single tick did after stepping the simulation.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing was pending
    Idle,
    /// A non-payload event was fetched and ignored
    Skipped(MessageKind),
    /// The command was submitted as the robot's new target
    Applied(JointCommand),
    /// A payload was fetched but not applied
    Dropped,
}

type DiagnosticHook = Box<dyn FnMut(&DropReason)>;

pub struct BridgeLoop<H: SimulationHost, S: MessageSource> {
    host: H,
    robot: H::Robot,
    source: S,
    render: bool,
    ticks: u64,
    diagnostics: Option<DiagnosticHook>,
}

impl<H: SimulationHost, S: MessageSource> BridgeLoop<H, S> {
    /// Prepare the scene and open the subscription.
    ///
    /// `connect` is called once with the broker settings, after the robot
    /// has been added to the scene and before the world is reset.
    pub fn setup<F>(config: &BridgeConfig, mut host: H, connect: F) -> Result<Self, BridgeError>
    where
        F: FnOnce(&BrokerConfig) -> eyre::Result<S>,
    {
        if let Err(e) = host.add_default_ground_plane() {
            return Err(Self::abort(&mut host, BridgeError::Simulation(e)));
        }

        let path = config.robot.prim_path.as_str();
        if !host.entity_exists(path) {
            error!("Robot not found at '{}'", path);
            let err = BridgeError::RobotNotFound {
                path: path.to_string(),
            };
            return Err(Self::abort(&mut host, err));
        }

        let mut robot = match host.add_robot(path, &config.robot.name) {
            Ok(robot) => robot,
            Err(e) => return Err(Self::abort(&mut host, BridgeError::Simulation(e))),
        };

        let source = match connect(&config.broker) {
            Ok(source) => source,
            Err(e) => {
                error!("Broker connection error: {}", e);
                return Err(Self::abort(&mut host, BridgeError::Broker(e)));
            }
        };
        info!("Connected to broker. Listening on '{}'", source.channel());

        if let Err(e) = host.reset().and_then(|_| robot.initialize()) {
            error!("Failed to initialize {}: {}", config.robot.name, e);
            return Err(Self::abort(&mut host, BridgeError::Simulation(e)));
        }
        info!(
            "Simulation started: {} has {} DOF",
            config.robot.name,
            robot.num_dof()
        );

        Ok(Self {
            host,
            robot,
            source,
            render: config.simulation.render,
            ticks: 0,
            diagnostics: None,
        })
    }

    fn abort(host: &mut H, err: BridgeError) -> BridgeError {
        host.close();
        err
    }

    /// Observe every dropped payload. Without a hook drops are silent.
    pub fn set_diagnostics<F>(&mut self, hook: F)
    where
        F: FnMut(&DropReason) + 'static,
    {
        self.diagnostics = Some(Box::new(hook));
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn robot(&self) -> &H::Robot {
        &self.robot
    }

    /// Step the simulation once, then handle at most one pending message.
    pub fn tick(&mut self) -> Result<TickOutcome, BridgeError> {
        self.host.step(self.render).map_err(BridgeError::Simulation)?;
        self.ticks += 1;

        let message = match self.source.get_message(true).map_err(BridgeError::Broker)? {
            Some(message) => message,
            None => return Ok(TickOutcome::Idle),
        };
        if !message.kind.is_payload() {
            return Ok(TickOutcome::Skipped(message.kind));
        }

        match self.apply(&message.data) {
            Ok(command) => Ok(TickOutcome::Applied(command)),
            Err(reason) => {
                if let Some(hook) = self.diagnostics.as_mut() {
                    hook(&reason);
                }
                Ok(TickOutcome::Dropped)
            }
        }
    }

    fn apply(&mut self, payload: &[u8]) -> Result<JointCommand, DropReason> {
        let command = JointCommand::decode(payload, self.robot.num_dof())?;
        self.robot
            .set_joint_positions(&command.to_f32())
            .map_err(|e| DropReason::Actuation(e.to_string()))?;
        Ok(command)
    }

    /// Tick until the host stops running, then close it. Returns the number
    /// of ticks taken.
    pub fn run(mut self) -> Result<u64, BridgeError> {
        while self.host.is_running() {
            if let Err(e) = self.tick() {
                error!("Bridge loop stopped after {} ticks: {}", self.ticks, e);
                self.host.close();
                return Err(e);
            }
        }

        self.host.close();
        Ok(self.ticks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{ChannelPublisher, ChannelSource};
    use crate::sim::MockSimulation;
    use crate::types::BrokerMessage;
    use std::cell::RefCell;
    use std::rc::Rc;

    const PATH: &str = "/World/fairino5_v6_robot";
    const SIX_DOF: &[u8] = br#"{"Joints": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]}"#;

    fn test_config() -> BridgeConfig {
        BridgeConfig::default()
    }

    fn start(sim: MockSimulation) -> (BridgeLoop<MockSimulation, ChannelSource>, ChannelPublisher) {
        let config = test_config();
        let (publisher, source) = ChannelSource::subscribe(&config.broker.channel);
        let bridge = BridgeLoop::setup(&config, sim, move |_| Ok(source)).unwrap();
        (bridge, publisher)
    }

    #[test]
    fn test_setup_prepares_scene() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (bridge, _publisher) = start(sim.clone());

        assert!(sim.has_ground_plane());
        assert_eq!(sim.scene_robots(), vec!["fr5_cobot".to_string()]);
        assert_eq!(sim.resets(), 1);
        assert_eq!(bridge.robot().num_dof(), 6);
        assert_eq!(bridge.ticks(), 0);
        assert!(!sim.is_closed());
    }

    #[test]
    fn test_valid_payload_sets_exact_target() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());
        publisher.publish(SIX_DOF);

        // First tick swallows the subscribe acknowledgement
        assert_eq!(bridge.tick().unwrap(), TickOutcome::Idle);
        let outcome = bridge.tick().unwrap();

        assert_eq!(
            outcome,
            TickOutcome::Applied(JointCommand::new(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]))
        );
        assert_eq!(
            sim.joint_positions(PATH),
            Some(vec![0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6])
        );
    }

    #[test]
    fn test_numeric_string_joints_are_applied() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        publisher.publish(&br#"{"Joints": ["0.1", "0.2", "0.3", "0.4", "0.5", "0.6"]}"#[..]);
        assert!(matches!(bridge.tick().unwrap(), TickOutcome::Applied(_)));
        assert_eq!(
            sim.joint_positions(PATH),
            Some(vec![0.1f32, 0.2, 0.3, 0.4, 0.5, 0.6])
        );
    }

    #[test]
    fn test_length_mismatch_leaves_target() {
        let sim = MockSimulation::new().with_articulation_at(PATH, vec![0.5; 6]);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        for payload in [
            &br#"{"Joints": [0.1, 0.2, 0.3, 0.4, 0.5]}"#[..],
            &br#"{"Joints": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7]}"#[..],
            &br#"{"Joints": []}"#[..],
        ] {
            publisher.publish(payload);
            assert_eq!(bridge.tick().unwrap(), TickOutcome::Dropped);
            assert_eq!(sim.joint_positions(PATH), Some(vec![0.5; 6]));
        }
        assert_eq!(sim.set_calls(PATH), 0);
    }

    #[test]
    fn test_malformed_payloads_never_escape_tick() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        for payload in [
            &b"not json"[..],
            &b"{\"Joints\": [0.1,"[..],
            &[0xc3, 0x28][..],
            &b"[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]"[..],
            &br#"{"Joints": [0.1, 0.2, "x", 0.4, 0.5, 0.6]}"#[..],
            &br#"{"Angles": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6]}"#[..],
        ] {
            publisher.publish(payload);
            assert_eq!(bridge.tick().unwrap(), TickOutcome::Dropped);
        }

        assert_eq!(sim.joint_positions(PATH), Some(vec![0.0; 6]));
        assert_eq!(sim.steps(), 7);
    }

    #[test]
    fn test_control_events_never_reach_decoder() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());

        let reasons = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&reasons);
        bridge.set_diagnostics(move |reason| seen.borrow_mut().push(reason.to_string()));

        publisher.send(BrokerMessage::unsubscribed("isaac_feed"));
        publisher.send(BrokerMessage {
            kind: MessageKind::Delete,
            channel: "isaac_feed".to_string(),
            data: SIX_DOF.to_vec(),
        });

        // Subscribe and unsubscribe acks are filtered at the source
        assert_eq!(bridge.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(bridge.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(
            bridge.tick().unwrap(),
            TickOutcome::Skipped(MessageKind::Delete)
        );

        assert!(reasons.borrow().is_empty());
        assert_eq!(sim.set_calls(PATH), 0);
    }

    #[test]
    fn test_idle_tick_still_steps_once() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, _publisher) = start(sim.clone());

        for expected in 1..=3 {
            assert_eq!(bridge.tick().unwrap(), TickOutcome::Idle);
            assert_eq!(sim.steps(), expected);
            assert_eq!(sim.renders(), expected);
        }
        assert_eq!(bridge.ticks(), 3);
    }

    #[test]
    fn test_one_message_per_tick() {
        let sim = MockSimulation::new().with_articulation(PATH, 1);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        publisher.publish(&br#"{"Joints": [1.0]}"#[..]);
        publisher.publish(&br#"{"Joints": [2.0]}"#[..]);
        publisher.publish(&br#"{"Joints": [3.0]}"#[..]);

        bridge.tick().unwrap();
        assert_eq!(sim.joint_positions(PATH), Some(vec![1.0]));
        bridge.tick().unwrap();
        assert_eq!(sim.joint_positions(PATH), Some(vec![2.0]));
        bridge.tick().unwrap();
        assert_eq!(sim.joint_positions(PATH), Some(vec![3.0]));
    }

    #[test]
    fn test_redelivery_is_idempotent() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        publisher.publish(SIX_DOF);
        publisher.publish(SIX_DOF);
        bridge.tick().unwrap();
        let first = sim.joint_positions(PATH);
        bridge.tick().unwrap();

        assert_eq!(sim.joint_positions(PATH), first);
        assert_eq!(sim.set_calls(PATH), 2);
    }

    #[test]
    fn test_missing_robot_aborts_before_loop() {
        let sim = MockSimulation::new().with_articulation("/World/other_robot", 6);
        let config = test_config();
        let connected = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&connected);

        let result = BridgeLoop::setup(&config, sim.clone(), move |broker| {
            *flag.borrow_mut() = true;
            Ok(ChannelSource::subscribe(&broker.channel).1)
        });

        match result {
            Err(BridgeError::RobotNotFound { path }) => assert_eq!(path, PATH),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("setup should fail without a robot"),
        }
        assert!(sim.is_closed());
        assert_eq!(sim.steps(), 0);
        assert!(!*connected.borrow());
    }

    #[test]
    fn test_broker_failure_aborts_setup() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let result = BridgeLoop::<MockSimulation, ChannelSource>::setup(
            &test_config(),
            sim.clone(),
            |broker| Err(eyre::eyre!("connection refused to {}", broker.endpoint())),
        );

        assert!(matches!(result, Err(BridgeError::Broker(_))));
        assert!(sim.is_closed());
        assert_eq!(sim.resets(), 0);
    }

    #[test]
    fn test_run_until_host_stops() {
        let sim = MockSimulation::new()
            .with_articulation(PATH, 6)
            .with_max_ticks(5);
        let (bridge, publisher) = start(sim.clone());
        publisher.publish(SIX_DOF);

        let ticks = bridge.run().unwrap();
        assert_eq!(ticks, 5);
        assert!(sim.is_closed());
        assert_eq!(sim.set_calls(PATH), 1);
    }

    #[test]
    fn test_actuation_failure_is_dropped() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        let reasons = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&reasons);
        bridge.set_diagnostics(move |reason| {
            seen.borrow_mut()
                .push(matches!(reason, DropReason::Actuation(_)))
        });

        sim.reject_targets(PATH, true);
        publisher.publish(SIX_DOF);
        assert_eq!(bridge.tick().unwrap(), TickOutcome::Dropped);
        assert_eq!(*reasons.borrow(), vec![true]);
    }

    #[test]
    fn test_diagnostic_hook_sees_drop_reason() {
        let sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, publisher) = start(sim.clone());
        bridge.tick().unwrap();

        let reasons = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&reasons);
        bridge.set_diagnostics(move |reason| seen.borrow_mut().push(reason.to_string()));

        publisher.publish(&br#"{"Joints": [0.1, 0.2]}"#[..]);
        bridge.tick().unwrap();

        assert_eq!(
            *reasons.borrow(),
            vec!["expected 6 joint positions, got 2".to_string()]
        );
    }

    #[test]
    fn test_step_failure_is_fatal() {
        let mut sim = MockSimulation::new().with_articulation(PATH, 6);
        let (mut bridge, _publisher) = start(sim.clone());
        sim.close();

        assert!(matches!(bridge.tick(), Err(BridgeError::Simulation(_))));
        assert_eq!(bridge.ticks(), 0);
    }
}
