/// Simulation Listener
/// Subscribes to the joint feed and drives the simulated robot every tick

use eyre::Result;
use joint_bridge_lib::{
    init_tracing, install_ctrl_c_handler, BridgeConfig, BridgeLoop, MockSimulation, RunningFlag,
    SimBackend, SimulationHost, UrdfVizHost, ZenohSource,
};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    init_tracing();

    tracing::info!("Starting Simulation Listener");

    let config = BridgeConfig::from_env()?;
    config.validate()?;

    tracing::info!("Broker: {} (mode {})", config.broker.endpoint(), config.broker.mode);
    tracing::info!("Channel: {}", config.broker.channel);
    tracing::info!("Robot: {} at {}", config.robot.name, config.robot.prim_path);

    // Async work (zenoh, HTTP, Ctrl-C) runs here; the tick loop stays on
    // this thread
    let runtime = Runtime::new()?;
    let running = install_ctrl_c_handler(runtime.handle());

    match config.simulation.backend {
        SimBackend::UrdfViz => {
            let host = UrdfVizHost::new(&config.simulation, runtime.handle().clone(), running)?;
            run_bridge(&config, host, &runtime)
        }
        SimBackend::Mock => {
            tracing::info!(
                "Using mock simulation with a {} DOF robot",
                config.simulation.mock_dof
            );
            let host = mock_host(&config, running)?;
            run_bridge(&config, host, &runtime)
        }
    }
}

fn mock_host(config: &BridgeConfig, running: RunningFlag) -> Result<MockSimulation> {
    Ok(MockSimulation::new()
        .with_articulation(&config.robot.prim_path, config.simulation.mock_dof)
        .with_tick_rate(config.simulation.tick_rate_hz)?
        .with_running_flag(running))
}

fn run_bridge<H: SimulationHost>(
    config: &BridgeConfig,
    host: H,
    runtime: &Runtime,
) -> Result<()> {
    let mut bridge = BridgeLoop::setup(config, host, |broker| {
        runtime.block_on(ZenohSource::connect(broker))
    })?;

    if config.diagnostics.log_dropped_messages {
        bridge.set_diagnostics(|reason| tracing::debug!("Dropped joint message: {}", reason));
    }

    tracing::info!("Entering tick loop...");
    let ticks = bridge.run()?;

    tracing::info!("Simulation listener shutting down after {} ticks", ticks);
    Ok(())
}
