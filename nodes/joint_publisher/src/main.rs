/// Joint Publisher
/// Publishes a sinusoidal joint sweep on the bridge channel for end-to-end testing

use eyre::Result;
use joint_bridge_lib::{init_tracing, tick_period, zenoh_config, BridgeConfig, JointCommand};
use std::f64::consts::PI;
use std::time::Duration;

/// Joint `i` lags joint `i - 1` by this phase
const PHASE_STEP: f64 = PI / 6.0;

fn sweep(joint_count: usize, amplitude: f64, frequency_hz: f64, t: f64) -> JointCommand {
    let joints = (0..joint_count)
        .map(|i| amplitude * (2.0 * PI * frequency_hz * t + i as f64 * PHASE_STEP).sin())
        .collect();
    JointCommand::new(joints)
}

fn publish_period(rate_hz: f64) -> Result<Duration> {
    tick_period(rate_hz).map_err(|e| eyre::eyre!("Invalid PUBLISH_RATE_HZ: {}", e))
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    tracing::info!("Starting Joint Publisher");

    let config = BridgeConfig::from_env()?;
    config.validate()?;

    let rate_hz = env_or("PUBLISH_RATE_HZ", 30.0_f64);
    let joint_count = env_or("JOINT_COUNT", 6_usize);
    let amplitude = env_or("AMPLITUDE", 0.5_f64);
    let frequency_hz = env_or("SWEEP_HZ", 0.2_f64);

    let period = publish_period(rate_hz)?;

    tracing::info!(
        "Sweeping {} joints at {:.2} Hz, amplitude {:.3} rad, publishing at {} Hz",
        joint_count,
        frequency_hz,
        amplitude,
        rate_hz
    );

    let session = zenoh::open(zenoh_config(&config.broker)?)
        .await
        .map_err(|e| {
            eyre::eyre!(
                "Failed to open Zenoh session to {}: {}",
                config.broker.endpoint(),
                e
            )
        })?;
    tracing::info!("Zenoh session ID: {}", session.zid());

    let publisher = session
        .declare_publisher(config.broker.channel.clone())
        .await
        .map_err(|e| eyre::eyre!("Failed to declare publisher {}: {}", config.broker.channel, e))?;
    tracing::info!("Publisher: {}", config.broker.channel);

    let mut interval = tokio::time::interval(period);
    let start = tokio::time::Instant::now();
    let mut sent: u64 = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let t = start.elapsed().as_secs_f64();
                let command = sweep(joint_count, amplitude, frequency_hz, t);
                let bytes = command.encode()?;

                if let Err(e) = publisher.put(bytes).await {
                    tracing::warn!("Failed to publish joint command: {}", e);
                    continue;
                }

                sent += 1;
                if sent % 100 == 0 {
                    tracing::info!("Published {} joint commands", sent);
                }
            }

            _ = &mut ctrl_c => {
                tracing::info!("Stop signal received");
                break;
            }
        }
    }

    tracing::info!("Joint publisher shutting down after {} commands", sent);
    Ok(())
}
