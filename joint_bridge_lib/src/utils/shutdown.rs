use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "keep running" flag, cleared once on shutdown request.
#[derive(Debug, Clone)]
pub struct RunningFlag(Arc<AtomicBool>);

impl RunningFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for RunningFlag {
    fn default() -> Self {
        Self::new()
    }
}

/// Clear the returned flag when the process receives Ctrl-C.
///
/// The signal listener lives on `runtime`; the flag itself can be polled
/// from any thread.
pub fn install_ctrl_c_handler(runtime: &tokio::runtime::Handle) -> RunningFlag {
    let flag = RunningFlag::new();
    let signal_flag = flag.clone();

    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, stopping");
                signal_flag.stop();
            }
            Err(e) => {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            }
        }
    });

    flag
}
