//! Polling worker driving the DDI client

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::ddi::client::{DdiClient, WorkOutcome};
use crate::http::transport::Transport;
use crate::installer::FirmwareInstaller;

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Interval between ticks
    pub tick_interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
        }
    }
}

/// Why the poller stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    Shutdown,
    RestartRequired,
}

/// Initialize the client and tick it until shutdown or a required restart.
///
/// A tick is never interrupted; shutdown is only observed between ticks.
pub async fn run<T, I, S, F>(
    options: &Options,
    client: &mut DdiClient<T, I>,
    sleep_fn: S,
    shutdown_signal: &mut Pin<Box<dyn Future<Output = ()> + Send>>,
) -> PollerExit
where
    T: Transport,
    I: FirmwareInstaller,
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Poller worker starting...");

    if client.initialize(Instant::now()).await == WorkOutcome::RestartRequired {
        return PollerExit::RestartRequired;
    }

    loop {
        tokio::select! {
            _ = &mut *shutdown_signal => {
                info!("Poller worker shutting down...");
                return PollerExit::Shutdown;
            }
            _ = sleep_fn(options.tick_interval) => {}
        }

        debug!("Tick");
        if client.tick(Instant::now()).await == WorkOutcome::RestartRequired {
            info!("Restart required");
            return PollerExit::RestartRequired;
        }
    }
}
