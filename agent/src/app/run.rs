//! Main application run loop

use std::future::Future;
use std::pin::Pin;

use tracing::{error, info, warn};

use crate::app::options::AppOptions;
use crate::ddi::client::DdiClient;
use crate::errors::DdiError;
use crate::http::transport::TcpTransport;
use crate::installer::file::FileInstaller;
use crate::storage::settings::RestartPolicy;
use crate::telemetry;
use crate::workers::poller::{self, PollerExit};

/// How the agent stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// A shutdown signal was received
    Shutdown,

    /// An update finished and the process must be restarted
    Restart,
}

/// Run the DDI agent
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<RunExit, DdiError> {
    info!("Initializing DDI Agent...");

    let mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(shutdown_signal);

    loop {
        let mut client = init_client(&options)?;

        let exit = poller::run(
            &options.poller,
            &mut client,
            tokio::time::sleep,
            &mut shutdown_signal,
        )
        .await;

        match (exit, options.restart_policy) {
            (PollerExit::Shutdown, _) => return Ok(RunExit::Shutdown),
            (PollerExit::RestartRequired, RestartPolicy::Exit) => return Ok(RunExit::Restart),
            (PollerExit::RestartRequired, RestartPolicy::Reinitialize) => {
                info!("Reinitializing client...");
            }
        }
    }
}

fn init_client(options: &AppOptions) -> Result<DdiClient<TcpTransport, FileInstaller>, DdiError> {
    let transport = if options.server.tls {
        TcpTransport::tls(options.server.ca_cert_path.as_deref(), options.timeouts)?
    } else {
        warn!("TLS disabled, the credential is sent in clear text");
        TcpTransport::plain(options.timeouts)
    };
    let installer = FileInstaller::new(&options.firmware_path);

    let mut client = DdiClient::new(options.identity(), transport, installer);
    match telemetry::config_data(&options.attributes) {
        Ok(payload) => client.set_config_data(payload),
        Err(e) => error!("Device attributes not usable as config data: {}", e),
    }
    Ok(client)
}
