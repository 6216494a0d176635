use tracing::{info, warn};

use dispatch_runtime::{init_logging, DispatchServer, ServerConfig, ServerError, ServerResult};
use dispatch_state::FileSnapshot;

#[tokio::main]
async fn main() -> ServerResult<()> {
    let config = ServerConfig::from_env()?;
    init_logging(config.log_format).map_err(ServerError::Logging)?;

    info!(
        addr = %config.bind_addr,
        data_file = %config.data_file.display(),
        "starting dispatch server"
    );

    let snapshot = FileSnapshot::new(&config.data_file);
    let server = DispatchServer::bind(&config, snapshot).await?;
    let stats = server.run(shutdown_signal()).await?;

    info!(
        actions = stats.actions_applied,
        saves_failed = stats.saves_failed,
        sessions = stats.sessions_opened,
        "dispatch server stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
        std::future::pending::<()>().await;
    }
}
