use std::net::SocketAddr;

use campus_core::config::CoreConfig;
use campus_core::errors::CampusError;
use campus_core::logging;
use campus_scheduling::api::SchedulingApi;
use campus_scheduling::{SchedulingRepository, SchedulingService};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    if let Err(err) = logging::init_tracing(None) {
        eprintln!("⚠️ failed to initialise tracing: {err}");
    }

    let config = load_scheduling_config()?;
    let bind_addr: SocketAddr = config
        .http_bind
        .clone()
        .unwrap_or_else(|| "0.0.0.0:8084".to_string())
        .parse()?;

    let repository = SchedulingRepository::from_config(&config).await?;
    let service = SchedulingService::new(repository);
    let app = SchedulingApi::new(service).into_router();

    let listener = TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr()?;
    info!(%actual_addr, "starting campus-scheduling service");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

fn load_scheduling_config() -> Result<CoreConfig, CampusError> {
    CoreConfig::from_env_with_prefix("SCHEDULING_")
        .or_else(|_| CoreConfig::from_env())
        .map_err(Into::into)
}

#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("failed to bind scheduling service: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),
    #[error("configuration error: {0}")]
    Config(#[from] CampusError),
}
