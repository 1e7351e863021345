use std::panic;
use std::sync::Arc;

use tonic::transport::Server;
use tracing_subscriber::EnvFilter;

use crate::config::ServiceConfig;
use crate::core::supervisor::Supervisor;
use crate::grpc::models::grading_service_server::GradingServiceServer;
use crate::grpc::services::GradingServiceImpl;
use crate::host::docker::DockerLauncher;

mod config;
mod constants;
mod core;
mod grpc;
mod host;

#[cfg(test)]
mod stubs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    set_panic_hook();

    let config = ServiceConfig::from_env()?;
    tracing::debug!("Service config: {:?}", config);

    let launcher = Arc::new(DockerLauncher::new(&config.docker_bin));
    let supervisor = Arc::new(Supervisor::new(launcher, config.supervisor.clone()));
    let service = GradingServiceServer::new(GradingServiceImpl::new(supervisor));

    tracing::info!("gRPC server listening on {}", config.listen_addr);
    Server::builder()
        .add_service(service)
        .serve_with_shutdown(config.listen_addr, shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
