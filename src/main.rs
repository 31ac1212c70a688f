use std::io;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::info;
use order_status_service::application::index_sync::IndexJob;
use order_status_service::config::AppConfig;
use order_status_service::domain::identity::GatewayClaimsDecoder;
use order_status_service::{
    assemble, build_server, create_pool, index_worker, production_ports, run_migrations,
};

#[derive(Debug, Parser)]
#[command(name = "order-status-service", about, version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Index newly created orders into Elasticsearch
    #[command(name = "worker:order", alias = "worker-order")]
    WorkerOrder,
    /// Apply status changes to indexed orders
    #[command(name = "worker:update-status")]
    WorkerUpdateStatus,
    /// Remove deleted orders from the index
    #[command(name = "worker:delete-order")]
    WorkerDeleteOrder,
}

impl Command {
    fn index_job(self) -> Option<IndexJob> {
        match self {
            Command::Serve => None,
            Command::WorkerOrder => Some(IndexJob::Upsert),
            Command::WorkerUpdateStatus => Some(IndexJob::PatchStatus),
            Command::WorkerDeleteOrder => Some(IndexJob::Delete),
        }
    }
}

fn startup_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let cli = Cli::parse();
    let config = AppConfig::from_env().map_err(startup_error)?;

    if let Some(job) = cli.command.and_then(Command::index_job) {
        let worker = index_worker(&config, job).map_err(startup_error)?;
        info!("Starting {} index worker", job.as_str());
        tokio::select! {
            _ = worker.run() => {}
            _ = tokio::signal::ctrl_c() => info!("Stopping {} index worker", job.as_str()),
        }
        return Ok(());
    }

    let pool = create_pool(&config.database_url).map_err(startup_error)?;
    run_migrations(&pool).map_err(startup_error)?;

    let ports = production_ports(&config, pool).map_err(startup_error)?;
    let service = assemble(ports, config.server_timeout);

    info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(service, Arc::new(GatewayClaimsDecoder), &config.host, config.port)?.await
}
