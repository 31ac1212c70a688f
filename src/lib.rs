pub mod application;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::enrichment::BulkEnricher;
use application::index_sync::{IndexJob, IndexSync};
use application::order_service::OrderService;
use application::query_router::QueryRouter;
use application::status_workflow::StatusWorkflow;
use config::AppConfig;
use domain::errors::DomainError;
use domain::identity::IdentityDecoder;
use domain::ports::{
    EventDispatcher, OrderRepository, OrderSearchIndex, ProductCatalog, UserDirectory,
};
use infrastructure::consumer::{queue_for, AmqpIndexConsumer};
use infrastructure::dispatcher::BackgroundDispatcher;
use infrastructure::http::build_client;
use infrastructure::order_repo::DieselOrderRepository;
use infrastructure::product_client::HttpProductCatalog;
use infrastructure::publisher::AmqpPublisher;
use infrastructure::search_index::ElasticOrderIndex;
use infrastructure::user_client::HttpUserDirectory;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), DomainError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| DomainError::Internal(format!("failed to run migrations: {}", e)))?;
    Ok(())
}

/// Every outbound dependency of the order service.
pub struct Ports {
    pub store: Arc<dyn OrderRepository>,
    pub index: Arc<dyn OrderSearchIndex>,
    pub users: Arc<dyn UserDirectory>,
    pub products: Arc<dyn ProductCatalog>,
    pub dispatcher: Arc<dyn EventDispatcher>,
}

/// Wire the application components over `ports`. `deadline` bounds each
/// enrichment call.
pub fn assemble(ports: Ports, deadline: Duration) -> OrderService {
    let router = QueryRouter::new(ports.index, Arc::clone(&ports.store));
    let enricher = BulkEnricher::new(
        Arc::clone(&ports.users),
        Arc::clone(&ports.products),
        deadline,
    );
    let workflow = StatusWorkflow::new(
        Arc::clone(&ports.store),
        ports.users,
        Arc::clone(&ports.dispatcher),
    );
    OrderService::new(ports.store, router, enricher, workflow, ports.dispatcher)
}

/// Production adapters: Postgres, Elasticsearch, the user and product
/// services over one shared HTTP client, and RabbitMQ.
pub fn production_ports(config: &AppConfig, pool: DbPool) -> Result<Ports, DomainError> {
    let client = build_client(config.server_timeout)?;
    let publisher = AmqpPublisher::new(&config.rabbitmq_url, config.queues.clone())?;

    Ok(Ports {
        store: Arc::new(DieselOrderRepository::new(pool)),
        index: Arc::new(ElasticOrderIndex::new(
            client.clone(),
            &config.elasticsearch_host,
            &config.elasticsearch_index,
        )),
        users: Arc::new(HttpUserDirectory::new(client.clone(), &config.user_service_url)),
        products: Arc::new(HttpProductCatalog::new(client, &config.product_service_url)),
        dispatcher: Arc::new(BackgroundDispatcher::new(Arc::new(publisher))),
    })
}

/// Index worker for `job` over the shared HTTP client and its own broker pool.
pub fn index_worker(config: &AppConfig, job: IndexJob) -> Result<AmqpIndexConsumer, DomainError> {
    let client = build_client(config.server_timeout)?;
    let writer = ElasticOrderIndex::new(
        client,
        &config.elasticsearch_host,
        &config.elasticsearch_index,
    );
    let sync = Arc::new(IndexSync::new(Arc::new(writer)));
    AmqpIndexConsumer::new(
        &config.rabbitmq_url,
        queue_for(&config.queues, job),
        job,
        sync,
    )
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    service: OrderService,
    decoder: Arc<dyn IdentityDecoder>,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let service = web::Data::new(service);
    let decoder = web::Data::new(decoder);
    let openapi = handlers::ApiDoc::openapi();

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(decoder.clone())
            .wrap(Logger::default())
            .configure(handlers::configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
