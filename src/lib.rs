pub mod application;
pub mod auth;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod schema;

use std::sync::Arc;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use application::agreement_service::AgreementService;
use application::crop_service::CropService;
use application::order_service::OrderService;
use application::payment_service::PaymentService;
use application::transport_service::TransportService;
use auth::TokenSigner;
use domain::ports::MarketplaceStore;

pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub type SharedStore = Arc<dyn MarketplaceStore>;

/// Run any pending Diesel migrations against the pool's database.
pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut conn = pool.get()?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;
    log::info!("applied {} pending migrations", applied.len());
    Ok(())
}

/// Services shared by every worker, all backed by the same store.
#[derive(Clone)]
pub struct AppState {
    pub crops: CropService<SharedStore>,
    pub orders: OrderService<SharedStore>,
    pub agreements: AgreementService<SharedStore>,
    pub payments: PaymentService<SharedStore>,
    pub transport: TransportService<SharedStore>,
    pub webhook_secret: String,
}

impl AppState {
    pub fn new(store: SharedStore, webhook_secret: impl Into<String>) -> Self {
        Self {
            crops: CropService::new(Arc::clone(&store)),
            orders: OrderService::new(Arc::clone(&store)),
            agreements: AgreementService::new(Arc::clone(&store)),
            payments: PaymentService::new(Arc::clone(&store)),
            transport: TransportService::new(store),
            webhook_secret: webhook_secret.into(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::crops::create_crop,
        handlers::crops::get_crop,
        handlers::orders::create_order,
        handlers::orders::get_order,
        handlers::orders::list_orders,
        handlers::orders::reject_order,
        handlers::orders::mark_ready,
        handlers::orders::cancel_order,
        handlers::agreements::farmer_sign,
        handlers::agreements::trader_sign,
        handlers::agreements::get_agreement,
        handlers::agreements::cancel_agreement,
        handlers::payments::initiate_payment,
        handlers::payments::list_payments,
        handlers::payments::payment_webhook,
        handlers::transport::accept_delivery,
        handlers::transport::update_delivery_status,
        handlers::transport::get_delivery,
        handlers::transport::record_location,
        handlers::transport::order_locations,
    ),
    tags(
        (name = "orders", description = "Order lifecycle"),
        (name = "agreements", description = "Farmer and trader signatures"),
        (name = "payments", description = "Advance, final and transport payments"),
        (name = "transport", description = "Delivery assignment and tracking"),
    )
)]
pub struct ApiDoc;

/// Registers every route. Shared by the server and the HTTP tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    use handlers::{agreements, crops, health, orders, payments, transport};

    cfg.route("/health", web::get().to(health::health)).service(
        web::scope("/api")
            .service(
                web::scope("/crops")
                    .route("", web::post().to(crops::create_crop))
                    .route("/{id}", web::get().to(crops::get_crop)),
            )
            .service(
                web::scope("/orders")
                    .route("", web::get().to(orders::list_orders))
                    .route("/create", web::post().to(orders::create_order))
                    .route("/reject/{id}", web::put().to(orders::reject_order))
                    .route("/ready/{id}", web::put().to(orders::mark_ready))
                    .route("/cancel/{id}", web::put().to(orders::cancel_order))
                    .route("/{id}", web::get().to(orders::get_order)),
            )
            .service(
                web::scope("/agreements")
                    .route("/farmer-sign/{order_id}", web::post().to(agreements::farmer_sign))
                    .route("/trader-sign/{order_id}", web::post().to(agreements::trader_sign))
                    .route("/cancel/{order_id}", web::post().to(agreements::cancel_agreement))
                    .route("/{order_id}", web::get().to(agreements::get_agreement)),
            )
            .service(
                web::scope("/payments")
                    .route("/initiate/{order_id}", web::post().to(payments::initiate_payment))
                    .route("/order/{order_id}", web::get().to(payments::list_payments))
                    .route("/webhook", web::post().to(payments::payment_webhook)),
            )
            .service(
                web::scope("/transport")
                    .route("/accept/{order_id}", web::post().to(transport::accept_delivery))
                    .route(
                        "/status/{delivery_id}",
                        web::put().to(transport::update_delivery_status),
                    )
                    .route("/delivery/{order_id}", web::get().to(transport::get_delivery))
                    .route(
                        "/location/order/{order_id}",
                        web::get().to(transport::order_locations),
                    )
                    .route(
                        "/location/{delivery_id}",
                        web::post().to(transport::record_location),
                    ),
            ),
    );
}

/// Build and return an actix-web `Server` bound to `host:port`.
///
/// The caller is responsible for `.await`-ing (or `tokio::spawn`-ing) the
/// returned server.
pub fn build_server(
    state: AppState,
    signer: TokenSigner,
    host: &str,
    port: u16,
) -> std::io::Result<actix_web::dev::Server> {
    let openapi = ApiDoc::openapi();

    Ok(HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(signer.clone()))
            .wrap(Logger::default())
            .configure(configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind((host.to_string(), port))?
    .run())
}
