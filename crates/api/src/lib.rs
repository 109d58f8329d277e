//! HTTP API for the cart and checkout services.
//!
//! Exposes the user's cart, checkout and orders under `/api/profile`,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod validation;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use catalog::{Catalog, HttpCatalog, InMemoryCatalog};
use checkout::{CartService, CheckoutService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{
    CartStore, InMemoryCartStore, InMemoryDatabase, InMemoryOrderStore, OrderStore, PgCartStore,
    PgOrderStore, Transactional,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// The set of stores and catalog the API runs against.
///
/// Both stores must share one transaction type so checkout can span them.
pub trait Backend: Send + Sync + 'static {
    type Carts: CartStore + 'static;
    type Orders: OrderStore<Tx = <Self::Carts as Transactional>::Tx> + 'static;
    type Catalog: Catalog + 'static;
}

/// PostgreSQL stores with the HTTP product catalog.
pub struct PostgresBackend;

impl Backend for PostgresBackend {
    type Carts = PgCartStore;
    type Orders = PgOrderStore;
    type Catalog = HttpCatalog;
}

/// In-memory stores and catalog.
pub struct InMemoryBackend;

impl Backend for InMemoryBackend {
    type Carts = InMemoryCartStore;
    type Orders = InMemoryOrderStore;
    type Catalog = InMemoryCatalog;
}

/// Shared application state accessible from all handlers.
pub struct AppState<B: Backend> {
    pub carts: CartService<B::Carts, B::Catalog>,
    pub orders: OrderService<B::Orders>,
    pub checkout: CheckoutService<B::Carts, B::Orders, B::Catalog>,
}

impl<B: Backend> AppState<B>
where
    B::Carts: Clone,
    B::Orders: Clone,
    B::Catalog: Clone,
{
    pub fn new(carts: B::Carts, orders: B::Orders, catalog: B::Catalog) -> Self {
        Self {
            carts: CartService::new(carts.clone(), catalog.clone()),
            orders: OrderService::new(orders.clone()),
            checkout: CheckoutService::new(carts, orders, catalog),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: Backend>(state: Arc<AppState<B>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/api/profile/cart",
            get(routes::cart::get::<B>).delete(routes::cart::clear::<B>),
        )
        .route("/api/profile/cart/items", post(routes::cart::add_item::<B>))
        .route(
            "/api/profile/cart/items/{product_id}",
            put(routes::cart::set_item_count::<B>).delete(routes::cart::remove_item::<B>),
        )
        .route(
            "/api/profile/cart/checkout",
            post(routes::cart::checkout::<B>),
        )
        .route(
            "/api/profile/order/{order_id}",
            get(routes::orders::get::<B>).patch(routes::orders::update::<B>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates state backed by in-memory stores and catalog.
///
/// Returns the database and catalog handles so callers can seed them.
pub fn create_in_memory_state() -> (
    Arc<AppState<InMemoryBackend>>,
    InMemoryDatabase,
    InMemoryCatalog,
) {
    let db = InMemoryDatabase::new();
    let catalog = InMemoryCatalog::new();
    let state = AppState::<InMemoryBackend>::new(
        InMemoryCartStore::new(db.clone()),
        InMemoryOrderStore::new(db.clone()),
        catalog.clone(),
    );
    (Arc::new(state), db, catalog)
}
