use std::{
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};

use encore_core::Encore;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod config;
mod context;
mod errors;
mod gateway;
mod logging;
mod net;
mod requests;
mod schemas;
mod songs;

pub use config::{Config, StorageBackend};
pub use context::ServerContext;
pub use logging::init_logger;

use gateway::Gateway;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 4600;

pub type Router = axum::Router<ServerContext>;

/// Starts the encore server. Runs until the process exits.
pub async fn run_server(config: &Config, encore: Arc<Encore>) {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();

    let gateway = Gateway::new();
    gateway::spawn_event_bridge(&encore, gateway.clone());

    let context = ServerContext {
        encore,
        gateway,
        port: config.port,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .nest("/songs", songs::router())
        .nest("/requests", requests::router())
        .nest("/ip", net::router())
        .nest("/gateway", gateway::router());

    let root_router = Router::new()
        .nest("/api", api_router)
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {}.", config.port);

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}
