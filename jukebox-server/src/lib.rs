mod config;
mod context;
mod docs;
mod errors;
mod events;
mod logging;
mod rooms;
mod schemas;
mod serialized;
mod settings;
mod tracks;

use std::{
    net::{Ipv6Addr, SocketAddr},
    path::Path,
};

use axum::routing::{get, post};
use log::{info, warn};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

pub use config::*;
pub use context::ServerContext;
pub use logging::init_logger;

pub type Router = axum::Router<ServerContext>;

/// Builds the full router, with `/static` served from `static_dir` when given
pub fn router(context: ServerContext, static_dir: Option<&Path>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/rooms", rooms::router())
        .nest("/tracks", tracks::router())
        .nest("/settings", settings::router())
        .nest("/events", events::router())
        .route("/broadcast", post(events::broadcast));

    let mut root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs));

    if let Some(dir) = static_dir {
        root_router = root_router.nest_service("/static", ServeDir::new(dir));
    }

    root_router.layer(cors).with_state(context)
}

/// Starts the jukebox server, returning once it is shut down
pub async fn run_server(context: ServerContext, config: &ServerConfig) -> std::io::Result<()> {
    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, config.port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on {}", addr);

    let hub = context.collab.hub().clone();
    let app = router(context, config.static_dir.as_deref());

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }

            info!("Shutting down");
        })
        .await?;

    // Let queued events reach the sockets that are still open
    hub.flush().await;
    Ok(())
}
