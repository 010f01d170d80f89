use axum::Router;
use std::future::Future;
use std::io;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Request tracing plus permissive CORS for browser clients.
pub fn with_middleware(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
    )
}

/// Serve `router` on `listener` until `shutdown` resolves.
///
/// # Errors
///
/// Propagates I/O errors from the accept loop.
pub async fn serve<F>(listener: TcpListener, router: Router, name: &str, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(%addr, service = name, "Listening");
    axum::serve(listener, with_middleware(router))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!(service = name, "Shut down");
    Ok(())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
}
