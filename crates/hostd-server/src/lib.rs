pub mod client;
pub mod error;
pub mod routes;
pub mod state;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use hostd_core::config::HostdConfig;
use std::future::Future;
use std::path::Path;
use tokio::net::UnixListener;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all RPC routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(routes::health::health))
        .route("/v1/busy", get(routes::busy::get_busy))
        .route("/v1/run", post(routes::run::run_action))
        .fallback(routes::not_found)
        .method_not_allowed_fallback(routes::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Bind the daemon socket: create the parent directory, remove a stale
/// socket file, bind, and apply `mode`.
pub fn bind_socket(path: &Path, mode: u32) -> anyhow::Result<UnixListener> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create socket dir {}", dir.display()))?;
    }
    if std::fs::symlink_metadata(path).is_ok() {
        std::fs::remove_file(path)
            .with_context(|| format!("failed to remove stale socket {}", path.display()))?;
        tracing::debug!(socket = %path.display(), "removed stale socket");
    }

    let listener = UnixListener::bind(path)
        .with_context(|| format!("failed to bind socket {}", path.display()))?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    Ok(listener)
}

/// Serve on a pre-bound listener until `shutdown` resolves.
pub async fn serve_on<F>(listener: UnixListener, app_state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(app_state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the daemon on the configured Unix socket. Returns after Ctrl-C or
/// SIGTERM, removing the socket file on the way out.
pub async fn serve(config: &HostdConfig) -> anyhow::Result<()> {
    let mode = config.socket_mode_bits()?;
    let listener = bind_socket(&config.socket, mode)?;

    let state = AppState::from_config(config);
    let actions: Vec<_> = state.engine.registry().names().collect();
    tracing::info!(
        socket = %config.socket.display(),
        mode = %format!("{mode:o}"),
        script = %config.gpu_shed_script.display(),
        actions = ?actions,
        "hostd listening on unix socket"
    );

    let result = serve_on(listener, state, shutdown_signal()).await;

    let _ = std::fs::remove_file(&config.socket);
    tracing::info!("hostd stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
