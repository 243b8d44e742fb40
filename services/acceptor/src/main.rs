use std::any::Any;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use acceptor::config::Config;
use wsrelay_core::ServiceManager;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    let manager = Arc::new(ServiceManager::new(config.fragment_size, config.keep_clean));
    manager.set_wait_time(config.wait_time).await;

    for path in &config.relay_paths {
        let factory = Arc::new(|| Box::new(()) as Box<dyn Any + Send>);
        manager.add(path, factory).await;
        info!(path = %path, "endpoint registered");
    }
    manager.start().await;

    let router = acceptor::build_router(manager.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %config.bind_addr, "acceptor listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    manager
        .stop(Some((1000, "server shutting down")), true, true)
        .await;
    info!("acceptor shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
