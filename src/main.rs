use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use accounts::api::{create_router, AppState};
use accounts::cache::{CacheClient, RedisCache, RepositorySelector};
use accounts::config::{CacheMode, Config};
use accounts::monitor::{
    Availability, ConnectionMonitor, ManagedConnection, MonitorConfig, MonitorExit,
};
use accounts::observability::{init_tracing, MetricsRegistry};
use accounts::resilience::{CardsClient, CurrencyClient, ServiceClient};
use accounts::service::AccountService;
use accounts::storage::{AccountStore, PoolSettings, PostgresAccountStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(
        &config.log_level,
        config.log_file.as_deref(),
        config.log_backup_count,
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        cache_mode = ?config.cache_mode,
        "Starting accounts service"
    );

    let metrics = Arc::new(MetricsRegistry::new());
    let availability = Arc::new(Availability::new());

    // Store adapter; connected by the monitor
    let store = Arc::new(PostgresAccountStore::new(PoolSettings {
        database_url: config.database_url.clone(),
        min_connections: config.db_min_connections,
        max_connections: config.db_max_connections,
        acquire_timeout: config.db_acquire_timeout(),
    }));

    // Distributed cache, only when a mode may use it
    let redis = match config.cache_mode {
        CacheMode::Auto | CacheMode::Distributed => Some(Arc::new(RedisCache::new(&config.redis_url))),
        CacheMode::Local | CacheMode::None => None,
    };

    let selector = Arc::new(RepositorySelector::new(
        store.clone() as Arc<dyn AccountStore>,
        redis.clone().map(|r| r as Arc<dyn CacheClient>),
        availability.clone(),
        metrics.clone(),
        config.cache_mode,
        config.cache_ttl(),
    ));

    // Dependent microservices
    let cards = CardsClient::new(
        ServiceClient::new(
            "cards",
            &config.cards_base_url,
            config.external_timeout(),
            config.cards_breaker(),
            metrics.clone(),
        )?,
        &config.cards_endpoint,
    );
    let currencies = CurrencyClient::new(
        ServiceClient::new(
            "currencies",
            &config.currencies_base_url,
            config.external_timeout(),
            config.currencies_breaker(),
            metrics.clone(),
        )?,
        &config.currencies_endpoint,
    );

    let state = Arc::new(AppState {
        accounts: AccountService::new(
            selector,
            Arc::new(cards),
            Arc::new(currencies),
            &config.base_currency,
        ),
        availability: availability.clone(),
        metrics: metrics.clone(),
    });

    // Start the connection monitor
    let monitor = ConnectionMonitor::new(
        store.clone() as Arc<dyn ManagedConnection>,
        redis.clone().map(|r| r as Arc<dyn ManagedConnection>),
        availability,
        metrics,
        MonitorConfig {
            check_interval: config.monitor_interval(),
            startup_attempts: config.startup_attempts,
            startup_retry_delay: config.startup_retry_delay(),
        },
    );
    let mut monitor_handle = monitor.start();

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = async {
        if config.graceful_shutdown {
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        } else {
            axum::serve(listener, app).await
        }
    };

    // The server and the monitor run side by side; losing the store ends both.
    tokio::select! {
        result = server => {
            result?;
            info!("Shutting down...");
            monitor_handle.shutdown().await;
        }
        exit = monitor_handle.exited() => {
            if exit != MonitorExit::Shutdown {
                error!(severity = "critical", ?exit, "Connection monitor stopped, terminating");
                store.close().await;
                if let Some(redis) = &redis {
                    redis.close().await;
                }
                std::process::exit(1);
            }
        }
    }

    store.close().await;
    if let Some(redis) = &redis {
        redis.close().await;
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
