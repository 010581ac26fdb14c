use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::observability::MetricsRegistry;

use super::availability::{Availability, ResourceState};
use super::connection::ManagedConnection;

/// Errors that end the monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("database unreachable after {attempts} startup attempts: {last_error}")]
    StartupFailed {
        attempts: u32,
        last_error: anyhow::Error,
    },

    #[error("database connection lost and reconnection failed: {0}")]
    StoreLost(anyhow::Error),
}

/// Why the monitor task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Shutdown was requested through the handle
    Shutdown,
    /// The store could not be (re)connected; the process must terminate
    StoreLost,
    /// The task panicked or was aborted
    Aborted,
}

/// Monitor timing.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between checks; also the grace delay before the first check
    pub check_interval: Duration,
    /// Connection attempts per resource at startup
    pub startup_attempts: u32,
    pub startup_retry_delay: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            check_interval: Duration::from_secs(10),
            startup_attempts: 5,
            startup_retry_delay: Duration::from_secs(3),
        }
    }
}

/// Background watchdog for the store and cache connections.
pub struct ConnectionMonitor {
    store: Arc<dyn ManagedConnection>,
    cache: Option<Arc<dyn ManagedConnection>>,
    availability: Arc<Availability>,
    metrics: Arc<MetricsRegistry>,
    config: MonitorConfig,
}

impl ConnectionMonitor {
    pub fn new(
        store: Arc<dyn ManagedConnection>,
        cache: Option<Arc<dyn ManagedConnection>>,
        availability: Arc<Availability>,
        metrics: Arc<MetricsRegistry>,
        config: MonitorConfig,
    ) -> Self {
        ConnectionMonitor {
            store,
            cache,
            availability,
            metrics,
            config,
        }
    }

    /// Connect both resources with retries, then mark the service ready.
    ///
    /// Store failure is fatal; cache failure leaves the cache disconnected
    /// for the periodic checks to pick up later.
    pub async fn startup(&self, shutdown: &mut watch::Receiver<bool>) -> Result<(), MonitorError> {
        info!("Service is starting up...");

        match self.connect_with_retries(self.store.as_ref(), shutdown).await {
            Ok(()) => self.availability.set_store_state(ResourceState::Connected),
            Err(last_error) => {
                error!(severity = "critical", error = %last_error, "Database connection failed at startup");
                return Err(MonitorError::StartupFailed {
                    attempts: self.config.startup_attempts,
                    last_error,
                });
            }
        }

        if let Some(cache) = &self.cache {
            match self.connect_with_retries(cache.as_ref(), shutdown).await {
                Ok(()) => self.availability.set_cache_state(ResourceState::Connected),
                Err(e) => {
                    warn!(error = %e, "Cache unavailable at startup, continuing without it");
                    self.availability.set_cache_state(ResourceState::Disconnected);
                }
            }
        }

        self.availability.mark_ready();
        info!("Service started successfully");
        Ok(())
    }

    async fn connect_with_retries(
        &self,
        resource: &dyn ManagedConnection,
        shutdown: &mut watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let attempts = self.config.startup_attempts.max(1);
        let mut attempt = 1;

        loop {
            info!(resource = resource.name(), attempt, "Awaiting connection...");
            match resource.connect().await {
                Ok(()) => {
                    info!(resource = resource.name(), "Connection initialized");
                    return Ok(());
                }
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(resource = resource.name(), error = %e, "Connection failed, retrying");
                    if wait_or_shutdown(shutdown, self.config.startup_retry_delay).await {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// One cache check. Never fatal.
    pub async fn check_cache(&self) {
        let Some(cache) = &self.cache else {
            return;
        };

        let probe = if cache.has_handle() {
            cache.ping().await
        } else {
            cache.connect().await
        };

        match probe {
            Ok(()) => {
                debug!("Watchdog: cache connection healthy");
                self.availability.set_cache_state(ResourceState::Connected);
            }
            Err(e) => {
                self.availability.set_cache_state(ResourceState::Reconnecting);
                warn!(error = %e, "Watchdog: cache connection lost. Attempting to reconnect...");

                match cache.connect().await {
                    Ok(()) => {
                        self.metrics.record_cache_reconnect();
                        self.availability.set_cache_state(ResourceState::Connected);
                        warn!("Watchdog: cache reconnected successfully");
                    }
                    Err(e) => {
                        self.availability.set_cache_state(ResourceState::Disconnected);
                        warn!(error = %e, "Watchdog: cache reconnection failed. Will try again in next cycle");
                    }
                }
            }
        }
    }

    /// One store check. Returns an error when the store is gone for good.
    pub async fn check_store(&self) -> Result<(), MonitorError> {
        let probe = if self.store.has_handle() {
            self.store.ping().await
        } else {
            self.store.connect().await
        };

        let Err(e) = probe else {
            debug!("Watchdog: database connection healthy");
            self.availability.set_store_state(ResourceState::Connected);
            return Ok(());
        };

        self.availability.set_store_state(ResourceState::Reconnecting);
        error!(
            severity = "critical",
            error = %e,
            "Watchdog: database connection lost. Attempting reconnection..."
        );

        match self.store.connect().await {
            Ok(()) => {
                self.metrics.record_store_reconnect();
                self.availability.set_store_state(ResourceState::Connected);
                info!("Watchdog: database reconnected successfully");
                Ok(())
            }
            Err(e) => {
                self.availability.set_store_state(ResourceState::Disconnected);
                error!(
                    severity = "critical",
                    error = %e,
                    "Watchdog: FATAL - could not reconnect to database"
                );
                Err(MonitorError::StoreLost(e))
            }
        }
    }

    /// Cache first, then store, as one monitor cycle.
    pub async fn run_cycle(&self) -> Result<(), MonitorError> {
        self.check_cache().await;
        self.check_store().await
    }

    /// Spawn the monitor: startup, grace delay, then periodic checks.
    pub fn start(self) -> MonitorHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            if let Err(e) = self.startup(&mut shutdown_rx).await {
                error!(error = %e, "Connection monitor giving up");
                self.store.close().await;
                return MonitorExit::StoreLost;
            }

            if wait_or_shutdown(&mut shutdown_rx, self.config.check_interval).await {
                return MonitorExit::Shutdown;
            }

            info!(
                interval_secs = self.config.check_interval.as_secs(),
                "Starting background connection monitor"
            );

            loop {
                if let Err(e) = self.run_cycle().await {
                    error!(error = %e, "Releasing database resources before exit");
                    self.store.close().await;
                    return MonitorExit::StoreLost;
                }

                if wait_or_shutdown(&mut shutdown_rx, self.config.check_interval).await {
                    info!("Connection monitor stopped");
                    return MonitorExit::Shutdown;
                }
            }
        });

        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Sleep for `delay`; returns `true` if shutdown was requested meanwhile.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

/// Owner of the running monitor task.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<MonitorExit>,
}

impl MonitorHandle {
    /// Wait for the monitor to stop on its own.
    pub async fn exited(&mut self) -> MonitorExit {
        match (&mut self.task).await {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "Connection monitor task failed");
                MonitorExit::Aborted
            }
        }
    }

    /// Ask the monitor to stop and wait for it.
    pub async fn shutdown(mut self) -> MonitorExit {
        let _ = self.shutdown.send(true);
        self.exited().await
    }
}
