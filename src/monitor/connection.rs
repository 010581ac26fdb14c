use async_trait::async_trait;

/// A long-lived connection handle the monitor keeps alive.
///
/// Implementors own the handle and swap it atomically on `connect`, so
/// request paths holding the previous handle are never torn down mid-call.
#[async_trait]
pub trait ManagedConnection: Send + Sync {
    /// Resource name used in logs.
    fn name(&self) -> &str;

    /// Whether a handle has been established (it may still be dead).
    fn has_handle(&self) -> bool;

    /// Establish a fresh handle, replacing any existing one.
    async fn connect(&self) -> anyhow::Result<()>;

    /// Lightweight liveness probe on the existing handle.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Release the handle and its resources.
    async fn close(&self);
}
