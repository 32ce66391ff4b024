//! Slot holding the one active agent connection.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::Connection;

/// Holds at most one active [`Connection`].
///
/// Installing a connection closes the previous one before the new one
/// becomes visible. Only the connection currently installed can clear the
/// slot, so a replaced connection's late disconnect never wipes its
/// successor.
#[derive(Default)]
pub struct ConnectionRegistry {
    active: Mutex<Option<Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes any installed connection, then installs `conn` and marks it
    /// online.
    pub async fn install(&self, conn: Arc<Connection>) {
        let mut slot = self.active.lock().await;
        if let Some(old) = slot.take() {
            if old.is_online() {
                tracing::info!(
                    old = old.id(),
                    new = conn.id(),
                    peer = %conn.peer(),
                    "replacing active agent connection"
                );
            } else {
                tracing::info!(old = old.id(), "clearing stale agent connection");
            }
            old.close().await;
        }
        conn.mark_online();
        *slot = Some(conn);
    }

    /// Returns `true` if an agent connection is installed and open.
    pub async fn is_online(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| c.is_online())
    }

    /// Snapshot of the active connection, if it is online.
    pub async fn active(&self) -> Option<Arc<Connection>> {
        self.active
            .lock()
            .await
            .as_ref()
            .filter(|c| c.is_online())
            .cloned()
    }

    /// Clears the slot if `conn` is the one installed.
    ///
    /// Returns `false` (and leaves the slot alone) when `conn` has already
    /// been replaced.
    pub async fn release(&self, conn: &Arc<Connection>) -> bool {
        let mut slot = self.active.lock().await;
        let ours = slot.as_ref().is_some_and(|c| Arc::ptr_eq(c, conn));
        if ours {
            *slot = None;
            conn.mark_offline();
        }
        ours
    }

    /// Closes and clears the active connection (shutdown path).
    pub async fn close_active(&self) {
        let old = self.active.lock().await.take();
        if let Some(conn) = old {
            tracing::info!(id = conn.id(), "closing agent connection");
            conn.close().await;
        }
    }
}
