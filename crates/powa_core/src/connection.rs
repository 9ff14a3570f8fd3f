//! Logical connections over a loaded database.

use crate::database::Database;
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct Status {
    active: usize,
    closed: bool,
}

/// One open of the database at the target version.
///
/// Counts its active transactions. With close-after-transaction enabled the
/// connection closes itself when that count drops back to zero, and every
/// later operation must re-initialize.
pub(crate) struct Connection {
    id: u64,
    database: Arc<Database>,
    close_after_transaction: bool,
    status: Mutex<Status>,
}

impl Connection {
    pub(crate) fn new(id: u64, database: Arc<Database>, close_after_transaction: bool) -> Self {
        Self {
            id,
            database,
            close_after_transaction,
            status: Mutex::new(Status::default()),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.status.lock().closed
    }

    pub(crate) fn active_transactions(&self) -> usize {
        self.status.lock().active
    }

    /// Registers a new transaction on this connection.
    pub(crate) fn begin(self: &Arc<Self>) -> StoreResult<ConnectionLease> {
        let mut status = self.status.lock();
        if status.closed {
            return Err(StoreError::NoConnection);
        }
        status.active += 1;
        Ok(ConnectionLease {
            connection: Arc::clone(self),
        })
    }

    /// Closes the connection now, regardless of active transactions.
    pub(crate) fn close(&self) {
        {
            let mut status = self.status.lock();
            if status.closed {
                return;
            }
            status.closed = true;
        }
        self.shut_down();
    }

    fn finish(&self) {
        let close = {
            let mut status = self.status.lock();
            status.active = status.active.saturating_sub(1);
            let close = status.active == 0 && self.close_after_transaction && !status.closed;
            if close {
                status.closed = true;
            }
            close
        };
        if close {
            self.shut_down();
        }
    }

    fn shut_down(&self) {
        if let Err(e) = self.database.sync() {
            warn!(connection = self.id, error = %e, "sync on close failed");
        }
        debug!(connection = self.id, "connection closed");
    }
}

/// A transaction's claim on its connection; released on drop.
pub(crate) struct ConnectionLease {
    connection: Arc<Connection>,
}

impl ConnectionLease {
    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.connection.finish();
    }
}
