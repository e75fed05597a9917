// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Scoped transactions.

use tracing::warn;

use crate::connection::Connection;
use crate::error::Result;

/// Locking mode for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Deferred: shared locks are taken by the first read.
    ReadOnly,
    /// Immediate: the write lock is taken when the transaction begins.
    ReadWrite,
}

/// An open transaction that is rolled back when dropped uncommitted.
#[must_use = "dropping a transaction rolls it back"]
pub struct Transaction<'conn> {
    conn: &'conn Connection,
    open: bool,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn begin(conn: &'conn Connection, access: Access) -> Result<Self> {
        match access {
            Access::ReadOnly => conn.begin_transaction_ro()?,
            Access::ReadWrite => conn.begin_transaction_rw()?,
        }
        Ok(Self { conn, open: true })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub fn commit(mut self) -> Result<()> {
        self.open = false;
        self.conn.commit_transaction()
    }

    pub fn rollback(mut self) -> Result<()> {
        self.open = false;
        self.conn.rollback_transaction()
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.open && self.conn.in_transaction() {
            if let Err(e) = self.conn.rollback_transaction() {
                warn!(
                    "Failed to roll back transaction on {}: {e}",
                    self.conn.path().display()
                );
            }
        }
    }
}
