// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Objects persisted as typed attributes.

use std::collections::HashMap;

use tokenstore_db::{Access, Connection, log_error};
use tracing::debug;

use crate::attribute::{Attribute, AttributeKind, AttributeType};
use crate::error::{Error, Result};
use crate::schema::{KIND_PRIORITY, TABLES, resolve_kind};

/// Identifier of an object within one token database. Zero means "none".
pub type ObjectId = i64;

/// Attribute access shared by every token backend's objects.
pub trait StoreObject {
    fn object_id(&self) -> ObjectId;

    fn is_valid(&self) -> bool;

    fn attribute_exists(&self, ty: AttributeType) -> Result<bool>;

    fn get_attribute(&mut self, ty: AttributeType) -> Result<Option<&Attribute>>;

    fn set_attribute(&mut self, ty: AttributeType, attribute: &Attribute) -> Result<()>;

    fn start_transaction(&self, access: Access) -> Result<()>;

    fn commit_transaction(&self) -> Result<()>;

    fn abort_transaction(&mut self) -> Result<()>;
}

/// One object in a token database, bound to a connection it does not own.
///
/// An object starts without an identifier; [`insert`](Self::insert) or
/// [`find`](Self::find) give it one. Attribute values read through
/// [`get_attribute`](Self::get_attribute) are always fetched from the
/// database, so writes committed by other connections are seen on the next
/// read.
#[derive(Debug)]
pub struct DbObject<'conn> {
    conn: Option<&'conn Connection>,
    id: ObjectId,
    cache: HashMap<AttributeType, Attribute>,
}

/// Log a logical error through the database error handler and return it.
fn fail<T>(err: Error) -> Result<T> {
    log_error(&err);
    Err(err)
}

impl<'conn> DbObject<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn: Some(conn),
            id: 0,
            cache: HashMap::new(),
        }
    }

    /// An object that was never bound to a connection.
    pub fn unbound() -> Self {
        Self {
            conn: None,
            id: 0,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn with_id(conn: &'conn Connection, id: ObjectId) -> Self {
        Self {
            conn: Some(conn),
            id,
            cache: HashMap::new(),
        }
    }

    fn connection(&self) -> Result<&'conn Connection> {
        match self.conn {
            Some(conn) => Ok(conn),
            None => fail(Error::NotConnected),
        }
    }

    /// The connection, provided this object also has an identifier.
    fn valid_connection(&self) -> Result<&'conn Connection> {
        let conn = self.connection()?;
        if self.id == 0 {
            return fail(Error::InvalidObject);
        }
        Ok(conn)
    }

    /// Create the object and attribute tables.
    ///
    /// Stops at the first table that fails; tables created before it remain.
    pub fn create_tables(&self) -> Result<()> {
        let conn = self.connection()?;
        for (name, ddl) in TABLES {
            let statement = conn.prepare(ddl)?;
            conn.execute(&statement)?;
            debug!("Created table {name} in {}", conn.path().display());
        }
        Ok(())
    }

    /// Insert a new object row and take its identifier.
    pub fn insert(&mut self) -> Result<ObjectId> {
        let conn = self.connection()?;
        let statement = conn.prepare("insert into object default values")?;
        conn.execute(&statement)?;
        self.id = conn.last_insert_row_id()?;
        self.cache.clear();
        Ok(self.id)
    }

    /// Bind this instance to the existing object `id`.
    pub fn find(&mut self, id: ObjectId) -> Result<()> {
        let conn = self.connection()?;
        if id == 0 {
            return fail(Error::InvalidObjectId);
        }
        self.id = 0;
        self.cache.clear();

        let statement = conn.prepare("select id from object where id = ?1")?;
        statement.bind_int64(1, id)?;
        let result = conn.perform(&statement)?;
        if !result.is_valid() || result.get_int64(1) != id {
            return fail(Error::ObjectNotFound(id));
        }
        self.id = id;
        Ok(())
    }

    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    /// Whether the object has an identifier and a connection.
    pub fn is_valid(&self) -> bool {
        self.id != 0 && self.conn.is_some()
    }

    pub fn has_connection(&self) -> bool {
        self.conn.is_some()
    }

    /// Detach from the connection. The identifier is kept, but every further
    /// store operation fails.
    pub fn drop_connection(&mut self) {
        self.conn = None;
        self.cache.clear();
    }

    /// Kinds under which `ty` is stored for this object, in priority order.
    fn stored_kinds(&self, conn: &Connection, ty: AttributeType) -> Result<Vec<AttributeKind>> {
        let sql = KIND_PRIORITY
            .iter()
            .enumerate()
            .map(|(code, kind)| {
                format!(
                    "select {code} from {} where type = ?1 and object_id = ?2",
                    kind.table()
                )
            })
            .collect::<Vec<_>>()
            .join(" union all ");
        let statement = conn.prepare(&sql)?;
        statement.bind_int64(1, ty.into())?;
        statement.bind_int64(2, self.id)?;

        let result = conn.perform(&statement)?;
        let mut kinds = Vec::new();
        if result.is_valid() {
            loop {
                if let Some(kind) = KIND_PRIORITY.get(result.get_int64(1) as usize) {
                    kinds.push(*kind);
                }
                if !result.next_row() {
                    break;
                }
            }
        }
        Ok(kinds)
    }

    fn current_kind(&self, conn: &Connection, ty: AttributeType) -> Result<Option<AttributeKind>> {
        Ok(resolve_kind(self.stored_kinds(conn, ty)?))
    }

    /// Whether `ty` is stored for this object under any kind.
    pub fn attribute_exists(&self, ty: AttributeType) -> Result<bool> {
        let conn = self.valid_connection()?;
        Ok(self.current_kind(conn, ty)?.is_some())
    }

    /// Read `ty` from the database.
    ///
    /// The value is kept on this instance until the next read or write of
    /// the same type, and returned by reference.
    pub fn get_attribute(&mut self, ty: AttributeType) -> Result<Option<&Attribute>> {
        let conn = self.valid_connection()?;
        let Some(kind) = self.current_kind(conn, ty)? else {
            self.cache.remove(&ty);
            return Ok(None);
        };

        let statement = conn.prepare(&format!(
            "select value from {} where type = ?1 and object_id = ?2",
            kind.table()
        ))?;
        statement.bind_int64(1, ty.into())?;
        statement.bind_int64(2, self.id)?;
        let result = conn.perform(&statement)?;
        if !result.is_valid() {
            self.cache.remove(&ty);
            return Ok(None);
        }

        let attribute = match kind {
            AttributeKind::Boolean => Attribute::Boolean(result.get_int(1) != 0),
            AttributeKind::Integer => Attribute::UnsignedLong(result.get_uint64(1)),
            AttributeKind::Blob => Attribute::ByteString(result.get_binary(1).unwrap_or_default()),
        };
        self.cache.insert(ty, attribute);
        Ok(self.cache.get(&ty))
    }

    /// Store `attribute` under `ty`, replacing any value of any kind.
    ///
    /// Inside a caller's transaction the write runs in a savepoint. Otherwise
    /// it gets its own immediate transaction, so the write lock is waited for
    /// up to the busy timeout before anything is read.
    pub fn set_attribute(&mut self, ty: AttributeType, attribute: &Attribute) -> Result<()> {
        let conn = self.valid_connection()?;
        self.cache.remove(&ty);
        let id = self.id;
        let this = &*self;

        let write = || {
            let stored = this.stored_kinds(conn, ty)?;
            let kind = attribute.kind();

            for other in stored.iter().filter(|k| **k != kind) {
                let statement = conn.prepare(&format!(
                    "delete from {} where type = ?1 and object_id = ?2",
                    other.table()
                ))?;
                statement.bind_int64(1, ty.into())?;
                statement.bind_int64(2, id)?;
                conn.execute(&statement)?;
            }

            let sql = if stored.contains(&kind) {
                format!(
                    "update {} set value = ?1 where type = ?2 and object_id = ?3",
                    kind.table()
                )
            } else {
                format!(
                    "insert into {} (value, type, object_id) values (?1, ?2, ?3)",
                    kind.table()
                )
            };
            let statement = conn.prepare(&sql)?;
            match attribute {
                Attribute::Boolean(b) => statement.bind_int(1, i32::from(*b))?,
                // Stored as the same 64-bit pattern; read back with get_uint64.
                Attribute::UnsignedLong(v) => statement.bind_int64(1, *v as i64)?,
                Attribute::ByteString(bytes) => statement.bind_blob(1, bytes)?,
            }
            statement.bind_int64(2, ty.into())?;
            statement.bind_int64(3, id)?;
            conn.execute(&statement)?;
            Ok::<(), Error>(())
        };

        if conn.in_transaction() {
            return conn.with_savepoint("set_attribute", write);
        }
        let txn = conn.transaction(Access::ReadWrite)?;
        write()?;
        txn.commit()?;
        Ok(())
    }

    /// Begin a transaction on the object's connection.
    ///
    /// [`Access::ReadWrite`] takes the write lock immediately, so lock
    /// contention surfaces here rather than at the first write.
    pub fn start_transaction(&self, access: Access) -> Result<()> {
        let conn = self.connection()?;
        if conn.in_transaction() {
            return fail(Error::TransactionInProgress);
        }
        match access {
            Access::ReadOnly => conn.begin_transaction_ro()?,
            Access::ReadWrite => conn.begin_transaction_rw()?,
        }
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        let conn = self.connection()?;
        if !conn.in_transaction() {
            return fail(Error::NoTransaction);
        }
        conn.commit_transaction()?;
        Ok(())
    }

    /// Roll back the open transaction, discarding every write made in it.
    pub fn abort_transaction(&mut self) -> Result<()> {
        let conn = self.connection()?;
        self.cache.clear();
        if !conn.in_transaction() {
            return fail(Error::NoTransaction);
        }
        conn.rollback_transaction()?;
        Ok(())
    }

    /// Delete the object and all of its attributes.
    pub fn destroy(&mut self) -> Result<()> {
        let conn = self.valid_connection()?;
        let statement = conn.prepare("delete from object where id = ?1")?;
        statement.bind_int64(1, self.id)?;
        conn.execute(&statement)?;
        debug!("Deleted object {} from {}", self.id, conn.path().display());
        self.id = 0;
        self.cache.clear();
        Ok(())
    }
}

impl StoreObject for DbObject<'_> {
    fn object_id(&self) -> ObjectId {
        DbObject::object_id(self)
    }

    fn is_valid(&self) -> bool {
        DbObject::is_valid(self)
    }

    fn attribute_exists(&self, ty: AttributeType) -> Result<bool> {
        DbObject::attribute_exists(self, ty)
    }

    fn get_attribute(&mut self, ty: AttributeType) -> Result<Option<&Attribute>> {
        DbObject::get_attribute(self, ty)
    }

    fn set_attribute(&mut self, ty: AttributeType, attribute: &Attribute) -> Result<()> {
        DbObject::set_attribute(self, ty, attribute)
    }

    fn start_transaction(&self, access: Access) -> Result<()> {
        DbObject::start_transaction(self, access)
    }

    fn commit_transaction(&self) -> Result<()> {
        DbObject::commit_transaction(self)
    }

    fn abort_transaction(&mut self) -> Result<()> {
        DbObject::abort_transaction(self)
    }
}
