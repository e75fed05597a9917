// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Tokens backed by one SQLite database each.
//!
//! A token lives in `<base>/<name>/sqlite3.db`. Object 1 of that database
//! carries the token metadata (label, serial, flags and PIN blobs) as vendor
//! attributes; every other object belongs to the token's users.

use std::fs;
use std::path::{Path, PathBuf};

use tokenstore_db::{Access, Connection, ConnectionOptions};
use tracing::{debug, warn};

use crate::attribute::types::{
    CKA_OS_SOPIN, CKA_OS_TOKENFLAGS, CKA_OS_TOKENLABEL, CKA_OS_TOKENSERIAL, CKA_OS_USERPIN,
};
use crate::attribute::{Attribute, AttributeType};
use crate::config::StoreConfig;
use crate::error::{Error, IoContext, Result};
use crate::flags::{CKF_USER_PIN_INITIALIZED, INITIAL_TOKEN_FLAGS, SO_PIN_STATE, USER_PIN_STATE};
use crate::object::{DbObject, ObjectId, StoreObject};

/// File name of the token database inside the token directory.
pub const DBTOKEN_FILE: &str = "sqlite3.db";

/// Identifier of the object holding token metadata.
pub const DBTOKEN_OBJECT_TOKENINFO: ObjectId = 1;

/// Operations every token backend provides to the store catalog.
pub trait Token: Sized {
    type Object<'a>: StoreObject
    where
        Self: 'a;

    /// Create a new token named `name` under `base`.
    fn create(
        base: &Path,
        name: &str,
        label: &[u8],
        serial: &[u8],
        config: &StoreConfig,
    ) -> Result<Self>;

    /// Open the existing token named `name` under `base`.
    fn open(base: &Path, name: &str, config: &StoreConfig) -> Result<Self>;

    /// Directory name of the token under its base directory.
    fn name(&self) -> &str;

    fn token_label(&self) -> Result<Vec<u8>>;

    fn token_serial(&self) -> Result<Vec<u8>>;

    fn token_flags(&self) -> Result<u64>;

    fn set_token_flags(&self, flags: u64) -> Result<()>;

    fn set_so_pin(&self, pin_blob: &[u8]) -> Result<()>;

    fn so_pin(&self) -> Result<Vec<u8>>;

    fn set_user_pin(&self, pin_blob: &[u8]) -> Result<()>;

    fn user_pin(&self) -> Result<Vec<u8>>;

    fn objects(&self) -> Result<Vec<Self::Object<'_>>>;

    fn create_object(&self) -> Result<Self::Object<'_>>;

    fn delete_object(&self, object: &mut Self::Object<'_>) -> Result<()>;

    fn is_valid(&self) -> bool;

    fn invalidate(&mut self);

    /// Remove the token and everything in it.
    fn clear_token(self) -> Result<()>;
}

/// A token stored in its own SQLite database.
#[derive(Debug)]
pub struct DbToken {
    name: String,
    dir: PathBuf,
    conn: Connection,
    valid: bool,
}

impl DbToken {
    /// Create the token database `base/name/sqlite3.db` and seed its metadata.
    ///
    /// Refuses to touch an existing database. On failure the partially
    /// created file and directory are removed.
    pub fn create(
        base: &Path,
        name: &str,
        label: &[u8],
        serial: &[u8],
        options: &ConnectionOptions,
    ) -> Result<Self> {
        Self::create_with(base, name, options, |token| token.initialize(label, serial))
    }

    /// Create the token database and fill it with `init`, removing what was
    /// created when `init` fails.
    fn create_with<F>(
        base: &Path,
        name: &str,
        options: &ConnectionOptions,
        init: F,
    ) -> Result<Self>
    where
        F: FnOnce(&Self) -> Result<()>,
    {
        let dir = base.join(name);
        let path = dir.join(DBTOKEN_FILE);
        if path.exists() {
            return Err(Error::TokenExists(path));
        }

        fs::create_dir_all(&dir)
            .io_context(|| format!("Failed to create token directory {}", dir.display()))?;

        let conn = match Connection::open(&dir, DBTOKEN_FILE, options) {
            Ok(conn) => conn,
            Err(e) => {
                remove_token_files(&dir);
                return Err(e.into());
            }
        };

        let token = Self {
            name: name.to_owned(),
            dir,
            conn,
            valid: true,
        };
        if let Err(e) = init(&token) {
            let DbToken { dir, mut conn, .. } = token;
            if let Err(close) = conn.close() {
                warn!("Failed to close token database {}: {close}", path.display());
            }
            drop(conn);
            remove_token_files(&dir);
            return Err(e);
        }

        debug!("Created token {} at {}", token.name, token.dir.display());
        Ok(token)
    }

    fn initialize(&self, label: &[u8], serial: &[u8]) -> Result<()> {
        let txn = self.conn.transaction(Access::ReadWrite)?;
        DbObject::new(&self.conn).create_tables()?;
        self.seed(label, serial)?;
        txn.commit()?;
        Ok(())
    }

    /// Insert the metadata object, which must get id 1, and store the
    /// initial label, serial and flags on it.
    fn seed(&self, label: &[u8], serial: &[u8]) -> Result<()> {
        let mut info = DbObject::new(&self.conn);
        let id = info.insert()?;
        if id != DBTOKEN_OBJECT_TOKENINFO {
            return Err(Error::TokenCorrupt {
                path: self.conn.path().to_owned(),
                id,
            });
        }
        info.set_attribute(CKA_OS_TOKENLABEL, &Attribute::ByteString(label.to_vec()))?;
        info.set_attribute(CKA_OS_TOKENSERIAL, &Attribute::ByteString(serial.to_vec()))?;
        info.set_attribute(CKA_OS_TOKENFLAGS, &Attribute::UnsignedLong(INITIAL_TOKEN_FLAGS))?;
        Ok(())
    }

    /// Open the token database `base/name/sqlite3.db`.
    pub fn open(base: &Path, name: &str, options: &ConnectionOptions) -> Result<Self> {
        let dir = base.join(name);
        let path = dir.join(DBTOKEN_FILE);
        if !path.is_file() {
            return Err(Error::TokenNotFound(path));
        }

        let conn = Connection::open(&dir, DBTOKEN_FILE, options)?;
        DbObject::new(&conn).find(DBTOKEN_OBJECT_TOKENINFO)?;

        debug!("Opened token {name} at {}", dir.display());
        Ok(Self {
            name: name.to_owned(),
            dir,
            conn,
            valid: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the token database.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// The metadata object, bound to this token's connection.
    fn token_object(&self) -> Result<DbObject<'_>> {
        if !self.valid {
            return Err(Error::InvalidToken);
        }
        Ok(DbObject::with_id(&self.conn, DBTOKEN_OBJECT_TOKENINFO))
    }

    fn byte_string(&self, ty: AttributeType) -> Result<Vec<u8>> {
        let mut info = self.token_object()?;
        match info.get_attribute(ty)? {
            Some(Attribute::ByteString(bytes)) => Ok(bytes.clone()),
            _ => Err(Error::MissingAttribute(ty)),
        }
    }

    fn stored_flags(info: &mut DbObject<'_>) -> Result<u64> {
        match info.get_attribute(CKA_OS_TOKENFLAGS)? {
            Some(Attribute::UnsignedLong(flags)) => Ok(*flags),
            _ => Err(Error::MissingAttribute(CKA_OS_TOKENFLAGS)),
        }
    }

    /// Store `pin_blob` under `ty` and update the flags, in one transaction.
    fn set_pin(&self, ty: AttributeType, pin_blob: &[u8], set: u64, clear: u64) -> Result<()> {
        let mut info = self.token_object()?;
        let txn = self.conn.transaction(Access::ReadWrite)?;
        info.set_attribute(ty, &Attribute::ByteString(pin_blob.to_vec()))?;
        let flags = (Self::stored_flags(&mut info)? | set) & !clear;
        info.set_attribute(CKA_OS_TOKENFLAGS, &Attribute::UnsignedLong(flags))?;
        txn.commit()?;
        Ok(())
    }

    /// Store a new SO PIN blob and clear the SO PIN state flags.
    pub fn set_so_pin(&self, pin_blob: &[u8]) -> Result<()> {
        self.set_pin(CKA_OS_SOPIN, pin_blob, 0, SO_PIN_STATE)
    }

    pub fn so_pin(&self) -> Result<Vec<u8>> {
        self.byte_string(CKA_OS_SOPIN)
    }

    /// Store a new user PIN blob, mark the user PIN initialized and clear the
    /// user PIN state flags.
    pub fn set_user_pin(&self, pin_blob: &[u8]) -> Result<()> {
        self.set_pin(
            CKA_OS_USERPIN,
            pin_blob,
            CKF_USER_PIN_INITIALIZED,
            USER_PIN_STATE,
        )
    }

    pub fn user_pin(&self) -> Result<Vec<u8>> {
        self.byte_string(CKA_OS_USERPIN)
    }

    pub fn token_label(&self) -> Result<Vec<u8>> {
        self.byte_string(CKA_OS_TOKENLABEL)
    }

    pub fn token_serial(&self) -> Result<Vec<u8>> {
        self.byte_string(CKA_OS_TOKENSERIAL)
    }

    /// The stored flags, with `CKF_USER_PIN_INITIALIZED` set whenever a user
    /// PIN is present.
    pub fn token_flags(&self) -> Result<u64> {
        let mut info = self.token_object()?;
        let mut flags = Self::stored_flags(&mut info)?;
        if info.attribute_exists(CKA_OS_USERPIN)? {
            flags |= CKF_USER_PIN_INITIALIZED;
        }
        Ok(flags)
    }

    pub fn set_token_flags(&self, flags: u64) -> Result<()> {
        self.token_object()?
            .set_attribute(CKA_OS_TOKENFLAGS, &Attribute::UnsignedLong(flags))
    }

    /// All objects except the metadata object, ordered by identifier.
    pub fn objects(&self) -> Result<Vec<DbObject<'_>>> {
        if !self.valid {
            return Err(Error::InvalidToken);
        }
        let statement = self
            .conn
            .prepare("select id from object where id <> ?1 order by id")?;
        statement.bind_int64(1, DBTOKEN_OBJECT_TOKENINFO)?;
        let result = self.conn.perform(&statement)?;

        let mut objects = Vec::new();
        if result.is_valid() {
            loop {
                objects.push(DbObject::with_id(&self.conn, result.get_int64(1)));
                if !result.next_row() {
                    break;
                }
            }
        }
        Ok(objects)
    }

    pub fn create_object(&self) -> Result<DbObject<'_>> {
        if !self.valid {
            return Err(Error::InvalidToken);
        }
        let mut object = DbObject::new(&self.conn);
        object.insert()?;
        Ok(object)
    }

    /// Delete `object` and its attributes. The metadata object cannot be
    /// deleted this way.
    pub fn delete_object(&self, object: &mut DbObject<'_>) -> Result<()> {
        if !self.valid {
            return Err(Error::InvalidToken);
        }
        if object.object_id() == DBTOKEN_OBJECT_TOKENINFO {
            return Err(Error::InvalidObjectId);
        }
        object.destroy()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Mark the token unusable, for instance after it was deleted elsewhere.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Close the database and remove it together with the token directory.
    pub fn clear_token(mut self) -> Result<()> {
        self.invalidate();
        self.conn.close()?;
        let path = self.dir.join(DBTOKEN_FILE);
        fs::remove_file(&path)
            .io_context(|| format!("Failed to remove token database {}", path.display()))?;
        fs::remove_dir_all(&self.dir)
            .io_context(|| format!("Failed to remove token directory {}", self.dir.display()))?;
        debug!("Cleared token {}", self.name);
        Ok(())
    }
}

/// Best-effort removal of a token that failed to initialize.
fn remove_token_files(dir: &Path) {
    let path = dir.join(DBTOKEN_FILE);
    if path.exists() {
        if let Err(e) = fs::remove_file(&path) {
            warn!("Failed to remove token database {}: {e}", path.display());
        }
    }
    if let Err(e) = fs::remove_dir(dir) {
        warn!("Failed to remove token directory {}: {e}", dir.display());
    }
}

impl Token for DbToken {
    type Object<'a> = DbObject<'a>;

    fn create(
        base: &Path,
        name: &str,
        label: &[u8],
        serial: &[u8],
        config: &StoreConfig,
    ) -> Result<Self> {
        DbToken::create(base, name, label, serial, &config.connection_options(name))
    }

    fn open(base: &Path, name: &str, config: &StoreConfig) -> Result<Self> {
        DbToken::open(base, name, &config.connection_options(name))
    }

    fn name(&self) -> &str {
        DbToken::name(self)
    }

    fn token_label(&self) -> Result<Vec<u8>> {
        DbToken::token_label(self)
    }

    fn token_serial(&self) -> Result<Vec<u8>> {
        DbToken::token_serial(self)
    }

    fn token_flags(&self) -> Result<u64> {
        DbToken::token_flags(self)
    }

    fn set_token_flags(&self, flags: u64) -> Result<()> {
        DbToken::set_token_flags(self, flags)
    }

    fn set_so_pin(&self, pin_blob: &[u8]) -> Result<()> {
        DbToken::set_so_pin(self, pin_blob)
    }

    fn so_pin(&self) -> Result<Vec<u8>> {
        DbToken::so_pin(self)
    }

    fn set_user_pin(&self, pin_blob: &[u8]) -> Result<()> {
        DbToken::set_user_pin(self, pin_blob)
    }

    fn user_pin(&self) -> Result<Vec<u8>> {
        DbToken::user_pin(self)
    }

    fn objects(&self) -> Result<Vec<DbObject<'_>>> {
        DbToken::objects(self)
    }

    fn create_object(&self) -> Result<DbObject<'_>> {
        DbToken::create_object(self)
    }

    fn delete_object(&self, object: &mut DbObject<'_>) -> Result<()> {
        DbToken::delete_object(self, object)
    }

    fn is_valid(&self) -> bool {
        DbToken::is_valid(self)
    }

    fn invalidate(&mut self) {
        DbToken::invalidate(self)
    }

    fn clear_token(self) -> Result<()> {
        DbToken::clear_token(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{CKF_SO_PIN_LOCKED, CKF_TOKEN_INITIALIZED};
    use tempfile::TempDir;

    fn create(base: &Path) -> DbToken {
        DbToken::create(
            base,
            "newToken",
            b"label",
            b"serial",
            &ConnectionOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_create_refuses_existing_database() {
        let base = TempDir::new().unwrap();
        let _token = create(base.path());
        assert!(matches!(
            DbToken::create(
                base.path(),
                "newToken",
                b"x",
                b"y",
                &ConnectionOptions::default()
            ),
            Err(Error::TokenExists(_))
        ));
    }

    #[test]
    fn test_open_missing_token() {
        let base = TempDir::new().unwrap();
        assert!(matches!(
            DbToken::open(base.path(), "absent", &ConnectionOptions::default()),
            Err(Error::TokenNotFound(_))
        ));
        assert!(!base.path().join("absent").exists());
    }

    #[test]
    fn test_initial_flags() {
        let base = TempDir::new().unwrap();
        let token = create(base.path());
        let flags = token.token_flags().unwrap();
        assert_eq!(flags, INITIAL_TOKEN_FLAGS);
        assert_ne!(flags & CKF_TOKEN_INITIALIZED, 0);
        assert_ne!(flags & CKF_SO_PIN_LOCKED, 0);
        assert_eq!(flags & CKF_USER_PIN_INITIALIZED, 0);
    }

    #[test]
    fn test_invalidated_token_refuses_access() {
        let base = TempDir::new().unwrap();
        let mut token = create(base.path());
        token.invalidate();
        assert!(!token.is_valid());
        assert!(matches!(token.token_label(), Err(Error::InvalidToken)));
        assert!(matches!(token.create_object(), Err(Error::InvalidToken)));
    }

    #[test]
    fn test_corrupt_metadata_id_removes_token() {
        let base = TempDir::new().unwrap();
        let options = ConnectionOptions::default();
        let result = DbToken::create_with(base.path(), "newToken", &options, |token| {
            let txn = token.conn.transaction(Access::ReadWrite)?;
            DbObject::new(&token.conn).create_tables()?;
            let statement = token
                .conn
                .prepare("insert into sqlite_sequence (name, seq) values ('object', 41)")?;
            token.conn.execute(&statement)?;
            token.seed(b"label", b"serial")?;
            txn.commit()?;
            Ok(())
        });

        match result {
            Err(Error::TokenCorrupt { id, .. }) => assert_eq!(id, 42),
            other => panic!("expected TokenCorrupt, got {other:?}"),
        }
        assert!(!base.path().join("newToken").exists());

        let token = create(base.path());
        assert_eq!(token.token_label().unwrap(), b"label");
    }

    #[test]
    fn test_failed_seeding_removes_token() {
        let base = TempDir::new().unwrap();
        let options = ConnectionOptions::default();
        let result = DbToken::create_with(base.path(), "newToken", &options, |token| {
            token.initialize(b"label", b"serial")?;
            // The tables exist now, so a second run fails.
            token.initialize(b"label", b"serial")
        });
        assert!(matches!(result, Err(Error::Db(_))));
        assert!(!base.path().join("newToken").exists());
        assert!(!matches!(
            DbToken::create(base.path(), "newToken", b"l", b"s", &options),
            Err(Error::TokenExists(_))
        ));
    }

    #[test]
    fn test_metadata_object_is_protected() {
        let base = TempDir::new().unwrap();
        let token = create(base.path());
        let mut info = DbObject::with_id(token.connection(), DBTOKEN_OBJECT_TOKENINFO);
        assert!(matches!(
            token.delete_object(&mut info),
            Err(Error::InvalidObjectId)
        ));
    }
}
