// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Token object store.
//!
//! Persists the objects of cryptographic tokens (in the PKCS#11 sense) as
//! typed attributes in SQLite, one database per token.
//!
//! **Architecture**: objects and tokens sit on top of `tokenstore-db`, which
//! owns all SQL access.
//!
//! # Key Features
//!
//! - Boolean, unsigned integer and byte string attributes per object
//! - Read-only and read-write (immediate) attribute transactions
//! - Token metadata: label, serial, flags, SO and user PIN blobs
//! - A catalog of all tokens below a base directory
//!
//! # Example
//!
//! ```ignore
//! use tokenstore::{Attribute, ObjectStore, StoreConfig, types::CKA_TOKEN};
//!
//! let mut store: ObjectStore = ObjectStore::new(&StoreConfig::default())?;
//! let token = store.new_token(b"my token")?;
//! let mut key = token.create_object()?;
//! key.set_attribute(CKA_TOKEN, &Attribute::Boolean(true))?;
//! ```

pub mod attribute;
pub mod config;
mod error;
pub mod flags;
pub mod object;
pub mod schema;
pub mod store;
pub mod token;

pub use attribute::{Attribute, AttributeKind, AttributeType, types};
pub use config::StoreConfig;
pub use error::{Error, IoContext, Result};
pub use object::{DbObject, ObjectId, StoreObject};
pub use store::ObjectStore;
pub use token::{DbToken, Token};
pub use tokenstore_db::Access;
