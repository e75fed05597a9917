// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Token database schema.
//!
//! One `object` table and one attribute table per value kind. Every attribute
//! row references its object and is deleted along with it.

use crate::attribute::AttributeKind;

macro_rules! attribute_table {
    ($name:literal, $column:literal) => {
        (
            $name,
            concat!(
                "create table ",
                $name,
                " (value ",
                $column,
                ", type integer, object_id integer references object(id) on delete cascade, ",
                "id integer primary key autoincrement)"
            ),
        )
    };
}

/// Tables created for a new token, in creation order.
pub const TABLES: &[(&str, &str)] = &[
    (
        "object",
        "create table object (id integer primary key autoincrement)",
    ),
    attribute_table!("attribute_text", "text"),
    attribute_table!("attribute_integer", "integer"),
    attribute_table!("attribute_blob", "blob"),
    attribute_table!("attribute_boolean", "boolean"),
    attribute_table!("attribute_datetime", "datetime"),
    attribute_table!("attribute_real", "real"),
];

/// Order in which kind tables are consulted when reading an attribute.
///
/// Writes keep at most one row per (object, type) across all kinds, so the
/// order only matters for databases written by other tools.
pub const KIND_PRIORITY: [AttributeKind; 3] = [
    AttributeKind::Boolean,
    AttributeKind::Integer,
    AttributeKind::Blob,
];

/// Pick the kind to read when rows exist in several kind tables.
pub fn resolve_kind(present: impl IntoIterator<Item = AttributeKind>) -> Option<AttributeKind> {
    let present: Vec<AttributeKind> = present.into_iter().collect();
    KIND_PRIORITY.into_iter().find(|kind| present.contains(kind))
}

impl AttributeKind {
    /// Table holding attributes of this kind.
    pub fn table(self) -> &'static str {
        match self {
            AttributeKind::Boolean => "attribute_boolean",
            AttributeKind::Integer => "attribute_integer",
            AttributeKind::Blob => "attribute_blob",
        }
    }
}
