// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Typed attribute values.

/// Caller-defined attribute tag (a PKCS#11 `CKA_*` value).
pub type AttributeType = u32;

/// A value stored on an object under some [`AttributeType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    Boolean(bool),
    UnsignedLong(u64),
    ByteString(Vec<u8>),
}

/// The storage kind of an [`Attribute`]; each kind has its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Boolean,
    Integer,
    Blob,
}

impl Attribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Attribute::Boolean(_) => AttributeKind::Boolean,
            Attribute::UnsignedLong(_) => AttributeKind::Integer,
            Attribute::ByteString(_) => AttributeKind::Blob,
        }
    }

    pub fn is_boolean_attribute(&self) -> bool {
        matches!(self, Attribute::Boolean(_))
    }

    pub fn is_unsigned_long_attribute(&self) -> bool {
        matches!(self, Attribute::UnsignedLong(_))
    }

    pub fn is_byte_string_attribute(&self) -> bool {
        matches!(self, Attribute::ByteString(_))
    }

    pub fn boolean_value(&self) -> Option<bool> {
        match self {
            Attribute::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn unsigned_long_value(&self) -> Option<u64> {
        match self {
            Attribute::UnsignedLong(v) => Some(*v),
            _ => None,
        }
    }

    pub fn byte_string_value(&self) -> Option<&[u8]> {
        match self {
            Attribute::ByteString(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<bool> for Attribute {
    fn from(value: bool) -> Self {
        Attribute::Boolean(value)
    }
}

impl From<u64> for Attribute {
    fn from(value: u64) -> Self {
        Attribute::UnsignedLong(value)
    }
}

impl From<Vec<u8>> for Attribute {
    fn from(value: Vec<u8>) -> Self {
        Attribute::ByteString(value)
    }
}

impl From<&[u8]> for Attribute {
    fn from(value: &[u8]) -> Self {
        Attribute::ByteString(value.to_vec())
    }
}

/// PKCS#11 attribute types used by the store, plus the vendor types holding
/// token metadata on object 1.
pub mod types {
    use super::AttributeType;

    pub const CKA_CLASS: AttributeType = 0x0000;
    pub const CKA_TOKEN: AttributeType = 0x0001;
    pub const CKA_PRIVATE: AttributeType = 0x0002;
    pub const CKA_LABEL: AttributeType = 0x0003;
    pub const CKA_VALUE: AttributeType = 0x0011;
    pub const CKA_ISSUER: AttributeType = 0x0081;
    pub const CKA_KEY_TYPE: AttributeType = 0x0100;
    pub const CKA_SUBJECT: AttributeType = 0x0101;
    pub const CKA_ID: AttributeType = 0x0102;
    pub const CKA_SENSITIVE: AttributeType = 0x0103;
    pub const CKA_SIGN: AttributeType = 0x0108;
    pub const CKA_VERIFY: AttributeType = 0x010a;
    pub const CKA_MODULUS: AttributeType = 0x0120;
    pub const CKA_MODULUS_BITS: AttributeType = 0x0121;
    pub const CKA_PUBLIC_EXPONENT: AttributeType = 0x0122;
    pub const CKA_COEFFICIENT: AttributeType = 0x0128;
    pub const CKA_PRIME_BITS: AttributeType = 0x0133;
    pub const CKA_SUBPRIME_BITS: AttributeType = 0x0134;
    pub const CKA_VALUE_BITS: AttributeType = 0x0160;
    pub const CKA_EXTRACTABLE: AttributeType = 0x0162;
    pub const CKA_NEVER_EXTRACTABLE: AttributeType = 0x0164;
    pub const CKA_AUTH_PIN_FLAGS: AttributeType = 0x0201;

    pub const CKA_VENDOR_DEFINED: AttributeType = 0x8000_0000;
    pub const CKA_VENDOR_TOKENSTORE: AttributeType = CKA_VENDOR_DEFINED + 0x5348;

    pub const CKA_OS_TOKENLABEL: AttributeType = CKA_VENDOR_TOKENSTORE + 1;
    pub const CKA_OS_TOKENSERIAL: AttributeType = CKA_VENDOR_TOKENSTORE + 2;
    pub const CKA_OS_TOKENFLAGS: AttributeType = CKA_VENDOR_TOKENSTORE + 3;
    pub const CKA_OS_SOPIN: AttributeType = CKA_VENDOR_TOKENSTORE + 4;
    pub const CKA_OS_USERPIN: AttributeType = CKA_VENDOR_TOKENSTORE + 5;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_and_getters() {
        let attr = Attribute::from(true);
        assert!(attr.is_boolean_attribute());
        assert_eq!(attr.boolean_value(), Some(true));
        assert_eq!(attr.unsigned_long_value(), None);

        let attr = Attribute::from(0x8765_4321u64);
        assert!(attr.is_unsigned_long_attribute());
        assert_eq!(attr.kind(), AttributeKind::Integer);

        let attr = Attribute::from(&b"\0ab\0"[..]);
        assert!(attr.is_byte_string_attribute());
        assert_eq!(attr.byte_string_value(), Some(&b"\0ab\0"[..]));
    }

    #[test]
    fn test_vendor_types() {
        assert_eq!(types::CKA_OS_TOKENLABEL, 0x8000_5349);
        assert_eq!(types::CKA_OS_USERPIN, 0x8000_534d);
    }
}
