// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Token creation, metadata and object management.

use rstest::{fixture, rstest};
use tempfile::TempDir;
use tokenstore::flags::*;
use tokenstore::token::DBTOKEN_FILE;
use tokenstore::types::{CKA_LABEL, CKA_TOKEN};
use tokenstore::{Attribute, DbToken, Error};
use tokenstore_db::ConnectionOptions;

struct Fixture {
    base: TempDir,
    token: DbToken,
}

fn label() -> Vec<u8> {
    hex::decode("40414243").unwrap()
}

fn serial() -> Vec<u8> {
    hex::decode("0102030405060708").unwrap()
}

#[fixture]
fn fixture() -> Fixture {
    let base = TempDir::new().unwrap();
    let token = DbToken::create(
        base.path(),
        "newToken",
        &label(),
        &serial(),
        &ConnectionOptions::default(),
    )
    .unwrap();
    Fixture { base, token }
}

#[test_log::test(rstest)]
fn test_create_token(fixture: Fixture) {
    let token = &fixture.token;
    assert!(token.is_valid());
    assert!(fixture.base.path().join("newToken").join(DBTOKEN_FILE).is_file());
    assert_eq!(token.token_serial().unwrap(), serial());
    assert_eq!(token.token_label().unwrap(), b"@ABC");
    assert!(token.objects().unwrap().is_empty());

    let mut info = tokenstore::DbObject::new(token.connection());
    info.find(1).unwrap();
    assert_eq!(info.object_id(), 1);
}

#[rstest]
fn test_reopen_token(fixture: Fixture) {
    let Fixture { base, token } = fixture;
    token.set_so_pin(b"so-blob").unwrap();
    drop(token);

    let token = DbToken::open(base.path(), "newToken", &ConnectionOptions::default()).unwrap();
    assert_eq!(token.token_label().unwrap(), label());
    assert_eq!(token.so_pin().unwrap(), b"so-blob");
}

#[rstest]
fn test_pins_update_flags(fixture: Fixture) {
    let token = &fixture.token;
    assert!(matches!(token.so_pin(), Err(Error::MissingAttribute(_))));
    assert!(matches!(token.user_pin(), Err(Error::MissingAttribute(_))));

    token.set_so_pin(b"so").unwrap();
    let flags = token.token_flags().unwrap();
    assert_eq!(flags & SO_PIN_STATE, 0);
    assert_eq!(flags & CKF_USER_PIN_INITIALIZED, 0);
    assert_ne!(flags & CKF_TOKEN_INITIALIZED, 0);

    token
        .set_token_flags(flags | CKF_USER_PIN_LOCKED | CKF_USER_PIN_FINAL_TRY)
        .unwrap();
    token.set_user_pin(b"user").unwrap();
    let flags = token.token_flags().unwrap();
    assert_ne!(flags & CKF_USER_PIN_INITIALIZED, 0);
    assert_eq!(flags & USER_PIN_STATE, 0);
    assert_eq!(token.user_pin().unwrap(), b"user");
}

#[rstest]
fn test_user_pin_presence_sets_flag(fixture: Fixture) {
    let token = &fixture.token;
    token.set_user_pin(b"user").unwrap();
    // The stored flags lose the bit, the reported flags do not.
    token.set_token_flags(INITIAL_TOKEN_FLAGS).unwrap();
    assert_ne!(token.token_flags().unwrap() & CKF_USER_PIN_INITIALIZED, 0);
}

#[rstest]
fn test_objects(fixture: Fixture) {
    let token = &fixture.token;
    let mut first = token.create_object().unwrap();
    first.set_attribute(CKA_TOKEN, &true.into()).unwrap();
    let second = token.create_object().unwrap();
    assert!(first.object_id() > 1);
    assert!(second.object_id() > first.object_id());

    let ids: Vec<_> = token.objects().unwrap().iter().map(|o| o.object_id()).collect();
    assert_eq!(ids, vec![first.object_id(), second.object_id()]);

    token.delete_object(&mut first).unwrap();
    assert!(!first.is_valid());

    let mut remaining = token.objects().unwrap();
    assert_eq!(remaining.len(), 1);
    remaining[0]
        .set_attribute(CKA_LABEL, &Attribute::ByteString(b"key".to_vec()))
        .unwrap();
    assert_eq!(
        remaining[0].get_attribute(CKA_LABEL).unwrap(),
        Some(&Attribute::ByteString(b"key".to_vec()))
    );
}

#[rstest]
fn test_clear_token(fixture: Fixture) {
    let Fixture { base, token } = fixture;
    token.clear_token().unwrap();
    assert!(!base.path().join("newToken").exists());
    assert!(matches!(
        DbToken::open(base.path(), "newToken", &ConnectionOptions::default()),
        Err(Error::TokenNotFound(_))
    ));
}
