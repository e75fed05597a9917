// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Store catalog: token discovery, creation and removal.

use std::fs;

use rstest::{fixture, rstest};
use tempfile::TempDir;
use tokenstore::{Error, ObjectStore, StoreConfig};

struct Fixture {
    _base: TempDir,
    config: StoreConfig,
}

#[fixture]
fn fixture() -> Fixture {
    let base = TempDir::new().unwrap();
    let config = StoreConfig {
        base_dir: base.path().join("tokens"),
        busy_timeout_ms: 100,
        ..StoreConfig::default()
    };
    Fixture {
        _base: base,
        config,
    }
}

#[test_log::test(rstest)]
fn test_empty_store(fixture: Fixture) {
    let store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    assert_eq!(store.token_count(), 0);
    assert!(store.token(0).is_none());
    assert!(fixture.config.base_dir.is_dir());
}

#[rstest]
fn test_new_tokens(fixture: Fixture) {
    let mut store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    let first_label = hex::decode("DEADC0FFEE").unwrap();
    let second_label = hex::decode("DEADBEEF").unwrap();

    let first = store.new_token(&first_label).unwrap();
    assert!(first.is_valid());
    assert_eq!(first.token_label().unwrap(), first_label);
    let first_serial = first.token_serial().unwrap();
    assert_eq!(first_serial.len(), 16);
    assert!(first.name().ends_with(std::str::from_utf8(&first_serial).unwrap()));

    let second = store.new_token(&second_label).unwrap();
    assert_eq!(second.token_label().unwrap(), second_label);
    assert_ne!(second.token_serial().unwrap(), first_serial);
    assert_eq!(store.token_count(), 2);
}

#[rstest]
fn test_reopen_store(fixture: Fixture) {
    let mut names = {
        let mut store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
        let a = store.new_token(b"a").unwrap().name().to_owned();
        let b = store.new_token(b"b").unwrap().name().to_owned();
        vec![a, b]
    };
    names.sort();

    let store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    let found: Vec<_> = store.tokens().iter().map(|t| t.name().to_owned()).collect();
    assert_eq!(found, names);
}

#[rstest]
fn test_skips_foreign_directories(fixture: Fixture) {
    fs::create_dir_all(fixture.config.base_dir.join("not-a-token")).unwrap();
    fs::write(fixture.config.base_dir.join("stray-file"), b"x").unwrap();

    let mut store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    assert_eq!(store.token_count(), 0);
    store.new_token(b"label").unwrap();

    let store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    assert_eq!(store.token_count(), 1);
}

#[rstest]
fn test_destroy_token(fixture: Fixture) {
    let mut store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    let name = store.new_token(b"doomed").unwrap().name().to_owned();
    store.new_token(b"kept").unwrap();

    let index = store
        .tokens()
        .iter()
        .position(|t| t.name() == name)
        .unwrap();
    store.destroy_token(index).unwrap();
    assert_eq!(store.token_count(), 1);
    assert!(!fixture.config.base_dir.join(&name).exists());
    assert!(matches!(store.destroy_token(5), Err(Error::TokenIndex(5))));

    let store: ObjectStore = ObjectStore::new(&fixture.config).unwrap();
    assert_eq!(store.token_count(), 1);
    assert_eq!(store.token(0).unwrap().token_label().unwrap(), b"kept");
}

#[rstest]
fn test_invalid_config_is_rejected(fixture: Fixture) {
    let config = StoreConfig {
        busy_timeout_ms: 0,
        ..fixture.config
    };
    assert!(matches!(
        ObjectStore::<tokenstore::DbToken>::new(&config),
        Err(Error::Config(_))
    ));
}
