// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use anyhow::Context;
use tokenstore::{DbToken, Error, ObjectStore, StoreConfig};
use tracing::info;

use crate::cli::{Cli, Command, IndexArgs, InitArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => StoreConfig::from_file(path)?,
        None => StoreConfig::load()?,
    };
    let mut store: ObjectStore = ObjectStore::new(&config)
        .with_context(|| format!("opening store at {}", config.base_dir.display()))?;

    match cli.command {
        Command::Init(args) => cmd_init(&mut store, args),
        Command::List => cmd_list(&store),
        Command::Show(args) => cmd_show(&store, args),
        Command::Delete(args) => cmd_delete(&mut store, args),
    }
}

fn cmd_init(store: &mut ObjectStore, args: InitArgs) -> anyhow::Result<()> {
    let token = store.new_token(args.label.as_bytes())?;
    info!("Created token {}", token.name());
    println!("{}", token.name());
    Ok(())
}

fn cmd_list(store: &ObjectStore) -> anyhow::Result<()> {
    for (index, token) in store.tokens().iter().enumerate() {
        println!(
            "{index}\t{}\t{}\t{}\t{:#010x}",
            token.name(),
            display_bytes(&token.token_label()?),
            display_bytes(&token.token_serial()?),
            token.token_flags()?
        );
    }
    Ok(())
}

fn cmd_show(store: &ObjectStore, args: IndexArgs) -> anyhow::Result<()> {
    let token = token_at(store, args.index)?;
    println!("name:      {}", token.name());
    println!("directory: {}", token.dir().display());
    println!("label:     {}", display_bytes(&token.token_label()?));
    println!("serial:    {}", display_bytes(&token.token_serial()?));
    println!("flags:     {:#010x}", token.token_flags()?);
    println!("so pin:    {}", pin_state(token.so_pin())?);
    println!("user pin:  {}", pin_state(token.user_pin())?);
    println!("objects:   {}", token.objects()?.len());
    Ok(())
}

fn cmd_delete(store: &mut ObjectStore, args: IndexArgs) -> anyhow::Result<()> {
    let name = token_at(store, args.index)?.name().to_owned();
    store.destroy_token(args.index)?;
    info!("Deleted token {name}");
    Ok(())
}

fn token_at(store: &ObjectStore, index: usize) -> anyhow::Result<&DbToken> {
    store.token(index).with_context(|| {
        format!(
            "no token at index {index}, the store holds {}",
            store.token_count()
        )
    })
}

/// Whether a PIN blob is stored. Errors other than absence are passed on.
fn pin_state(pin: tokenstore::Result<Vec<u8>>) -> anyhow::Result<&'static str> {
    match pin {
        Ok(_) => Ok("set"),
        Err(Error::MissingAttribute(_)) => Ok("unset"),
        Err(e) => Err(e.into()),
    }
}

/// Printable text as is, anything else as hex.
fn display_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => text.to_owned(),
        _ => hex::encode(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_bytes() {
        assert_eq!(display_bytes(b"my token"), "my token");
        assert_eq!(display_bytes(&[0xde, 0xad, 0x00]), "dead00");
    }

    #[test]
    fn test_pin_state() {
        assert_eq!(pin_state(Ok(b"blob".to_vec())).unwrap(), "set");
        assert_eq!(
            pin_state(Err(Error::MissingAttribute(0x8000_534c))).unwrap(),
            "unset"
        );
        assert!(pin_state(Err(Error::InvalidToken)).is_err());
    }
}
