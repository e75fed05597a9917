// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Catalog of the tokens under one base directory.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::error::{Error, IoContext, Result};
use crate::token::{DbToken, Token};

/// Every token found under a base directory, one subdirectory each.
///
/// The backend is chosen by the type parameter; the store only relies on the
/// [`Token`] operations.
#[derive(Debug)]
pub struct ObjectStore<T: Token = DbToken> {
    base_dir: PathBuf,
    config: StoreConfig,
    tokens: Vec<T>,
}

impl<T: Token> ObjectStore<T> {
    /// Open every token under `config.base_dir`, creating the directory if
    /// needed. Entries that do not hold a readable token are skipped.
    pub fn new(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let base_dir = config.base_dir.clone();
        fs::create_dir_all(&base_dir)
            .io_context(|| format!("Failed to create base directory {}", base_dir.display()))?;

        let entries = fs::read_dir(&base_dir)
            .io_context(|| format!("Failed to read base directory {}", base_dir.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.io_context(|| format!("Failed to read entry in {}", base_dir.display()))?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => warn!("Skipping non UTF-8 token directory {name:?}"),
            }
        }
        names.sort();

        let mut tokens = Vec::with_capacity(names.len());
        for name in names {
            match T::open(&base_dir, &name, config) {
                Ok(token) => tokens.push(token),
                Err(e) => warn!("Skipping token directory {name}: {e}"),
            }
        }

        debug!(
            "Loaded {} token(s) from {}",
            tokens.len(),
            base_dir.display()
        );
        Ok(Self {
            base_dir,
            config: config.clone(),
            tokens,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn token(&self, index: usize) -> Option<&T> {
        self.tokens.get(index)
    }

    pub fn tokens(&self) -> &[T] {
        &self.tokens
    }

    /// Create a token with a random name. Its serial is the last 16 hex
    /// digits of the name.
    pub fn new_token(&mut self, label: &[u8]) -> Result<&T> {
        let name = generate_token_name()?;
        let serial = &name.as_bytes()[name.len() - 16..];
        let token = T::create(&self.base_dir, &name, label, serial, &self.config)?;
        debug!("Created token {name} in {}", self.base_dir.display());
        self.tokens.push(token);
        let index = self.tokens.len() - 1;
        Ok(&self.tokens[index])
    }

    /// Remove the token at `index` from the catalog and from disk.
    pub fn destroy_token(&mut self, index: usize) -> Result<()> {
        if index >= self.tokens.len() {
            return Err(Error::TokenIndex(index));
        }
        let token = self.tokens.remove(index);
        let name = token.name().to_owned();
        token.clear_token()?;
        debug!("Destroyed token {name}");
        Ok(())
    }
}

/// 16 random bytes, hex encoded.
fn generate_token_name() -> Result<String> {
    let mut bytes = [0u8; 16];
    getrandom::fill(&mut bytes).map_err(Error::Random)?;
    Ok(hex::encode(bytes))
}
