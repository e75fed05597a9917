// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tokenstore", about = "Inspect and manage token object stores", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file (falls back to $TOKENSTORE_CONFIG)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new token
    Init(InitArgs),
    /// List all tokens in the store
    List,
    /// Show the metadata of one token
    Show(IndexArgs),
    /// Delete a token and all of its objects
    Delete(IndexArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Token label
    #[arg(short, long)]
    pub label: String,
}

#[derive(Args)]
pub struct IndexArgs {
    /// Position of the token as printed by `list`
    pub index: usize,
}
