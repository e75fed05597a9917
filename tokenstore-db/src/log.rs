// SPDX-FileCopyrightText: 2025 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Process-wide error reporting hook.
//!
//! Every engine error seen by this crate is passed to a single handler. The
//! default handler forwards to `tracing::error!`. Tests that exercise failure
//! paths on purpose can install a different handler, or none at all.

use std::fmt::Display;
use std::sync::{PoisonError, RwLock};

/// Receives one formatted error message.
pub type LogErrorHandler = fn(&str);

static HANDLER: RwLock<Option<LogErrorHandler>> = RwLock::new(Some(default_handler as LogErrorHandler));

fn default_handler(message: &str) {
    tracing::error!("{message}");
}

/// Install `handler`, returning the one previously installed.
///
/// Passing `None` disables error reporting altogether.
pub fn set_log_error_handler(handler: Option<LogErrorHandler>) -> Option<LogErrorHandler> {
    let mut current = HANDLER.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *current, handler)
}

/// Restore the default handler.
pub fn reset_log_error_handler() {
    set_log_error_handler(Some(default_handler));
}

/// Report an error message through the installed handler.
pub fn log_error(message: impl Display) {
    let handler = *HANDLER.read().unwrap_or_else(PoisonError::into_inner);
    if let Some(handler) = handler {
        handler(&message.to_string());
    }
}
