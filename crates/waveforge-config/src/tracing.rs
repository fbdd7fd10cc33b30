// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2026 Waveforge contributors
// Part of Waveforge. Licensed under AGPL-3.0-or-later.

//! Tracing-subscriber bootstrap shared by every Waveforge binary.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Errors raised while configuring the global subscriber.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("tracing subscriber was already initialised")]
    AlreadyInitialised,
}

/// Configures the global tracing subscriber.
///
/// The filter defaults to `info` and honours `RUST_LOG`. Safe to call from
/// any host exactly once; later calls report [`InitError::AlreadyInitialised`]
/// without touching the installed subscriber.
pub fn init_tracing() -> Result<(), InitError> {
    INITIALISED
        .set(())
        .map_err(|_| InitError::AlreadyInitialised)?;

    let ansi = std::io::stdout().is_terminal();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(ansi);
    Registry::default().with(filter).with(fmt_layer).init();

    Ok(())
}
