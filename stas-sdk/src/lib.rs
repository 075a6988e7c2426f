#![deny(missing_docs)]

//! STAS token SDK.
//!
//! Re-exports the SDK crates for single-crate usage and adds the
//! process-level pieces: [`Settings`] loading and [`init_tracing`].

pub mod error;
pub mod settings;

pub use stas_primitives as primitives;
pub use stas_script as script;
pub use stas_tokens as tokens;
pub use stas_transaction as transaction;

pub use error::SdkError;
pub use settings::Settings;

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Install a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` when a global subscriber was already installed; calling
/// it more than once is harmless.
pub fn init_tracing() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
