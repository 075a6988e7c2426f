//! Cryptographic and encoding primitives for STAS token transactions.
//!
//! This crate provides the building blocks used by the script, transaction
//! and token layers:
//! - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160)
//! - Chain hash type for transaction identifiers
//! - secp256k1 keys and DER signatures
//! - Variable-length integers and a binary reader/writer

pub mod chainhash;
pub mod ec;
pub mod hash;
pub mod util;

mod error;
pub use error::PrimitivesError;
