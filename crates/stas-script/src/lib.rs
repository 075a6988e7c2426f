//! Script handling for STAS token transactions.
//!
//! Provides the `Script` byte-vector type, opcode constants, chunk decoding,
//! minimal push encoding, script-number encoding for amounts, and Base58Check
//! P2PKH addresses.

pub mod address;
pub mod chunk;
pub mod number;
pub mod opcodes;
pub mod script;

mod error;
pub use address::{Address, Network};
pub use chunk::ScriptChunk;
pub use error::ScriptError;
pub use script::Script;
