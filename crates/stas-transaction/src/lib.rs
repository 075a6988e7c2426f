//! Transaction building, signing and serialization.
//!
//! Provides the `Transaction` type with inputs and outputs, the FORKID
//! signature-hash preimage the token scripts introspect, and the P2PKH
//! template used for funding inputs.

pub mod input;
pub mod output;
pub mod sighash;
pub mod template;
pub mod transaction;

mod error;
pub use error::TransactionError;
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use transaction::Transaction;

#[cfg(test)]
mod tests;
