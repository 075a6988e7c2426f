//! Unlocking script templates.

pub mod p2pkh;

use stas_script::Script;

use crate::transaction::Transaction;
use crate::TransactionError;

/// A signing strategy producing the unlocking script for one input.
pub trait UnlockingScriptTemplate {
    /// Produce the unlocking script for `input_index`.
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<Script, TransactionError>;

    /// Upper bound on the unlocking script length, used for fee estimation
    /// before the signature exists.
    fn estimate_length(&self, tx: &Transaction, input_index: usize) -> usize;
}
