//! Pay-to-public-key-hash template.
//!
//! Locking: `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`.
//! Unlocking: `<DER sig + sighash byte> <compressed pubkey>`.

use stas_primitives::ec::{PrivateKey, PublicKey};
use stas_script::{Address, Script};

use crate::sighash::SIGHASH_ALL_FORKID;
use crate::template::UnlockingScriptTemplate;
use crate::transaction::Transaction;
use crate::TransactionError;

/// Upper bound of a P2PKH unlocking script: push + 72-byte DER signature +
/// sighash byte, push + 33-byte compressed key.
pub const P2PKH_UNLOCKING_SCRIPT_BYTES: usize = 1 + 73 + 1 + 33;

/// P2PKH locking script for `address`.
pub fn lock(address: &Address) -> Script {
    Script::p2pkh(&address.public_key_hash)
}

/// Build `<sig> <pubkey>` from a finished signature (DER plus sighash byte).
pub fn unlocking_script(signature: &[u8], public_key: &PublicKey) -> Result<Script, TransactionError> {
    let mut script = Script::new();
    script.append_push_data(signature)?;
    script.append_push_data(&public_key.to_compressed())?;
    Ok(script)
}

/// Create a P2PKH unlocker for `private_key`.
///
/// `sighash_flag` defaults to `SIGHASH_ALL_FORKID`.
pub fn unlock(private_key: PrivateKey, sighash_flag: Option<u32>) -> P2PKH {
    P2PKH {
        private_key,
        sighash_flag: sighash_flag.unwrap_or(SIGHASH_ALL_FORKID),
    }
}

/// P2PKH signing template holding a private key and sighash flag.
pub struct P2PKH {
    private_key: PrivateKey,
    sighash_flag: u32,
}

impl UnlockingScriptTemplate for P2PKH {
    /// Sign the input using the attached source output.
    ///
    /// # Returns
    /// The unlocking script, or a `SigningError` when the input is out of
    /// range or has no source output.
    fn sign(&self, tx: &Transaction, input_index: usize) -> Result<Script, TransactionError> {
        let input = tx.inputs.get(input_index).ok_or_else(|| {
            TransactionError::SigningError(format!(
                "input index {} out of range (tx has {} inputs)",
                input_index,
                tx.inputs.len()
            ))
        })?;
        let source = input.source_tx_output().ok_or_else(|| {
            TransactionError::SigningError("missing source output on input".to_string())
        })?;

        let sig_hash = tx.signature_hash(
            input_index,
            source.locking_script.to_bytes(),
            self.sighash_flag,
            source.satoshis,
        )?;
        let signature = self.private_key.sign(&sig_hash)?;

        let mut sig_buf = signature.to_der();
        sig_buf.push(self.sighash_flag as u8);
        unlocking_script(&sig_buf, &self.private_key.pub_key())
    }

    fn estimate_length(&self, _tx: &Transaction, _input_index: usize) -> usize {
        P2PKH_UNLOCKING_SCRIPT_BYTES
    }
}
