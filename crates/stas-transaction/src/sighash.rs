//! Signature hash computation.
//!
//! BSV signs a BIP-143-style digest that includes the FORKID flag. Token
//! scripts go further and require the raw preimage itself inside the
//! unlocking script, so both the preimage and its digest are exposed.

use stas_primitives::hash::sha256d;
use stas_primitives::util::BsvWriter;

use crate::transaction::Transaction;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Sighash flag constants
// -----------------------------------------------------------------------

/// Sign all inputs and all outputs.
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign no outputs.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign only the output with the same index as the signed input.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Sign only the current input, so others may be added later.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Replay-protection flag required on every BSV signature.
pub const SIGHASH_FORKID: u32 = 0x40;

/// ALL | FORKID, the default for token and funding inputs.
pub const SIGHASH_ALL_FORKID: u32 = SIGHASH_ALL | SIGHASH_FORKID;

/// SINGLE | ANYONECANPAY | FORKID, used to sign a swap offer.
pub const SIGHASH_SINGLE_ANYONECANPAY_FORKID: u32 =
    SIGHASH_SINGLE | SIGHASH_ANYONECANPAY | SIGHASH_FORKID;

/// Mask extracting the base type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u32 = 0x1f;

/// Fixed bytes of a preimage excluding the script code and its length prefix.
pub const PREIMAGE_FIXED_LEN: usize = 4 + 32 + 32 + 36 + 8 + 4 + 32 + 4 + 4;

// -----------------------------------------------------------------------
// FORKID signature hash
// -----------------------------------------------------------------------

/// Compute the digest signed for `input_index`.
///
/// # Arguments
/// * `tx`                  - The transaction being signed.
/// * `input_index`         - Index of the input being signed.
/// * `prev_output_script`  - The locking script (scriptCode) of the output being spent.
/// * `sighash_type`        - The combined sighash flags.
/// * `satoshis`            - The value of the output being spent.
///
/// # Returns
/// The 32-byte double-SHA256 of the preimage.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    prev_output_script: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<[u8; 32], TransactionError> {
    let preimage = calc_preimage(tx, input_index, prev_output_script, sighash_type, satoshis)?;
    Ok(sha256d(&preimage))
}

/// Compute the preimage bytes before double-hashing.
///
/// Field order: nVersion, hashPrevouts, hashSequence, outpoint,
/// scriptCode, value, nSequence, hashOutputs, nLocktime, sighash type.
///
/// # Returns
/// The raw preimage, or `InvalidTransaction` if `input_index` is out of range.
pub fn calc_preimage(
    tx: &Transaction,
    input_index: usize,
    prev_output_script: &[u8],
    sighash_type: u32,
    satoshis: u64,
) -> Result<Vec<u8>, TransactionError> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        TransactionError::InvalidTransaction(format!(
            "input index {} out of range (tx has {} inputs)",
            input_index,
            tx.inputs.len()
        ))
    })?;

    let base_type = sighash_type & SIGHASH_MASK;
    let anyone_can_pay = sighash_type & SIGHASH_ANYONECANPAY != 0;

    let hash_prevouts = if anyone_can_pay {
        [0u8; 32]
    } else {
        prevouts_hash(tx)
    };

    let hash_sequence =
        if anyone_can_pay || base_type == SIGHASH_SINGLE || base_type == SIGHASH_NONE {
            [0u8; 32]
        } else {
            sequence_hash(tx)
        };

    let hash_outputs = match base_type {
        SIGHASH_SINGLE => match tx.outputs.get(input_index) {
            Some(output) => sha256d(&output.to_bytes()),
            None => [0u8; 32],
        },
        SIGHASH_NONE => [0u8; 32],
        _ => outputs_hash(tx),
    };

    let mut writer = BsvWriter::with_capacity(PREIMAGE_FIXED_LEN + 3 + prev_output_script.len());
    writer.write_u32_le(tx.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);
    writer.write_bytes(&input.source_txid);
    writer.write_u32_le(input.source_tx_out_index);
    writer.write_var_bytes(prev_output_script);
    writer.write_u64_le(satoshis);
    writer.write_u32_le(input.sequence_number);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(sighash_type);

    Ok(writer.into_bytes())
}

fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = BsvWriter::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        writer.write_bytes(&input.source_txid);
        writer.write_u32_le(input.source_tx_out_index);
    }
    sha256d(writer.as_bytes())
}

fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = BsvWriter::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        writer.write_u32_le(input.sequence_number);
    }
    sha256d(writer.as_bytes())
}

fn outputs_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = BsvWriter::new();
    for output in &tx.outputs {
        output.write_to(&mut writer);
    }
    sha256d(writer.as_bytes())
}
