//! Size and fee estimation.
//!
//! Unlocking scripts do not exist when the change output is sized, so their
//! length is bounded from above: amounts as 9-byte pushes, signatures at the
//! 72-byte DER maximum plus the sighash byte, and preimages at their exact
//! length (which only depends on the spent script).

use stas_primitives::util::VarInt;
use stas_script::chunk::push_data_prefix;
use stas_transaction::sighash::PREIMAGE_FIXED_LEN;
use stas_transaction::template::p2pkh::P2PKH_UNLOCKING_SCRIPT_BYTES;
use stas_transaction::Transaction;

use crate::assembler::UnlockShape;
use crate::config::FeeRate;
use crate::error::TokenError;

/// Upper bound of an amount push (8-byte number plus prefix).
pub const AMOUNT_PUSH_BYTES: usize = 9;

/// A 20-byte hash push.
pub const HASH_PUSH_BYTES: usize = 21;

/// Upper bound of an output-index push.
pub const INDEX_PUSH_BYTES: usize = 9;

/// A 32-byte txid push.
pub const TXID_PUSH_BYTES: usize = 33;

/// Signature push: prefix, 72-byte DER maximum, sighash byte.
pub const SIGNATURE_PUSH_BYTES: usize = 1 + 72 + 1;

/// Compressed public key push.
pub const PUBLIC_KEY_PUSH_BYTES: usize = 1 + 33;

/// Fee for `size_bytes` at `rate`, rounded up.
pub fn estimate_fee(size_bytes: usize, rate: &FeeRate) -> u64 {
    rate.fee_for(size_bytes)
}

/// Bytes taken by a single push of `len` bytes.
pub fn push_size(len: usize) -> usize {
    if len == 0 {
        return 1;
    }
    push_data_prefix(len).map_or(5, |p| p.len()) + len
}

/// Exact sighash preimage length for a spent script of `script_len` bytes.
pub fn preimage_len(script_len: usize) -> usize {
    PREIMAGE_FIXED_LEN + VarInt::from(script_len).length() + script_len
}

/// Upper bound of the shape fields for `shape`.
pub fn shape_len(shape: &UnlockShape) -> usize {
    match shape {
        UnlockShape::Plain => 1,
        UnlockShape::Swap { counterpart_tx, .. } => {
            INDEX_PUSH_BYTES + push_size(counterpart_tx.len()) + 1
        }
        UnlockShape::Merge { pieces, .. } => {
            INDEX_PUSH_BYTES
                + pieces.iter().map(|p| push_size(p.len())).sum::<usize>()
                + INDEX_PUSH_BYTES
        }
    }
}

/// Upper bound of a token unlocking script.
///
/// # Arguments
/// * `num_segments` - Output slots, null slots included.
/// * `preimage_len` - Length of the preimage that will be pushed.
/// * `shape_len` - Bytes of the shape fields (see [`shape_len`]).
pub fn estimate_unlocking_script_overhead(
    num_segments: usize,
    preimage_len: usize,
    shape_len: usize,
) -> usize {
    num_segments * (AMOUNT_PUSH_BYTES + HASH_PUSH_BYTES)
        + INDEX_PUSH_BYTES
        + TXID_PUSH_BYTES
        + shape_len
        + push_size(preimage_len)
        + SIGNATURE_PUSH_BYTES
        + PUBLIC_KEY_PUSH_BYTES
}

/// Serialized size of `tx` once each input carries an unlocking script of
/// `unlocking_lens[i]` bytes.
///
/// Inputs that already hold a script keep it when `unlocking_lens[i]` is `None`.
pub fn estimate_tx_size(tx: &Transaction, unlocking_lens: &[Option<usize>]) -> usize {
    let mut size = tx.size();
    for (input, estimate) in tx.inputs.iter().zip(unlocking_lens) {
        if let Some(len) = estimate {
            let current = input.unlocking_script.as_ref().map_or(0, |s| s.len());
            size -= VarInt::from(current).length() + current;
            size += VarInt::from(*len).length() + len;
        }
    }
    size
}

/// Size estimate for a swap transaction.
///
/// `tx` is the swap with its change output already present; `extra_bytes`
/// covers the counterpart transactions the token inputs will push, and
/// `maker_preimage_len` is the maker input's exact preimage length. The
/// maker's spent output always travels with the offer as a `ProvenUtxo`, so
/// no fallback guess is needed.
pub fn estimate_swap_size(tx: &Transaction, extra_bytes: usize, maker_preimage_len: usize) -> usize {
    let preimage = VarInt::from(maker_preimage_len).length() + maker_preimage_len;

    tx.size()
        + AMOUNT_PUSH_BYTES
        + HASH_PUSH_BYTES
        + 4
        + INDEX_PUSH_BYTES
        + TXID_PUSH_BYTES
        + INDEX_PUSH_BYTES
        + extra_bytes
        + preimage * 2
        + 1
        + 72
        + PUBLIC_KEY_PUSH_BYTES
        + tx.inputs.len().saturating_sub(1) * P2PKH_UNLOCKING_SCRIPT_BYTES
}

/// Fee for a swap transaction; see [`estimate_swap_size`].
pub fn estimate_swap_fee(
    tx: &Transaction,
    extra_bytes: usize,
    maker_preimage_len: usize,
    rate: &FeeRate,
) -> u64 {
    estimate_fee(estimate_swap_size(tx, extra_bytes, maker_preimage_len), rate)
}

/// Change left after paying `outputs_total` and `fee` from `inputs_total`.
///
/// # Errors
/// `InsufficientFunds` when nothing (or less than nothing) is left.
pub fn compute_change(inputs_total: u64, outputs_total: u64, fee: u64) -> Result<u64, TokenError> {
    let needed = outputs_total.saturating_add(fee);
    match inputs_total.checked_sub(needed) {
        Some(change) if change > 0 => Ok(change),
        _ => Err(TokenError::InsufficientFunds {
            needed: needed.saturating_add(1),
            available: inputs_total,
        }),
    }
}
