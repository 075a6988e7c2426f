//! Previous-transaction pieces for merge unlocking scripts.
//!
//! A merging input proves its counterpart's ancestry by pushing the
//! counterpart's previous transaction cut at every occurrence of the token
//! script body (everything after the owner hash). The locking script splices
//! the body back in between the pieces, hashes the result and compares it to
//! the outpoint txid.

use stas_primitives::hash::sha256d;
use stas_transaction::Transaction;

use crate::error::TokenError;
use crate::script::templates::MARKER_OFFSET;
use crate::script::is_token_script_bytes;

/// Cut `raw_tx` around the token script body of its output `vout`.
///
/// # Returns
/// The pieces in transaction order; joining them with the body in between
/// reproduces `raw_tx`.
///
/// # Errors
/// `MalformedScript` if `raw_tx` does not parse, `vout` is out of range or
/// the output is not a token script.
pub fn merge_pieces(raw_tx: &[u8], vout: u32) -> Result<Vec<Vec<u8>>, TokenError> {
    let tx = Transaction::from_bytes(raw_tx)
        .map_err(|e| TokenError::MalformedScript(format!("previous transaction: {e}")))?;
    let output = tx.outputs.get(vout as usize).ok_or_else(|| {
        TokenError::MalformedScript(format!(
            "vout {} out of range (tx has {} outputs)",
            vout,
            tx.outputs.len()
        ))
    })?;
    let script = output.locking_script.to_bytes();
    if !is_token_script_bytes(script) {
        return Err(TokenError::MalformedScript(format!(
            "output {vout} of the previous transaction is not a token script"
        )));
    }
    let body = &script[MARKER_OFFSET..];

    let pieces = split_on(raw_tx, body);

    let mut rebuilt = Vec::with_capacity(raw_tx.len());
    for (i, piece) in pieces.iter().enumerate() {
        if i > 0 {
            rebuilt.extend_from_slice(body);
        }
        rebuilt.extend_from_slice(piece);
    }
    if sha256d(&rebuilt) != sha256d(raw_tx) {
        return Err(TokenError::MalformedScript(
            "internal error: reconstructed transaction hash mismatch".into(),
        ));
    }

    Ok(pieces)
}

/// Split `haystack` on every non-overlapping occurrence of `needle`.
fn split_on(haystack: &[u8], needle: &[u8]) -> Vec<Vec<u8>> {
    if needle.is_empty() {
        return vec![haystack.to_vec()];
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut pos = 0;
    while needle.len() <= haystack.len() - pos {
        if haystack[pos..pos + needle.len()] == *needle {
            pieces.push(haystack[start..pos].to_vec());
            pos += needle.len();
            start = pos;
        } else {
            pos += 1;
        }
    }
    pieces.push(haystack[start..].to_vec());
    pieces
}
