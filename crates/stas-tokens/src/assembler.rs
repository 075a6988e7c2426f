//! Token unlocking script assembly.
//!
//! The token script re-derives the spending transaction's outputs from the
//! unlocking script and checks them against the signed preimage, so the
//! assembled fields must describe the final output set exactly:
//!
//! ```text
//! [<amount> <owner hash>]...     one slot per output (OP_FALSE OP_FALSE for a null slot)
//! [OP_<vout> <funding txid>]     omitted for zero-fee transactions
//! <shape fields>                 OP_0 | OP_<vout> <prev tx> OP_1 | OP_<vout> <piece>... OP_<n>
//! <preimage> <signature> <public key>
//! ```

use stas_primitives::chainhash::Hash;
use stas_primitives::ec::PublicKey;
use stas_script::chunk::ScriptChunk;
use stas_script::number::decode_script_number;
use stas_script::opcodes::{OP_0, OP_1, OP_FALSE};
use stas_script::Script;

use crate::error::TokenError;
use crate::script::Version;

/// One output of the transaction being unlocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Output value.
    pub satoshis: u64,
    /// Hash the output pays to.
    pub public_key_hash: [u8; 20],
}

/// Outpoint of the fee-paying input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingOutpoint {
    /// Funding transaction ID.
    pub txid: Hash,
    /// Funding output index.
    pub vout: u32,
}

/// The transaction-type dependent part of the unlocking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockShape {
    /// Transfer, split and redeem.
    Plain,
    /// Atomic swap: the counterpart's previous transaction is pushed whole.
    Swap {
        /// Output index the counterpart input spends.
        counterpart_vout: u32,
        /// Raw previous transaction of the counterpart input.
        counterpart_tx: Vec<u8>,
    },
    /// Merge: the counterpart's previous transaction is pushed in pieces.
    Merge {
        /// Output index the counterpart input spends.
        counterpart_vout: u32,
        /// Previous transaction cut around the token script body.
        pieces: Vec<Vec<u8>>,
    },
}

/// Everything the assembler needs for one token input.
#[derive(Debug, Clone)]
pub struct UnlockParts<'a> {
    /// Output slots in output order.
    pub segments: &'a [Option<Segment>],
    /// Fee-paying outpoint; ignored when zero-fee.
    pub funding: Option<FundingOutpoint>,
    /// Transaction shape.
    pub shape: &'a UnlockShape,
    /// Sighash preimage of the input.
    pub preimage: &'a [u8],
    /// DER signature followed by the sighash byte.
    pub signature: &'a [u8],
    /// Signer's public key.
    pub public_key: &'a PublicKey,
}

/// Assemble a complete token unlocking script.
///
/// # Errors
/// `SegmentCountMismatch` when the non-null segments do not match
/// `output_count`; `Validation` for a zero-fee version 1 spend or a
/// fee-paying spend without a funding outpoint.
pub fn assemble(
    parts: &UnlockParts<'_>,
    version: Version,
    is_zero_fee: bool,
    output_count: usize,
) -> Result<Script, TokenError> {
    let mut script = assemble_linking(
        parts.segments,
        parts.funding.as_ref(),
        parts.shape,
        version,
        is_zero_fee,
        output_count,
    )?;
    script.append_push_data(parts.preimage)?;
    script.append_push_data(parts.signature)?;
    script.append_push_data(&parts.public_key.to_compressed())?;
    Ok(script)
}

/// Assemble the fields that precede the preimage.
///
/// A taker completing a pre-signed swap offer prepends these to the
/// maker's `<preimage> <signature> <public key>`.
pub fn assemble_linking(
    segments: &[Option<Segment>],
    funding: Option<&FundingOutpoint>,
    shape: &UnlockShape,
    version: Version,
    is_zero_fee: bool,
    output_count: usize,
) -> Result<Script, TokenError> {
    if is_zero_fee && version == Version::V1 {
        return Err(TokenError::Validation(
            "version 1 tokens cannot be spent without a fee".into(),
        ));
    }
    let non_null = segments.iter().filter(|s| s.is_some()).count();
    if non_null != output_count {
        return Err(TokenError::SegmentCountMismatch {
            segments: non_null,
            outputs: output_count,
        });
    }

    let mut script = Script::new();
    for slot in segments {
        match slot {
            Some(segment) => {
                script.append_number(amount(segment.satoshis)?)?;
                script.append_push_data(&segment.public_key_hash)?;
            }
            None => script.append_opcodes(&[OP_FALSE, OP_FALSE]),
        }
    }

    if !is_zero_fee {
        let funding = funding.ok_or_else(|| {
            TokenError::Validation("fee-paying unlocking script needs a funding outpoint".into())
        })?;
        script.append_small_int(u64::from(funding.vout))?;
        script.append_push_data(funding.txid.as_bytes())?;
    }

    match shape {
        UnlockShape::Plain => script.append_opcodes(&[OP_0]),
        UnlockShape::Swap {
            counterpart_vout,
            counterpart_tx,
        } => {
            script.append_small_int(u64::from(*counterpart_vout))?;
            script.append_push_data(counterpart_tx)?;
            script.append_opcodes(&[OP_1]);
        }
        UnlockShape::Merge {
            counterpart_vout,
            pieces,
        } => {
            script.append_small_int(u64::from(*counterpart_vout))?;
            for piece in pieces {
                script.append_push_data(piece)?;
            }
            script.append_small_int(pieces.len() as u64)?;
        }
    }

    Ok(script)
}

fn amount(satoshis: u64) -> Result<i64, TokenError> {
    i64::try_from(satoshis)
        .map_err(|_| TokenError::Validation(format!("amount {satoshis} out of range")))
}

/// Read the leading output slots back out of an assembled unlocking script.
///
/// Parsing stops at the first pair of chunks that is neither
/// `<amount> <20-byte hash>` nor `OP_FALSE OP_FALSE`.
pub fn decode_segments(script: &Script) -> Result<Vec<Option<Segment>>, TokenError> {
    let chunks = script.chunks()?;
    let mut slots = Vec::new();
    for pair in chunks.chunks_exact(2) {
        match slot_of(&pair[0], &pair[1]) {
            Some(slot) => slots.push(slot),
            None => break,
        }
    }
    Ok(slots)
}

fn slot_of(first: &ScriptChunk, second: &ScriptChunk) -> Option<Option<Segment>> {
    let is_false = |c: &ScriptChunk| c.op == OP_FALSE && c.data.is_none();
    if is_false(first) && is_false(second) {
        return Some(None);
    }
    let hash: [u8; 20] = second.data.as_deref()?.try_into().ok()?;
    let satoshis = match &first.data {
        Some(bytes) if bytes.len() <= 9 => decode_script_number(bytes)?,
        None if first.op == OP_0 => 0,
        _ => return None,
    };
    Some(Some(Segment {
        satoshis: u64::try_from(satoshis).ok()?,
        public_key_hash: hash,
    }))
}

#[cfg(test)]
mod tests {
    //! Layout of the assembled script for each shape, the zero-fee
    //! variants and the segment count invariant.

    use super::*;
    use stas_primitives::ec::PrivateKey;
    use stas_script::opcodes::OP_2;

    fn key() -> PublicKey {
        PrivateKey::new().pub_key()
    }

    fn seg(satoshis: u64, b: u8) -> Option<Segment> {
        Some(Segment {
            satoshis,
            public_key_hash: [b; 20],
        })
    }

    fn funding() -> FundingOutpoint {
        FundingOutpoint {
            txid: Hash::new([0xf0; 32]),
            vout: 1,
        }
    }

    #[test]
    fn plain_fee_layout() {
        let pk = key();
        let segments = [seg(35_000, 0xaa), seg(1_000, 0xbb)];
        let parts = UnlockParts {
            segments: &segments,
            funding: Some(funding()),
            shape: &UnlockShape::Plain,
            preimage: &[0x01; 200],
            signature: &[0x30; 71],
            public_key: &pk,
        };
        let script = assemble(&parts, Version::V2, false, 2).unwrap();
        let chunks = script.chunks().unwrap();

        assert_eq!(chunks[0].data.as_deref(), Some(&[0xb8, 0x88, 0x00][..]));
        assert_eq!(chunks[1].data.as_deref(), Some(&[0xaa; 20][..]));
        assert_eq!(chunks[4].op, OP_1);
        assert_eq!(chunks[5].data.as_deref(), Some(&[0xf0; 32][..]));
        assert_eq!(chunks[6].op, OP_0);
        assert_eq!(chunks[7].data.as_deref().map(<[u8]>::len), Some(200));
        assert_eq!(chunks[9].data.as_deref(), Some(&pk.to_compressed()[..]));
        assert_eq!(chunks.len(), 10);
    }

    #[test]
    fn small_amounts_are_pushes_not_opcodes() {
        let segments = [seg(5, 0x01)];
        let script =
            assemble_linking(&segments, None, &UnlockShape::Plain, Version::V2, true, 1).unwrap();
        assert_eq!(&script.to_bytes()[..2], &[0x01, 0x05]);
    }

    #[test]
    fn zero_fee_omits_funding() {
        let segments = [seg(35_000, 0x01), seg(35_000, 0x02)];
        let with_fee = assemble_linking(
            &segments,
            Some(&funding()),
            &UnlockShape::Plain,
            Version::V2,
            false,
            2,
        )
        .unwrap();
        let zero_fee =
            assemble_linking(&segments, Some(&funding()), &UnlockShape::Plain, Version::V2, true, 2)
                .unwrap();
        // OP_1 plus a 33-byte txid push.
        assert_eq!(with_fee.len() - zero_fee.len(), 1 + 33);
    }

    #[test]
    fn zero_fee_v1_is_rejected() {
        let segments = [seg(1, 0x01)];
        let err = assemble_linking(&segments, None, &UnlockShape::Plain, Version::V1, true, 1);
        assert!(matches!(err, Err(TokenError::Validation(_))));
    }

    #[test]
    fn fee_without_funding_is_rejected() {
        let segments = [seg(1, 0x01)];
        let err = assemble_linking(&segments, None, &UnlockShape::Plain, Version::V2, false, 1);
        assert!(matches!(err, Err(TokenError::Validation(_))));
    }

    #[test]
    fn segment_count_must_match_outputs() {
        let segments = [seg(1, 0x01), None, seg(2, 0x02)];
        let err = assemble_linking(&segments, Some(&funding()), &UnlockShape::Plain, Version::V2, false, 3);
        assert!(matches!(
            err,
            Err(TokenError::SegmentCountMismatch {
                segments: 2,
                outputs: 3
            })
        ));
    }

    #[test]
    fn swap_and_merge_shapes() {
        let segments = [seg(10, 0x01)];
        let swap = UnlockShape::Swap {
            counterpart_vout: 2,
            counterpart_tx: vec![0xee; 300],
        };
        let script = assemble_linking(&segments, None, &swap, Version::V2, true, 1).unwrap();
        let chunks = script.chunks().unwrap();
        assert_eq!(chunks[2].op, OP_2);
        assert_eq!(chunks[3].data.as_deref().map(<[u8]>::len), Some(300));
        assert_eq!(chunks[4].op, OP_1);

        let merge = UnlockShape::Merge {
            counterpart_vout: 0,
            pieces: vec![vec![0x01; 80], vec![0x02; 40]],
        };
        let script = assemble_linking(&segments, None, &merge, Version::V2, true, 1).unwrap();
        let chunks = script.chunks().unwrap();
        assert_eq!(chunks[2].op, OP_0);
        assert_eq!(chunks[5].op, OP_2);
    }

    #[test]
    fn decode_with_null_slot() {
        let pk = key();
        let segments = [seg(70_000, 0x0a), None, seg(0, 0x0c)];
        let parts = UnlockParts {
            segments: &segments,
            funding: Some(FundingOutpoint {
                txid: Hash::new([0x11; 32]),
                vout: 0,
            }),
            shape: &UnlockShape::Plain,
            preimage: &[0x02; 180],
            signature: &[0x30; 72],
            public_key: &pk,
        };
        let script = assemble(&parts, Version::V2, false, 2).unwrap();
        assert_eq!(decode_segments(&script).unwrap(), segments.to_vec());
    }

    #[test]
    fn decode_zero_fee_redeem() {
        let pk = key();
        let segments = [seg(9_000, 0x0a), None];
        let parts = UnlockParts {
            segments: &segments,
            funding: None,
            shape: &UnlockShape::Plain,
            preimage: &[0x02; 180],
            signature: &[0x30; 72],
            public_key: &pk,
        };
        let script = assemble(&parts, Version::V2, true, 1).unwrap();
        assert_eq!(decode_segments(&script).unwrap(), segments.to_vec());
    }
}
