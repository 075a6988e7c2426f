//! Script chunk decoding and push encoding.
//!
//! A chunk is either a bare opcode or a data push with its payload. Decoding
//! is flat: `OP_RETURN` is an ordinary opcode, so the data pushes that trail
//! a token template stay individually addressable.

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes), this is the length.
    pub op: u8,
    /// The data payload, if this chunk is a push operation.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// Byte length of this chunk when serialized.
    pub fn encoded_len(&self) -> usize {
        match (&self.data, self.op) {
            (Some(d), OP_PUSHDATA1) => 2 + d.len(),
            (Some(d), OP_PUSHDATA2) => 3 + d.len(),
            (Some(d), OP_PUSHDATA4) => 5 + d.len(),
            (Some(d), _) => 1 + d.len(),
            (None, _) => 1,
        }
    }

    /// ASM token: hex for pushes, the opcode name otherwise.
    pub fn to_asm_string(&self) -> String {
        match &self.data {
            Some(data) => hex::encode(data),
            None => opcode_to_string(self.op),
        }
    }
}

fn take<'a>(bytes: &'a [u8], pos: usize, len: usize) -> Result<&'a [u8], ScriptError> {
    pos.checked_add(len)
        .and_then(|end| bytes.get(pos..end))
        .ok_or(ScriptError::DataTooSmall)
}

/// Decode raw script bytes into chunks.
///
/// # Arguments
/// * `bytes` - The raw script bytes to decode.
///
/// # Returns
/// A vector of parsed chunks, or `DataTooSmall` if a push is truncated.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut chunks = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let op = bytes[pos];
        pos += 1;
        let len = match op {
            0x01..=0x4b => op as usize,
            OP_PUSHDATA1 => {
                let n = take(bytes, pos, 1)?[0] as usize;
                pos += 1;
                n
            }
            OP_PUSHDATA2 => {
                let n = take(bytes, pos, 2)?;
                pos += 2;
                u16::from_le_bytes([n[0], n[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let n = take(bytes, pos, 4)?;
                pos += 4;
                u32::from_le_bytes([n[0], n[1], n[2], n[3]]) as usize
            }
            _ => {
                chunks.push(ScriptChunk { op, data: None });
                continue;
            }
        };
        let data = take(bytes, pos, len)?.to_vec();
        pos += len;
        chunks.push(ScriptChunk {
            op,
            data: Some(data),
        });
    }

    Ok(chunks)
}

/// Compute the push prefix for a payload of `data_len` bytes.
///
/// # Returns
/// The prefix bytes, or `DataTooBig` beyond the 4-byte length range.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len <= 75 {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xff {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xffff {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xffff_ffff {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig)
    }
}

/// Encode `data` as a single push (prefix plus payload).
///
/// An empty payload encodes as `OP_0`.
pub fn encode_push(data: &[u8]) -> Result<Vec<u8>, ScriptError> {
    if data.is_empty() {
        return Ok(vec![OP_0]);
    }
    let mut out = push_data_prefix(data.len())?;
    out.extend_from_slice(data);
    Ok(out)
}
