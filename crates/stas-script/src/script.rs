//! The `Script` byte-vector newtype.
//!
//! Locking and unlocking scripts are both carried as `Script`. Construction
//! helpers append opcodes, pushes and script numbers; classification covers
//! the P2PKH shape used for funding, change and redeem outputs.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::chunk::{decode_script, encode_push, ScriptChunk};
use crate::number::encode_script_number;
use crate::opcodes::*;
use crate::ScriptError;

/// A script, represented as its raw bytes.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from a hex string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string (e.g. "76a914...88ac").
    ///
    /// # Returns
    /// A `Script` wrapping the decoded bytes, or an error if the hex is invalid.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Parse space-separated ASM. Known opcode names become opcodes, any
    /// other token is treated as hex push data.
    pub fn from_asm(asm: &str) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for token in asm.split_whitespace() {
            match string_to_opcode(token) {
                Some(op) => script.append_opcodes(&[op]),
                None => {
                    let data = hex::decode(token)?;
                    script.append_push_data(&data)?;
                }
            }
        }
        Ok(script)
    }

    /// Standard pay-to-public-key-hash locking script.
    pub fn p2pkh(pkh: &[u8; 20]) -> Self {
        let mut bytes = Vec::with_capacity(25);
        bytes.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
        bytes.extend_from_slice(pkh);
        bytes.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Script(bytes)
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Lowercase hex of the script bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// ASM rendering. Returns an empty string when the script does not decode.
    pub fn to_asm(&self) -> String {
        match self.chunks() {
            Ok(chunks) => chunks
                .iter()
                .map(ScriptChunk::to_asm_string)
                .collect::<Vec<_>>()
                .join(" "),
            Err(_) => String::new(),
        }
    }

    /// Borrow the raw bytes.
    pub fn to_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the script and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Script length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the script has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    // -----------------------------------------------------------------------
    // Classification
    // -----------------------------------------------------------------------

    /// Exact `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG` match.
    pub fn is_p2pkh(&self) -> bool {
        let b = &self.0;
        b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
    }

    /// The 20-byte hash of a P2PKH script.
    ///
    /// # Returns
    /// The hash, or `NotP2PKH` for any other script shape.
    pub fn public_key_hash(&self) -> Result<[u8; 20], ScriptError> {
        if !self.is_p2pkh() {
            return Err(ScriptError::NotP2PKH);
        }
        let mut pkh = [0u8; 20];
        pkh.copy_from_slice(&self.0[3..23]);
        Ok(pkh)
    }

    /// Decode into chunks.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        decode_script(&self.0)
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    /// Append a data push with the correct length prefix.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        let encoded = encode_push(data)?;
        self.0.extend_from_slice(&encoded);
        Ok(())
    }

    /// Append bare opcodes.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) {
        self.0.extend_from_slice(opcodes);
    }

    /// Append already-encoded script bytes verbatim.
    pub fn append_raw(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    /// Push an integer as a script number; zero becomes `OP_0`.
    pub fn append_number(&mut self, value: i64) -> Result<(), ScriptError> {
        self.append_push_data(&encode_script_number(value))
    }

    /// Push a small integer with its dedicated opcode when one exists,
    /// otherwise as a script number.
    pub fn append_small_int(&mut self, value: u64) -> Result<(), ScriptError> {
        match small_int_opcode(value) {
            Some(op) => {
                self.append_opcodes(&[op]);
                Ok(())
            }
            None => {
                let v = i64::try_from(value).map_err(|_| ScriptError::DataTooBig)?;
                self.append_number(v)
            }
        }
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
