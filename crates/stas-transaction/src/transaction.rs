//! Core transaction type.
//!
//! Supports binary and hex serialization, transaction ID computation and
//! the sighash entry point used by every signer.

use std::fmt;

use stas_primitives::chainhash::Hash;
use stas_primitives::util::{BsvReader, BsvWriter, VarInt};

use crate::input::TransactionInput;
use crate::output::TransactionOutput;
use crate::sighash;
use crate::TransactionError;

/// A transaction: version, inputs, outputs and lock time.
///
/// # Wire format
///
/// | Field        | Size                      |
/// |--------------|---------------------------|
/// | version      | 4 bytes (LE)              |
/// | input count  | VarInt                    |
/// | inputs       | variable (per input)      |
/// | output count | VarInt                    |
/// | outputs      | variable (per output)     |
/// | lock_time    | 4 bytes (LE)              |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction format version.
    pub version: u32,
    /// Ordered inputs.
    pub inputs: Vec<TransactionInput>,
    /// Ordered outputs.
    pub outputs: Vec<TransactionOutput>,
    /// Lock time.
    pub lock_time: u32,
}

impl Transaction {
    /// Create an empty version-1 transaction with lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction from hex.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str).map_err(|e| {
            TransactionError::SerializationError(format!("invalid hex: {}", e))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse exactly one transaction from `bytes`.
    ///
    /// # Returns
    /// The transaction, or a `SerializationError` if the data is truncated or
    /// has trailing bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut reader = BsvReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(TransactionError::SerializationError(format!(
                "trailing {} bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a reader.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let version = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading version: {}", e))
        })?;

        let input_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading input count: {}", e))
        })?;
        let mut inputs = Vec::new();
        for _ in 0..input_count.value() {
            inputs.push(TransactionInput::read_from(reader)?);
        }

        let output_count = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading output count: {}", e))
        })?;
        let mut outputs = Vec::new();
        for _ in 0..output_count.value() {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        let lock_time = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading lock time: {}", e))
        })?;

        Ok(Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        })
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Serialize to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::with_capacity(self.size());
        writer.write_u32_le(self.version);
        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(&mut writer);
        }
        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(&mut writer);
        }
        writer.write_u32_le(self.lock_time);
        writer.into_bytes()
    }

    /// Serialize to lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Serialized size in bytes, computed without serializing.
    pub fn size(&self) -> usize {
        let script_size = |s: Option<usize>| {
            let len = s.unwrap_or(0);
            VarInt::from(len).length() + len
        };
        let inputs: usize = self
            .inputs
            .iter()
            .map(|i| 36 + script_size(i.unlocking_script.as_ref().map(|s| s.len())) + 4)
            .sum();
        let outputs: usize = self
            .outputs
            .iter()
            .map(|o| 8 + script_size(Some(o.locking_script.len())))
            .sum();
        4 + VarInt::from(self.inputs.len()).length()
            + inputs
            + VarInt::from(self.outputs.len()).length()
            + outputs
            + 4
    }

    /// Transaction ID (double SHA-256 of the serialization).
    pub fn tx_id(&self) -> Hash {
        Hash::double_hash(&self.to_bytes())
    }

    /// Transaction ID in display (reversed hex) form.
    pub fn tx_id_hex(&self) -> String {
        self.tx_id().to_string()
    }

    // -----------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------

    /// Append an input.
    pub fn add_input(&mut self, input: TransactionInput) {
        self.inputs.push(input);
    }

    /// Append an output.
    pub fn add_output(&mut self, output: TransactionOutput) {
        self.outputs.push(output);
    }

    /// Number of inputs.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Number of outputs.
    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// Sum of output values.
    pub fn total_output_satoshis(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }

    /// Sum of spent output values.
    ///
    /// # Returns
    /// The total, or a `SigningError` naming the first input whose source
    /// output is not attached.
    pub fn total_input_satoshis(&self) -> Result<u64, TransactionError> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(i, input)| {
                input.source_tx_satoshis().ok_or_else(|| {
                    TransactionError::SigningError(format!(
                        "input {} has no source output attached",
                        i
                    ))
                })
            })
            .sum()
    }

    // -----------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------

    /// FORKID sighash digest for `input_index`.
    pub fn signature_hash(
        &self,
        input_index: usize,
        prev_output_script: &[u8],
        sighash_type: u32,
        satoshis: u64,
    ) -> Result<[u8; 32], TransactionError> {
        sighash::signature_hash(self, input_index, prev_output_script, sighash_type, satoshis)
    }

    /// FORKID sighash preimage for `input_index`.
    pub fn preimage(
        &self,
        input_index: usize,
        prev_output_script: &[u8],
        sighash_type: u32,
        satoshis: u64,
    ) -> Result<Vec<u8>, TransactionError> {
        sighash::calc_preimage(self, input_index, prev_output_script, sighash_type, satoshis)
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
