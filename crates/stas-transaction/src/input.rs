//! Transaction input.
//!
//! An input references a previous output by outpoint and carries the
//! unlocking script once signed. The spent output's value and locking script
//! can be attached so that signing and fee checks need no external lookup.

use stas_primitives::chainhash::Hash;
use stas_primitives::util::{BsvReader, BsvWriter};
use stas_script::Script;

use crate::output::TransactionOutput;
use crate::TransactionError;

/// Sequence number marking a final input.
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// A transaction input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// Previous transaction ID in internal byte order.
    pub source_txid: [u8; 32],
    /// Index of the spent output in the previous transaction.
    pub source_tx_out_index: u32,
    /// Sequence number.
    pub sequence_number: u32,
    /// Unlocking script, `None` until signed.
    pub unlocking_script: Option<Script>,
    source_output: Option<TransactionOutput>,
}

impl TransactionInput {
    /// Create an unsigned input spending `txid:vout`.
    pub fn new(txid: Hash, vout: u32) -> Self {
        TransactionInput {
            source_txid: *txid.as_bytes(),
            source_tx_out_index: vout,
            sequence_number: DEFAULT_SEQUENCE_NUMBER,
            unlocking_script: None,
            source_output: None,
        }
    }

    /// Create an input and attach the output it spends.
    pub fn with_source_output(txid: Hash, vout: u32, output: TransactionOutput) -> Self {
        let mut input = Self::new(txid, vout);
        input.source_output = Some(output);
        input
    }

    /// Deserialize an input from the reader.
    ///
    /// # Returns
    /// The input, or a `SerializationError` if the data is truncated.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let source_txid = reader.read_array::<32>().map_err(|e| {
            TransactionError::SerializationError(format!("reading source txid: {}", e))
        })?;
        let source_tx_out_index = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading output index: {}", e))
        })?;
        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;
        let script_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading unlocking script: {}", e))
        })?;
        let sequence_number = reader.read_u32_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading sequence: {}", e))
        })?;

        Ok(TransactionInput {
            source_txid,
            source_tx_out_index,
            sequence_number,
            unlocking_script: if script_bytes.is_empty() {
                None
            } else {
                Some(Script::from_bytes(script_bytes))
            },
            source_output: None,
        })
    }

    /// Serialize into the writer. An unsigned input writes an empty script.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_bytes(&self.source_txid);
        writer.write_u32_le(self.source_tx_out_index);
        match &self.unlocking_script {
            Some(script) => writer.write_var_bytes(script.to_bytes()),
            None => writer.write_u8(0),
        }
        writer.write_u32_le(self.sequence_number);
    }

    /// The previous transaction ID.
    pub fn source_txid_hash(&self) -> Hash {
        Hash::new(self.source_txid)
    }

    /// Attach or clear the spent output.
    pub fn set_source_output(&mut self, output: Option<TransactionOutput>) {
        self.source_output = output;
    }

    /// The spent output, if attached.
    pub fn source_tx_output(&self) -> Option<&TransactionOutput> {
        self.source_output.as_ref()
    }

    /// Value of the spent output, if attached.
    pub fn source_tx_satoshis(&self) -> Option<u64> {
        self.source_output.as_ref().map(|o| o.satoshis)
    }

    /// Locking script of the spent output, if attached.
    pub fn source_tx_script(&self) -> Option<&Script> {
        self.source_output.as_ref().map(|o| &o.locking_script)
    }
}
