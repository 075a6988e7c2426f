//! Transaction output: a satoshi value and its locking script.

use stas_primitives::util::{BsvReader, BsvWriter};
use stas_script::Script;

use crate::TransactionError;

/// A transaction output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Value in satoshis.
    pub satoshis: u64,
    /// Spending conditions.
    pub locking_script: Script,
}

impl TransactionOutput {
    /// Create an output paying `satoshis` to `locking_script`.
    pub fn new(satoshis: u64, locking_script: Script) -> Self {
        TransactionOutput {
            satoshis,
            locking_script,
        }
    }

    /// Deserialize an output from the reader.
    ///
    /// # Returns
    /// The output, or a `SerializationError` if the data is truncated.
    pub fn read_from(reader: &mut BsvReader) -> Result<Self, TransactionError> {
        let satoshis = reader.read_u64_le().map_err(|e| {
            TransactionError::SerializationError(format!("reading satoshis: {}", e))
        })?;
        let script_len = reader.read_varint().map_err(|e| {
            TransactionError::SerializationError(format!("reading script length: {}", e))
        })?;
        let script_bytes = reader.read_bytes(script_len.value() as usize).map_err(|e| {
            TransactionError::SerializationError(format!("reading locking script: {}", e))
        })?;
        Ok(TransactionOutput {
            satoshis,
            locking_script: Script::from_bytes(script_bytes),
        })
    }

    /// Serialize into the writer.
    pub fn write_to(&self, writer: &mut BsvWriter) {
        writer.write_u64_le(self.satoshis);
        writer.write_var_bytes(self.locking_script.to_bytes());
    }

    /// Serialized output bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BsvWriter::with_capacity(9 + self.locking_script.len() + 8);
        self.write_to(&mut writer);
        writer.into_bytes()
    }
}
