//! 32-byte chain hash used for transaction identifiers.
//!
//! Bytes are stored in internal (wire) order and displayed reversed, which is
//! how explorers and broadcast services present transaction IDs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash::sha256d;
use crate::PrimitivesError;

/// Size of a Hash in bytes.
pub const HASH_SIZE: usize = 32;

/// A 32-byte hash such as a transaction ID.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    /// Create a Hash from a raw 32-byte array in internal order.
    pub fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    /// Create a Hash from a byte slice in internal order.
    ///
    /// # Arguments
    /// * `bytes` - A slice that must be exactly 32 bytes.
    ///
    /// # Returns
    /// `Ok(Hash)` if the slice is 32 bytes, or an error otherwise.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let arr: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            PrimitivesError::InvalidHash(format!(
                "invalid hash length of {}, want {}",
                bytes.len(),
                HASH_SIZE
            ))
        })?;
        Ok(Hash(arr))
    }

    /// Parse a display-order (byte-reversed) hex string.
    ///
    /// # Arguments
    /// * `hex_str` - Exactly 64 hex characters.
    ///
    /// # Returns
    /// `Ok(Hash)` on success, or an error for invalid hex or length.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.len() != HASH_SIZE * 2 {
            return Err(PrimitivesError::InvalidHash(format!(
                "hash string must be {} characters, got {}",
                HASH_SIZE * 2,
                hex_str.len()
            )));
        }
        let mut bytes = hex::decode(hex_str)?;
        bytes.reverse();
        Self::from_bytes(&bytes)
    }

    /// Hash `data` with double SHA-256.
    pub fn double_hash(data: &[u8]) -> Self {
        Hash(sha256d(data))
    }

    /// Borrow the bytes in internal order.
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Bytes in display order, as they appear in a hex txid.
    pub fn to_reversed_bytes(&self) -> [u8; HASH_SIZE] {
        let mut out = self.0;
        out.reverse();
        out
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_reversed_bytes()))
    }
}

impl FromStr for Hash {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hash::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TXID: &str = "b1fea52486ce0c62bb442b530a3f0132b826c74e473d1f2c220bfa78111c5082";

    #[test]
    fn test_from_hex_reverses() {
        let hash = Hash::from_hex(TXID).unwrap();
        assert_eq!(hash.as_bytes()[0], 0x82);
        assert_eq!(hash.as_bytes()[31], 0xb1);
        assert_eq!(hash.to_string(), TXID);
    }

    #[test]
    fn test_from_hex_rejects_short() {
        assert!(Hash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_from_bytes_wrong_length() {
        assert!(Hash::from_bytes(&[0u8; 31]).is_err());
    }

    #[test]
    fn test_from_str_matches_from_hex() {
        let parsed: Hash = TXID.parse().unwrap();
        assert_eq!(parsed, Hash::from_hex(TXID).unwrap());
    }
}
