//! secp256k1 public key.

use std::fmt;

use k256::ecdsa::VerifyingKey;

use crate::ec::signature::Signature;
use crate::hash::hash160;
use crate::PrimitivesError;

/// Length of a compressed SEC1 public key.
pub const COMPRESSED_LEN: usize = 33;

/// A secp256k1 public key. Always serialized compressed.
#[derive(Clone, Debug)]
pub struct PublicKey {
    inner: VerifyingKey,
}

impl PublicKey {
    pub(crate) fn from_verifying_key(inner: VerifyingKey) -> Self {
        PublicKey { inner }
    }

    /// Parse a SEC1-encoded public key (compressed or uncompressed).
    ///
    /// # Arguments
    /// * `bytes` - 33 or 65 bytes of SEC1 encoding.
    ///
    /// # Returns
    /// `Ok(PublicKey)` if the point is on the curve, otherwise an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.is_empty() {
            return Err(PrimitivesError::InvalidPublicKey(
                "public key is empty".to_string(),
            ));
        }
        let inner = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| PrimitivesError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { inner })
    }

    /// Parse a hex-encoded SEC1 public key.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Compressed 33-byte SEC1 encoding.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Hex of the compressed encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Hash160 of the compressed encoding: the owner or redemption hash
    /// embedded in token scripts.
    pub fn hash160(&self) -> [u8; 20] {
        hash160(&self.to_compressed())
    }

    /// Verify a signature over a 32-byte digest.
    pub fn verify(&self, hash: &[u8], sig: &Signature) -> bool {
        sig.verify(hash, self)
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey {
        &self.inner
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_compressed() == other.to_compressed()
    }
}

impl Eq for PublicKey {}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
