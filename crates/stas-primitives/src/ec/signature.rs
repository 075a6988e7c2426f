//! DER-encoded ECDSA signatures.
//!
//! Signing is deterministic (RFC 6979) over a pre-computed digest, and
//! serialization always uses the low-S form required for standard
//! transactions.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa;

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// A low-S ECDSA signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    inner: ecdsa::Signature,
}

impl Signature {
    /// Build a signature from big-endian `r` and `s` scalars.
    ///
    /// # Returns
    /// An error if either scalar is zero or out of range.
    pub fn from_scalars(r: [u8; 32], s: [u8; 32]) -> Result<Self, PrimitivesError> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&r);
        bytes[32..].copy_from_slice(&s);
        let sig = ecdsa::Signature::from_slice(&bytes)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
        Ok(Self::normalized(sig))
    }

    /// The `r` scalar, big-endian.
    pub fn r(&self) -> [u8; 32] {
        self.inner.r().to_bytes().into()
    }

    /// The `s` scalar, big-endian.
    pub fn s(&self) -> [u8; 32] {
        self.inner.s().to_bytes().into()
    }

    /// Parse a strict DER signature (without a trailing sighash byte).
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let sig = ecdsa::Signature::from_der(bytes)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
        Ok(Self::normalized(sig))
    }

    /// DER encoding, at most 72 bytes.
    pub fn to_der(&self) -> Vec<u8> {
        self.inner.to_der().as_bytes().to_vec()
    }

    /// Sign a 32-byte digest with `priv_key`.
    ///
    /// # Arguments
    /// * `hash` - The digest to sign.
    /// * `priv_key` - The signing key.
    ///
    /// # Returns
    /// A low-S `Signature`, or an error if the digest is unusable.
    pub fn sign(hash: &[u8], priv_key: &PrivateKey) -> Result<Self, PrimitivesError> {
        let sig: ecdsa::Signature =
            PrehashSigner::<ecdsa::Signature>::sign_prehash(priv_key.signing_key(), hash)
                .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
        Ok(Self::normalized(sig))
    }

    /// Verify against a 32-byte digest and public key.
    pub fn verify(&self, hash: &[u8], pub_key: &PublicKey) -> bool {
        pub_key
            .verifying_key()
            .verify_prehash(hash, &self.inner)
            .is_ok()
    }

    fn normalized(sig: ecdsa::Signature) -> Self {
        Signature {
            inner: sig.normalize_s().unwrap_or(sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256;

    #[test]
    fn test_sign_verify() {
        let key = PrivateKey::new();
        let digest = sha256(b"token transfer");
        let sig = key.sign(&digest).unwrap();
        assert!(key.pub_key().verify(&digest, &sig));
        assert!(!key.pub_key().verify(&sha256(b"other"), &sig));
    }

    #[test]
    fn test_der_roundtrip_and_bounds() {
        let key = PrivateKey::new();
        let digest = sha256(b"der");
        let sig = key.sign(&digest).unwrap();
        let der = sig.to_der();
        assert_eq!(der[0], 0x30);
        assert!(der.len() <= 72);
        assert_eq!(Signature::from_der(&der).unwrap(), sig);
    }

    #[test]
    fn test_signing_is_deterministic() {
        let key = PrivateKey::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000002",
        )
        .unwrap();
        let digest = sha256(b"same message");
        assert_eq!(key.sign(&digest).unwrap(), key.sign(&digest).unwrap());
    }

    #[test]
    fn test_from_der_rejects_garbage() {
        assert!(Signature::from_der(&[0x30, 0x01, 0x00]).is_err());
    }
}
