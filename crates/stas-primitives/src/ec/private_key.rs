//! secp256k1 private key with WIF support.
//!
//! Wraps a k256 `SigningKey`. Only the local signer in the token layer holds
//! one of these; builders work with public keys and signing callbacks.

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::ec::public_key::PublicKey;
use crate::ec::signature::Signature;
use crate::hash::sha256d;
use crate::PrimitivesError;

/// Length of a serialized private key in bytes.
const PRIVATE_KEY_BYTES_LEN: usize = 32;

/// Mainnet WIF prefix byte.
const MAINNET_PREFIX: u8 = 0x80;

/// Testnet WIF prefix byte.
const TESTNET_PREFIX: u8 = 0xef;

/// Compression flag byte appended to WIF for compressed public keys.
const COMPRESS_MAGIC: u8 = 0x01;

/// A secp256k1 private key.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a new random private key from the OS RNG.
    pub fn new() -> Self {
        PrivateKey {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a private key from a raw 32-byte scalar.
    ///
    /// # Arguments
    /// * `bytes` - A 32-byte slice representing the private key scalar.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` if the scalar is valid on secp256k1, otherwise an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() != PRIVATE_KEY_BYTES_LEN {
            return Err(PrimitivesError::InvalidPrivateKey(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_BYTES_LEN,
                bytes.len()
            )));
        }
        let inner = SigningKey::from_slice(bytes)
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner })
    }

    /// Create a private key from a 64-character hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        if hex_str.is_empty() {
            return Err(PrimitivesError::InvalidPrivateKey(
                "private key hex is empty".to_string(),
            ));
        }
        let mut bytes = hex::decode(hex_str)?;
        let key = Self::from_bytes(&bytes);
        bytes.zeroize();
        key
    }

    /// Decode a WIF string (mainnet or testnet, compressed or not).
    ///
    /// # Arguments
    /// * `wif` - A Base58Check-encoded WIF string.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` on success, or an error if the WIF is malformed or the checksum fails.
    pub fn from_wif(wif: &str) -> Result<Self, PrimitivesError> {
        let mut decoded = bs58::decode(wif)
            .into_vec()
            .map_err(|e| PrimitivesError::InvalidWif(e.to_string()))?;

        let result = Self::from_wif_payload(&decoded);
        decoded.zeroize();
        result
    }

    fn from_wif_payload(decoded: &[u8]) -> Result<Self, PrimitivesError> {
        // prefix + key [+ compress flag] + checksum
        let payload_end = match decoded.len() {
            38 if decoded[33] == COMPRESS_MAGIC => 34,
            38 => {
                return Err(PrimitivesError::InvalidWif(
                    "malformed private key: invalid compression flag".to_string(),
                ))
            }
            37 => 33,
            n => {
                return Err(PrimitivesError::InvalidWif(format!(
                    "malformed private key: invalid length {}",
                    n
                )))
            }
        };
        if decoded[0] != MAINNET_PREFIX && decoded[0] != TESTNET_PREFIX {
            return Err(PrimitivesError::InvalidWif(format!(
                "unknown network prefix 0x{:02x}",
                decoded[0]
            )));
        }
        let checksum = sha256d(&decoded[..payload_end]);
        if checksum[..4] != decoded[payload_end..] {
            return Err(PrimitivesError::ChecksumMismatch);
        }
        Self::from_bytes(&decoded[1..1 + PRIVATE_KEY_BYTES_LEN])
    }

    /// Encode as a compressed mainnet WIF string.
    pub fn to_wif(&self) -> String {
        self.to_wif_prefix(MAINNET_PREFIX)
    }

    /// Encode as a compressed testnet WIF string.
    pub fn to_wif_testnet(&self) -> String {
        self.to_wif_prefix(TESTNET_PREFIX)
    }

    fn to_wif_prefix(&self, prefix: u8) -> String {
        let mut payload = Vec::with_capacity(38);
        payload.push(prefix);
        payload.extend_from_slice(&self.inner.to_bytes());
        payload.push(COMPRESS_MAGIC);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);
        let wif = bs58::encode(&payload).into_string();
        payload.zeroize();
        wif
    }

    /// Hex encoding of the 32-byte scalar.
    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.to_bytes())
    }

    /// Derive the corresponding public key.
    pub fn pub_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.inner.verifying_key().clone())
    }

    /// Sign a 32-byte digest, producing a low-S signature.
    ///
    /// # Arguments
    /// * `hash` - The message digest (a sighash, never the raw preimage).
    pub fn sign(&self, hash: &[u8]) -> Result<Signature, PrimitivesError> {
        Signature::sign(hash, self)
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("pub_key", &self.pub_key().to_hex())
            .finish()
    }
}
