//! Hash functions used by the STAS protocol.
//!
//! Transaction identifiers and sighash digests use double SHA-256, owner and
//! redemption fields of token scripts use Hash160.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute double SHA-256 (SHA-256d) of the input data.
///
/// Used for transaction IDs, the sighash digest and Base58Check checksums.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte double-SHA-256 digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 hash of the input data.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// Compute Hash160: RIPEMD-160(SHA-256(data)).
///
/// Owner and redemption fields in token scripts are Hash160 digests of
/// compressed public keys.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 20-byte Hash160 digest.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}
