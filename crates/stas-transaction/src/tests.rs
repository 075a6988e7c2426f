//! Tests for the stas-transaction crate.
//!
//! Covers wire-format parsing and serialization, size computation, txid
//! ordering, sighash preimage layout for the flag combinations the token
//! protocol uses, and byte-exact P2PKH signing.

use stas_primitives::chainhash::Hash;
use stas_primitives::ec::PrivateKey;
use stas_script::Script;

use crate::input::{TransactionInput, DEFAULT_SEQUENCE_NUMBER};
use crate::output::TransactionOutput;
use crate::sighash;
use crate::template::p2pkh;
use crate::template::UnlockingScriptTemplate;
use crate::transaction::Transaction;

// -----------------------------------------------------------------------
// Raw transaction hex test vectors
// -----------------------------------------------------------------------

/// A one-input, two-output transaction.
const SOURCE_RAW_TX: &str = "010000000138c7c61c14ffb063c3bb2664041a3e29ea6ea0412a0c18ff725ba4e9e12afae2030000006a47304402203e9ab8e4c14addf3b4741540b556cfb0e0efb67dc1a7b5ce84c3ac56b3fd447802203c9f49f7bd893ebd7060176dfc36bcaff9d2c443d9a0dd6cd2d59b372c024d20412102798913bc057b344de675dac34faafe3dc2f312c758cd9068209f810877306d66ffffffff02dc050000000000002076a914eb0bd5edba389198e73f8efabddfc61666969ff788ac6a0568656c6c6faa0d0000000000001976a914eb0bd5edba389198e73f8efabddfc61666969ff788ac00000000";

/// A three-input transaction with a non-zero lock time.
const MULTI_INPUT_TX_HEX: &str = "0200000003a9bc457fdc6a54d99300fb137b23714d860c350a9d19ff0f571e694a419ff3a0010000006b48304502210086c83beb2b2663e4709a583d261d75be538aedcafa7766bd983e5c8db2f8b2fc02201a88b178624ab0ad1748b37c875f885930166237c88f5af78ee4e61d337f935f412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff0092bb9a47e27bf64fc98f557c530c04d9ac25e2f2a8b600e92a0b1ae7c89c20010000006b483045022100f06b3db1c0a11af348401f9cebe10ae2659d6e766a9dcd9e3a04690ba10a160f02203f7fbd7dfcfc70863aface1a306fcc91bbadf6bc884c21a55ef0d32bd6b088c8412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff9d0d4554fa692420a0830ca614b6c60f1bf8eaaa21afca4aa8c99fb052d9f398000000006b483045022100d920f2290548e92a6235f8b2513b7f693a64a0d3fa699f81a034f4b4608ff82f0220767d7d98025aff3c7bd5f2a66aab6a824f5990392e6489aae1e1ae3472d8dffb412103e8be830d98bb3b007a0343ee5c36daa48796ae8bb57946b1e87378ad6e8a090dfeffffff02807c814a000000001976a9143a6bf34ebfcf30e8541bbb33a7882845e5a29cb488ac76b0e60e000000001976a914bd492b67f90cb85918494767ebb23102c4f06b7088ac67000000";

const PREV_P2PKH: &str = "76a914eb0bd5edba389198e73f8efabddfc61666969ff788ac";

// -----------------------------------------------------------------------
// Parsing and serialization
// -----------------------------------------------------------------------

/// Parsing and re-serializing reproduces the input hex.
#[test]
fn test_from_hex_roundtrip() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).expect("should parse source tx hex");
    assert_eq!(tx.version, 1);
    assert_eq!(tx.input_count(), 1);
    assert_eq!(tx.output_count(), 2);
    assert_eq!(tx.outputs[0].satoshis, 1500);
    assert_eq!(tx.to_hex(), SOURCE_RAW_TX);
}

/// Three inputs, version 2 and a lock time survive the round trip.
#[test]
fn test_multi_input_roundtrip() {
    let tx = Transaction::from_hex(MULTI_INPUT_TX_HEX).expect("should parse multi-input tx");
    assert_eq!(tx.version, 2);
    assert_eq!(tx.input_count(), 3);
    assert_eq!(tx.lock_time, 0x67);
    assert_eq!(tx.inputs[0].sequence_number, 0xffff_fffe);
    assert_eq!(tx.to_hex(), MULTI_INPUT_TX_HEX);
}

/// Trailing bytes after a complete transaction are rejected.
#[test]
fn test_trailing_bytes_error() {
    let mut bytes = hex::decode(SOURCE_RAW_TX).unwrap();
    bytes.push(0x00);
    assert!(Transaction::from_bytes(&bytes).is_err());
}

/// Truncated and non-hex input fail cleanly.
#[test]
fn test_malformed_input_errors() {
    assert!(Transaction::from_hex("zz").is_err());
    assert!(Transaction::from_bytes(&[]).is_err());
    assert!(Transaction::from_hex(&SOURCE_RAW_TX[..100]).is_err());
}

/// `size()` matches the serialized length for signed and unsigned inputs.
#[test]
fn test_transaction_size() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    assert_eq!(tx.size(), tx.to_bytes().len());

    let mut unsigned = tx.clone();
    unsigned.inputs[0].unlocking_script = None;
    assert_eq!(unsigned.size(), unsigned.to_bytes().len());
    assert_eq!(tx.size() - unsigned.size(), 0x6a);
}

/// An empty transaction is version, two zero counts and lock time.
#[test]
fn test_empty_transaction_serialization() {
    let tx = Transaction::new();
    assert_eq!(tx.to_hex(), "01000000000000000000");
}

// -----------------------------------------------------------------------
// Transaction ID
// -----------------------------------------------------------------------

/// The display txid is the reversed double-SHA256 of the serialization.
#[test]
fn test_tx_id_is_reversed_digest() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    let digest = stas_primitives::hash::sha256d(&tx.to_bytes());
    let mut reversed = digest;
    reversed.reverse();
    assert_eq!(tx.tx_id_hex(), hex::encode(reversed));
    assert_eq!(tx.tx_id().as_bytes(), &digest);
}

/// An input created from a display txid stores internal byte order.
#[test]
fn test_input_source_txid_order() {
    let txid = "e2fa2ae1e9a45b72ff180c2a41a06eea293e1a046426bbc363b0ff141cc6c738";
    let input = TransactionInput::new(Hash::from_hex(txid).unwrap(), 3);
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    assert_eq!(input.source_txid, tx.inputs[0].source_txid);
    assert_eq!(input.sequence_number, DEFAULT_SEQUENCE_NUMBER);
    assert_eq!(input.source_txid_hash().to_string(), txid);
}

/// Input totals require every source output to be attached.
#[test]
fn test_total_input_satoshis() {
    let mut tx = Transaction::new();
    let hash = Hash::new([7u8; 32]);
    tx.add_input(TransactionInput::with_source_output(
        hash,
        0,
        TransactionOutput::new(600, Script::new()),
    ));
    tx.add_input(TransactionInput::new(hash, 1));
    assert!(tx.total_input_satoshis().is_err());

    tx.inputs[1].set_source_output(Some(TransactionOutput::new(400, Script::new())));
    assert_eq!(tx.total_input_satoshis().unwrap(), 1000);
}

// -----------------------------------------------------------------------
// Sighash
// -----------------------------------------------------------------------

/// The ALL|FORKID preimage has the documented field layout.
#[test]
fn test_calc_preimage_structure() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    let prev = hex::decode(PREV_P2PKH).unwrap();

    let preimage = tx
        .preimage(0, &prev, sighash::SIGHASH_ALL_FORKID, 1500)
        .expect("preimage should succeed");

    assert_eq!(preimage.len(), sighash::PREIMAGE_FIXED_LEN + 1 + prev.len());
    assert_eq!(&preimage[..4], &1u32.to_le_bytes());
    assert_eq!(&preimage[68..100], &tx.inputs[0].source_txid);
    assert_eq!(&preimage[104..105], &[25u8]);
    assert_eq!(&preimage[130..138], &1500u64.to_le_bytes());
    let tail = &preimage[preimage.len() - 4..];
    assert_eq!(tail, &0x41u32.to_le_bytes());
}

/// SINGLE|ANYONECANPAY zeroes prevouts and sequence and commits to the
/// same-index output only.
#[test]
fn test_preimage_single_anyonecanpay() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    let prev = hex::decode(PREV_P2PKH).unwrap();
    let flags = sighash::SIGHASH_SINGLE_ANYONECANPAY_FORKID;
    assert_eq!(flags, 0xc3);

    let preimage = tx.preimage(0, &prev, flags, 1500).unwrap();
    assert_eq!(&preimage[4..68], &[0u8; 64][..]);

    let outputs_at = preimage.len() - 4 - 4 - 32;
    let expected = stas_primitives::hash::sha256d(&tx.outputs[0].to_bytes());
    assert_eq!(&preimage[outputs_at..outputs_at + 32], &expected);

    // Appending inputs and outputs does not change the committed digest.
    let mut extended = tx.clone();
    extended.add_input(TransactionInput::new(Hash::new([9u8; 32]), 4));
    extended.add_output(TransactionOutput::new(1, Script::new()));
    assert_eq!(
        extended.signature_hash(0, &prev, flags, 1500).unwrap(),
        tx.signature_hash(0, &prev, flags, 1500).unwrap()
    );
}

/// An out-of-range input index is an error, not a panic.
#[test]
fn test_signature_hash_out_of_range() {
    let tx = Transaction::from_hex(SOURCE_RAW_TX).unwrap();
    assert!(tx.signature_hash(99, &[], sighash::SIGHASH_ALL_FORKID, 0).is_err());
}

// -----------------------------------------------------------------------
// P2PKH signing
// -----------------------------------------------------------------------

/// P2PKH signing reproduces a known signed transaction byte-for-byte.
#[test]
fn test_p2pkh_sign_exact_match() {
    let unsigned_hex = "010000000193a35408b6068499e0d5abd799d3e827d9bfe70c9b75ebe209c91d25072326510000000000ffffffff02404b4c00000000001976a91404ff367be719efa79d76e4416ffb072cd53b208888acde94a905000000001976a91404d03f746652cfcb6cb55119ab473a045137d26588ac00000000";
    let mut tx = Transaction::from_hex(unsigned_hex).unwrap();
    tx.inputs[0].set_source_output(Some(TransactionOutput::new(
        100_000_000,
        Script::from_hex("76a914c0a3c167a28cabb9fbb495affa0761e6e74ac60d88ac").unwrap(),
    )));

    let key = PrivateKey::from_wif("cNGwGSc7KRrTmdLUZ54fiSXWbhLNDc2Eg5zNucgQxyQCzuQ5YRDq").unwrap();
    let unlocker = p2pkh::unlock(key, None);
    let script = unlocker.sign(&tx, 0).expect("signing should succeed");
    assert!(script.len() <= unlocker.estimate_length(&tx, 0));
    tx.inputs[0].unlocking_script = Some(script);

    let expected = "010000000193a35408b6068499e0d5abd799d3e827d9bfe70c9b75ebe209c91d2507232651000000006b483045022100c1d77036dc6cd1f3fa1214b0688391ab7f7a16cd31ea4e5a1f7a415ef167df820220751aced6d24649fa235132f1e6969e163b9400f80043a72879237dab4a1190ad412103b8b40a84123121d260f5c109bc5a46ec819c2e4002e5ba08638783bfb4e01435ffffffff02404b4c00000000001976a91404ff367be719efa79d76e4416ffb072cd53b208888acde94a905000000001976a91404d03f746652cfcb6cb55119ab473a045137d26588ac00000000";
    assert_eq!(tx.to_hex(), expected);
}

/// Signing without a source output fails.
#[test]
fn test_p2pkh_error_without_source_output() {
    let mut tx = Transaction::new();
    tx.add_input(TransactionInput::new(Hash::new([1u8; 32]), 0));
    let unlocker = p2pkh::unlock(PrivateKey::new(), None);
    assert!(unlocker.sign(&tx, 0).is_err());
    assert!(unlocker.sign(&tx, 5).is_err());
}
