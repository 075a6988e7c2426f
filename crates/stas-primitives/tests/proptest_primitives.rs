use proptest::prelude::*;

use stas_primitives::chainhash::Hash;
use stas_primitives::ec::PrivateKey;
use stas_primitives::hash::sha256;
use stas_primitives::util::{BsvReader, VarInt};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn wif_roundtrip(seed in prop::array::uniform32(any::<u8>())) {
        // Not every 32-byte array is a valid scalar.
        if let Ok(pk) = PrivateKey::from_bytes(&seed) {
            let back = PrivateKey::from_wif(&pk.to_wif()).unwrap();
            prop_assert_eq!(pk.to_hex(), back.to_hex());
        }
    }

    #[test]
    fn sign_verify_roundtrip(
        seed in prop::array::uniform32(any::<u8>()),
        msg in prop::collection::vec(any::<u8>(), 0..256)
    ) {
        if let Ok(pk) = PrivateKey::from_bytes(&seed) {
            let hash = sha256(&msg);
            let sig = pk.sign(&hash).unwrap();
            prop_assert!(pk.pub_key().verify(&hash, &sig));
            prop_assert!(sig.to_der().len() <= 72);
        }
    }

    #[test]
    fn hash_hex_roundtrip(bytes in prop::array::uniform32(any::<u8>())) {
        let hash = Hash::new(bytes);
        let back = Hash::from_hex(&hash.to_string()).unwrap();
        prop_assert_eq!(hash, back);
    }

    #[test]
    fn varint_length_matches_encoding(v in any::<u64>()) {
        let encoded = VarInt(v).to_bytes();
        prop_assert_eq!(encoded.len(), VarInt(v).length());
        let mut reader = BsvReader::new(&encoded);
        prop_assert_eq!(reader.read_varint().unwrap(), VarInt(v));
    }
}
