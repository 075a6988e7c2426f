//! Opcode constants used when building and reading token scripts.
//!
//! Only the subset that appears in locking templates, unlocking scripts and
//! ASM output is named here; every other byte renders as `OP_UNKNOWN<n>`.

pub const OP_0: u8 = 0x00;
pub const OP_FALSE: u8 = 0x00;
pub const OP_DATA_20: u8 = 0x14;
pub const OP_DATA_32: u8 = 0x20;
pub const OP_DATA_33: u8 = 0x21;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1NEGATE: u8 = 0x4f;
pub const OP_1: u8 = 0x51;
pub const OP_TRUE: u8 = 0x51;
pub const OP_2: u8 = 0x52;
pub const OP_3: u8 = 0x53;
pub const OP_16: u8 = 0x60;

pub const OP_NOP: u8 = 0x61;
pub const OP_IF: u8 = 0x63;
pub const OP_NOTIF: u8 = 0x64;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_VERIFY: u8 = 0x69;
pub const OP_RETURN: u8 = 0x6a;

pub const OP_TOALTSTACK: u8 = 0x6b;
pub const OP_FROMALTSTACK: u8 = 0x6c;
pub const OP_2DROP: u8 = 0x6d;
pub const OP_2DUP: u8 = 0x6e;
pub const OP_3DUP: u8 = 0x6f;
pub const OP_2OVER: u8 = 0x70;
pub const OP_2SWAP: u8 = 0x72;
pub const OP_IFDUP: u8 = 0x73;
pub const OP_DEPTH: u8 = 0x74;
pub const OP_DROP: u8 = 0x75;
pub const OP_DUP: u8 = 0x76;
pub const OP_NIP: u8 = 0x77;
pub const OP_OVER: u8 = 0x78;
pub const OP_PICK: u8 = 0x79;
pub const OP_ROLL: u8 = 0x7a;
pub const OP_ROT: u8 = 0x7b;
pub const OP_SWAP: u8 = 0x7c;
pub const OP_TUCK: u8 = 0x7d;

pub const OP_CAT: u8 = 0x7e;
pub const OP_SPLIT: u8 = 0x7f;
pub const OP_NUM2BIN: u8 = 0x80;
pub const OP_BIN2NUM: u8 = 0x81;
pub const OP_SIZE: u8 = 0x82;

pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_1ADD: u8 = 0x8b;
pub const OP_1SUB: u8 = 0x8c;
pub const OP_NOT: u8 = 0x91;
pub const OP_0NOTEQUAL: u8 = 0x92;
pub const OP_ADD: u8 = 0x93;
pub const OP_SUB: u8 = 0x94;
pub const OP_MUL: u8 = 0x95;
pub const OP_LSHIFT: u8 = 0x98;
pub const OP_RSHIFT: u8 = 0x99;
pub const OP_BOOLAND: u8 = 0x9a;
pub const OP_BOOLOR: u8 = 0x9b;
pub const OP_NUMEQUAL: u8 = 0x9c;
pub const OP_NUMEQUALVERIFY: u8 = 0x9d;
pub const OP_LESSTHAN: u8 = 0x9f;
pub const OP_GREATERTHAN: u8 = 0xa0;
pub const OP_MIN: u8 = 0xa3;
pub const OP_MAX: u8 = 0xa4;
pub const OP_WITHIN: u8 = 0xa5;

pub const OP_SHA256: u8 = 0xa8;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_HASH256: u8 = 0xaa;
pub const OP_CODESEPARATOR: u8 = 0xab;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKSIGVERIFY: u8 = 0xad;

/// Opcode pushing the small integer `n` (0..=16).
///
/// Returns `None` for values outside the small-integer range.
pub fn small_int_opcode(n: u64) -> Option<u8> {
    match n {
        0 => Some(OP_0),
        1..=16 => Some(OP_1 + (n as u8) - 1),
        _ => None,
    }
}

/// Inverse of [`small_int_opcode`].
pub fn small_int_value(op: u8) -> Option<u64> {
    match op {
        OP_0 => Some(0),
        OP_1..=OP_16 => Some((op - OP_1 + 1) as u64),
        _ => None,
    }
}

/// Canonical name of an opcode for ASM output.
pub fn opcode_to_string(op: u8) -> String {
    let name = match op {
        OP_0 => "OP_0",
        OP_PUSHDATA1 => "OP_PUSHDATA1",
        OP_PUSHDATA2 => "OP_PUSHDATA2",
        OP_PUSHDATA4 => "OP_PUSHDATA4",
        OP_1NEGATE => "OP_1NEGATE",
        OP_1..=OP_16 => return format!("OP_{}", op - OP_1 + 1),
        OP_NOP => "OP_NOP",
        OP_IF => "OP_IF",
        OP_NOTIF => "OP_NOTIF",
        OP_ELSE => "OP_ELSE",
        OP_ENDIF => "OP_ENDIF",
        OP_VERIFY => "OP_VERIFY",
        OP_RETURN => "OP_RETURN",
        OP_TOALTSTACK => "OP_TOALTSTACK",
        OP_FROMALTSTACK => "OP_FROMALTSTACK",
        OP_2DROP => "OP_2DROP",
        OP_2DUP => "OP_2DUP",
        OP_3DUP => "OP_3DUP",
        OP_2OVER => "OP_2OVER",
        OP_2SWAP => "OP_2SWAP",
        OP_IFDUP => "OP_IFDUP",
        OP_DEPTH => "OP_DEPTH",
        OP_DROP => "OP_DROP",
        OP_DUP => "OP_DUP",
        OP_NIP => "OP_NIP",
        OP_OVER => "OP_OVER",
        OP_PICK => "OP_PICK",
        OP_ROLL => "OP_ROLL",
        OP_ROT => "OP_ROT",
        OP_SWAP => "OP_SWAP",
        OP_TUCK => "OP_TUCK",
        OP_CAT => "OP_CAT",
        OP_SPLIT => "OP_SPLIT",
        OP_NUM2BIN => "OP_NUM2BIN",
        OP_BIN2NUM => "OP_BIN2NUM",
        OP_SIZE => "OP_SIZE",
        OP_EQUAL => "OP_EQUAL",
        OP_EQUALVERIFY => "OP_EQUALVERIFY",
        OP_1ADD => "OP_1ADD",
        OP_1SUB => "OP_1SUB",
        OP_NOT => "OP_NOT",
        OP_0NOTEQUAL => "OP_0NOTEQUAL",
        OP_ADD => "OP_ADD",
        OP_SUB => "OP_SUB",
        OP_MUL => "OP_MUL",
        OP_LSHIFT => "OP_LSHIFT",
        OP_RSHIFT => "OP_RSHIFT",
        OP_BOOLAND => "OP_BOOLAND",
        OP_BOOLOR => "OP_BOOLOR",
        OP_NUMEQUAL => "OP_NUMEQUAL",
        OP_NUMEQUALVERIFY => "OP_NUMEQUALVERIFY",
        OP_LESSTHAN => "OP_LESSTHAN",
        OP_GREATERTHAN => "OP_GREATERTHAN",
        OP_MIN => "OP_MIN",
        OP_MAX => "OP_MAX",
        OP_WITHIN => "OP_WITHIN",
        OP_SHA256 => "OP_SHA256",
        OP_HASH160 => "OP_HASH160",
        OP_HASH256 => "OP_HASH256",
        OP_CODESEPARATOR => "OP_CODESEPARATOR",
        OP_CHECKSIG => "OP_CHECKSIG",
        OP_CHECKSIGVERIFY => "OP_CHECKSIGVERIFY",
        _ => return format!("OP_UNKNOWN{}", op),
    };
    name.to_string()
}

/// Parse an ASM opcode name (`OP_DUP`, `OP_5`, `OP_FALSE`...).
pub fn string_to_opcode(name: &str) -> Option<u8> {
    match name {
        "OP_FALSE" => return Some(OP_FALSE),
        "OP_TRUE" => return Some(OP_TRUE),
        _ => {}
    }
    if !name.starts_with("OP_") {
        return None;
    }
    (0..=u8::MAX).find(|op| !(0x01..=0x4b).contains(op) && opcode_to_string(*op) == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_int_roundtrip() {
        for n in 0..=16u64 {
            let op = small_int_opcode(n).unwrap();
            assert_eq!(small_int_value(op), Some(n));
        }
        assert_eq!(small_int_opcode(17), None);
        assert_eq!(small_int_opcode(2), Some(0x52));
    }

    #[test]
    fn test_names() {
        assert_eq!(opcode_to_string(OP_CHECKSIG), "OP_CHECKSIG");
        assert_eq!(opcode_to_string(0x55), "OP_5");
        assert_eq!(opcode_to_string(0xba), "OP_UNKNOWN186");
        assert_eq!(string_to_opcode("OP_HASH160"), Some(OP_HASH160));
        assert_eq!(string_to_opcode("OP_16"), Some(OP_16));
        assert_eq!(string_to_opcode("OP_FALSE"), Some(OP_0));
        assert_eq!(string_to_opcode("deadbeef"), None);
    }
}
