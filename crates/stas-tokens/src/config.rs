//! Fee rate configuration.

use serde::{Deserialize, Serialize};

/// Fee rate expressed as `sats` per `per_byte` bytes.
///
/// The default of 50 satoshis per 1000 bytes matches the relay policy most
/// BSV miners advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeRate {
    /// Satoshis charged per `per_byte` bytes.
    pub sats: u64,
    /// Size unit in bytes the `sats` figure applies to.
    pub per_byte: u64,
}

impl FeeRate {
    /// Create a fee rate of `sats` per `per_byte` bytes.
    pub fn new(sats: u64, per_byte: u64) -> Self {
        FeeRate { sats, per_byte }
    }

    /// Fee for a transaction of `size_bytes`, rounded up.
    ///
    /// A zero `per_byte` is treated as 1; a product past `u64::MAX`
    /// saturates, which no funding input can cover.
    pub fn fee_for(&self, size_bytes: usize) -> u64 {
        let per_byte = self.per_byte.max(1);
        (size_bytes as u64).saturating_mul(self.sats).div_ceil(per_byte)
    }
}

impl Default for FeeRate {
    fn default() -> Self {
        FeeRate {
            sats: 50,
            per_byte: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate() {
        let rate = FeeRate::default();
        assert_eq!(rate.sats, 50);
        assert_eq!(rate.per_byte, 1000);
    }

    #[test]
    fn fee_rounds_up() {
        let rate = FeeRate::default();
        assert_eq!(rate.fee_for(0), 0);
        assert_eq!(rate.fee_for(1), 1);
        assert_eq!(rate.fee_for(20), 1);
        assert_eq!(rate.fee_for(21), 2);
        assert_eq!(rate.fee_for(1000), 50);
    }

    #[test]
    fn zero_unit_does_not_panic() {
        let rate = FeeRate::new(1, 0);
        assert_eq!(rate.fee_for(250), 250);
    }

    #[test]
    fn huge_rate_saturates() {
        assert_eq!(FeeRate::new(u64::MAX, 1).fee_for(10), u64::MAX);
        assert_eq!(FeeRate::new(u64::MAX, 1000).fee_for(2000), u64::MAX.div_ceil(1000));
        assert_eq!(FeeRate::default().fee_for(1001), 51);
    }

    #[test]
    fn serde_roundtrip() {
        let rate = FeeRate::new(500, 1000);
        let json = serde_json::to_string(&rate).unwrap();
        assert_eq!(json, r#"{"sats":500,"per_byte":1000}"#);
        let back: FeeRate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rate);
    }
}
