//! Binary serialization helpers.
//!
//! `VarInt` plus a cursor reader and an append-only writer for the
//! little-endian wire format shared by transactions and sighash preimages.

use crate::PrimitivesError;

// ---------------------------------------------------------------------------
// VarInt
// ---------------------------------------------------------------------------

/// A Bitcoin protocol variable-length integer.
///
/// Encoded in 1, 3, 5 or 9 bytes depending on magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarInt(pub u64);

impl VarInt {
    /// Return the wire-format byte length of this VarInt.
    ///
    /// # Returns
    /// 1, 3, 5, or 9 depending on the value.
    pub fn length(&self) -> usize {
        match self.0 {
            0..=0xfc => 1,
            0xfd..=0xffff => 3,
            0x1_0000..=0xffff_ffff => 5,
            _ => 9,
        }
    }

    /// Encode the VarInt into a new byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let v = self.0;
        match self.length() {
            1 => vec![v as u8],
            3 => {
                let mut out = vec![0xfd];
                out.extend_from_slice(&(v as u16).to_le_bytes());
                out
            }
            5 => {
                let mut out = vec![0xfe];
                out.extend_from_slice(&(v as u32).to_le_bytes());
                out
            }
            _ => {
                let mut out = vec![0xff];
                out.extend_from_slice(&v.to_le_bytes());
                out
            }
        }
    }

    /// Return the underlying value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl From<u64> for VarInt {
    fn from(v: u64) -> Self {
        VarInt(v)
    }
}

impl From<usize> for VarInt {
    fn from(v: usize) -> Self {
        VarInt(v as u64)
    }
}

// ---------------------------------------------------------------------------
// BsvReader
// ---------------------------------------------------------------------------

/// A cursor-based reader over wire-format bytes.
pub struct BsvReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BsvReader<'a> {
    /// Create a new reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        BsvReader { data, pos: 0 }
    }

    /// Read `n` bytes and advance the position.
    ///
    /// # Returns
    /// A byte slice of length `n`, or `UnexpectedEof` if insufficient data remains.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], PrimitivesError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(PrimitivesError::UnexpectedEof)?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Read a fixed-size array and advance the position.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PrimitivesError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, PrimitivesError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16_le(&mut self) -> Result<u16, PrimitivesError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, PrimitivesError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, PrimitivesError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    /// Read a VarInt and advance the position accordingly.
    pub fn read_varint(&mut self) -> Result<VarInt, PrimitivesError> {
        let value = match self.read_u8()? {
            0xff => self.read_u64_le()?,
            0xfe => self.read_u32_le()? as u64,
            0xfd => self.read_u16_le()? as u64,
            b => b as u64,
        };
        Ok(VarInt(value))
    }

    /// Current read offset from the start of the data.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Return the number of bytes remaining.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

// ---------------------------------------------------------------------------
// BsvWriter
// ---------------------------------------------------------------------------

/// An append-only buffer for wire-format bytes.
#[derive(Debug, Default)]
pub struct BsvWriter {
    buf: Vec<u8>,
}

impl BsvWriter {
    /// Create a new empty writer.
    pub fn new() -> Self {
        BsvWriter { buf: Vec::new() }
    }

    /// Create a new writer with a pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        BsvWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a single byte.
    pub fn write_u8(&mut self, val: u8) {
        self.buf.push(val);
    }

    /// Append a little-endian u32.
    pub fn write_u32_le(&mut self, val: u32) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a little-endian u64.
    pub fn write_u64_le(&mut self, val: u64) {
        self.buf.extend_from_slice(&val.to_le_bytes());
    }

    /// Append a VarInt.
    pub fn write_varint(&mut self, val: VarInt) {
        self.buf.extend_from_slice(&val.to_bytes());
    }

    /// Append a VarInt length prefix followed by `bytes`.
    pub fn write_var_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(VarInt::from(bytes.len()));
        self.write_bytes(bytes);
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
