//! A growable byte buffer with a big-endian typed read/write cursor.
//!
//! Mirrors the shape of `ba2`'s `Source`/`Sink` streaming abstraction, but
//! owns its bytes directly (rather than borrowing/mapping them) since the
//! entry tree and file payloads are built up incrementally before being
//! written to disk.

use std::io::Read;

use flate2::read::{ZlibDecoder, ZlibEncoder};
use flate2::Compression;

use crate::error::{Error, Result};

/// The format codes a [`ByteBuffer`] can `get`/`put`.
///
/// `Half`, `Double` and `Packed` are carried for parity with the reference
/// format's declared format enum; none of them are exercised by on-disk kxr
/// data (see spec §4.1, Design Notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Int,
    Short,
    Byte,
    Half,
    Float,
    Double,
    String,
    Packed,
}

impl DataFormat {
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Int => 'i',
            Self::Short => 's',
            Self::Byte => 'b',
            Self::Half => 'h',
            Self::Float => 'f',
            Self::Double => 'd',
            Self::String => 't',
            Self::Packed => 'p',
        }
    }

    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'i' => Some(Self::Int),
            's' => Some(Self::Short),
            'b' => Some(Self::Byte),
            'h' => Some(Self::Half),
            'f' => Some(Self::Float),
            'd' => Some(Self::Double),
            't' => Some(Self::String),
            'p' => Some(Self::Packed),
            _ => None,
        }
    }
}

/// A value read from or written to a [`ByteBuffer`] via its `get`/`put`
/// interface.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i32),
    Short(i16),
    Byte(u8),
    Half(f32),
    Float(f32),
    Double(f64),
    Str(String),
}

/// A growable, in-memory byte buffer with a read/write cursor.
///
/// All multi-byte scalar formats are big-endian on the wire; [`crypt`] is the
/// one operation that works in little-endian words (see spec §4.1.1).
///
/// [`crypt`]: ByteBuffer::crypt
#[derive(Debug, Clone, Default)]
pub struct ByteBuffer {
    buffer: Vec<u8>,
    pos: usize,
    capacity: Option<usize>,
}

impl ByteBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::new(),
            pos: 0,
            capacity: Some(capacity),
        }
    }

    #[must_use]
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            buffer: data,
            pos: 0,
            capacity: None,
        }
    }

    #[must_use]
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn check_overflow(&self, end: usize) -> Result<()> {
        match self.capacity {
            Some(cap) if end > cap => Err(Error::BufferOverflow),
            _ => Ok(()),
        }
    }

    fn read_bytes(&mut self, len: usize) -> Result<&[u8]> {
        let end = self.pos + len;
        self.check_overflow(end)?;
        if end > self.buffer.len() {
            return Err(Error::CorruptHeader);
        }
        let slice = &self.buffer[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Write `data` at the cursor, growing the buffer (zero-filling any gap)
    /// as needed, matching `BytesIO`'s write-past-the-end behavior.
    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let end = self.pos + data.len();
        self.check_overflow(end)?;
        if end > self.buffer.len() {
            self.buffer.resize(end, 0);
        }
        self.buffer[self.pos..end].copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    pub fn get(&mut self, format: DataFormat) -> Result<Value> {
        match format {
            DataFormat::Int => self.get_i32().map(Value::Int),
            DataFormat::Short => self.get_i16().map(Value::Short),
            DataFormat::Byte => self.get_u8().map(Value::Byte),
            DataFormat::Half => Err(Error::UnsupportedFormat('h')),
            DataFormat::Float => self.get_f32().map(Value::Float),
            DataFormat::Double => self.get_f64().map(Value::Double),
            DataFormat::String => self.get_string().map(Value::Str),
            DataFormat::Packed => Err(Error::UnsupportedFormat('p')),
        }
    }

    pub fn put(&mut self, format: DataFormat, value: &Value) -> Result<()> {
        match (format, value) {
            (DataFormat::Int, Value::Int(v)) => self.put_i32(*v),
            (DataFormat::Short, Value::Short(v)) => self.put_i16(*v),
            (DataFormat::Byte, Value::Byte(v)) => self.put_u8(*v),
            (DataFormat::Float, Value::Float(v)) => self.put_f32(*v),
            (DataFormat::Double, Value::Double(v)) => self.put_f64(*v),
            (DataFormat::String, Value::Str(v)) => self.put_string(v),
            (DataFormat::Half | DataFormat::Packed, _) => Err(Error::UnsupportedFormat(format.code())),
            _ => Err(Error::UnsupportedFormat(format.code())),
        }
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().unwrap();
        Ok(i32::from_be_bytes(bytes))
    }

    pub fn put_i32(&mut self, value: i32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn get_i16(&mut self) -> Result<i16> {
        let bytes: [u8; 2] = self.read_bytes(2)?.try_into().unwrap();
        Ok(i16::from_be_bytes(bytes))
    }

    pub fn put_i16(&mut self, value: i16) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    pub fn get_f32(&mut self) -> Result<f32> {
        let bytes: [u8; 4] = self.read_bytes(4)?.try_into().unwrap();
        Ok(f32::from_be_bytes(bytes))
    }

    pub fn put_f32(&mut self, value: f32) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    pub fn get_f64(&mut self) -> Result<f64> {
        let bytes: [u8; 8] = self.read_bytes(8)?.try_into().unwrap();
        Ok(f64::from_be_bytes(bytes))
    }

    pub fn put_f64(&mut self, value: f64) -> Result<()> {
        self.write_bytes(&value.to_be_bytes())
    }

    /// Length-prefixed (`u16` big-endian) UTF-8 string — the `t` format.
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_i16()? as u16 as usize;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::CorruptHeader)
    }

    pub fn put_string(&mut self, value: &str) -> Result<()> {
        let len: u16 = value
            .len()
            .try_into()
            .map_err(|_| Error::NameTooLong(u16::MAX as usize))?;
        self.put_i16(len as i16)?;
        self.write_bytes(value.as_bytes())
    }

    /// Appends raw bytes at the cursor without any format framing, used for
    /// writing the container prolog's literal `"kxrf"` magic.
    pub fn put_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.write_bytes(data)
    }

    /// Replace the buffer's contents with their zlib-compressed form.
    pub fn compress(&mut self, level: u32) -> Result<()> {
        let mut encoder = ZlibEncoder::new(&self.buffer[..], Compression::new(level));
        let mut out = Vec::new();
        encoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Compression(e.to_string()))?;
        self.buffer = out;
        self.pos = 0;
        Ok(())
    }

    /// Replace the buffer's contents with their zlib-decompressed form.
    pub fn decompress(&mut self) -> Result<()> {
        let mut decoder = ZlibDecoder::new(&self.buffer[..]);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::Compression(e.to_string()))?;
        self.buffer = out;
        self.pos = 0;
        Ok(())
    }

    /// The stateful 32-bit stream-XOR obfuscation (spec §4.1.1).
    ///
    /// `crypt` is an involution: calling it twice with the same `magic`
    /// restores the original bytes. The strict `i + 4 < N` step condition is
    /// a faithful-to-format requirement, not a bug — a buffer whose length
    /// is a multiple of 4 processes its last word byte-at-a-time.
    pub fn crypt(&mut self, magic: u32) {
        let n = self.buffer.len();
        let mut magic = magic;
        let mut i = 0usize;

        while i < n {
            if i > 0 && i % 4 == 0 {
                magic = (magic << 1) | ((!((magic >> 3) ^ magic) >> 13) & 1);
            }

            if i + 4 < n {
                let word = u32::from_le_bytes(self.buffer[i..i + 4].try_into().unwrap());
                let word = word ^ magic;
                self.buffer[i..i + 4].copy_from_slice(&word.to_le_bytes());
                i += 4;
            } else {
                let shift = 8 * (i % 4);
                self.buffer[i] ^= ((magic >> shift) & 0xFF) as u8;
                i += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ByteBuffer;

    #[test]
    fn crypt_is_an_involution() {
        let data: Vec<u8> = (0..37u32).map(|x| (x * 7 + 3) as u8).collect();
        let mut bbuf = ByteBuffer::from_bytes(data.clone());
        bbuf.crypt(0xDEAD_BEEF);
        assert_ne!(bbuf.buffer(), &data[..]);
        bbuf.crypt(0xDEAD_BEEF);
        assert_eq!(bbuf.buffer(), &data[..]);
    }

    #[test]
    fn crypt_is_an_involution_on_multiple_of_four_length() {
        let data: Vec<u8> = (0..64u32).map(|x| (x * 13 + 1) as u8).collect();
        let mut bbuf = ByteBuffer::from_bytes(data.clone());
        bbuf.crypt(0x1234_5678);
        bbuf.crypt(0x1234_5678);
        assert_eq!(bbuf.buffer(), &data[..]);
    }

    #[test]
    fn crypt_tail_quirk_processes_final_word_byte_at_a_time() {
        // with N a multiple of 4, the final 4 bytes never satisfy i+4 < N,
        // so they're XORed with the *unshifted* tail of `magic` one byte at
        // a time rather than as a single little-endian word.
        let mut bbuf = ByteBuffer::from_bytes(vec![0u8; 8]);
        bbuf.crypt(0x0102_0304);
        // i=0: magic unchanged (first word), i+4=4 < 8 -> word xor.
        assert_eq!(&bbuf.buffer()[0..4], &0x0102_0304u32.to_le_bytes());
        // i=4: magic updates once, then i+4=8 is not < 8 -> byte-at-a-time.
        assert_ne!(bbuf.buffer()[4..8], [0, 0, 0, 0]);
    }

    #[test]
    fn string_round_trips() {
        let mut bbuf = ByteBuffer::new();
        bbuf.put_string("hello.txt").unwrap();
        bbuf.set_pos(0);
        assert_eq!(bbuf.get_string().unwrap(), "hello.txt");
    }

    #[test]
    fn capacity_overflow_is_rejected() {
        let mut bbuf = ByteBuffer::with_capacity(2);
        assert!(bbuf.put_i32(1).is_err());
    }

    #[test]
    fn compress_then_decompress_round_trips() {
        let mut bbuf = ByteBuffer::from_bytes(b"Hello, world!\n".to_vec());
        bbuf.compress(5).unwrap();
        bbuf.decompress().unwrap();
        assert_eq!(bbuf.buffer(), b"Hello, world!\n");
    }
}
