//! Endianness-aware primitive decoding and encoding over in-memory buffers

use super::error::GgufError;

/// Byte order of every multi-byte field in a GGUF file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

macro_rules! read_fixed {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, GgufError> {
                let bytes = self.take_array::<{ std::mem::size_of::<$ty>() }>()?;
                Ok(match self.endian {
                    Endian::Little => <$ty>::from_le_bytes(bytes),
                    Endian::Big => <$ty>::from_be_bytes(bytes),
                })
            }
        )*
    };
}

macro_rules! write_fixed {
    ($($name:ident => $ty:ty),* $(,)?) => {
        $(
            pub fn $name(&mut self, v: $ty) {
                match self.endian {
                    Endian::Little => self.buf.extend_from_slice(&v.to_le_bytes()),
                    Endian::Big => self.buf.extend_from_slice(&v.to_be_bytes()),
                }
            }
        )*
    };
}

/// Cursor over a borrowed byte buffer
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, pos: 0, endian }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn set_endian(&mut self, endian: Endian) {
        self.endian = endian;
    }

    /// Consume `len` bytes, failing without moving the cursor if too few remain
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], GgufError> {
        if len > self.remaining() {
            return Err(GgufError::TruncatedInput {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], GgufError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    read_fixed! {
        read_u8 => u8,
        read_i8 => i8,
        read_u16 => u16,
        read_i16 => i16,
        read_u32 => u32,
        read_i32 => i32,
        read_u64 => u64,
        read_i64 => i64,
        read_f32 => f32,
        read_f64 => f64,
    }

    pub fn read_bool(&mut self) -> Result<bool, GgufError> {
        let offset = self.pos;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GgufError::MalformedEntry(format!(
                "bool at offset {offset} has byte value {other}"
            ))),
        }
    }

    /// Length-prefixed string: u64 byte length followed by UTF-8 bytes
    pub fn read_string(&mut self) -> Result<String, GgufError> {
        let offset = self.pos;
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| GgufError::TruncatedInput {
            offset: self.pos,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| {
            GgufError::MalformedEntry(format!("invalid UTF-8 in string at offset {offset}"))
        })
    }

    /// Read a u64 element count, capping it to what the buffer could possibly hold
    pub fn read_len(&mut self, min_element_size: usize) -> Result<(u64, usize), GgufError> {
        let len = self.read_u64()?;
        let max = self.remaining() / min_element_size.max(1);
        let capacity = usize::try_from(len).map_or(max, |n| n.min(max));
        Ok((len, capacity))
    }
}

/// Growable output buffer encoding primitives in a fixed byte order
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl ByteWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    pub fn with_capacity(endian: Endian, capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            endian,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    write_fixed! {
        write_u8 => u8,
        write_i8 => i8,
        write_u16 => u16,
        write_i16 => i16,
        write_u32 => u32,
        write_i32 => i32,
        write_u64 => u64,
        write_i64 => i64,
        write_f32 => f32,
        write_f64 => f64,
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_u64(s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// Zero-pad until the buffer length is a multiple of `alignment`
    pub fn pad_to(&mut self, alignment: usize) {
        let padded = align_offset(self.buf.len(), alignment);
        self.buf.resize(padded, 0);
    }
}

/// Round `offset` up to the next multiple of `alignment`
pub fn align_offset(offset: usize, alignment: usize) -> usize {
    offset.div_ceil(alignment) * alignment
}
