use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("VarInt too big")]
    VarIntTooBig,
    #[error("Not enough data: needed {needed}, {remaining} remaining")]
    NotEnoughData { needed: usize, remaining: usize },
    #[error("Slice length {0} exceeds limit {1}")]
    LimitHit(usize, usize),
    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("Invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: i64 },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Maximum element count accepted for a length-prefixed sequence when limits
/// are enabled on a reader.
pub const SLICE_LIMIT: usize = 1024;

fn ensure(buf: &impl Buf, needed: usize) -> CodecResult<()> {
    if buf.remaining() < needed {
        return Err(CodecError::NotEnoughData {
            needed,
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

/// Read an unsigned VarInt (at most 5 bytes).
pub fn read_varu32(buf: &mut impl Buf) -> CodecResult<u32> {
    let mut result: u32 = 0;
    let mut shift: u32 = 0;
    loop {
        ensure(&*buf, 1)?;
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u32) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 35 {
            return Err(CodecError::VarIntTooBig);
        }
    }
}

/// Write an unsigned VarInt.
pub fn write_varu32(buf: &mut impl BufMut, mut value: u32) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Calculate the byte length of an unsigned VarInt.
pub fn varu32_len(value: u32) -> usize {
    let mut val = value;
    let mut len = 0;
    loop {
        len += 1;
        val >>= 7;
        if val == 0 {
            break;
        }
    }
    len
}

/// Read an unsigned VarLong (at most 10 bytes).
pub fn read_varu64(buf: &mut impl Buf) -> CodecResult<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        ensure(&*buf, 1)?;
        let byte = buf.get_u8();
        result |= ((byte & 0x7F) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift >= 70 {
            return Err(CodecError::VarIntTooBig);
        }
    }
}

/// Write an unsigned VarLong.
pub fn write_varu64(buf: &mut impl BufMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

fn zigzag32(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

fn unzigzag32(v: u32) -> i32 {
    ((v >> 1) as i32) ^ -((v & 1) as i32)
}

fn zigzag64(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn unzigzag64(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// How the element count of a sequence is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LenPrefix {
    U16,
    U32,
    VarU32,
}

/// A single field-level (de)serialization capability. `Reader` fills the
/// referenced values from the buffer, `Writer` emits them, so every packet
/// describes its layout once.
pub trait PacketIo {
    fn reading(&self) -> bool;
    /// The item network id that carries the extra shield blocking tick.
    fn shield_id(&self) -> i32;

    fn u8(&mut self, x: &mut u8) -> CodecResult<()>;
    fn bool(&mut self, x: &mut bool) -> CodecResult<()>;
    fn u16(&mut self, x: &mut u16) -> CodecResult<()>;
    fn u32(&mut self, x: &mut u32) -> CodecResult<()>;
    fn i32(&mut self, x: &mut i32) -> CodecResult<()>;
    fn be_i32(&mut self, x: &mut i32) -> CodecResult<()>;
    fn u64(&mut self, x: &mut u64) -> CodecResult<()>;
    fn i64(&mut self, x: &mut i64) -> CodecResult<()>;
    fn f32(&mut self, x: &mut f32) -> CodecResult<()>;
    fn varu32(&mut self, x: &mut u32) -> CodecResult<()>;
    fn varint32(&mut self, x: &mut i32) -> CodecResult<()>;
    fn varu64(&mut self, x: &mut u64) -> CodecResult<()>;
    fn varint64(&mut self, x: &mut i64) -> CodecResult<()>;
    fn string(&mut self, x: &mut String) -> CodecResult<()>;
    /// VarU32-length-prefixed byte slice.
    fn byte_slice(&mut self, x: &mut Vec<u8>) -> CodecResult<()>;
    /// All bytes left in the payload, without a length prefix.
    fn remaining_bytes(&mut self, x: &mut Vec<u8>) -> CodecResult<()>;
    fn uuid(&mut self, x: &mut Uuid) -> CodecResult<()>;
    /// Element count of a sequence. Readers validate it against the bytes left
    /// and, if enabled, against `SLICE_LIMIT`.
    fn seq_len(&mut self, len: &mut usize, prefix: LenPrefix) -> CodecResult<()>;
}

/// Types with a fixed field layout on the wire.
pub trait Marshal {
    fn marshal<I: PacketIo>(&mut self, io: &mut I) -> CodecResult<()>;
}

/// Marshal a length-prefixed sequence.
pub fn seq<I: PacketIo, T: Marshal + Default>(
    io: &mut I,
    prefix: LenPrefix,
    items: &mut Vec<T>,
) -> CodecResult<()> {
    let mut len = items.len();
    io.seq_len(&mut len, prefix)?;
    if io.reading() {
        items.clear();
        for _ in 0..len {
            let mut item = T::default();
            item.marshal(io)?;
            items.push(item);
        }
    } else {
        for item in items.iter_mut() {
            item.marshal(io)?;
        }
    }
    Ok(())
}

/// Marshal a length-prefixed sequence of strings.
pub fn string_seq<I: PacketIo>(
    io: &mut I,
    prefix: LenPrefix,
    items: &mut Vec<String>,
) -> CodecResult<()> {
    let mut len = items.len();
    io.seq_len(&mut len, prefix)?;
    if io.reading() {
        items.clear();
        for _ in 0..len {
            let mut s = String::new();
            io.string(&mut s)?;
            items.push(s);
        }
    } else {
        for s in items.iter_mut() {
            io.string(s)?;
        }
    }
    Ok(())
}

/// Marshal a bool-prefixed optional value.
pub fn optional<I: PacketIo, T: Default>(
    io: &mut I,
    value: &mut Option<T>,
    mut f: impl FnMut(&mut I, &mut T) -> CodecResult<()>,
) -> CodecResult<()> {
    let mut present = value.is_some();
    io.bool(&mut present)?;
    if io.reading() {
        *value = if present {
            let mut v = T::default();
            f(io, &mut v)?;
            Some(v)
        } else {
            None
        };
    } else if let Some(v) = value.as_mut() {
        f(io, v)?;
    }
    Ok(())
}

/// Reads packet fields from a payload buffer.
pub struct Reader<'a> {
    buf: &'a mut Bytes,
    shield_id: i32,
    limits: bool,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a mut Bytes, shield_id: i32, enable_limits: bool) -> Self {
        Self {
            buf,
            shield_id,
            limits: enable_limits,
        }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn take(&mut self, len: usize) -> CodecResult<Bytes> {
        ensure(&*self.buf, len)?;
        Ok(self.buf.split_to(len))
    }
}

impl PacketIo for Reader<'_> {
    fn reading(&self) -> bool {
        true
    }

    fn shield_id(&self) -> i32 {
        self.shield_id
    }

    fn u8(&mut self, x: &mut u8) -> CodecResult<()> {
        ensure(&*self.buf, 1)?;
        *x = self.buf.get_u8();
        Ok(())
    }

    fn bool(&mut self, x: &mut bool) -> CodecResult<()> {
        ensure(&*self.buf, 1)?;
        *x = self.buf.get_u8() != 0;
        Ok(())
    }

    fn u16(&mut self, x: &mut u16) -> CodecResult<()> {
        ensure(&*self.buf, 2)?;
        *x = self.buf.get_u16_le();
        Ok(())
    }

    fn u32(&mut self, x: &mut u32) -> CodecResult<()> {
        ensure(&*self.buf, 4)?;
        *x = self.buf.get_u32_le();
        Ok(())
    }

    fn i32(&mut self, x: &mut i32) -> CodecResult<()> {
        ensure(&*self.buf, 4)?;
        *x = self.buf.get_i32_le();
        Ok(())
    }

    fn be_i32(&mut self, x: &mut i32) -> CodecResult<()> {
        ensure(&*self.buf, 4)?;
        *x = self.buf.get_i32();
        Ok(())
    }

    fn u64(&mut self, x: &mut u64) -> CodecResult<()> {
        ensure(&*self.buf, 8)?;
        *x = self.buf.get_u64_le();
        Ok(())
    }

    fn i64(&mut self, x: &mut i64) -> CodecResult<()> {
        ensure(&*self.buf, 8)?;
        *x = self.buf.get_i64_le();
        Ok(())
    }

    fn f32(&mut self, x: &mut f32) -> CodecResult<()> {
        ensure(&*self.buf, 4)?;
        *x = self.buf.get_f32_le();
        Ok(())
    }

    fn varu32(&mut self, x: &mut u32) -> CodecResult<()> {
        *x = read_varu32(self.buf)?;
        Ok(())
    }

    fn varint32(&mut self, x: &mut i32) -> CodecResult<()> {
        *x = unzigzag32(read_varu32(self.buf)?);
        Ok(())
    }

    fn varu64(&mut self, x: &mut u64) -> CodecResult<()> {
        *x = read_varu64(self.buf)?;
        Ok(())
    }

    fn varint64(&mut self, x: &mut i64) -> CodecResult<()> {
        *x = unzigzag64(read_varu64(self.buf)?);
        Ok(())
    }

    fn string(&mut self, x: &mut String) -> CodecResult<()> {
        let len = read_varu32(self.buf)? as usize;
        let bytes = self.take(len)?;
        *x = String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(())
    }

    fn byte_slice(&mut self, x: &mut Vec<u8>) -> CodecResult<()> {
        let len = read_varu32(self.buf)? as usize;
        *x = self.take(len)?.to_vec();
        Ok(())
    }

    fn remaining_bytes(&mut self, x: &mut Vec<u8>) -> CodecResult<()> {
        let len = self.buf.remaining();
        *x = self.take(len)?.to_vec();
        Ok(())
    }

    fn uuid(&mut self, x: &mut Uuid) -> CodecResult<()> {
        ensure(&*self.buf, 16)?;
        let hi = self.buf.get_u64_le() as u128;
        let lo = self.buf.get_u64_le() as u128;
        *x = Uuid::from_u128((hi << 64) | lo);
        Ok(())
    }

    fn seq_len(&mut self, len: &mut usize, prefix: LenPrefix) -> CodecResult<()> {
        *len = match prefix {
            LenPrefix::U16 => {
                ensure(&*self.buf, 2)?;
                self.buf.get_u16_le() as usize
            }
            LenPrefix::U32 => {
                ensure(&*self.buf, 4)?;
                self.buf.get_u32_le() as usize
            }
            LenPrefix::VarU32 => read_varu32(self.buf)? as usize,
        };
        if self.limits && *len > SLICE_LIMIT {
            return Err(CodecError::LimitHit(*len, SLICE_LIMIT));
        }
        // Every element occupies at least one byte.
        ensure(&*self.buf, *len)?;
        Ok(())
    }
}

/// Writes packet fields to an output buffer.
pub struct Writer<'a> {
    buf: &'a mut BytesMut,
    shield_id: i32,
}

impl<'a> Writer<'a> {
    pub fn new(buf: &'a mut BytesMut, shield_id: i32) -> Self {
        Self { buf, shield_id }
    }
}

impl PacketIo for Writer<'_> {
    fn reading(&self) -> bool {
        false
    }

    fn shield_id(&self) -> i32 {
        self.shield_id
    }

    fn u8(&mut self, x: &mut u8) -> CodecResult<()> {
        self.buf.put_u8(*x);
        Ok(())
    }

    fn bool(&mut self, x: &mut bool) -> CodecResult<()> {
        self.buf.put_u8(*x as u8);
        Ok(())
    }

    fn u16(&mut self, x: &mut u16) -> CodecResult<()> {
        self.buf.put_u16_le(*x);
        Ok(())
    }

    fn u32(&mut self, x: &mut u32) -> CodecResult<()> {
        self.buf.put_u32_le(*x);
        Ok(())
    }

    fn i32(&mut self, x: &mut i32) -> CodecResult<()> {
        self.buf.put_i32_le(*x);
        Ok(())
    }

    fn be_i32(&mut self, x: &mut i32) -> CodecResult<()> {
        self.buf.put_i32(*x);
        Ok(())
    }

    fn u64(&mut self, x: &mut u64) -> CodecResult<()> {
        self.buf.put_u64_le(*x);
        Ok(())
    }

    fn i64(&mut self, x: &mut i64) -> CodecResult<()> {
        self.buf.put_i64_le(*x);
        Ok(())
    }

    fn f32(&mut self, x: &mut f32) -> CodecResult<()> {
        self.buf.put_f32_le(*x);
        Ok(())
    }

    fn varu32(&mut self, x: &mut u32) -> CodecResult<()> {
        write_varu32(self.buf, *x);
        Ok(())
    }

    fn varint32(&mut self, x: &mut i32) -> CodecResult<()> {
        write_varu32(self.buf, zigzag32(*x));
        Ok(())
    }

    fn varu64(&mut self, x: &mut u64) -> CodecResult<()> {
        write_varu64(self.buf, *x);
        Ok(())
    }

    fn varint64(&mut self, x: &mut i64) -> CodecResult<()> {
        write_varu64(self.buf, zigzag64(*x));
        Ok(())
    }

    fn string(&mut self, x: &mut String) -> CodecResult<()> {
        write_varu32(self.buf, x.len() as u32);
        self.buf.put_slice(x.as_bytes());
        Ok(())
    }

    fn byte_slice(&mut self, x: &mut Vec<u8>) -> CodecResult<()> {
        write_varu32(self.buf, x.len() as u32);
        self.buf.put_slice(x);
        Ok(())
    }

    fn remaining_bytes(&mut self, x: &mut Vec<u8>) -> CodecResult<()> {
        self.buf.put_slice(x);
        Ok(())
    }

    fn uuid(&mut self, x: &mut Uuid) -> CodecResult<()> {
        let v = x.as_u128();
        self.buf.put_u64_le((v >> 64) as u64);
        self.buf.put_u64_le(v as u64);
        Ok(())
    }

    fn seq_len(&mut self, len: &mut usize, prefix: LenPrefix) -> CodecResult<()> {
        match prefix {
            LenPrefix::U16 => self.buf.put_u16_le(*len as u16),
            LenPrefix::U32 => self.buf.put_u32_le(*len as u32),
            LenPrefix::VarU32 => write_varu32(self.buf, *len as u32),
        }
        Ok(())
    }
}
