use byteorder::{BigEndian, ByteOrder, LittleEndian};
use emdgm_types::{DgmError, DgmResult, Endian};

/// Писатель полей в растущий буфер. Всегда создаёт новый буфер и никогда
/// не трогает исходные байты файла.
#[derive(Debug, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl ByteWriter {
    pub fn new(endian: Endian) -> Self {
        Self::with_capacity(endian, 256)
    }

    pub fn with_capacity(
        endian: Endian,
        capacity: usize,
    ) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn put_bytes(
        &mut self,
        b: &[u8],
    ) {
        self.buf.extend_from_slice(b);
    }

    pub fn put_u8(
        &mut self,
        v: u8,
    ) {
        self.buf.push(v);
    }

    pub fn put_i8(
        &mut self,
        v: i8,
    ) {
        self.buf.push(v as u8);
    }

    pub fn put_u16(
        &mut self,
        v: u16,
    ) {
        let mut b = [0u8; 2];
        match self.endian {
            Endian::Little => LittleEndian::write_u16(&mut b, v),
            Endian::Big => BigEndian::write_u16(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i16(
        &mut self,
        v: i16,
    ) {
        self.put_u16(v as u16);
    }

    pub fn put_u32(
        &mut self,
        v: u32,
    ) {
        let mut b = [0u8; 4];
        match self.endian {
            Endian::Little => LittleEndian::write_u32(&mut b, v),
            Endian::Big => BigEndian::write_u32(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i32(
        &mut self,
        v: i32,
    ) {
        self.put_u32(v as u32);
    }

    pub fn put_f32(
        &mut self,
        v: f32,
    ) {
        self.put_u32(v.to_bits());
    }

    pub fn put_f64(
        &mut self,
        v: f64,
    ) {
        let mut b = [0u8; 8];
        match self.endian {
            Endian::Little => LittleEndian::write_f64(&mut b, v),
            Endian::Big => BigEndian::write_f64(&mut b, v),
        }
        self.buf.extend_from_slice(&b);
    }

    /// Строка ровно в `n` байт Latin-1: обрезается или дополняется NUL.
    pub fn put_chars(
        &mut self,
        s: &str,
        n: usize,
    ) -> DgmResult<()> {
        let bytes = encode_latin1(s)?;
        let take = bytes.len().min(n);
        self.buf.extend_from_slice(&bytes[..take]);
        self.buf.resize(self.buf.len() + (n - take), 0);
        Ok(())
    }

    /// Текст Latin-1 без дополнения.
    pub fn put_text(
        &mut self,
        s: &str,
    ) -> DgmResult<()> {
        let bytes = encode_latin1(s)?;
        self.buf.extend_from_slice(&bytes);
        Ok(())
    }

    /// Перезаписывает u32 по смещению (поле длины после сборки тела).
    pub fn patch_u32(
        &mut self,
        off: usize,
        v: u32,
    ) {
        match self.endian {
            Endian::Little => LittleEndian::write_u32(&mut self.buf[off..off + 4], v),
            Endian::Big => BigEndian::write_u32(&mut self.buf[off..off + 4], v),
        }
    }
}

/// Символы U+0000..U+00FF по одному байту; остальные не кодируются.
pub fn latin1_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(c).ok()).collect()
}

fn encode_latin1(s: &str) -> DgmResult<Vec<u8>> {
    latin1_bytes(s).ok_or_else(|| DgmError::format_violation(format!("{s:?} is not Latin-1 text")))
}
