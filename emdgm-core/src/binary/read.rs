use byteorder::{BigEndian, ByteOrder, LittleEndian};
use emdgm_types::{DgmError, DgmResult, Endian};

/// Последовательный курсор чтения по срезу байт.
///
/// Не аллоцирует ничего, кроме строк из `read_chars`. Чтение за границей
/// среза возвращает [`DgmError::Truncated`] и не сдвигает позицию.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> ByteCursor<'a> {
    pub fn new(
        buf: &'a [u8],
        endian: Endian,
    ) -> Self {
        Self {
            buf,
            pos: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Непрочитанный хвост среза.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Проверяет, что впереди есть `n` байт для `what`.
    pub fn ensure(
        &self,
        n: usize,
        what: &'static str,
    ) -> DgmResult<()> {
        if n > self.remaining() {
            return Err(DgmError::truncated(what, n, self.remaining()));
        }
        Ok(())
    }

    pub fn skip(
        &mut self,
        n: usize,
    ) -> DgmResult<()> {
        self.ensure(n, "skipped bytes")?;
        self.pos += n;
        Ok(())
    }

    pub fn read_bytes(
        &mut self,
        n: usize,
    ) -> DgmResult<&'a [u8]> {
        self.ensure(n, "field")?;
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> DgmResult<u8> {
        let v = self.u8_at(self.pos)?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i8(&mut self) -> DgmResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16(&mut self) -> DgmResult<u16> {
        let v = self.u16_at(self.pos)?;
        self.pos += 2;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> DgmResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    pub fn read_u32(&mut self) -> DgmResult<u32> {
        let v = self.u32_at(self.pos)?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_i32(&mut self) -> DgmResult<i32> {
        Ok(self.read_u32()? as i32)
    }

    pub fn read_f32(&mut self) -> DgmResult<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> DgmResult<f64> {
        let b = self.read_bytes(8)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_f64(b),
            Endian::Big => BigEndian::read_f64(b),
        })
    }

    /// Строка фиксированной длины, дополненная NUL справа. Байты
    /// читаются как Latin-1, поэтому [`ByteWriter::put_chars`] вернёт их
    /// без изменений.
    ///
    /// [`ByteWriter::put_chars`]: super::ByteWriter::put_chars
    pub fn read_chars(
        &mut self,
        n: usize,
    ) -> DgmResult<String> {
        let b = self.read_bytes(n)?;
        Ok(latin1_text(trim_nul(b)))
    }

    // Доступ по явному смещению (позиция курсора не меняется)

    pub fn u8_at(
        &self,
        off: usize,
    ) -> DgmResult<u8> {
        self.slice_at(off, 1).map(|b| b[0])
    }

    pub fn u16_at(
        &self,
        off: usize,
    ) -> DgmResult<u16> {
        let b = self.slice_at(off, 2)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u16(b),
            Endian::Big => BigEndian::read_u16(b),
        })
    }

    pub fn u32_at(
        &self,
        off: usize,
    ) -> DgmResult<u32> {
        let b = self.slice_at(off, 4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u32(b),
            Endian::Big => BigEndian::read_u32(b),
        })
    }

    fn slice_at(
        &self,
        off: usize,
        n: usize,
    ) -> DgmResult<&'a [u8]> {
        let available = self.buf.len().saturating_sub(off);
        if n > available {
            return Err(DgmError::truncated("field", n, available));
        }
        Ok(&self.buf[off..off + n])
    }
}

/// Байты как Latin-1: каждый байт — один символ U+0000..U+00FF.
pub fn latin1_text(b: &[u8]) -> String {
    b.iter().map(|&c| char::from(c)).collect()
}

/// Срез без завершающих NUL.
pub fn trim_nul(b: &[u8]) -> &[u8] {
    let end = b.iter().rposition(|&c| c != 0).map_or(0, |i| i + 1);
    &b[..end]
}
