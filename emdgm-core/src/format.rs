//! Кадрирование датаграмм Kongsberg EM `.all`.
//!
//! Кадр на диске:
//!
//! ```text
//! [length u32][STX 0x02][type u8][model u16][date u32][time_ms u32]
//! [body ...][spare 0..1][ETX 0x03][checksum u16]
//! ```
//!
//! `length` — число байт после самого поля длины. Контрольная сумма —
//! сумма байт строго между STX и ETX по модулю 65536. Длина кадра после
//! поля длины всегда чётная, при необходимости перед ETX пишется нулевой
//! байт выравнивания.

use chrono::{Datelike, NaiveDate, Timelike};
use emdgm_types::{DatagramKind, DgmError, DgmResult, Endian};
use log::debug;

use crate::binary::{ByteCursor, ByteWriter};

/// Начало текста
pub const STX: u8 = 0x02;

/// Конец текста
pub const ETX: u8 = 0x03;

/// Размер поля длины
pub const LENGTH_FIELD_SIZE: usize = 4;

/// STX, тип, модель, дата, время
pub const FRAME_HEADER_SIZE: usize = 12;

/// ETX + контрольная сумма
pub const FRAME_TRAILER_SIZE: usize = 3;

/// Минимальное значение поля длины (пустое тело)
pub const MIN_DATAGRAM_LEN: u32 = (FRAME_HEADER_SIZE + FRAME_TRAILER_SIZE) as u32;

/// Максимальное значение поля длины (16 МБ)
pub const MAX_DATAGRAM_LEN: u32 = 16 * 1024 * 1024;

/// Смещение тела относительно начала кадра
pub const BODY_OFFSET: usize = LENGTH_FIELD_SIZE + FRAME_HEADER_SIZE;

/// Общий заголовок каждой датаграммы (после STX).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub kind_id: u8,
    /// Номер модели эхолота (например, 2040, 710)
    pub model: u16,
    /// Дата в виде YYYYMMDD
    pub date: u32,
    /// Миллисекунды от полуночи
    pub time_ms: u32,
}

impl FrameHeader {
    /// POSIX-время датаграммы в секундах, если дата корректна.
    pub fn posix_time(&self) -> Option<f64> {
        posix_time(self.date, self.time_ms)
    }
}

/// Переводит пару (YYYYMMDD, мс от полуночи) в POSIX-секунды.
pub fn posix_time(
    date: u32,
    time_ms: u32,
) -> Option<f64> {
    let day = NaiveDate::from_ymd_opt(
        (date / 10_000) as i32,
        (date / 100) % 100,
        date % 100,
    )?;
    let midnight = day.and_hms_opt(0, 0, 0)?.and_utc().timestamp();
    Some(midnight as f64 + time_ms as f64 * 1e-3)
}

/// Обратное преобразование POSIX-секунд в (YYYYMMDD, мс от полуночи).
pub fn split_posix_time(t: f64) -> Option<(u32, u32)> {
    let secs = t.floor();
    let dt = chrono::DateTime::from_timestamp(secs as i64, 0)?;
    let date = dt.year() as u32 * 10_000 + dt.month() * 100 + dt.day();
    let ms = dt.num_seconds_from_midnight() as f64 * 1e3 + (t - secs) * 1e3;
    Some((date, ms.round() as u32))
}

/// Кадр, найденный в буфере.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub offset: u64,
    /// Полный размер кадра, включая поле длины
    pub length: usize,
    pub kind_id: u8,
}

impl Frame {
    pub fn kind(&self) -> Option<DatagramKind> {
        DatagramKind::from_u8(self.kind_id).ok()
    }

    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

/// Результат проверки кадра в заданной позиции.
#[derive(Debug)]
pub enum Probe {
    /// Корректный кадр известного типа
    Valid(Frame),
    /// Корректный кадр, тип отсутствует в реестре
    Unsupported(Frame),
    /// В этой позиции кадра нет
    Invalid(DgmError),
}

/// Контрольная сумма: сумма байт по модулю 65536.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

/// Проверяет кадр в позиции `offset`.
///
/// Порядок проверок: поле длины, диапазон длины, STX, ETX, контрольная
/// сумма (если `verify_checksum`), затем тип.
pub fn probe(
    buf: &[u8],
    offset: usize,
    endian: Endian,
    verify_checksum: bool,
) -> Probe {
    let at = offset as u64;
    let cur = ByteCursor::new(buf, endian);

    let declared = match cur.u32_at(offset) {
        Ok(v) => v,
        Err(_) => return Probe::Invalid(DgmError::framing(at, "no room for length field")),
    };

    if !(MIN_DATAGRAM_LEN..=MAX_DATAGRAM_LEN).contains(&declared) {
        return Probe::Invalid(DgmError::framing(
            at,
            format!("length {declared} out of range"),
        ));
    }

    let length = LENGTH_FIELD_SIZE + declared as usize;
    let available = buf.len() - offset;
    if length > available {
        return Probe::Invalid(DgmError::framing(
            at,
            format!("length {length} exceeds remaining {available} bytes"),
        ));
    }

    let stx = offset + LENGTH_FIELD_SIZE;
    let etx = offset + length - FRAME_TRAILER_SIZE;

    if buf[stx] != STX {
        return Probe::Invalid(DgmError::framing(at, "missing STX"));
    }
    if buf[etx] != ETX {
        return Probe::Invalid(DgmError::framing(at, "missing ETX"));
    }

    if verify_checksum {
        let expected = checksum(&buf[stx + 1..etx]);
        let found = match cur.u16_at(etx + 1) {
            Ok(v) => v,
            Err(e) => return Probe::Invalid(e),
        };
        if expected != found {
            return Probe::Invalid(DgmError::ChecksumMismatch { expected, found });
        }
    }

    let frame = Frame {
        offset: at,
        length,
        kind_id: buf[stx + 1],
    };

    if DatagramKind::is_supported(frame.kind_id) {
        Probe::Valid(frame)
    } else {
        Probe::Unsupported(frame)
    }
}

/// Проверяет кадр в позиции `offset` и возвращает его тип и длину.
pub fn frame_at(
    buf: &[u8],
    offset: usize,
    endian: Endian,
    verify_checksum: bool,
) -> DgmResult<Frame> {
    match probe(buf, offset, endian, verify_checksum) {
        Probe::Valid(frame) => Ok(frame),
        Probe::Unsupported(frame) => Err(DgmError::UnsupportedType(frame.kind_id)),
        Probe::Invalid(e) => Err(e),
    }
}

/// Определяет порядок байт файла по первому корректному кадру.
///
/// Little-endian проверяется первым. Просматривается не более
/// `search_limit` байт от начала буфера с шагом `step`.
pub fn detect_endian(
    buf: &[u8],
    step: usize,
    search_limit: usize,
    verify_checksum: bool,
) -> Option<Endian> {
    let limit = buf.len().min(search_limit);
    let step = step.max(1);

    let mut off = 0;
    while off < limit {
        for endian in [Endian::Little, Endian::Big] {
            if !matches!(
                probe(buf, off, endian, verify_checksum),
                Probe::Invalid(_)
            ) {
                debug!("detected {endian} byte order from frame at offset {off}");
                return Some(endian);
            }
        }
        off += step;
    }

    None
}

/// Разбирает полный кадр: заголовок и тело (вместе с байтом выравнивания).
pub fn split_frame(
    bytes: &[u8],
    endian: Endian,
    verify_checksum: bool,
) -> DgmResult<(FrameHeader, &[u8])> {
    let frame = match probe(bytes, 0, endian, verify_checksum) {
        Probe::Valid(frame) | Probe::Unsupported(frame) => frame,
        Probe::Invalid(e) => return Err(e),
    };

    if frame.length != bytes.len() {
        return Err(DgmError::framing(
            0,
            format!(
                "declared length {} does not match {} bytes",
                frame.length,
                bytes.len()
            ),
        ));
    }

    let mut cur = ByteCursor::new(bytes, endian);
    cur.skip(LENGTH_FIELD_SIZE + 1)?;
    let header = FrameHeader {
        kind_id: cur.read_u8()?,
        model: cur.read_u16()?,
        date: cur.read_u32()?,
        time_ms: cur.read_u32()?,
    };

    Ok((header, &bytes[BODY_OFFSET..bytes.len() - FRAME_TRAILER_SIZE]))
}

/// Нужен ли байт выравнивания для тела длины `body_len`.
pub fn needs_pad(body_len: usize) -> bool {
    (FRAME_HEADER_SIZE + body_len + FRAME_TRAILER_SIZE) % 2 != 0
}

/// Собирает полный кадр: длина, выравнивание и контрольная сумма
/// вычисляются заново.
pub fn write_frame(
    header: &FrameHeader,
    body: &[u8],
    endian: Endian,
) -> DgmResult<Vec<u8>> {
    let pad = needs_pad(body.len()) as usize;
    let length = FRAME_HEADER_SIZE + body.len() + pad + FRAME_TRAILER_SIZE;
    if length as u64 > MAX_DATAGRAM_LEN as u64 {
        return Err(DgmError::FieldEncoding {
            field: "length",
            value: length as f64,
        });
    }

    let mut w = ByteWriter::with_capacity(endian, LENGTH_FIELD_SIZE + length);
    w.put_u32(length as u32);
    w.put_u8(STX);
    w.put_u8(header.kind_id);
    w.put_u16(header.model);
    w.put_u32(header.date);
    w.put_u32(header.time_ms);
    w.put_bytes(body);
    if pad == 1 {
        w.put_u8(0);
    }

    let sum = checksum(&w.as_slice()[LENGTH_FIELD_SIZE + 1..]);
    w.put_u8(ETX);
    w.put_u16(sum);

    Ok(w.into_inner())
}
