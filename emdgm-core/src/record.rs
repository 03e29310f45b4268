//! Запись: кадр датаграммы с декодированным телом.
//!
//! `Record` владеет своими данными и не ссылается на буфер файла.

use emdgm_types::{DatagramKind, DgmError, DgmResult, Endian};
use serde::Serialize;

use crate::{
    datagram::DecodeContext,
    format::{posix_time, split_frame, split_posix_time, write_frame, FrameHeader},
    registry::{self, Datagram},
    schema::Value,
    tolerance::Mismatch,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub endian: Endian,
    /// Номер модели эхолота
    pub model: u16,
    /// YYYYMMDD
    pub date: u32,
    /// Миллисекунды от полуночи
    pub time_ms: u32,
    pub body: Datagram,
}

impl Record {
    pub fn new(
        body: impl Into<Datagram>,
        model: u16,
        date: u32,
        time_ms: u32,
    ) -> Self {
        Self {
            endian: Endian::default(),
            model,
            date,
            time_ms,
            body: body.into(),
        }
    }

    /// Запись с временем в POSIX-секундах.
    pub fn at_time(
        body: impl Into<Datagram>,
        model: u16,
        time: f64,
    ) -> DgmResult<Self> {
        let (date, time_ms) = split_posix_time(time)
            .ok_or_else(|| DgmError::format_violation(format!("time {time} is out of range")))?;
        Ok(Self::new(body, model, date, time_ms))
    }

    pub fn with_endian(
        mut self,
        endian: Endian,
    ) -> Self {
        self.endian = endian;
        self
    }

    pub fn kind(&self) -> DatagramKind {
        self.body.kind()
    }

    /// POSIX-время записи в секундах.
    pub fn time(&self) -> Option<f64> {
        posix_time(self.date, self.time_ms)
    }

    /// Контекст, с которым декодировалось тело.
    pub fn context(&self) -> DecodeContext {
        DecodeContext::new(self.model, self.time())
    }

    fn frame_header(&self) -> FrameHeader {
        FrameHeader {
            kind_id: self.kind().as_u8(),
            model: self.model,
            date: self.date,
            time_ms: self.time_ms,
        }
    }

    /// Разбирает один полный кадр с проверкой контрольной суммы.
    pub fn from_bytes(
        bytes: &[u8],
        endian: Endian,
    ) -> DgmResult<Self> {
        Self::decode(bytes, endian, true)
    }

    pub fn decode(
        bytes: &[u8],
        endian: Endian,
        verify_checksum: bool,
    ) -> DgmResult<Self> {
        let (header, body) = split_frame(bytes, endian, verify_checksum)?;
        let ctx = DecodeContext::new(header.model, header.posix_time());
        let body = registry::decode(header.kind_id, body, endian, &ctx)?;

        Ok(Self {
            endian,
            model: header.model,
            date: header.date,
            time_ms: header.time_ms,
            body,
        })
    }

    /// Кодирует кадр в исходном порядке байт. Длина, выравнивание и
    /// контрольная сумма вычисляются заново.
    pub fn to_bytes(&self) -> DgmResult<Vec<u8>> {
        self.to_bytes_with(self.endian)
    }

    pub fn to_bytes_with(
        &self,
        endian: Endian,
    ) -> DgmResult<Vec<u8>> {
        let body = self.body.to_bytes(endian, &self.context())?;
        write_frame(&self.frame_header(), &body, endian)
    }

    /// Сдвигает числовые поля заголовка тела.
    pub fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        self.body.shift_numeric(delta);
    }

    /// Первое расхождение с другой записью с учётом допусков кодирования.
    pub fn mismatch(
        &self,
        other: &Self,
    ) -> Option<Mismatch> {
        let frame = [
            ("model", self.model as i64, other.model as i64),
            ("date", self.date as i64, other.date as i64),
            ("time_ms", self.time_ms as i64, other.time_ms as i64),
        ];
        frame
            .into_iter()
            .find(|(_, a, b)| a != b)
            .map(|(name, a, b)| Mismatch::new(name, Value::Int(a), Value::Int(b), 0.0))
            .or_else(|| {
                self.body
                    .mismatch(&other.body, &self.context())
                    .map(|m| m.within("body"))
            })
    }

    pub fn approx_eq(
        &self,
        other: &Self,
    ) -> bool {
        self.mismatch(other).is_none()
    }

    pub fn to_json(&self) -> DgmResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| DgmError::format_violation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        datagram::{AttitudeDatagram, ClockDatagram},
        format::checksum,
        subrecord::Attitude,
    };

    const T0: f64 = 1_476_643_408.0;

    fn attitude_record() -> Record {
        let mut body = AttitudeDatagram::new();
        for i in 0..3 {
            body.attitude
                .push(
                    Attitude::row()
                        .with("Time", T0 + 0.02 * i as f64)
                        .unwrap()
                        .with("Roll", 1.5)
                        .unwrap(),
                )
                .unwrap();
        }
        body.header.set("NumberOfEntries", 3).unwrap();
        Record::at_time(body, 2040, T0).unwrap()
    }

    #[test]
    fn test_frame_layout() {
        let rec = attitude_record();
        assert_eq!(rec.date, 20161016);
        assert_eq!(rec.time_ms, 67_408_000);

        let bytes = rec.to_bytes().unwrap();
        // тело 6 + 36 + 1 = 43, нечётное, без выравнивания
        assert_eq!(bytes.len(), 4 + 12 + 43 + 3);
        assert_eq!(u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize, bytes.len() - 4);
        assert_eq!(bytes[4], 0x02);
        assert_eq!(bytes[5], b'A');
        assert_eq!(bytes[bytes.len() - 3], 0x03);
        let n = bytes.len();
        assert_eq!(
            u16::from_le_bytes([bytes[n - 2], bytes[n - 1]]),
            checksum(&bytes[5..n - 3])
        );
    }

    #[test]
    fn test_round_trip_both_orders() {
        let rec = attitude_record();
        for endian in [Endian::Little, Endian::Big] {
            let bytes = rec.to_bytes_with(endian).unwrap();
            let back = Record::from_bytes(&bytes, endian).unwrap();
            assert_eq!(back.endian, endian);
            assert!(rec.approx_eq(&back), "{:?}", rec.mismatch(&back));
            assert_eq!(back.to_bytes().unwrap(), bytes);
        }
    }

    #[test]
    fn test_jiggle_and_revert() {
        let rec = attitude_record();
        let bytes = rec.to_bytes().unwrap();
        let original = Record::from_bytes(&bytes, Endian::Little).unwrap();

        let mut shifted = original.clone();
        shifted.shift_numeric(1.0);
        let mut back = Record::from_bytes(&shifted.to_bytes().unwrap(), Endian::Little).unwrap();
        back.shift_numeric(-1.0);
        let back = Record::from_bytes(&back.to_bytes().unwrap(), Endian::Little).unwrap();

        assert!(original.approx_eq(&back), "{:?}", original.mismatch(&back));
    }

    #[test]
    fn test_wrong_length_and_checksum() {
        let mut bytes = Record::new(ClockDatagram::new(), 710, 20161016, 0)
            .to_bytes()
            .unwrap();

        let err = Record::from_bytes(&bytes[..bytes.len() - 1], Endian::Little).unwrap_err();
        assert!(err.is_recoverable());

        bytes[20] ^= 0xFF;
        assert!(Record::from_bytes(&bytes, Endian::Little).is_err());
        // Без проверки суммы кадр разбирается
        assert!(Record::decode(&bytes, Endian::Little, false).is_ok());
    }

    #[test]
    fn test_json_export() {
        let json = attitude_record().to_json().unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["model"], 2040);
        assert_eq!(v["body"]["Attitude"]["attitude"][0]["Roll"], 1.5);
    }
}
