//! Тела датаграмм по типам.
//!
//! Каждый тип — заголовок фиксированной схемы и, при наличии,
//! под-записи, длина которых берётся из полей заголовка.

use emdgm_types::{DatagramKind, DgmError, DgmResult, Endian};
use serde::Serialize;

use crate::{
    binary::{latin1_text, trim_nul, ByteCursor, ByteWriter},
    schema::{Fields, Param, Params},
    tolerance::{Mismatch, Tolerant},
};

/// Контекст, который не хранится в теле датаграммы и передаётся явно.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DecodeContext {
    /// Номер модели эхолота из общего заголовка
    pub model: u16,
    /// POSIX-время записи (секунды)
    pub time: Option<f64>,
}

impl DecodeContext {
    pub fn new(
        model: u16,
        time: Option<f64>,
    ) -> Self {
        Self { model, time }
    }

    pub fn params(&self) -> Params {
        Params {
            record_time: self.time,
            ..Params::default()
        }
    }
}

/// Общий интерфейс тел датаграмм.
pub trait DatagramBody: Sized {
    fn kind(&self) -> DatagramKind;

    fn decode(
        kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self>;

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()>;

    fn header(&self) -> &Fields;

    fn header_mut(&mut self) -> &mut Fields;

    /// Параметры, с которыми кодируются под-записи.
    fn params(
        &self,
        ctx: &DecodeContext,
    ) -> DgmResult<Params> {
        Ok(ctx.params())
    }

    /// Сдвигает числовые поля заголовка.
    fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        self.header_mut().shift_numeric(delta);
    }

    fn mismatch(
        &self,
        other: &Self,
        ctx: &DecodeContext,
    ) -> Option<Mismatch> {
        let params = self.params(ctx).unwrap_or_else(|_| ctx.params());
        self.header()
            .mismatch(other.header(), &params)
            .map(|m| m.within("header"))
    }

    /// Декодирует тело целиком. Допускается только один байт
    /// выравнивания после разобранных данных.
    fn from_bytes(
        kind: DatagramKind,
        body: &[u8],
        endian: Endian,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let mut cur = ByteCursor::new(body, endian);
        let value = Self::decode(kind, &mut cur, ctx)?;
        if cur.remaining() > 1 {
            return Err(DgmError::format_violation(format!(
                "{kind}: {} unparsed bytes after body",
                cur.remaining()
            )));
        }
        Ok(value)
    }

    fn to_bytes(
        &self,
        endian: Endian,
        ctx: &DecodeContext,
    ) -> DgmResult<Vec<u8>> {
        let mut w = ByteWriter::new(endian);
        self.encode(&mut w, ctx)?;
        Ok(w.into_inner())
    }
}

/// Разрешение в метрах из целого поля заголовка в сантиметрах.
pub(crate) fn resolution(
    header: &Fields,
    field: &str,
) -> DgmResult<f64> {
    Ok(header.f64(field)? * 0.01)
}

/// Параметры с разрешением из заголовка.
pub(crate) fn with_resolution(
    params: Params,
    header: &Fields,
    field: &str,
    param: Param,
) -> DgmResult<Params> {
    Ok(params.with(param, resolution(header, field)?))
}

/// Текст Latin-1 до конца тела без завершающих NUL.
pub(crate) fn read_text(cur: &mut ByteCursor<'_>) -> DgmResult<String> {
    let raw = cur.read_bytes(cur.remaining())?;
    Ok(latin1_text(trim_nul(raw)))
}

/// Неразобранный хвост тела. Завершающий нулевой байт считается
/// выравниванием: при кодировании он появится снова, поэтому байты
/// кадра сохраняются.
pub(crate) fn read_tail<'a>(cur: &mut ByteCursor<'a>) -> DgmResult<&'a [u8]> {
    let raw = cur.read_bytes(cur.remaining())?;
    Ok(match raw.split_last() {
        Some((0, rest)) => rest,
        _ => raw,
    })
}

/// Датаграмма, состоящая только из заголовка.
macro_rules! header_only {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $schema:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        pub struct $name {
            pub header: $crate::schema::Fields,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    header: $crate::schema::Fields::zeroed(&$schema),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::datagram::DatagramBody for $name {
            fn kind(&self) -> emdgm_types::DatagramKind {
                $kind
            }

            fn decode(
                _kind: emdgm_types::DatagramKind,
                cur: &mut $crate::binary::ByteCursor<'_>,
                ctx: &$crate::datagram::DecodeContext,
            ) -> emdgm_types::DgmResult<Self> {
                let header = $crate::schema::Fields::decode(&$schema, cur, &ctx.params())?;
                Ok(Self { header })
            }

            fn encode(
                &self,
                w: &mut $crate::binary::ByteWriter,
                ctx: &$crate::datagram::DecodeContext,
            ) -> emdgm_types::DgmResult<()> {
                self.header.encode(w, &ctx.params())
            }

            fn header(&self) -> &$crate::schema::Fields {
                &self.header
            }

            fn header_mut(&mut self) -> &mut $crate::schema::Fields {
                &mut self.header
            }
        }
    };
}

pub(crate) use header_only;

pub mod attitude;
pub mod clock;
pub mod depth;
pub mod extra;
pub mod installation;
pub mod position;
pub mod quality;
pub mod raw_range;
pub mod seabed;
pub mod sound_speed;
pub mod stave;
pub mod system;
pub mod water_column;

pub use attitude::*;
pub use clock::*;
pub use depth::*;
pub use extra::*;
pub use installation::*;
pub use position::*;
pub use quality::*;
pub use raw_range::*;
pub use seabed::*;
pub use sound_speed::*;
pub use stave::*;
pub use system::*;
pub use water_column::*;
