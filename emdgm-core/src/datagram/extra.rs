//! Дополнительные параметры (51). Содержимое определяется полем
//! `ContentIdentifier`; разбор таблицы bscorr зависит от модели эхолота.

use emdgm_types::{DatagramKind, DgmError, DgmResult};
use log::debug;
use serde::Serialize;

use super::{read_tail, system::text_mismatch, DatagramBody, DecodeContext};
use crate::{
    binary::{latin1_text, trim_nul, ByteCursor, ByteWriter},
    schema::{Field, Fields, Rule, Schema, Value},
    subrecord::count_value,
    tolerance::{Mismatch, Tolerant},
};

pub static EXTRA_PARAMETERS_HEADER: Schema = Schema::new(
    "extra parameters header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("ContentIdentifier", Rule::U16),
    ],
);

/// calib.txt
pub const CONTENT_CALIB: i64 = 1;

/// bscorr.txt
pub const CONTENT_BSCORR: i64 = 6;

/// Модели, для которых содержимое 6 — таблица bscorr.
pub const BSCORR_MODELS: [u16; 2] = [2040, 2045];

/// Содержимое после заголовка.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExtraContent {
    /// Текст с префиксом длины u16 (calib.txt, bscorr.txt)
    Text(String),
    /// Неразобранные байты
    Raw(Vec<u8>),
}

/// Дополнительные параметры (51).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraParametersDatagram {
    pub header: Fields,
    pub content: ExtraContent,
    /// Строки чисел из bscorr.txt; решается один раз при декодировании
    pub bscorr: Option<Vec<Vec<f64>>>,
}

impl ExtraParametersDatagram {
    pub fn new(
        content_id: u16,
        content: ExtraContent,
    ) -> DgmResult<Self> {
        let header = Fields::zeroed(&EXTRA_PARAMETERS_HEADER).with("ContentIdentifier", content_id)?;
        Ok(Self {
            header,
            content,
            bscorr: None,
        })
    }

    fn content_id(&self) -> DgmResult<i64> {
        self.header.int("ContentIdentifier")
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            ExtraContent::Text(s) => Some(s),
            ExtraContent::Raw(_) => None,
        }
    }
}

/// Разбирает числовые строки bscorr.txt. Комментарии (`#`) и строки
/// с нечисловыми полями пропускаются.
pub fn parse_bscorr(text: &str) -> Vec<Vec<f64>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            l.split_whitespace()
                .map(str::parse::<f64>)
                .collect::<Result<Vec<_>, _>>()
                .ok()
        })
        .collect()
}

impl DatagramBody for ExtraParametersDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::ExtraParameters
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let header = Fields::decode(&EXTRA_PARAMETERS_HEADER, cur, &ctx.params())?;
        let id = header.int("ContentIdentifier")?;

        let content = if id == CONTENT_CALIB || id == CONTENT_BSCORR {
            let n = cur.read_u16()? as usize;
            cur.ensure(n, "extra parameters text")?;
            ExtraContent::Text(latin1_text(trim_nul(cur.read_bytes(n)?)))
        } else {
            debug!("extra parameters content {id} kept as raw bytes");
            ExtraContent::Raw(read_tail(cur)?.to_vec())
        };

        let bscorr = match (&content, id) {
            (ExtraContent::Text(text), CONTENT_BSCORR) if BSCORR_MODELS.contains(&ctx.model) => {
                Some(parse_bscorr(text))
            }
            _ => None,
        };

        Ok(Self {
            header,
            content,
            bscorr,
        })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        self.header.encode(w, &ctx.params())?;
        let id = self.content_id()?;

        match &self.content {
            ExtraContent::Text(text) if id == CONTENT_CALIB || id == CONTENT_BSCORR => {
                let n = count_value("TextLength", text.chars().count(), u16::MAX as usize)?;
                w.put_u16(n as u16);
                w.put_text(text)?;
            }
            ExtraContent::Raw(raw) if id != CONTENT_CALIB && id != CONTENT_BSCORR => {
                w.put_bytes(raw);
            }
            _ => {
                return Err(DgmError::format_violation(format!(
                    "content {id} does not match its payload kind"
                )))
            }
        }
        Ok(())
    }

    fn header(&self) -> &Fields {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Fields {
        &mut self.header
    }

    fn mismatch(
        &self,
        other: &Self,
        ctx: &DecodeContext,
    ) -> Option<Mismatch> {
        let header = self
            .header
            .mismatch(&other.header, &ctx.params())
            .map(|m| m.within("header"));
        header.or_else(|| match (&self.content, &other.content) {
            (ExtraContent::Text(a), ExtraContent::Text(b)) => text_mismatch("content", a, b),
            (a, b) if a == b => None,
            (a, b) => Some(Mismatch::new(
                "content",
                Value::Text(format!("{a:?}")),
                Value::Text(format!("{b:?}")),
                0.0,
            )),
        })
    }
}
