//! Параметры установки (73 — начало, 105 — конец, 112 — удалённая
//! информация). Тело — текст вида `KEY=value,KEY=value,...`.

use emdgm_types::{DatagramKind, DgmError, DgmResult};
use serde::Serialize;

use super::{read_text, system::text_mismatch, DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Rule, Schema},
    tolerance::{Mismatch, Tolerant},
};

pub static INSTALLATION_HEADER: Schema = Schema::new(
    "installation header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("SecondarySerialNumber", Rule::U16),
    ],
);

/// Параметры установки. Один тип для трёх идентификаторов, текст —
/// первичное представление.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallationDatagram {
    kind: DatagramKind,
    pub header: Fields,
    pub text: String,
}

impl InstallationDatagram {
    pub fn new(kind: DatagramKind) -> DgmResult<Self> {
        Self::check_kind(kind)?;
        Ok(Self {
            kind,
            header: Fields::zeroed(&INSTALLATION_HEADER),
            text: String::new(),
        })
    }

    /// Собирает текст из пар в заданном порядке.
    pub fn with_settings<K, V>(
        mut self,
        settings: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.text = settings
            .into_iter()
            .map(|(k, v)| format!("{}={},", k.as_ref(), v.as_ref()))
            .collect();
        self
    }

    /// Пары `ключ=значение` в порядке следования. Элемент без `=`
    /// возвращается с пустым значением.
    pub fn settings(&self) -> Vec<(&str, &str)> {
        self.text
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.split_once('=').unwrap_or((s, "")))
            .collect()
    }

    /// Значение первого параметра с ключом `key`.
    pub fn setting(
        &self,
        key: &str,
    ) -> Option<&str> {
        self.settings()
            .into_iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    fn check_kind(kind: DatagramKind) -> DgmResult<()> {
        match kind {
            DatagramKind::InstallationStart
            | DatagramKind::InstallationStop
            | DatagramKind::InstallationRemote => Ok(()),
            other => Err(DgmError::format_violation(format!(
                "{other} is not an installation datagram"
            ))),
        }
    }
}

impl DatagramBody for InstallationDatagram {
    fn kind(&self) -> DatagramKind {
        self.kind
    }

    fn decode(
        kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        Self::check_kind(kind)?;
        let header = Fields::decode(&INSTALLATION_HEADER, cur, &ctx.params())?;
        let text = read_text(cur)?;
        Ok(Self { kind, header, text })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        self.header.encode(w, &ctx.params())?;
        w.put_text(&self.text)
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
        self.header
            .mismatch_within(&other.header, &ctx.params(), "header")
            .or_else(|| text_mismatch("text", &self.text, &other.text))
    }
}
