//! Под-записи ориентации: записи датчика ориентации (65) и сетевой
//! ориентации с исходными байтами входного сообщения (110).

use emdgm_types::DgmResult;
use serde::Serialize;

use super::{count_value, table_subrecord, SubRecord};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Params, Raw, Rule, Schema, Value},
    tolerance::{Mismatch, Tolerant},
};

/// Запись ориентации (12 байт). `Time` — смещение от времени датаграммы.
pub static ATTITUDE_ENTRY: Schema = Schema::new(
    "attitude entries",
    &[
        Field::new("Time", Rule::time_offset(Raw::U16, 0.001)),
        Field::new("Status", Rule::U16),
        Field::new("Roll", Rule::scaled(Raw::I16, 0.01)),
        Field::new("Pitch", Rule::scaled(Raw::I16, 0.01)),
        Field::new("Heave", Rule::scaled(Raw::I16, 0.01)),
        Field::new("Heading", Rule::scaled(Raw::U16, 0.01)),
    ],
);

table_subrecord!(
    /// Записи ориентации датаграммы 65.
    Attitude,
    ATTITUDE_ENTRY
);

/// Фиксированная часть записи сетевой ориентации (11 байт).
pub static NETWORK_ATTITUDE_ENTRY: Schema = Schema::new(
    "network attitude entries",
    &[
        Field::new("Time", Rule::time_offset(Raw::U16, 0.001)),
        Field::new("Roll", Rule::scaled(Raw::I16, 0.01)),
        Field::new("Pitch", Rule::scaled(Raw::I16, 0.01)),
        Field::new("Heave", Rule::scaled(Raw::I16, 0.01)),
        Field::new("Heading", Rule::scaled(Raw::U16, 0.01)),
        Field::new("InputLength", Rule::U8),
    ],
);

/// Запись сетевой ориентации и байты исходного сообщения датчика.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkAttitudeEntry {
    pub fields: Fields,
    pub input: Vec<u8>,
}

impl NetworkAttitudeEntry {
    pub fn new(
        fields: Fields,
        input: Vec<u8>,
    ) -> Self {
        Self { fields, input }
    }
}

/// Записи датаграммы 110.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NetworkAttitude {
    pub entries: Vec<NetworkAttitudeEntry>,
}

impl NetworkAttitude {
    pub fn row() -> Fields {
        Fields::zeroed(&NETWORK_ATTITUDE_ENTRY)
    }
}

impl SubRecord for NetworkAttitude {
    fn decode(
        cur: &mut ByteCursor<'_>,
        count: usize,
        params: &Params,
    ) -> DgmResult<Self> {
        // Минимум — фиксированные части всех записей
        cur.ensure(
            count.saturating_mul(NETWORK_ATTITUDE_ENTRY.width()),
            NETWORK_ATTITUDE_ENTRY.name,
        )?;

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let fields = Fields::decode(&NETWORK_ATTITUDE_ENTRY, cur, params)?;
            let n = fields.count("InputLength")?;
            cur.ensure(n, "network attitude input")?;
            let input = cur.read_bytes(n)?.to_vec();
            entries.push(NetworkAttitudeEntry { fields, input });
        }

        Ok(Self { entries })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()> {
        for e in &self.entries {
            let mut fields = e.fields.clone();
            fields.set(
                "InputLength",
                count_value("InputLength", e.input.len(), u8::MAX as usize)?,
            )?;
            fields.encode(w, params)?;
            w.put_bytes(&e.input);
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.entries.len()
    }

    fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        for e in &mut self.entries {
            e.fields.shift_numeric(delta);
        }
    }
}

impl Tolerant for NetworkAttitude {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        if self.entries.len() != other.entries.len() {
            return Some(Mismatch::length(
                "len",
                self.entries.len(),
                other.entries.len(),
            ));
        }

        self.entries
            .iter()
            .zip(&other.entries)
            .enumerate()
            .find_map(|(i, (a, b))| {
                let m = a.fields.mismatch(&b.fields, params).or_else(|| {
                    (a.input != b.input).then(|| {
                        Mismatch::new(
                            "input",
                            Value::Bytes(a.input.clone()),
                            Value::Bytes(b.input.clone()),
                            0.0,
                        )
                    })
                });
                m.map(|m| m.within(format!("[{i}]")))
            })
    }
}
