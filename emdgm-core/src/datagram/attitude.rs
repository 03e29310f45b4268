//! Ориентация (65) и сетевая ориентация (110). Время записей задаётся
//! смещением от времени датаграммы, поэтому для декодирования нужно
//! `DecodeContext::time`.

use emdgm_types::{DatagramKind, DgmResult};
use serde::Serialize;

use super::{DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Rule, Schema, Value},
    subrecord::{count_value, Attitude, NetworkAttitude, SubRecord},
    tolerance::{Mismatch, Tolerant},
};

pub static ATTITUDE_HEADER: Schema = Schema::new(
    "attitude header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfEntries", Rule::U16),
    ],
);

/// Ориентация (65).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttitudeDatagram {
    pub header: Fields,
    pub attitude: Attitude,
    /// Описатель датчика после записей
    pub sensor_descriptor: u8,
}

impl AttitudeDatagram {
    pub fn new() -> Self {
        Self {
            header: Fields::zeroed(&ATTITUDE_HEADER),
            attitude: Attitude::new(),
            sensor_descriptor: 0,
        }
    }
}

impl Default for AttitudeDatagram {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramBody for AttitudeDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::Attitude
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&ATTITUDE_HEADER, cur, &params)?;
        let attitude = Attitude::decode(cur, header.count("NumberOfEntries")?, &params)?;
        cur.ensure(1, "attitude sensor descriptor")?;
        let sensor_descriptor = cur.read_u8()?;

        Ok(Self {
            header,
            attitude,
            sensor_descriptor,
        })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "NumberOfEntries",
            count_value("NumberOfEntries", self.attitude.count(), u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.attitude.encode(w, &params)?;
        w.put_u8(self.sensor_descriptor);
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
        let params = ctx.params();
        self.header
            .mismatch(&other.header, &params)
            .map(|m| m.within("header"))
            .or_else(|| {
                self.attitude
                    .mismatch(&other.attitude, &params)
                    .map(|m| m.within("attitude"))
            })
            .or_else(|| {
                (self.sensor_descriptor != other.sensor_descriptor).then(|| {
                    Mismatch::new(
                        "sensor_descriptor",
                        Value::Int(self.sensor_descriptor as i64),
                        Value::Int(other.sensor_descriptor as i64),
                        0.0,
                    )
                })
            })
    }
}

pub static NETWORK_ATTITUDE_HEADER: Schema = Schema::new(
    "network attitude header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfEntries", Rule::U16),
        Field::new("SensorSystemDescriptor", Rule::I8),
        Field::new("Spare", Rule::U8),
    ],
);

/// Сетевая ориентация (110).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkAttitudeDatagram {
    pub header: Fields,
    pub attitude: NetworkAttitude,
}

impl NetworkAttitudeDatagram {
    pub fn new() -> Self {
        Self {
            header: Fields::zeroed(&NETWORK_ATTITUDE_HEADER),
            attitude: NetworkAttitude::default(),
        }
    }
}

impl Default for NetworkAttitudeDatagram {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramBody for NetworkAttitudeDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::NetworkAttitude
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&NETWORK_ATTITUDE_HEADER, cur, &params)?;
        let attitude = NetworkAttitude::decode(cur, header.count("NumberOfEntries")?, &params)?;
        Ok(Self { header, attitude })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "NumberOfEntries",
            count_value("NumberOfEntries", self.attitude.count(), u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.attitude.encode(w, &params)
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
        let params = ctx.params();
        self.header
            .mismatch(&other.header, &params)
            .map(|m| m.within("header"))
            .or_else(|| {
                self.attitude
                    .mismatch(&other.attitude, &params)
                    .map(|m| m.within("attitude"))
            })
    }
}
