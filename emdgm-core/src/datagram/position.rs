//! Положение (80) и глубина/высота (104).

use emdgm_types::{DatagramKind, DgmResult};
use log::debug;
use serde::Serialize;

use super::{header_only, DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Raw, Rule, Schema, Value},
    subrecord::{count_value, Gga},
    tolerance::{Mismatch, Tolerant},
};

pub static POSITION_HEADER: Schema = Schema::new(
    "position header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("Latitude", Rule::scaled(Raw::I32, 5e-8)),
        Field::new("Longitude", Rule::scaled(Raw::I32, 1e-7)),
        Field::new("FixQuality", Rule::U16),
        Field::new("SpeedOverGround", Rule::scaled(Raw::U16, 0.01)),
        Field::new("CourseOverGround", Rule::scaled(Raw::U16, 0.01)),
        Field::new("Heading", Rule::scaled(Raw::U16, 0.01)),
        Field::new("PositionSystemDescriptor", Rule::U8),
        Field::new("InputLength", Rule::U8),
    ],
);

/// Положение (80). Исходное входное сообщение хранится как есть;
/// `gga` — его разбор, если это `$--GGA`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionDatagram {
    pub header: Fields,
    input: Vec<u8>,
    gga: Option<Gga>,
}

impl PositionDatagram {
    pub fn new(input: Vec<u8>) -> Self {
        let gga = parse_gga(&input);
        Self {
            header: Fields::zeroed(&POSITION_HEADER),
            input,
            gga,
        }
    }

    pub fn input(&self) -> &[u8] {
        &self.input
    }

    pub fn gga(&self) -> Option<&Gga> {
        self.gga.as_ref()
    }

    /// Заменяет входное сообщение сообщением GGA.
    pub fn set_gga(
        &mut self,
        gga: &Gga,
    ) -> DgmResult<()> {
        let input = gga.sentence_bytes();
        self.gga = Some(Gga::parse(&input)?);
        self.input = input;
        Ok(())
    }
}

fn parse_gga(input: &[u8]) -> Option<Gga> {
    let is_gga = input.first() == Some(&b'$') && input.get(3..6) == Some(b"GGA".as_slice());
    if !is_gga {
        return None;
    }
    match Gga::parse(input) {
        Ok(gga) => Some(gga),
        Err(e) => {
            debug!("position input looks like GGA but does not parse: {e}");
            None
        }
    }
}

impl DatagramBody for PositionDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::Position
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let header = Fields::decode(&POSITION_HEADER, cur, &ctx.params())?;
        let n = header.count("InputLength")?;
        cur.ensure(n, "position input")?;
        let input = cur.read_bytes(n)?.to_vec();
        let gga = parse_gga(&input);
        Ok(Self { header, input, gga })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let mut header = self.header.clone();
        header.set(
            "InputLength",
            count_value("InputLength", self.input.len(), u8::MAX as usize)?,
        )?;
        header.encode(w, &ctx.params())?;
        w.put_bytes(&self.input);
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
            .mismatch_within(&other.header, &params, "header")
            .or_else(|| {
                (self.input != other.input).then(|| {
                    Mismatch::new(
                        "input",
                        Value::Bytes(self.input.clone()),
                        Value::Bytes(other.input.clone()),
                        0.0,
                    )
                })
            })
            .or_else(|| self.gga.mismatch_within(&other.gga, &params, "gga"))
    }
}

pub static HEIGHT_HEADER: Schema = Schema::new(
    "height header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("Height", Rule::scaled(Raw::I32, 0.01)),
        Field::new("HeightType", Rule::U8),
    ],
);

header_only!(
    /// Глубина (давление) или высота (104).
    HeightDatagram,
    DatagramKind::Height,
    HEIGHT_HEADER
);
