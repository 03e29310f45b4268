//! Промеры: старый формат глубин (68) и XYZ (88).

use emdgm_types::{DatagramKind, DgmResult};
use serde::Serialize;

use super::{with_resolution, DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Param, Params, Raw, Rule, Schema, Value},
    subrecord::{count_value, DepthBeams, SubRecord, XyzBeams},
    tolerance::{Mismatch, Tolerant},
};

/// Заголовок 68. Разрешения хранятся в сантиметрах и задают масштаб
/// координат лучей.
pub static DEPTH_HEADER: Schema = Schema::new(
    "depth header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("Heading", Rule::scaled(Raw::U16, 0.01)),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
        Field::new("TransmitTransducerDepth", Rule::scaled(Raw::U16, 0.01)),
        Field::new("MaxBeams", Rule::U8),
        Field::new("ValidBeams", Rule::U8),
        Field::new("ZResolution", Rule::U8),
        Field::new("XyResolution", Rule::U8),
        Field::new("SamplingRate", Rule::U16),
    ],
);

/// Глубины (68).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepthDatagram {
    pub header: Fields,
    pub beams: DepthBeams,
    /// Множитель смещения глубины преобразователя (после лучей)
    pub depth_offset_multiplier: i8,
}

impl DepthDatagram {
    /// Пустая датаграмма с разрешениями в сантиметрах.
    pub fn new(
        z_resolution_cm: u8,
        xy_resolution_cm: u8,
    ) -> DgmResult<Self> {
        let header = Fields::zeroed(&DEPTH_HEADER)
            .with("ZResolution", z_resolution_cm)?
            .with("XyResolution", xy_resolution_cm)?;
        Ok(Self {
            header,
            beams: DepthBeams::new(),
            depth_offset_multiplier: 0,
        })
    }

    fn resolution_params(
        header: &Fields,
        ctx: &DecodeContext,
    ) -> DgmResult<Params> {
        let params = with_resolution(ctx.params(), header, "ZResolution", Param::ZResolution)?;
        with_resolution(params, header, "XyResolution", Param::XyResolution)
    }
}

impl DatagramBody for DepthDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::Depth
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let header = Fields::decode(&DEPTH_HEADER, cur, &ctx.params())?;
        let params = Self::resolution_params(&header, ctx)?;
        let beams = DepthBeams::decode(cur, header.count("ValidBeams")?, &params)?;
        cur.ensure(1, "depth offset multiplier")?;
        let depth_offset_multiplier = cur.read_i8()?;

        Ok(Self {
            header,
            beams,
            depth_offset_multiplier,
        })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = self.params(ctx)?;
        let mut header = self.header.clone();
        header.set(
            "ValidBeams",
            count_value("ValidBeams", self.beams.count(), u8::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.beams.encode(w, &params)?;
        w.put_i8(self.depth_offset_multiplier);
        Ok(())
    }

    fn header(&self) -> &Fields {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Fields {
        &mut self.header
    }

    fn params(
        &self,
        ctx: &DecodeContext,
    ) -> DgmResult<Params> {
        Self::resolution_params(&self.header, ctx)
    }

    fn mismatch(
        &self,
        other: &Self,
        ctx: &DecodeContext,
    ) -> Option<Mismatch> {
        let params = self.params(ctx).unwrap_or_else(|_| ctx.params());
        self.header
            .mismatch_within(&other.header, &params, "header")
            .or_else(|| self.beams.mismatch_within(&other.beams, &params, "beams"))
            .or_else(|| {
                (self.depth_offset_multiplier != other.depth_offset_multiplier).then(|| {
                    Mismatch::new(
                        "depth_offset_multiplier",
                        Value::Int(self.depth_offset_multiplier as i64),
                        Value::Int(other.depth_offset_multiplier as i64),
                        0.0,
                    )
                })
            })
    }
}

pub static XYZ_HEADER: Schema = Schema::new(
    "xyz header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("Heading", Rule::scaled(Raw::U16, 0.01)),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
        Field::new("TransmitTransducerDepth", Rule::F32),
        Field::new("NumberOfBeams", Rule::U16),
        Field::new("ValidDetections", Rule::U16),
        Field::new("SamplingFrequency", Rule::F32),
        Field::new("ScanningInfo", Rule::U8),
        Field::new("Spare", Rule::Bytes(3)),
    ],
);

/// Промеры XYZ (88).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XyzDatagram {
    pub header: Fields,
    pub beams: XyzBeams,
}

impl XyzDatagram {
    pub fn new() -> Self {
        Self {
            header: Fields::zeroed(&XYZ_HEADER),
            beams: XyzBeams::new(),
        }
    }
}

impl Default for XyzDatagram {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramBody for XyzDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::Xyz
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&XYZ_HEADER, cur, &params)?;
        let beams = XyzBeams::decode(cur, header.count("NumberOfBeams")?, &params)?;
        Ok(Self { header, beams })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "NumberOfBeams",
            count_value("NumberOfBeams", self.beams.count(), u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.beams.encode(w, &params)
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
            .or_else(|| self.beams.mismatch_within(&other.beams, &params, "beams"))
    }
}
