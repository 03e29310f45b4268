use emdgm_types::{DatagramKind, DgmResult};
use serde::Serialize;

use super::{DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Raw, Rule, Schema},
    subrecord::{count_value, SubRecord, WaterColumnBeams, WaterColumnTx},
    tolerance::{Mismatch, Tolerant},
};

pub static WATER_COLUMN_HEADER: Schema = Schema::new(
    "water column header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfDatagrams", Rule::U16),
        Field::new("DatagramNumber", Rule::U16),
        Field::new("NumberOfTxSectors", Rule::U16),
        Field::new("TotalRxBeams", Rule::U16),
        Field::new("RxBeamsInDatagram", Rule::U16),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
        Field::new("SamplingFrequency", Rule::scaled(Raw::U32, 0.01)),
        Field::new("TxTimeHeave", Rule::scaled(Raw::I16, 0.01)),
        Field::new("TvgFunction", Rule::U8),
        Field::new("TvgOffset", Rule::I8),
        Field::new("ScanningInfo", Rule::U8),
        Field::new("Spare", Rule::Bytes(3)),
    ],
);

/// Водяной столб (107). Один пинг может быть разбит на несколько
/// датаграмм (`NumberOfDatagrams`, `DatagramNumber`); каждая
/// декодируется отдельно.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterColumnDatagram {
    pub header: Fields,
    pub tx: WaterColumnTx,
    pub beams: WaterColumnBeams,
}

impl WaterColumnDatagram {
    pub fn new() -> Self {
        Self {
            header: Fields::zeroed(&WATER_COLUMN_HEADER),
            tx: WaterColumnTx::new(),
            beams: WaterColumnBeams::default(),
        }
    }
}

impl Default for WaterColumnDatagram {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramBody for WaterColumnDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::WaterColumn
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&WATER_COLUMN_HEADER, cur, &params)?;
        let tx = WaterColumnTx::decode(cur, header.count("NumberOfTxSectors")?, &params)?;
        let beams = WaterColumnBeams::decode(cur, header.count("RxBeamsInDatagram")?, &params)?;
        Ok(Self { header, tx, beams })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "NumberOfTxSectors",
            count_value("NumberOfTxSectors", self.tx.count(), u16::MAX as usize)?,
        )?;
        header.set(
            "RxBeamsInDatagram",
            count_value("RxBeamsInDatagram", self.beams.count(), u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.tx.encode(w, &params)?;
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
            .or_else(|| self.tx.mismatch_within(&other.tx, &params, "tx"))
            .or_else(|| self.beams.mismatch_within(&other.beams, &params, "beams"))
    }
}
