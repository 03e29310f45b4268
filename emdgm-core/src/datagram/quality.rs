use emdgm_types::{DatagramKind, DgmError, DgmResult};
use serde::Serialize;

use super::{DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Rule, Schema},
    subrecord::{count_value, Samples},
    tolerance::{Mismatch, Tolerant},
};

pub static QUALITY_FACTOR_HEADER: Schema = Schema::new(
    "quality factor header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfRxBeams", Rule::U16),
        Field::new("ParametersPerBeam", Rule::U8),
        Field::new("Spare", Rule::U8),
    ],
);

/// Факторы качества (79): матрица `лучи × параметры` в binary32,
/// построчно по лучам.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityFactorDatagram {
    pub header: Fields,
    pub values: Samples,
}

impl QualityFactorDatagram {
    pub fn new(parameters_per_beam: u8) -> DgmResult<Self> {
        Ok(Self {
            header: Fields::zeroed(&QUALITY_FACTOR_HEADER)
                .with("ParametersPerBeam", parameters_per_beam)?,
            values: Samples::new(Rule::F32, Vec::new()),
        })
    }

    fn parameters_per_beam(&self) -> DgmResult<usize> {
        self.header.count("ParametersPerBeam")
    }

    /// Параметры луча `beam`.
    pub fn beam(
        &self,
        beam: usize,
    ) -> Option<&[f64]> {
        let n = self.parameters_per_beam().ok()?;
        self.values.values().get(beam * n..(beam + 1) * n)
    }

    /// Добавляет луч; число значений должно совпадать с
    /// `ParametersPerBeam`.
    pub fn push_beam(
        &mut self,
        params: &[f64],
    ) -> DgmResult<()> {
        let n = self.parameters_per_beam()?;
        if params.len() != n {
            return Err(DgmError::format_violation(format!(
                "beam has {} quality parameters, header declares {n}",
                params.len()
            )));
        }
        self.values.values_mut().extend_from_slice(params);
        Ok(())
    }

    /// Число лучей по длине матрицы. При нуле параметров на луч матрица
    /// пуста при любом числе лучей, и значение из заголовка сохраняется.
    fn rx_beams(&self) -> DgmResult<usize> {
        let n = self.parameters_per_beam()?;
        match (n, self.values.len()) {
            (0, 0) => self.header.count("NumberOfRxBeams"),
            (_, 0) => Ok(0),
            (0, len) => Err(DgmError::format_violation(format!(
                "{len} quality values with zero parameters per beam"
            ))),
            (n, len) if len % n != 0 => Err(DgmError::format_violation(format!(
                "{len} quality values are not a multiple of {n}"
            ))),
            (n, len) => Ok(len / n),
        }
    }
}

impl DatagramBody for QualityFactorDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::QualityFactor
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&QUALITY_FACTOR_HEADER, cur, &params)?;
        let count = header
            .count("NumberOfRxBeams")?
            .checked_mul(header.count("ParametersPerBeam")?)
            .ok_or_else(|| DgmError::format_violation("quality factor count overflow"))?;
        let values = Samples::decode(cur, count, Rule::F32, &params)?;
        Ok(Self { header, values })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "NumberOfRxBeams",
            count_value("NumberOfRxBeams", self.rx_beams()?, u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.values.encode(w, &params)
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
            .or_else(|| self.values.mismatch_within(&other.values, &params, "values"))
    }
}
