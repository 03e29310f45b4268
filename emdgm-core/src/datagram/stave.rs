use emdgm_types::{DatagramKind, DgmError, DgmResult};
use serde::Serialize;

use super::{DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Raw, Rule, Schema},
    subrecord::{count_value, Samples},
    tolerance::{Mismatch, Tolerant},
};

pub static STAVE_HEADER: Schema = Schema::new(
    "stave data header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfDatagrams", Rule::U16),
        Field::new("DatagramNumber", Rule::U16),
        Field::new("RxSamplingFrequency", Rule::F32),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
        Field::new("StartRangeSample", Rule::U16),
        Field::new("TotalSamples", Rule::U16),
        Field::new("SamplesInDatagram", Rule::U16),
        Field::new("NumberOfStaves", Rule::U16),
    ],
);

/// Амплитуда отсчёта стейва в шагах 0.5 дБ.
pub const STAVE_SAMPLE: Rule = Rule::scaled(Raw::I8, 0.5);

/// Данные стейвов (109): матрица `отсчёты × стейвы`, построчно по
/// отсчётам.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaveDatagram {
    pub header: Fields,
    pub samples: Samples,
}

impl StaveDatagram {
    pub fn new(staves: u16) -> DgmResult<Self> {
        Ok(Self {
            header: Fields::zeroed(&STAVE_HEADER).with("NumberOfStaves", staves)?,
            samples: Samples::new(STAVE_SAMPLE, Vec::new()),
        })
    }

    /// Значения всех стейвов для отсчёта `i`.
    pub fn sample(
        &self,
        i: usize,
    ) -> Option<&[f64]> {
        let n = self.header.count("NumberOfStaves").ok()?;
        self.samples.values().get(i * n..(i + 1) * n)
    }

    /// Число отсчётов по длине матрицы; без стейвов берётся из заголовка.
    fn samples_in_datagram(&self) -> DgmResult<usize> {
        let staves = self.header.count("NumberOfStaves")?;
        match (staves, self.samples.len()) {
            (0, 0) => self.header.count("SamplesInDatagram"),
            (_, 0) => Ok(0),
            (0, len) => Err(DgmError::format_violation(format!(
                "{len} stave samples with zero staves"
            ))),
            (n, len) if len % n != 0 => Err(DgmError::format_violation(format!(
                "{len} stave samples are not a multiple of {n} staves"
            ))),
            (n, len) => Ok(len / n),
        }
    }
}

impl DatagramBody for StaveDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::StaveData
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&STAVE_HEADER, cur, &params)?;
        let count = header
            .count("SamplesInDatagram")?
            .checked_mul(header.count("NumberOfStaves")?)
            .ok_or_else(|| DgmError::format_violation("stave sample count overflow"))?;
        let samples = Samples::decode(cur, count, STAVE_SAMPLE, &params)?;
        Ok(Self { header, samples })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "SamplesInDatagram",
            count_value("SamplesInDatagram", self.samples_in_datagram()?, u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.samples.encode(w, &params)
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
            .or_else(|| self.samples.mismatch_within(&other.samples, &params, "samples"))
    }
}

#[cfg(test)]
mod tests {
    use emdgm_types::Endian;

    use super::*;

    #[test]
    fn test_stave_matrix() {
        let ctx = DecodeContext::default();
        let mut dgm = StaveDatagram::new(4).unwrap();
        dgm.header.set("RxSamplingFrequency", 15_000.0).unwrap();
        dgm.header.set("SamplesInDatagram", 3).unwrap();
        dgm.samples
            .values_mut()
            .extend((0..12).map(|i| -20.0 - 0.5 * i as f64));

        let bytes = dgm.to_bytes(Endian::Little, &ctx).unwrap();
        assert_eq!(STAVE_HEADER.width(), 22);
        assert_eq!(bytes.len(), 22 + 12);

        let back = StaveDatagram::from_bytes(DatagramKind::StaveData, &bytes, Endian::Little, &ctx)
            .unwrap();
        assert_eq!(back, dgm);
        assert_eq!(back.sample(2), Some(&[-24.0, -24.5, -25.0, -25.5][..]));
    }

    #[test]
    fn test_zero_staves_keep_sample_count() {
        let ctx = DecodeContext::default();
        let mut dgm = StaveDatagram::new(0).unwrap();
        dgm.header.set("SamplesInDatagram", 7).unwrap();

        let bytes = dgm.to_bytes(Endian::Big, &ctx).unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(u16::from_be_bytes([bytes[18], bytes[19]]), 7);

        let back =
            StaveDatagram::from_bytes(DatagramKind::StaveData, &bytes, Endian::Big, &ctx).unwrap();
        assert_eq!(back, dgm);
        assert_eq!(back.sample(0), Some(&[][..]));
    }

    #[test]
    fn test_ragged_staves_rejected() {
        let mut dgm = StaveDatagram::new(5).unwrap();
        dgm.samples.values_mut().extend([0.0; 7]);
        assert!(dgm.to_bytes(Endian::Little, &DecodeContext::default()).is_err());
    }
}
