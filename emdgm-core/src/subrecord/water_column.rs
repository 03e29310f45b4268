//! Приёмные лучи водяного столба (107): заголовок луча и выборки
//! амплитуды сразу за ним.

use emdgm_types::DgmResult;
use serde::Serialize;

use super::{count_value, Samples, SubRecord};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Params, Raw, Rule, Schema},
    tolerance::{Mismatch, Tolerant},
};

/// Заголовок приёмного луча (10 байт).
pub static WATER_COLUMN_BEAM: Schema = Schema::new(
    "water column beams",
    &[
        Field::new("BeamPointingAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("StartRangeSampleNumber", Rule::U16),
        Field::new("NumberOfSamples", Rule::U16),
        Field::new("DetectedRange", Rule::U16),
        Field::new("TransmitSectorNumber", Rule::U8),
        Field::new("BeamNumber", Rule::U8),
    ],
);

/// Амплитуда в шагах 0.5 дБ.
pub const WATER_COLUMN_SAMPLE: Rule = Rule::scaled(Raw::I8, 0.5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterColumnBeam {
    pub fields: Fields,
    pub samples: Samples,
}

impl WaterColumnBeam {
    pub fn new(
        fields: Fields,
        samples: Vec<f64>,
    ) -> Self {
        Self {
            fields,
            samples: Samples::new(WATER_COLUMN_SAMPLE, samples),
        }
    }

    pub fn row() -> Fields {
        Fields::zeroed(&WATER_COLUMN_BEAM)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WaterColumnBeams {
    pub beams: Vec<WaterColumnBeam>,
}

impl SubRecord for WaterColumnBeams {
    fn decode(
        cur: &mut ByteCursor<'_>,
        count: usize,
        params: &Params,
    ) -> DgmResult<Self> {
        cur.ensure(
            count.saturating_mul(WATER_COLUMN_BEAM.width()),
            WATER_COLUMN_BEAM.name,
        )?;

        let mut beams = Vec::with_capacity(count);
        for _ in 0..count {
            let fields = Fields::decode(&WATER_COLUMN_BEAM, cur, params)?;
            let n = fields.count("NumberOfSamples")?;
            let samples = Samples::decode(cur, n, WATER_COLUMN_SAMPLE, params)?;
            beams.push(WaterColumnBeam { fields, samples });
        }

        Ok(Self { beams })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()> {
        for beam in &self.beams {
            let mut fields = beam.fields.clone();
            fields.set(
                "NumberOfSamples",
                count_value("NumberOfSamples", beam.samples.len(), u16::MAX as usize)?,
            )?;
            fields.encode(w, params)?;
            beam.samples.encode(w, params)?;
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.beams.len()
    }

    fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        for beam in &mut self.beams {
            beam.fields.shift_numeric(delta);
            beam.samples.shift_numeric(delta);
        }
    }
}

impl Tolerant for WaterColumnBeams {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        if self.beams.len() != other.beams.len() {
            return Some(Mismatch::length("len", self.beams.len(), other.beams.len()));
        }

        self.beams
            .iter()
            .zip(&other.beams)
            .enumerate()
            .find_map(|(i, (a, b))| {
                a.fields
                    .mismatch(&b.fields, params)
                    .or_else(|| a.samples.mismatch(&b.samples, params).map(|m| m.within("samples")))
                    .map(|m| m.within(format!("[{i}]")))
            })
    }
}
