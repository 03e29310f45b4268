//! Амплитуды обратного рассеяния (seabed image): таблица лучей и общий
//! вектор выборок, длина которого равна сумме `NumberOfSamples` по лучам.

use emdgm_types::{DgmError, DgmResult};
use serde::Serialize;

use super::{count_value, SubRecord, Samples};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Params, Raw, Rule, Schema, Table},
    tolerance::{Mismatch, Tolerant},
};

/// Луч датаграммы 83 (6 байт).
pub static SEABED_83_BEAM: Schema = Schema::new(
    "seabed image (83) beams",
    &[
        Field::new("BeamIndex", Rule::U8),
        Field::new("SortingDirection", Rule::I8),
        Field::new("NumberOfSamples", Rule::U16),
        Field::new("CentreSampleNumber", Rule::U16),
    ],
);

/// Луч датаграммы 89 (6 байт).
pub static SEABED_89_BEAM: Schema = Schema::new(
    "seabed image (89) beams",
    &[
        Field::new("SortingDirection", Rule::I8),
        Field::new("DetectionInfo", Rule::U8),
        Field::new("NumberOfSamples", Rule::U16),
        Field::new("CentreSampleNumber", Rule::U16),
    ],
);

/// Вариант раскладки выборок.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeabedFormat {
    /// i8 в шагах 0.5 дБ (83)
    Old,
    /// i16 в шагах 0.1 дБ, значение с точностью binary16 (89)
    Packed,
}

impl SeabedFormat {
    pub fn beam_schema(&self) -> &'static Schema {
        match self {
            SeabedFormat::Old => &SEABED_83_BEAM,
            SeabedFormat::Packed => &SEABED_89_BEAM,
        }
    }

    pub fn sample_rule(&self) -> Rule {
        match self {
            SeabedFormat::Old => Rule::scaled(Raw::I8, 0.5),
            SeabedFormat::Packed => Rule::packed(Raw::I16, 0.1),
        }
    }
}

/// Лучи и выборки обратного рассеяния.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeabedImage {
    #[serde(skip)]
    pub format: SeabedFormat,
    pub beams: Table,
    pub samples: Samples,
}

impl SeabedImage {
    pub fn new(format: SeabedFormat) -> Self {
        Self {
            format,
            beams: Table::new(format.beam_schema()),
            samples: Samples::new(format.sample_rule(), Vec::new()),
        }
    }

    pub fn beam(&self) -> Fields {
        Fields::zeroed(self.format.beam_schema())
    }

    /// Добавляет луч вместе с его выборками; `NumberOfSamples`
    /// выставляется по длине `samples`.
    pub fn push_beam(
        &mut self,
        mut beam: Fields,
        samples: &[f64],
    ) -> DgmResult<()> {
        beam.set(
            "NumberOfSamples",
            count_value("NumberOfSamples", samples.len(), u16::MAX as usize)?,
        )?;
        self.beams.push(beam)?;
        self.samples.values_mut().extend_from_slice(samples);
        Ok(())
    }

    /// Выборки луча `i`.
    pub fn beam_samples(
        &self,
        i: usize,
    ) -> DgmResult<&[f64]> {
        let mut start = 0;
        for (n, row) in self.beams.rows().iter().enumerate() {
            let count = row.count("NumberOfSamples")?;
            if n == i {
                return self
                    .samples
                    .values()
                    .get(start..start + count)
                    .ok_or_else(|| DgmError::truncated("seabed samples", start + count, self.samples.len()));
            }
            start += count;
        }
        Err(DgmError::format_violation(format!("no beam {i}")))
    }

    fn total_samples(&self) -> DgmResult<usize> {
        self.beams
            .rows()
            .iter()
            .try_fold(0usize, |acc, r| Ok(acc + r.count("NumberOfSamples")?))
    }

    pub fn decode_with(
        format: SeabedFormat,
        cur: &mut ByteCursor<'_>,
        beams: usize,
        params: &Params,
    ) -> DgmResult<Self> {
        let beams = Table::decode(format.beam_schema(), cur, beams, params)?;
        let mut image = Self {
            format,
            beams,
            samples: Samples::new(format.sample_rule(), Vec::new()),
        };
        let total = image.total_samples()?;
        image.samples = Samples::decode(cur, total, format.sample_rule(), params)?;
        Ok(image)
    }
}

impl SubRecord for SeabedImage {
    /// Декодирует в формате 89; для 83 используется [`SeabedImage::decode_with`].
    fn decode(
        cur: &mut ByteCursor<'_>,
        count: usize,
        params: &Params,
    ) -> DgmResult<Self> {
        Self::decode_with(SeabedFormat::Packed, cur, count, params)
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()> {
        let total = self.total_samples()?;
        if total != self.samples.len() {
            return Err(DgmError::format_violation(format!(
                "beams declare {total} samples, {} present",
                self.samples.len()
            )));
        }
        self.beams.encode(w, params)?;
        self.samples.encode(w, params)
    }

    fn count(&self) -> usize {
        self.beams.len()
    }

    fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        self.beams.shift_numeric(delta);
        self.samples.shift_numeric(delta);
    }
}

impl Tolerant for SeabedImage {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        self.beams
            .mismatch(&other.beams, params)
            .map(|m| m.within("beams"))
            .or_else(|| {
                self.samples
                    .mismatch(&other.samples, params)
                    .map(|m| m.within("samples"))
            })
    }
}

#[cfg(test)]
mod tests {
    use emdgm_types::Endian;

    use super::*;

    fn image(format: SeabedFormat) -> SeabedImage {
        let mut img = SeabedImage::new(format);
        let beam = img.beam().with("SortingDirection", -1).unwrap();
        img.push_beam(beam, &[-20.5, -21.0, -35.5]).unwrap();
        let beam = img.beam().with("SortingDirection", 1).unwrap();
        img.push_beam(beam, &[-18.0]).unwrap();
        img
    }

    #[test]
    fn test_old_format_samples_exact_at_half_db() {
        let img = image(SeabedFormat::Old);
        let bytes = img.to_bytes(Endian::Little, &Params::new()).unwrap();
        assert_eq!(bytes.len(), 2 * 6 + 4);

        let mut cur = ByteCursor::new(&bytes, Endian::Little);
        let back = SeabedImage::decode_with(SeabedFormat::Old, &mut cur, 2, &Params::new()).unwrap();
        assert_eq!(back.samples.values(), img.samples.values());
        assert_eq!(back.beam_samples(1).unwrap(), &[-18.0]);
    }

    #[test]
    fn test_packed_samples_within_tolerance() {
        let img = image(SeabedFormat::Packed);
        let bytes = img.to_bytes(Endian::Big, &Params::new()).unwrap();
        assert_eq!(bytes.len(), 2 * 6 + 4 * 2);

        let (back, used) = SeabedImage::from_bytes(&bytes, 2, Endian::Big, &Params::new()).unwrap();
        assert_eq!(used, bytes.len());
        assert!(img.approx_eq(&back, &Params::new()));

        // Повторный цикл не накапливает ошибку
        let again = back.to_bytes(Endian::Big, &Params::new()).unwrap();
        assert_eq!(again, bytes);
    }

    #[test]
    fn test_inconsistent_sample_count_rejected() {
        let mut img = image(SeabedFormat::Packed);
        img.samples.values_mut().pop();
        assert!(img.to_bytes(Endian::Little, &Params::new()).is_err());
    }

    #[test]
    fn test_declared_samples_exceed_bytes() {
        let img = image(SeabedFormat::Old);
        let bytes = img.to_bytes(Endian::Little, &Params::new()).unwrap();
        let mut cur = ByteCursor::new(&bytes[..bytes.len() - 1], Endian::Little);
        let err =
            SeabedImage::decode_with(SeabedFormat::Old, &mut cur, 2, &Params::new()).unwrap_err();
        assert!(matches!(err, DgmError::Truncated { what: "samples", .. }));
    }
}
