//! Амплитуды обратного рассеяния: старый формат (83) и формат 89.

use emdgm_types::DatagramKind;

use crate::{
    schema::{Field, Raw, Rule, Schema},
    subrecord::SeabedFormat,
};

pub static SEABED_83_HEADER: Schema = Schema::new(
    "seabed image (83) header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("MeanAbsorption", Rule::scaled(Raw::U16, 0.01)),
        Field::new("PulseLength", Rule::U16),
        Field::new("RangeToNormalIncidence", Rule::U16),
        Field::new("StartRangeTvg", Rule::U16),
        Field::new("StopRangeTvg", Rule::U16),
        Field::new("NormalIncidenceBs", Rule::I8),
        Field::new("ObliqueBs", Rule::I8),
        Field::new("TxBeamwidth", Rule::scaled(Raw::U16, 0.1)),
        Field::new("TvgLawCrossover", Rule::scaled(Raw::U8, 0.1)),
        Field::new("NumberOfBeams", Rule::U8),
    ],
);

pub static SEABED_89_HEADER: Schema = Schema::new(
    "seabed image (89) header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("SamplingFrequency", Rule::F32),
        Field::new("RangeToNormalIncidence", Rule::U16),
        Field::new("NormalIncidenceBs", Rule::scaled(Raw::I16, 0.1)),
        Field::new("ObliqueBs", Rule::scaled(Raw::I16, 0.1)),
        Field::new("TxBeamwidthAlong", Rule::scaled(Raw::U16, 0.1)),
        Field::new("TvgLawCrossover", Rule::scaled(Raw::U16, 0.1)),
        Field::new("NumberOfBeams", Rule::U16),
    ],
);

macro_rules! seabed_datagram {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $schema:expr, $format:expr, $max_beams:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        pub struct $name {
            pub header: $crate::schema::Fields,
            pub image: $crate::subrecord::SeabedImage,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    header: $crate::schema::Fields::zeroed(&$schema),
                    image: $crate::subrecord::SeabedImage::new($format),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl $crate::datagram::DatagramBody for $name {
            fn kind(&self) -> DatagramKind {
                $kind
            }

            fn decode(
                _kind: DatagramKind,
                cur: &mut $crate::binary::ByteCursor<'_>,
                ctx: &$crate::datagram::DecodeContext,
            ) -> emdgm_types::DgmResult<Self> {
                let params = ctx.params();
                let header = $crate::schema::Fields::decode(&$schema, cur, &params)?;
                let image = $crate::subrecord::SeabedImage::decode_with(
                    $format,
                    cur,
                    header.count("NumberOfBeams")?,
                    &params,
                )?;
                Ok(Self { header, image })
            }

            fn encode(
                &self,
                w: &mut $crate::binary::ByteWriter,
                ctx: &$crate::datagram::DecodeContext,
            ) -> emdgm_types::DgmResult<()> {
                use $crate::subrecord::{count_value, SubRecord};

                let params = ctx.params();
                let mut header = self.header.clone();
                header.set(
                    "NumberOfBeams",
                    count_value("NumberOfBeams", self.image.count(), $max_beams)?,
                )?;
                header.encode(w, &params)?;
                self.image.encode(w, &params)
            }

            fn header(&self) -> &$crate::schema::Fields {
                &self.header
            }

            fn header_mut(&mut self) -> &mut $crate::schema::Fields {
                &mut self.header
            }

            fn mismatch(
                &self,
                other: &Self,
                ctx: &$crate::datagram::DecodeContext,
            ) -> Option<$crate::tolerance::Mismatch> {
                use $crate::tolerance::Tolerant;

                let params = ctx.params();
                self.header
                    .mismatch_within(&other.header, &params, "header")
                    .or_else(|| self.image.mismatch_within(&other.image, &params, "image"))
            }
        }
    };
}

seabed_datagram!(
    /// Амплитуды обратного рассеяния, старый формат (83).
    SeabedImage83Datagram,
    DatagramKind::SeabedImage83,
    SEABED_83_HEADER,
    SeabedFormat::Old,
    u8::MAX as usize
);

seabed_datagram!(
    /// Амплитуды обратного рассеяния (89).
    SeabedImage89Datagram,
    DatagramKind::SeabedImage89,
    SEABED_89_HEADER,
    SeabedFormat::Packed,
    u16::MAX as usize
);
