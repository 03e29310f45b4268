//! Промеры по лучам: старый формат глубин (68) с целочисленными
//! координатами в единицах разрешения заголовка и формат XYZ (88) с
//! координатами в binary32.

use super::table_subrecord;
use crate::schema::{Field, Param, Raw, Rule, Schema};

/// Луч датаграммы 68 (16 байт). Масштаб координат задаётся
/// разрешениями из заголовка родителя.
pub static DEPTH_BEAM: Schema = Schema::new(
    "depth beams",
    &[
        Field::new("Depth", Rule::scaled_by(Raw::I16, Param::ZResolution)),
        Field::new("AcrossTrack", Rule::scaled_by(Raw::I16, Param::XyResolution)),
        Field::new("AlongTrack", Rule::scaled_by(Raw::I16, Param::XyResolution)),
        Field::new("BeamDepressionAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("BeamAzimuthAngle", Rule::scaled(Raw::U16, 0.01)),
        Field::new("Range", Rule::U16),
        Field::new("QualityFactor", Rule::U8),
        Field::new("DetectionWindowLength", Rule::U8),
        Field::new("Reflectivity", Rule::scaled(Raw::I8, 0.5)),
        Field::new("BeamNumber", Rule::U8),
    ],
);

table_subrecord!(
    /// Лучи датаграммы 68.
    DepthBeams,
    DEPTH_BEAM
);

/// Луч датаграммы 88 (20 байт).
pub static XYZ_BEAM: Schema = Schema::new(
    "xyz beams",
    &[
        Field::new("Depth", Rule::F32),
        Field::new("AcrossTrack", Rule::F32),
        Field::new("AlongTrack", Rule::F32),
        Field::new("DetectionWindowLength", Rule::U16),
        Field::new("QualityFactor", Rule::U8),
        Field::new("IncidenceAngleAdjustment", Rule::scaled(Raw::I8, 0.1)),
        Field::new("DetectionInfo", Rule::U8),
        Field::new("RealTimeCleaningInfo", Rule::I8),
        Field::new("Reflectivity", Rule::scaled(Raw::I16, 0.1)),
    ],
);

table_subrecord!(
    /// Лучи датаграммы 88.
    XyzBeams,
    XYZ_BEAM
);
