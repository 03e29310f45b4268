//! Массивы параметров передающих секторов (tx) и приёмных лучей (rx).

use super::table_subrecord;
use crate::schema::{Field, Raw, Rule, Schema};

/// Передающий сектор датаграммы 78 (24 байта).
pub static RAW_RANGE_TX: Schema = Schema::new(
    "raw range tx sectors",
    &[
        Field::new("TiltAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("FocusRange", Rule::scaled(Raw::U16, 0.1)),
        Field::new("SignalLength", Rule::F32),
        Field::new("SectorTransmitDelay", Rule::F32),
        Field::new("CentreFrequency", Rule::F32),
        Field::new("MeanAbsorption", Rule::scaled(Raw::U16, 0.01)),
        Field::new("SignalWaveformId", Rule::U8),
        Field::new("TransmitSectorNumber", Rule::U8),
        Field::new("SignalBandwidth", Rule::F32),
    ],
);

table_subrecord!(
    /// Передающие секторы датаграммы 78.
    RawRangeTx,
    RAW_RANGE_TX
);

/// Приёмный луч датаграммы 78 (16 байт).
pub static RAW_RANGE_RX: Schema = Schema::new(
    "raw range rx beams",
    &[
        Field::new("BeamPointingAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("TransmitSectorNumber", Rule::U8),
        Field::new("DetectionInfo", Rule::U8),
        Field::new("DetectionWindowLength", Rule::U16),
        Field::new("QualityFactor", Rule::U8),
        Field::new("Dcorr", Rule::I8),
        Field::new("TwoWayTravelTime", Rule::F32),
        Field::new("Reflectivity", Rule::scaled(Raw::I16, 0.1)),
        Field::new("RealTimeCleaningInfo", Rule::I8),
        Field::new("Spare", Rule::U8),
    ],
);

table_subrecord!(
    /// Приёмные лучи датаграммы 78.
    RawRangeRx,
    RAW_RANGE_RX
);

/// Передающий сектор датаграммы 102 (20 байт).
pub static RAW_RANGE_102_TX: Schema = Schema::new(
    "raw range (102) tx sectors",
    &[
        Field::new("TiltAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("FocusRange", Rule::scaled(Raw::U16, 0.1)),
        Field::new("SignalLength", Rule::scaled(Raw::U32, 1e-6)),
        Field::new("TransmitTimeOffset", Rule::scaled(Raw::U32, 1e-6)),
        Field::new("CentreFrequency", Rule::U32),
        Field::new("SignalBandwidth", Rule::scaled(Raw::U16, 10.0)),
        Field::new("SignalWaveformId", Rule::U8),
        Field::new("TransmitSectorNumber", Rule::U8),
    ],
);

table_subrecord!(
    /// Передающие секторы датаграммы 102.
    RawRange102Tx,
    RAW_RANGE_102_TX
);

/// Приёмный луч датаграммы 102 (12 байт). Время пробега в
/// четвертях отсчёта.
pub static RAW_RANGE_102_RX: Schema = Schema::new(
    "raw range (102) rx beams",
    &[
        Field::new("BeamPointingAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("TwoWayTravelTime", Rule::scaled(Raw::U16, 0.25)),
        Field::new("TransmitSectorNumber", Rule::U8),
        Field::new("Reflectivity", Rule::scaled(Raw::I8, 0.5)),
        Field::new("QualityFactor", Rule::U8),
        Field::new("DetectionWindowLength", Rule::U8),
        Field::new("BeamNumber", Rule::I16),
        Field::new("Spare", Rule::U16),
    ],
);

table_subrecord!(
    /// Приёмные лучи датаграммы 102.
    RawRange102Rx,
    RAW_RANGE_102_RX
);

/// Передающий сектор датаграммы водяного столба 107 (6 байт).
pub static WATER_COLUMN_TX: Schema = Schema::new(
    "water column tx sectors",
    &[
        Field::new("TiltAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("CentreFrequency", Rule::scaled(Raw::U16, 10.0)),
        Field::new("TransmitSectorNumber", Rule::U8),
        Field::new("Spare", Rule::U8),
    ],
);

table_subrecord!(
    /// Передающие секторы датаграммы 107.
    WaterColumnTx,
    WATER_COLUMN_TX
);
