use serde::{Deserialize, Serialize};

use crate::{DgmError, DgmResult};

/// Тип датаграммы (однобайтовый идентификатор после STX).
///
/// Набор закрыт: новый тип добавляется вариантом здесь и парой
/// decode/encode в реестре.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DatagramKind {
    /// '0' — PU id output
    PuId = 48,
    /// '1' — PU status output
    PuStatus = 49,
    /// '3' — Extra parameters
    ExtraParameters = 51,
    /// 'A' — Attitude
    Attitude = 65,
    /// 'B' — PU BIST result
    PuBist = 66,
    /// 'C' — Clock
    Clock = 67,
    /// 'D' — Depth (старый формат)
    Depth = 68,
    /// 'G' — Surface sound speed
    SurfaceSoundSpeed = 71,
    /// 'I' — Installation parameters (start)
    InstallationStart = 73,
    /// 'N' — Raw range and angle 78
    RawRangeAngle = 78,
    /// 'O' — Quality factor
    QualityFactor = 79,
    /// 'P' — Position
    Position = 80,
    /// 'R' — Runtime parameters
    Runtime = 82,
    /// 'S' — Seabed image (старый формат)
    SeabedImage83 = 83,
    /// 'U' — Sound speed profile
    SoundSpeedProfile = 85,
    /// 'X' — XYZ 88
    Xyz = 88,
    /// 'Y' — Seabed image 89
    SeabedImage89 = 89,
    /// 'f' — Raw range and angle (старый формат)
    RawRange102 = 102,
    /// 'h' — Depth (pressure) or height
    Height = 104,
    /// 'i' — Installation parameters (stop)
    InstallationStop = 105,
    /// 'k' — Water column
    WaterColumn = 107,
    /// 'm' — Stave data
    StaveData = 109,
    /// 'n' — Network attitude velocity
    NetworkAttitude = 110,
    /// 'p' — Remote information
    InstallationRemote = 112,
}

impl DatagramKind {
    /// Все поддерживаемые типы в порядке возрастания id.
    pub const ALL: [DatagramKind; 24] = [
        DatagramKind::PuId,
        DatagramKind::PuStatus,
        DatagramKind::ExtraParameters,
        DatagramKind::Attitude,
        DatagramKind::PuBist,
        DatagramKind::Clock,
        DatagramKind::Depth,
        DatagramKind::SurfaceSoundSpeed,
        DatagramKind::InstallationStart,
        DatagramKind::RawRangeAngle,
        DatagramKind::QualityFactor,
        DatagramKind::Position,
        DatagramKind::Runtime,
        DatagramKind::SeabedImage83,
        DatagramKind::SoundSpeedProfile,
        DatagramKind::Xyz,
        DatagramKind::SeabedImage89,
        DatagramKind::RawRange102,
        DatagramKind::Height,
        DatagramKind::InstallationStop,
        DatagramKind::WaterColumn,
        DatagramKind::StaveData,
        DatagramKind::NetworkAttitude,
        DatagramKind::InstallationRemote,
    ];

    pub fn from_u8(v: u8) -> DgmResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_u8() == v)
            .ok_or(DgmError::UnsupportedType(v))
    }

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    pub fn is_supported(v: u8) -> bool {
        Self::from_u8(v).is_ok()
    }

    /// Человекочитаемое имя для логов.
    pub fn name(&self) -> &'static str {
        match self {
            DatagramKind::PuId => "PU id output",
            DatagramKind::PuStatus => "PU status",
            DatagramKind::ExtraParameters => "extra parameters",
            DatagramKind::Attitude => "attitude",
            DatagramKind::PuBist => "PU BIST result",
            DatagramKind::Clock => "clock",
            DatagramKind::Depth => "depth",
            DatagramKind::SurfaceSoundSpeed => "surface sound speed",
            DatagramKind::InstallationStart => "installation parameters (start)",
            DatagramKind::RawRangeAngle => "raw range and angle 78",
            DatagramKind::QualityFactor => "quality factor",
            DatagramKind::Position => "position",
            DatagramKind::Runtime => "runtime parameters",
            DatagramKind::SeabedImage83 => "seabed image 83",
            DatagramKind::SoundSpeedProfile => "sound speed profile",
            DatagramKind::Xyz => "XYZ 88",
            DatagramKind::SeabedImage89 => "seabed image 89",
            DatagramKind::RawRange102 => "raw range and angle 102",
            DatagramKind::Height => "depth or height",
            DatagramKind::InstallationStop => "installation parameters (stop)",
            DatagramKind::WaterColumn => "water column",
            DatagramKind::StaveData => "stave data",
            DatagramKind::NetworkAttitude => "network attitude velocity",
            DatagramKind::InstallationRemote => "remote information",
        }
    }
}

impl std::fmt::Display for DatagramKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_u8(), self.name())
    }
}

impl TryFrom<u8> for DatagramKind {
    type Error = DgmError;

    fn try_from(v: u8) -> DgmResult<Self> {
        Self::from_u8(v)
    }
}
