//! Таблицы скорости звука: у поверхности (71) и профиль по глубине (85).

use super::table_subrecord;
use crate::schema::{Field, Param, Raw, Rule, Schema};

/// Измерение у преобразователя (4 байта). `Time` — секунды от времени
/// датаграммы.
pub static SURFACE_SOUND_SPEED_ENTRY: Schema = Schema::new(
    "surface sound speed entries",
    &[
        Field::new("Time", Rule::time_offset(Raw::U16, 1.0)),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
    ],
);

table_subrecord!(
    /// Измерения датаграммы 71.
    SurfaceSoundSpeeds,
    SURFACE_SOUND_SPEED_ENTRY
);

/// Точка профиля (8 байт). Глубина в единицах разрешения из заголовка.
pub static SOUND_SPEED_PROFILE_ENTRY: Schema = Schema::new(
    "sound speed profile entries",
    &[
        Field::new("Depth", Rule::scaled_by(Raw::U32, Param::DepthResolution)),
        Field::new("SoundSpeed", Rule::scaled(Raw::U32, 0.1)),
    ],
);

table_subrecord!(
    /// Точки профиля датаграммы 85.
    SoundSpeedProfile,
    SOUND_SPEED_PROFILE_ENTRY
);
