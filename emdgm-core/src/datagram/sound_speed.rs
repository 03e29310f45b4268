//! Скорость звука у поверхности (71) и профиль скорости звука (85).

use emdgm_types::{DatagramKind, DgmResult};
use serde::Serialize;

use super::{with_resolution, DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    format::posix_time,
    schema::{Field, Fields, Param, Params, Rule, Schema},
    subrecord::{count_value, SoundSpeedProfile, SubRecord, SurfaceSoundSpeeds},
    tolerance::{Mismatch, Tolerant},
};

pub static SURFACE_SOUND_SPEED_HEADER: Schema = Schema::new(
    "surface sound speed header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfEntries", Rule::U16),
    ],
);

/// Скорость звука у поверхности (71).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceSoundSpeedDatagram {
    pub header: Fields,
    pub entries: SurfaceSoundSpeeds,
}

impl SurfaceSoundSpeedDatagram {
    pub fn new() -> Self {
        Self {
            header: Fields::zeroed(&SURFACE_SOUND_SPEED_HEADER),
            entries: SurfaceSoundSpeeds::new(),
        }
    }
}

impl Default for SurfaceSoundSpeedDatagram {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramBody for SurfaceSoundSpeedDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::SurfaceSoundSpeed
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let params = ctx.params();
        let header = Fields::decode(&SURFACE_SOUND_SPEED_HEADER, cur, &params)?;
        let entries = SurfaceSoundSpeeds::decode(cur, header.count("NumberOfEntries")?, &params)?;
        Ok(Self { header, entries })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = ctx.params();
        let mut header = self.header.clone();
        header.set(
            "NumberOfEntries",
            count_value("NumberOfEntries", self.entries.count(), u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.entries.encode(w, &params)
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
            .or_else(|| self.entries.mismatch_within(&other.entries, &params, "entries"))
    }
}

/// Заголовок 85. `DepthResolution` в сантиметрах.
pub static SOUND_SPEED_PROFILE_HEADER: Schema = Schema::new(
    "sound speed profile header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("ProfileDate", Rule::U32),
        Field::new("ProfileTimeMs", Rule::U32),
        Field::new("NumberOfEntries", Rule::U16),
        Field::new("DepthResolution", Rule::U16),
    ],
);

/// Профиль скорости звука (85).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundSpeedProfileDatagram {
    pub header: Fields,
    pub profile: SoundSpeedProfile,
}

impl SoundSpeedProfileDatagram {
    pub fn new(depth_resolution_cm: u16) -> DgmResult<Self> {
        Ok(Self {
            header: Fields::zeroed(&SOUND_SPEED_PROFILE_HEADER)
                .with("DepthResolution", depth_resolution_cm)?,
            profile: SoundSpeedProfile::new(),
        })
    }

    /// POSIX-время измерения профиля.
    pub fn profile_time(&self) -> Option<f64> {
        let date = self.header.int("ProfileDate").ok()?;
        let ms = self.header.int("ProfileTimeMs").ok()?;
        posix_time(date as u32, ms as u32)
    }

    fn depth_params(
        header: &Fields,
        ctx: &DecodeContext,
    ) -> DgmResult<Params> {
        with_resolution(ctx.params(), header, "DepthResolution", Param::DepthResolution)
    }
}

impl DatagramBody for SoundSpeedProfileDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::SoundSpeedProfile
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let header = Fields::decode(&SOUND_SPEED_PROFILE_HEADER, cur, &ctx.params())?;
        let params = Self::depth_params(&header, ctx)?;
        let profile = SoundSpeedProfile::decode(cur, header.count("NumberOfEntries")?, &params)?;
        Ok(Self { header, profile })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        let params = self.params(ctx)?;
        let mut header = self.header.clone();
        header.set(
            "NumberOfEntries",
            count_value("NumberOfEntries", self.profile.count(), u16::MAX as usize)?,
        )?;
        header.encode(w, &params)?;
        self.profile.encode(w, &params)
    }

    fn header(&self) -> &Fields {
        &self.header
    }

    fn header_mut(&mut self) -> &mut Fields {
        &mut self.header
    }

    fn params(
        &self,
        ctx: &DecodeContext,
    ) -> DgmResult<Params> {
        Self::depth_params(&self.header, ctx)
    }

    fn mismatch(
        &self,
        other: &Self,
        ctx: &DecodeContext,
    ) -> Option<Mismatch> {
        let params = self.params(ctx).unwrap_or_else(|_| ctx.params());
        self.header
            .mismatch_within(&other.header, &params, "header")
            .or_else(|| self.profile.mismatch_within(&other.profile, &params, "profile"))
    }
}
