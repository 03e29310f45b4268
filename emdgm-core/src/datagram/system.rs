//! Датаграммы процессорного блока: идентификация (48), состояние (49),
//! результат самотестирования (66) и параметры работы (82).

use emdgm_types::{DatagramKind, DgmResult};
use serde::Serialize;

use super::{header_only, read_text, DatagramBody, DecodeContext};
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Field, Fields, Raw, Rule, Schema},
    tolerance::{Mismatch, Tolerant},
};

pub static PU_ID_HEADER: Schema = Schema::new(
    "PU id header",
    &[
        Field::new("ByteOrderFlag", Rule::U16),
        Field::new("SystemSerialNumber", Rule::U16),
        Field::new("UdpPort1", Rule::U16),
        Field::new("UdpPort2", Rule::U16),
        Field::new("UdpPort3", Rule::U16),
        Field::new("UdpPort4", Rule::U16),
        Field::new("SystemDescriptor", Rule::U32),
        Field::new("PuSoftwareVersion", Rule::Chars(16)),
        Field::new("BspSoftwareVersion", Rule::Chars(16)),
        Field::new("SonarHead1Version", Rule::Chars(16)),
        Field::new("SonarHead2Version", Rule::Chars(16)),
        Field::new("HostIpAddress", Rule::U32),
        Field::new("TxOpeningAngle", Rule::U8),
        Field::new("RxOpeningAngle", Rule::U8),
        Field::new("Spare", Rule::Bytes(7)),
    ],
);

header_only!(
    /// Идентификация процессорного блока (48).
    PuIdDatagram,
    DatagramKind::PuId,
    PU_ID_HEADER
);

pub static PU_STATUS_HEADER: Schema = Schema::new(
    "PU status header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("PingRate", Rule::scaled(Raw::U16, 0.01)),
        Field::new("PingCounter", Rule::U16),
        Field::new("SwathDistance", Rule::scaled(Raw::U32, 0.01)),
        Field::new("SensorInputStatusUdp2", Rule::U32),
        Field::new("SensorInputStatusSerial1", Rule::U32),
        Field::new("SensorInputStatusSerial2", Rule::U32),
        Field::new("SensorInputStatusSerial3", Rule::U32),
        Field::new("SensorInputStatusSerial4", Rule::U32),
        Field::new("PpsStatus", Rule::I8),
        Field::new("PositionStatus", Rule::I8),
        Field::new("AttitudeStatus", Rule::I8),
        Field::new("ClockStatus", Rule::I8),
        Field::new("HeadingStatus", Rule::I8),
        Field::new("PuStatus", Rule::U8),
        Field::new("LastHeading", Rule::scaled(Raw::U16, 0.01)),
        Field::new("LastRoll", Rule::scaled(Raw::I16, 0.01)),
        Field::new("LastPitch", Rule::scaled(Raw::I16, 0.01)),
        Field::new("LastHeave", Rule::scaled(Raw::I16, 0.01)),
        Field::new("SoundSpeedAtTransducer", Rule::scaled(Raw::U16, 0.1)),
        Field::new("LastDepth", Rule::scaled(Raw::U32, 0.01)),
        Field::new("AlongShipVelocity", Rule::scaled(Raw::I16, 0.01)),
        Field::new("AttitudeVelocityStatus", Rule::U8),
        Field::new("MammalProtectionRamp", Rule::U8),
        Field::new("BackscatterAtObliqueAngle", Rule::I8),
        Field::new("BackscatterAtNormalIncidence", Rule::I8),
        Field::new("FixedGain", Rule::I8),
        Field::new("DepthToNormalIncidence", Rule::U8),
        Field::new("RangeToNormalIncidence", Rule::U16),
        Field::new("PortCoverage", Rule::U8),
        Field::new("StarboardCoverage", Rule::U8),
        Field::new("SoundSpeedFromProfile", Rule::scaled(Raw::U16, 0.1)),
        Field::new("YawStabilizationAngle", Rule::scaled(Raw::I16, 0.01)),
        Field::new("PortCoverageOrVelocity", Rule::I16),
        Field::new("StarboardCoverageOrVelocity", Rule::I16),
        Field::new("CpuTemperature", Rule::I8),
    ],
);

header_only!(
    /// Состояние процессорного блока (49).
    PuStatusDatagram,
    DatagramKind::PuStatus,
    PU_STATUS_HEADER
);

pub static RUNTIME_HEADER: Schema = Schema::new(
    "runtime parameters header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("OperatorStationStatus", Rule::U8),
        Field::new("PuStatus", Rule::U8),
        Field::new("BspStatus", Rule::U8),
        Field::new("SonarHeadStatus", Rule::U8),
        Field::new("Mode", Rule::U8),
        Field::new("FilterIdentifier", Rule::U8),
        Field::new("MinimumDepth", Rule::U16),
        Field::new("MaximumDepth", Rule::U16),
        Field::new("AbsorptionCoefficient", Rule::scaled(Raw::U16, 0.01)),
        Field::new("TransmitPulseLength", Rule::U16),
        Field::new("TransmitBeamwidth", Rule::scaled(Raw::U16, 0.1)),
        Field::new("TransmitPowerReMax", Rule::I8),
        Field::new("ReceiveBeamwidth", Rule::scaled(Raw::U8, 0.1)),
        Field::new("ReceiveBandwidth", Rule::scaled(Raw::U8, 50.0)),
        Field::new("Mode2", Rule::U8),
        Field::new("SourceOfSoundSpeed", Rule::U8),
        Field::new("MaximumPortSwathWidth", Rule::U16),
        Field::new("BeamSpacing", Rule::U8),
        Field::new("MaximumPortCoverage", Rule::U8),
        Field::new("YawPitchStabilization", Rule::U8),
        Field::new("MaximumStarboardCoverage", Rule::U8),
        Field::new("MaximumStarboardSwathWidth", Rule::U16),
        Field::new("TransmitAlongTilt", Rule::scaled(Raw::I16, 0.1)),
        Field::new("FilterIdentifier2", Rule::U8),
    ],
);

header_only!(
    /// Параметры работы (82).
    RuntimeDatagram,
    DatagramKind::Runtime,
    RUNTIME_HEADER
);

pub static PU_BIST_HEADER: Schema = Schema::new(
    "PU BIST header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("TestNumber", Rule::U16),
        Field::new("TestResultStatus", Rule::I16),
    ],
);

/// Результат самотестирования (66): заголовок и текст отчёта.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PuBistDatagram {
    pub header: Fields,
    pub text: String,
}

impl PuBistDatagram {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            header: Fields::zeroed(&PU_BIST_HEADER),
            text: text.into(),
        }
    }
}

impl DatagramBody for PuBistDatagram {
    fn kind(&self) -> DatagramKind {
        DatagramKind::PuBist
    }

    fn decode(
        _kind: DatagramKind,
        cur: &mut ByteCursor<'_>,
        ctx: &DecodeContext,
    ) -> DgmResult<Self> {
        let header = Fields::decode(&PU_BIST_HEADER, cur, &ctx.params())?;
        let text = read_text(cur)?;
        Ok(Self { header, text })
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        ctx: &DecodeContext,
    ) -> DgmResult<()> {
        self.header.encode(w, &ctx.params())?;
        w.put_text(&self.text)
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
        self.header
            .mismatch(&other.header, &ctx.params())
            .map(|m| m.within("header"))
            .or_else(|| text_mismatch("text", &self.text, &other.text))
    }
}

pub(crate) fn text_mismatch(
    path: &str,
    a: &str,
    b: &str,
) -> Option<Mismatch> {
    (a != b).then(|| Mismatch::new(path, a.into(), b.into(), 0.0))
}

#[cfg(test)]
mod tests {
    use emdgm_types::Endian;

    use super::*;

    #[test]
    fn test_header_widths() {
        assert_eq!(PU_ID_HEADER.width(), 93);
        assert_eq!(RUNTIME_HEADER.width(), 36);
        assert_eq!(PU_BIST_HEADER.width(), 8);
    }

    #[test]
    fn test_pu_id_versions() {
        let mut pu = PuIdDatagram::new();
        pu.header.set("ByteOrderFlag", 1).unwrap();
        pu.header.set("SystemSerialNumber", 222).unwrap();
        pu.header.set("PuSoftwareVersion", "2.2.8 160111").unwrap();
        pu.header.set("Spare", crate::schema::Value::Bytes(vec![0; 7])).unwrap();

        let ctx = DecodeContext::new(2040, None);
        let bytes = pu.to_bytes(Endian::Little, &ctx).unwrap();
        assert_eq!(bytes.len(), 93);

        let back = PuIdDatagram::from_bytes(DatagramKind::PuId, &bytes, Endian::Little, &ctx).unwrap();
        assert_eq!(back, pu);
        assert_eq!(
            back.header.value("PuSoftwareVersion").unwrap().as_str(),
            Some("2.2.8 160111")
        );
    }

    #[test]
    fn test_bist_text_round_trip() {
        let mut bist = PuBistDatagram::new("CPU test OK\nTX36 test OK");
        bist.header.set("TestResultStatus", -1).unwrap();
        let ctx = DecodeContext::default();

        let mut bytes = bist.to_bytes(Endian::Big, &ctx).unwrap();
        // Байт выравнивания после текста
        bytes.push(0);
        let back = PuBistDatagram::from_bytes(DatagramKind::PuBist, &bytes, Endian::Big, &ctx).unwrap();
        assert_eq!(back.text, bist.text);
        assert!(back.mismatch(&bist, &ctx).is_none());
    }

    #[test]
    fn test_non_ascii_bytes_survive_re_encoding() {
        let mut pu = PuIdDatagram::new();
        pu.header.set("Spare", crate::schema::Value::Bytes(vec![0; 7])).unwrap();
        let ctx = DecodeContext::new(2040, None);
        let mut bytes = pu.to_bytes(Endian::Little, &ctx).unwrap();
        // PuSoftwareVersion начинается со смещения 16
        bytes[16..22].copy_from_slice(&[b'v', b'1', 0xB0, 0xE9, 0xFF, 0x80]);

        let back = PuIdDatagram::from_bytes(DatagramKind::PuId, &bytes, Endian::Little, &ctx).unwrap();
        assert_eq!(
            back.header.value("PuSoftwareVersion").unwrap().as_str(),
            Some("v1\u{b0}\u{e9}\u{ff}\u{80}")
        );
        assert_eq!(back.to_bytes(Endian::Little, &ctx).unwrap(), bytes);

        let mut body = PuBistDatagram::new("").to_bytes(Endian::Little, &ctx).unwrap();
        body.extend_from_slice(&[b'T', 0xC5, 0xF8, b'\n', 0x90]);
        let bist = PuBistDatagram::from_bytes(DatagramKind::PuBist, &body, Endian::Little, &ctx).unwrap();
        assert_eq!(bist.to_bytes(Endian::Little, &ctx).unwrap(), body);

        // Символ вне Latin-1 не кодируется
        pu.header.set("PuSoftwareVersion", "\u{20ac}").unwrap();
        assert!(pu.to_bytes(Endian::Little, &ctx).is_err());
    }

    #[test]
    fn test_truncated_header() {
        let ctx = DecodeContext::default();
        let err =
            RuntimeDatagram::from_bytes(DatagramKind::Runtime, &[0u8; 20], Endian::Little, &ctx)
                .unwrap_err();
        assert!(matches!(err, emdgm_types::DgmError::Truncated { .. }));
    }
}
