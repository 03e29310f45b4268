//! Реестр датаграмм: отображение id типа на кодек тела.
//!
//! Набор типов закрыт. Новый тип — вариант [`DatagramKind`], структура
//! тела с [`DatagramBody`] и одна строка в `registry!` ниже; сопоставление
//! в [`decode_kind`] исчерпывающее, поэтому пропущенный тип не
//! скомпилируется.

use emdgm_types::{DatagramKind, DgmResult, Endian};
use serde::Serialize;

use crate::{
    binary::ByteWriter,
    datagram::*,
    schema::{Fields, Params, Value},
    tolerance::Mismatch,
};

macro_rules! registry {
    ($($variant:ident($ty:ty) => [$($kind:ident),+]),+ $(,)?) => {
        /// Декодированное тело датаграммы любого поддерживаемого типа.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        pub enum Datagram {
            $($variant($ty)),+
        }

        $(
            impl From<$ty> for Datagram {
                fn from(body: $ty) -> Self {
                    Datagram::$variant(body)
                }
            }
        )+

        impl Datagram {
            pub fn kind(&self) -> DatagramKind {
                match self {
                    $(Datagram::$variant(d) => d.kind()),+
                }
            }

            pub fn header(&self) -> &Fields {
                match self {
                    $(Datagram::$variant(d) => d.header()),+
                }
            }

            pub fn header_mut(&mut self) -> &mut Fields {
                match self {
                    $(Datagram::$variant(d) => d.header_mut()),+
                }
            }

            /// Параметры, с которыми кодируются под-записи тела.
            pub fn params(
                &self,
                ctx: &DecodeContext,
            ) -> DgmResult<Params> {
                match self {
                    $(Datagram::$variant(d) => d.params(ctx)),+
                }
            }

            pub fn encode(
                &self,
                w: &mut ByteWriter,
                ctx: &DecodeContext,
            ) -> DgmResult<()> {
                match self {
                    $(Datagram::$variant(d) => d.encode(w, ctx)),+
                }
            }

            /// Сдвигает числовые поля заголовка.
            pub fn shift_numeric(
                &mut self,
                delta: f64,
            ) {
                match self {
                    $(Datagram::$variant(d) => d.shift_numeric(delta)),+
                }
            }

            pub fn mismatch(
                &self,
                other: &Self,
                ctx: &DecodeContext,
            ) -> Option<Mismatch> {
                match (self, other) {
                    $((Datagram::$variant(a), Datagram::$variant(b)) => a.mismatch(b, ctx),)+
                    _ => Some(Mismatch::new(
                        "kind",
                        Value::Int(self.kind().as_u8() as i64),
                        Value::Int(other.kind().as_u8() as i64),
                        0.0,
                    )),
                }
            }
        }

        /// Декодирует тело типа `kind`.
        pub fn decode_kind(
            kind: DatagramKind,
            body: &[u8],
            endian: Endian,
            ctx: &DecodeContext,
        ) -> DgmResult<Datagram> {
            match kind {
                $(
                    $(DatagramKind::$kind)|+ => {
                        <$ty>::from_bytes(kind, body, endian, ctx).map(Datagram::$variant)
                    }
                )+
            }
        }
    };
}

registry! {
    PuId(PuIdDatagram) => [PuId],
    PuStatus(PuStatusDatagram) => [PuStatus],
    ExtraParameters(ExtraParametersDatagram) => [ExtraParameters],
    Attitude(AttitudeDatagram) => [Attitude],
    PuBist(PuBistDatagram) => [PuBist],
    Clock(ClockDatagram) => [Clock],
    Depth(DepthDatagram) => [Depth],
    SurfaceSoundSpeed(SurfaceSoundSpeedDatagram) => [SurfaceSoundSpeed],
    Installation(InstallationDatagram) => [InstallationStart, InstallationStop, InstallationRemote],
    RawRangeAngle(RawRangeDatagram) => [RawRangeAngle],
    QualityFactor(QualityFactorDatagram) => [QualityFactor],
    Position(PositionDatagram) => [Position],
    Runtime(RuntimeDatagram) => [Runtime],
    SeabedImage83(SeabedImage83Datagram) => [SeabedImage83],
    SoundSpeedProfile(SoundSpeedProfileDatagram) => [SoundSpeedProfile],
    Xyz(XyzDatagram) => [Xyz],
    SeabedImage89(SeabedImage89Datagram) => [SeabedImage89],
    RawRange102(RawRange102Datagram) => [RawRange102],
    Height(HeightDatagram) => [Height],
    WaterColumn(WaterColumnDatagram) => [WaterColumn],
    StaveData(StaveDatagram) => [StaveData],
    NetworkAttitude(NetworkAttitudeDatagram) => [NetworkAttitude],
}

impl Datagram {
    pub fn to_bytes(
        &self,
        endian: Endian,
        ctx: &DecodeContext,
    ) -> DgmResult<Vec<u8>> {
        let mut w = ByteWriter::new(endian);
        self.encode(&mut w, ctx)?;
        Ok(w.into_inner())
    }
}

/// Декодирует тело по числовому id типа. Неизвестный id —
/// `UnsupportedType`, попытки разбора нет.
pub fn decode(
    kind_id: u8,
    body: &[u8],
    endian: Endian,
    ctx: &DecodeContext,
) -> DgmResult<Datagram> {
    decode_kind(DatagramKind::from_u8(kind_id)?, body, endian, ctx)
}

/// Кодирует тело (без кадра).
pub fn encode(
    datagram: &Datagram,
    endian: Endian,
    ctx: &DecodeContext,
) -> DgmResult<Vec<u8>> {
    datagram.to_bytes(endian, ctx)
}
