//! Дальности и углы: формат 78 и старый формат 102. Оба — заголовок,
//! затем массив передающих секторов и массив приёмных лучей.

use emdgm_types::DatagramKind;

use crate::{
    schema::{Field, Raw, Rule, Schema},
    subrecord::{RawRange102Rx, RawRange102Tx, RawRangeRx, RawRangeTx},
};

pub static RAW_RANGE_HEADER: Schema = Schema::new(
    "raw range header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
        Field::new("NumberOfTxSectors", Rule::U16),
        Field::new("NumberOfRxBeams", Rule::U16),
        Field::new("ValidDetections", Rule::U16),
        Field::new("SamplingFrequency", Rule::F32),
        Field::new("Dscale", Rule::U32),
    ],
);

pub static RAW_RANGE_102_HEADER: Schema = Schema::new(
    "raw range (102) header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("NumberOfTxSectors", Rule::U16),
        Field::new("NumberOfRxBeams", Rule::U16),
        Field::new("SamplingFrequency", Rule::scaled(Raw::U32, 0.01)),
        Field::new("RovDepth", Rule::scaled(Raw::I32, 0.01)),
        Field::new("SoundSpeed", Rule::scaled(Raw::U16, 0.1)),
        Field::new("MaxBeams", Rule::U16),
        Field::new("Spare1", Rule::U16),
        Field::new("Spare2", Rule::U16),
    ],
);

/// Датаграмма из заголовка, секторов `tx` и лучей `rx`. Счётчики
/// `NumberOfTxSectors` и `NumberOfRxBeams` пересчитываются при
/// кодировании.
macro_rules! tx_rx_datagram {
    ($(#[$meta:meta])* $name:ident, $kind:expr, $schema:expr, $tx:ty, $rx:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        pub struct $name {
            pub header: $crate::schema::Fields,
            pub tx: $tx,
            pub rx: $rx,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    header: $crate::schema::Fields::zeroed(&$schema),
                    tx: <$tx>::new(),
                    rx: <$rx>::new(),
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
                use $crate::subrecord::SubRecord;

                let params = ctx.params();
                let header = $crate::schema::Fields::decode(&$schema, cur, &params)?;
                let tx = <$tx>::decode(cur, header.count("NumberOfTxSectors")?, &params)?;
                let rx = <$rx>::decode(cur, header.count("NumberOfRxBeams")?, &params)?;
                Ok(Self { header, tx, rx })
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
                    "NumberOfTxSectors",
                    count_value("NumberOfTxSectors", self.tx.count(), u16::MAX as usize)?,
                )?;
                header.set(
                    "NumberOfRxBeams",
                    count_value("NumberOfRxBeams", self.rx.count(), u16::MAX as usize)?,
                )?;
                header.encode(w, &params)?;
                self.tx.encode(w, &params)?;
                self.rx.encode(w, &params)
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
                    .or_else(|| self.tx.mismatch_within(&other.tx, &params, "tx"))
                    .or_else(|| self.rx.mismatch_within(&other.rx, &params, "rx"))
            }
        }
    };
}

tx_rx_datagram!(
    /// Дальности и углы (78).
    RawRangeDatagram,
    DatagramKind::RawRangeAngle,
    RAW_RANGE_HEADER,
    RawRangeTx,
    RawRangeRx
);

tx_rx_datagram!(
    /// Дальности и углы, старый формат (102).
    RawRange102Datagram,
    DatagramKind::RawRange102,
    RAW_RANGE_102_HEADER,
    RawRange102Tx,
    RawRange102Rx
);
