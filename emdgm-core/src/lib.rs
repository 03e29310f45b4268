//! Кодек датаграмм Kongsberg EM `.all` и индекс произвольного доступа
//!
//! Файл `.all` — последовательность кадров: поле длины, STX, общий
//! заголовок, тело датаграммы, ETX и контрольная сумма. Индекс строится
//! за один проход и позволяет декодировать n-ю запись любого типа.
//!
//! # Быстрый старт
//!
//! ```no_run
//! use emdgm_core::{AllFile, DatagramKind, IndexConfig};
//!
//! let file = AllFile::open("0001_20161016_120000.all", &IndexConfig::default())?;
//! println!("{} записей", file.index().total_records());
//!
//! if let Some(rec) = file.get_record(DatagramKind::Depth, 0)? {
//!     println!("{}", rec.to_json()?);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binary;
pub mod datagram;
pub mod file;
pub mod format;
pub mod index;
pub mod record;
pub mod registry;
pub mod schema;
pub mod subrecord;
pub mod tolerance;

pub use binary::{ByteCursor, ByteWriter};
pub use datagram::*;
pub use emdgm_types::{DatagramKind, DgmError, DgmResult, Endian};
pub use file::AllFile;
pub use format::{checksum, detect_endian, probe, Frame, FrameHeader, Probe};
pub use index::*;
pub use record::Record;
pub use registry::{decode_kind, Datagram};
pub use schema::{Field, Fields, Param, Params, Raw, Rule, Schema, Table, Value};
pub use subrecord::{
    Attitude, DepthBeams, Gga, NetworkAttitude, NetworkAttitudeEntry, RawRange102Rx,
    RawRange102Tx, RawRangeRx, RawRangeTx, Samples, SeabedFormat, SeabedImage,
    SoundSpeedProfile, SubRecord, SurfaceSoundSpeeds, WaterColumnBeam, WaterColumnBeams,
    WaterColumnTx, XyzBeams,
};
pub use tolerance::{Mismatch, Tolerant};

/// Версия библиотеки.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
