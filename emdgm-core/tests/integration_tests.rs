use std::{
    io::Write,
    sync::{atomic::AtomicBool, Arc},
};

use crossbeam_channel::bounded;
use emdgm_core::{
    build_index, build_many,
    format::{write_frame, FrameHeader},
    AllFile, Attitude, AttitudeDatagram, ByteCursor, ClockDatagram, DatagramBody, DatagramKind,
    DecodeContext, DepthBeams, DepthDatagram, DgmError, Endian, ExtraContent,
    ExtraParametersDatagram, GapReason, Gga, HeightDatagram, IndexBuilder, IndexConfig,
    IndexProgress, InstallationDatagram, NetworkAttitude, NetworkAttitudeDatagram,
    NetworkAttitudeEntry, Param, Params, PositionDatagram, PuBistDatagram, PuIdDatagram,
    PuStatusDatagram, QualityFactorDatagram, RawRange102Datagram, RawRange102Rx,
    RawRange102Tx, RawRangeDatagram, RawRangeRx, RawRangeTx, Record, RuntimeDatagram,
    SeabedFormat, SeabedImage, SeabedImage83Datagram, SeabedImage89Datagram, SoundSpeedProfile,
    SoundSpeedProfileDatagram, StaveDatagram, SubRecord, SurfaceSoundSpeedDatagram,
    SurfaceSoundSpeeds, Tolerant, WaterColumnBeam, WaterColumnBeams, WaterColumnDatagram,
    WaterColumnTx, XyzBeams, XyzDatagram,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tempfile::NamedTempFile;

// ===========================================================================
// Helpers — детерминированные тест-данные
// ===========================================================================

/// 2016-10-16 18:43:28 UTC
const T0: f64 = 1_476_643_408.0;

const MODEL: u16 = 2040;

const GGA: &[u8] = b"$GPGGA,184328.00,5957.123456,N,01043.654321,E,2,12,0.8,12.345,M,41.210,M,3.0,0120*";

/// Сообщение GGA с верной контрольной суммой NMEA.
fn gga_sentence() -> Vec<u8> {
    let sum = GGA[1..GGA.len() - 1].iter().fold(0u8, |a, b| a ^ b);
    let mut s = GGA.to_vec();
    s.extend(format!("{sum:02X}\r\n").bytes());
    s
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn record(
    body: impl Into<emdgm_core::Datagram>,
    n: usize,
) -> Record {
    Record::at_time(body, MODEL, T0 + n as f64 * 0.5).unwrap()
}

/// По одной записи каждого поддерживаемого типа с заполненными
/// под-записями.
fn sample_records() -> Vec<Record> {
    let mut out = Vec::new();

    let mut pu_id = PuIdDatagram::new();
    pu_id.header.set("SystemSerialNumber", 217).unwrap();
    pu_id.header.set("PuSoftwareVersion", "1.2.3").unwrap();
    out.push(record(pu_id, 0));

    let mut pu_status = PuStatusDatagram::new();
    pu_status.header.set("PingRate", 2.5).unwrap();
    pu_status.header.set("PpsStatus", -1).unwrap();
    out.push(record(pu_status, 1));

    let extra = ExtraParametersDatagram::new(
        6,
        ExtraContent::Text("# bscorr\n1 2 -3.5\n4 5 6\n".into()),
    )
    .unwrap();
    out.push(record(extra, 2));

    let mut attitude = AttitudeDatagram::new();
    for i in 0..4 {
        attitude
            .attitude
            .push(
                Attitude::row()
                    .with("Time", T0 + 3.0 + 0.01 * i as f64)
                    .unwrap()
                    .with("Roll", -0.25 * i as f64)
                    .unwrap()
                    .with("Heading", 181.5)
                    .unwrap(),
            )
            .unwrap();
    }
    out.push(record(attitude, 3));

    out.push(record(PuBistDatagram::new("TX36 OK\nRX32 OK"), 4));

    let mut clock = ClockDatagram::new();
    clock.header.set("ExternalDate", 20161016).unwrap();
    clock.header.set("ExternalTimeMs", 67_410_500).unwrap();
    out.push(record(clock, 5));

    let mut depth = DepthDatagram::new(1, 2).unwrap();
    depth.header.set("Heading", 90.25).unwrap();
    for i in 0..3 {
        depth
            .beams
            .push(
                DepthBeams::row()
                    .with("Depth", 25.0 + 0.01 * i as f64)
                    .unwrap()
                    .with("AcrossTrack", -4.0 + 2.0 * i as f64)
                    .unwrap()
                    .with("BeamNumber", i + 1)
                    .unwrap(),
            )
            .unwrap();
    }
    out.push(record(depth, 6));

    let mut sss = SurfaceSoundSpeedDatagram::new();
    sss.entries
        .push(
            SurfaceSoundSpeeds::row()
                .with("Time", T0 + 5.5)
                .unwrap()
                .with("SoundSpeed", 1482.3)
                .unwrap(),
        )
        .unwrap();
    out.push(record(sss, 7));

    for (i, kind) in [
        DatagramKind::InstallationStart,
        DatagramKind::InstallationStop,
        DatagramKind::InstallationRemote,
    ]
    .into_iter()
    .enumerate()
    {
        let inst = InstallationDatagram::new(kind)
            .unwrap()
            .with_settings([("WLZ", "0.12"), ("SMH", "122"), ("S1Z", "3.5")]);
        out.push(record(inst, 8 + i));
    }

    let mut raw = RawRangeDatagram::new();
    raw.header.set("SoundSpeed", 1480.0).unwrap();
    raw.tx
        .push(RawRangeTx::row().with("TiltAngle", -1.25).unwrap())
        .unwrap();
    for b in 0..2 {
        raw.rx
            .push(
                RawRangeRx::row()
                    .with("BeamPointingAngle", 45.0 - b as f64)
                    .unwrap()
                    .with("TwoWayTravelTime", 0.035)
                    .unwrap(),
            )
            .unwrap();
    }
    out.push(record(raw, 11));

    let mut quality = QualityFactorDatagram::new(2).unwrap();
    quality.push_beam(&[0.5, 1.25]).unwrap();
    quality.push_beam(&[0.75, 2.0]).unwrap();
    out.push(record(quality, 12));

    let mut position = PositionDatagram::new(gga_sentence());
    position.header.set("Latitude", 59.95205760).unwrap();
    position.header.set("Longitude", 10.7275720).unwrap();
    position.header.set("Heading", 12.5).unwrap();
    out.push(record(position, 13));

    let mut runtime = RuntimeDatagram::new();
    runtime.header.set("PingCounter", 4321).unwrap();
    out.push(record(runtime, 14));

    let mut seabed83 = SeabedImage83Datagram::new();
    let beam = seabed83.image.beam().with("BeamIndex", 7).unwrap();
    seabed83
        .image
        .push_beam(beam, &[-20.0, -20.5, -21.0])
        .unwrap();
    out.push(record(seabed83, 15));

    let mut ssp = SoundSpeedProfileDatagram::new(1).unwrap();
    ssp.header.set("ProfileDate", 20161015).unwrap();
    ssp.header.set("ProfileTimeMs", 43_200_000).unwrap();
    for (z, c) in [(0.5, 1480.1), (10.0, 1479.4), (55.25, 1476.0)] {
        ssp.profile
            .push(
                SoundSpeedProfile::row()
                    .with("Depth", z)
                    .unwrap()
                    .with("SoundSpeed", c)
                    .unwrap(),
            )
            .unwrap();
    }
    out.push(record(ssp, 16));

    let mut xyz = XyzDatagram::new();
    xyz.beams
        .push(
            XyzBeams::row()
                .with("Depth", 31.5)
                .unwrap()
                .with("AcrossTrack", -12.25)
                .unwrap()
                .with("Reflectivity", -22.4)
                .unwrap(),
        )
        .unwrap();
    out.push(record(xyz, 17));

    let mut seabed89 = SeabedImage89Datagram::new();
    seabed89.header.set("SamplingFrequency", 15_625.0).unwrap();
    for b in 0..2 {
        let beam = seabed89.image.beam().with("SortingDirection", -1).unwrap();
        let samples: Vec<f64> = (0..b + 2).map(|i| -30.0 + 0.1 * i as f64).collect();
        seabed89.image.push_beam(beam, &samples).unwrap();
    }
    out.push(record(seabed89, 18));

    let mut raw102 = RawRange102Datagram::new();
    raw102.header.set("RovDepth", -3.5).unwrap();
    raw102
        .tx
        .push(RawRange102Tx::row().with("CentreFrequency", 300_000).unwrap())
        .unwrap();
    raw102
        .rx
        .push(RawRange102Rx::row().with("BeamNumber", -12).unwrap())
        .unwrap();
    out.push(record(raw102, 19));

    let mut height = HeightDatagram::new();
    height.header.set("Height", -1.23).unwrap();
    out.push(record(height, 20));

    let mut wc = WaterColumnDatagram::new();
    wc.header.set("NumberOfDatagrams", 1).unwrap();
    wc.tx
        .push(WaterColumnTx::row().with("TiltAngle", 0.5).unwrap())
        .unwrap();
    for b in 0..3 {
        wc.beams.beams.push(WaterColumnBeam::new(
            WaterColumnBeam::row().with("BeamNumber", b).unwrap(),
            vec![-50.0, -49.5, -49.0 + b as f64],
        ));
    }
    out.push(record(wc, 21));

    let mut stave = StaveDatagram::new(2).unwrap();
    stave
        .samples
        .values_mut()
        .extend([-10.0, -10.5, -11.0, -11.5]);
    out.push(record(stave, 22));

    let mut net = NetworkAttitudeDatagram::new();
    net.header.set("SensorSystemDescriptor", -96).unwrap();
    net.attitude.entries.push(NetworkAttitudeEntry::new(
        NetworkAttitude::row()
            .with("Time", T0 + 23.0)
            .unwrap()
            .with("Pitch", 0.75)
            .unwrap(),
        vec![0x90, 0x90, 1, 2, 3],
    ));
    out.push(record(net, 23));

    out
}

fn build_file(
    records: &[Record],
    endian: Endian,
) -> Vec<u8> {
    records
        .iter()
        .flat_map(|r| r.to_bytes_with(endian).unwrap())
        .collect()
}

// ===========================================================================
// Кадр и индекс
// ===========================================================================

#[test]
fn test_sample_covers_every_kind() {
    let kinds: Vec<_> = sample_records().iter().map(|r| r.kind()).collect();
    for kind in DatagramKind::ALL {
        assert!(kinds.contains(&kind), "нет записи типа {kind}");
    }
}

#[test]
fn test_frame_lengths_and_checksums() {
    for rec in sample_records() {
        let bytes = rec.to_bytes().unwrap();
        let len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        assert_eq!(len + 4, bytes.len(), "{}", rec.kind());
        // Тело вместе с заголовком и хвостом всегда чётной длины
        assert_eq!(len % 2, 0, "{}", rec.kind());
        assert_eq!(bytes[4], 0x02);
        assert_eq!(bytes[5], rec.kind().as_u8());
        assert_eq!(bytes[bytes.len() - 3], 0x03);
    }
}

#[test]
fn test_index_counts_and_offsets() {
    init_logger();
    let records = sample_records();
    let data = build_file(&records, Endian::Little);
    let index = build_index(&data).unwrap();

    assert_eq!(index.total_records(), records.len());
    assert!(index.gaps().is_empty());
    assert!(index.is_complete());
    assert_eq!(index.bytes_scanned(), data.len() as u64);

    let mut expected_offset = 0u64;
    for (rec, (kind, entry)) in records.iter().zip(index.iter()) {
        assert_eq!(kind, rec.kind());
        assert_eq!(entry.offset, expected_offset);
        expected_offset = entry.end();
    }

    assert_eq!(index.count(DatagramKind::Depth), 1);
    assert!(index
        .get_record(&data, DatagramKind::Depth, 1)
        .unwrap()
        .is_none());
    assert_eq!(index.count(DatagramKind::Xyz), 1);
    assert_eq!(index.count(DatagramKind::Height), 1);
}

#[test]
fn test_round_trip_every_kind_both_orders() {
    init_logger();
    for endian in [Endian::Little, Endian::Big] {
        let data = build_file(&sample_records(), endian);
        let index = build_index(&data).unwrap();
        assert_eq!(index.endian(), endian);

        for (kind, entry) in index.iter() {
            let bytes = &data[entry.offset as usize..entry.end() as usize];
            let rec = Record::from_bytes(bytes, endian).unwrap();
            assert_eq!(rec.kind(), kind);
            assert_eq!(rec.to_bytes().unwrap(), bytes, "{kind} ({endian})");

            let again = Record::from_bytes(&rec.to_bytes().unwrap(), endian).unwrap();
            assert!(rec.approx_eq(&again), "{kind}: {:?}", rec.mismatch(&again));
        }
    }
}

#[test]
fn test_jiggle_every_kind() {
    let data = build_file(&sample_records(), Endian::Little);
    let file = AllFile::from_bytes(data, &IndexConfig::default()).unwrap();

    for (kind, _) in file.index().iter() {
        let original = file.get_record(kind, 0).unwrap().unwrap();

        let mut shifted = original.clone();
        shifted.shift_numeric(1.0);
        let mut back = Record::from_bytes(&shifted.to_bytes().unwrap(), Endian::Little).unwrap();
        back.shift_numeric(-1.0);
        let back = Record::from_bytes(&back.to_bytes().unwrap(), Endian::Little).unwrap();

        assert!(
            original.approx_eq(&back),
            "{kind}: {:?}",
            original.mismatch(&back)
        );
    }
}

#[test]
fn test_jiggle_is_detected() {
    let rec = sample_records()
        .into_iter()
        .find(|r| r.kind() == DatagramKind::Height)
        .unwrap();
    let mut shifted = rec.clone();
    shifted.shift_numeric(1.0);
    let m = rec.mismatch(&shifted).unwrap();
    assert_eq!(m.path, "body.header.Height");
}

#[test]
fn test_resync_over_random_garbage() {
    init_logger();
    let records = sample_records();
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let mut data = Vec::new();
    for rec in &records {
        let garbage: Vec<u8> = (0..rng.gen_range(1..40))
            .map(|_| rng.gen_range(0x10..0xF0))
            .collect();
        data.extend(garbage);
        data.extend(rec.to_bytes().unwrap());
    }

    let index = IndexBuilder::new(IndexConfig {
        byte_order: Some(Endian::Little),
        ..IndexConfig::default()
    })
    .build(&data)
    .unwrap();

    assert_eq!(index.total_records(), records.len());
    assert_eq!(index.gaps().len(), records.len());
    assert!(index
        .gaps()
        .iter()
        .all(|g| g.reason == GapReason::Framing));

    let covered: u64 = index.iter().map(|(_, e)| e.length as u64).sum::<u64>()
        + index.gaps().iter().map(|g| g.length).sum::<u64>();
    assert_eq!(covered, data.len() as u64);
}

#[test]
fn test_corrupted_record_skipped() {
    let records = sample_records();
    let mut data = build_file(&records, Endian::Little);
    let index = build_index(&data).unwrap();
    let victim = index.entry(DatagramKind::Clock, 0).unwrap();
    data[victim.offset as usize + 20] ^= 0x5A;

    let index = build_index(&data).unwrap();
    assert_eq!(index.count(DatagramKind::Clock), 0);
    assert_eq!(index.total_records(), records.len() - 1);
    assert_eq!(index.gaps()[0].offset, victim.offset);

    // Без проверки суммы запись снова видна
    let lax = IndexBuilder::new(IndexConfig {
        verify_checksum: false,
        ..IndexConfig::default()
    })
    .build(&data)
    .unwrap();
    assert_eq!(lax.count(DatagramKind::Clock), 1);
}

#[test]
fn test_unsupported_type_recorded_as_gap() {
    let mut data = build_file(&sample_records()[..2], Endian::Little);
    let header = FrameHeader {
        kind_id: 0x6B,
        model: MODEL,
        date: 20161016,
        time_ms: 0,
    };
    let unknown = write_frame(&header, &[0u8; 10], Endian::Little).unwrap();
    let at = data.len() as u64;
    data.extend(&unknown);
    data.extend(sample_records()[5].to_bytes().unwrap());

    let index = build_index(&data).unwrap();
    assert_eq!(index.total_records(), 3);
    assert_eq!(index.gaps().len(), 1);
    assert_eq!(index.gaps()[0].offset, at);
    assert_eq!(index.gaps()[0].length, unknown.len() as u64);
    assert_eq!(index.gaps()[0].reason, GapReason::Unsupported(0x6B));
}

#[test]
fn test_truncated_tail() {
    let records = sample_records();
    let data = build_file(&records, Endian::Little);
    let cut = &data[..data.len() - 7];

    let index = build_index(cut).unwrap();
    assert_eq!(index.total_records(), records.len() - 1);
    let tail = index.gaps().last().unwrap();
    assert_eq!(tail.offset + tail.length, cut.len() as u64);

    let last = records.last().unwrap().to_bytes().unwrap();
    let err = Record::from_bytes(&last[..last.len() - 7], Endian::Little).unwrap_err();
    assert!(err.is_recoverable());
}

#[test]
fn test_truncated_body_reports_sizes() {
    let depth = sample_records()
        .into_iter()
        .find(|r| r.kind() == DatagramKind::Depth)
        .unwrap();
    let ctx = depth.context();
    let body = depth.body.to_bytes(Endian::Little, &ctx).unwrap();
    let err = DepthDatagram::from_bytes(DatagramKind::Depth, &body[..20], Endian::Little, &ctx)
        .unwrap_err();
    assert!(matches!(
        err,
        DgmError::Truncated {
            needed: 48,
            available: 4,
            ..
        }
    ));
}

// ===========================================================================
// Под-записи отдельно
// ===========================================================================

#[test]
fn test_standalone_subrecords() {
    let params = Params::new()
        .with(Param::ZResolution, 0.01)
        .with(Param::XyResolution, 0.02);

    let mut beams = DepthBeams::new();
    beams
        .push(DepthBeams::row().with("Depth", 12.34).unwrap())
        .unwrap();
    beams
        .push(DepthBeams::row().with("AlongTrack", -0.5).unwrap())
        .unwrap();

    for endian in [Endian::Little, Endian::Big] {
        let bytes = beams.to_bytes(endian, &params).unwrap();
        let mut padded = bytes.clone();
        padded.extend([0xAA, 0xBB]);
        let (back, used) = DepthBeams::from_bytes(&padded, 2, endian, &params).unwrap();
        assert_eq!(used, bytes.len());
        assert_eq!(back.count(), 2);
        approx::assert_abs_diff_eq!(back.rows()[0].f64("Depth").unwrap(), 12.34, epsilon = 0.005);
    }

    // Без разрешения глубины декодирование невозможно
    let bytes = beams.to_bytes(Endian::Little, &params).unwrap();
    let err = DepthBeams::from_bytes(&bytes, 2, Endian::Little, &Params::new()).unwrap_err();
    assert!(matches!(err, DgmError::MissingContext(_)));
}

#[test]
fn test_position_gga_view() {
    let file = AllFile::from_bytes(
        build_file(&sample_records(), Endian::Little),
        &IndexConfig::default(),
    )
    .unwrap();
    let rec = file.get_record(DatagramKind::Position, 0).unwrap().unwrap();
    let emdgm_core::Datagram::Position(pos) = &rec.body else {
        panic!("ожидалась датаграмма позиции");
    };
    assert_eq!(pos.input(), gga_sentence().as_slice());
    let gga = pos.gga().unwrap();
    assert_eq!(gga.talker, "GP");
    assert_eq!(gga.satellites, 12);
    approx::assert_abs_diff_eq!(pos.header.f64("Latitude").unwrap(), 59.9520576, epsilon = 5e-8);
}

#[test]
fn test_installation_settings_survive() {
    let file = AllFile::from_bytes(
        build_file(&sample_records(), Endian::Big),
        &IndexConfig::default(),
    )
    .unwrap();
    for kind in [
        DatagramKind::InstallationStart,
        DatagramKind::InstallationStop,
        DatagramKind::InstallationRemote,
    ] {
        let rec = file.get_record(kind, 0).unwrap().unwrap();
        let emdgm_core::Datagram::Installation(inst) = &rec.body else {
            panic!("ожидалась датаграмма установки");
        };
        assert_eq!(inst.kind(), kind);
        assert_eq!(inst.setting("SMH"), Some("122"));
    }
}

#[test]
fn test_missing_time_context() {
    let mut att = AttitudeDatagram::new();
    att.attitude
        .push(Attitude::row().with("Time", T0).unwrap())
        .unwrap();
    let ctx = DecodeContext::new(MODEL, None);
    let err = att.to_bytes(Endian::Little, &ctx).unwrap_err();
    assert!(matches!(err, DgmError::MissingContext(_)));
}

/// +1 → кодирование → декодирование → −1 → кодирование → декодирование
/// в обоих порядках байт.
fn jiggle_standalone<T>(
    name: &str,
    original: &T,
    params: &Params,
) where
    T: SubRecord + Tolerant + Clone + std::fmt::Debug,
{
    for endian in [Endian::Little, Endian::Big] {
        let mut shifted = original.clone();
        shifted.shift_numeric(1.0);
        let bytes = shifted.to_bytes(endian, params).unwrap();
        let (mut back, used) = T::from_bytes(&bytes, shifted.count(), endian, params).unwrap();
        assert_eq!(used, bytes.len(), "{name} ({endian})");
        assert!(
            !original.approx_eq(&back, params),
            "{name} ({endian}): сдвиг не виден"
        );

        back.shift_numeric(-1.0);
        let bytes = back.to_bytes(endian, params).unwrap();
        let (back, _) = T::from_bytes(&bytes, back.count(), endian, params).unwrap();
        assert!(
            original.approx_eq(&back, params),
            "{name} ({endian}): {:?}",
            original.mismatch(&back, params)
        );
    }
}

#[test]
fn test_jiggle_every_subrecord_family() {
    let params = Params::new()
        .with(Param::RecordTime, T0)
        .with(Param::ZResolution, 0.01)
        .with(Param::XyResolution, 0.02)
        .with(Param::DepthResolution, 0.01);

    let mut attitude = Attitude::new();
    for i in 0..3 {
        attitude
            .push(
                Attitude::row()
                    .with("Time", T0 + 0.5 + 0.01 * i as f64)
                    .unwrap()
                    .with("Roll", -0.25 * i as f64)
                    .unwrap()
                    .with("Heave", 0.12)
                    .unwrap()
                    .with("Heading", 181.5)
                    .unwrap(),
            )
            .unwrap();
    }
    jiggle_standalone("attitude", &attitude, &params);

    let network = NetworkAttitude {
        entries: vec![
            NetworkAttitudeEntry::new(
                NetworkAttitude::row()
                    .with("Time", T0 + 0.25)
                    .unwrap()
                    .with("Pitch", 0.75)
                    .unwrap(),
                vec![0x90, 0x90, 1, 2, 3],
            ),
            NetworkAttitudeEntry::new(NetworkAttitude::row().with("Time", T0).unwrap(), Vec::new()),
        ],
    };
    jiggle_standalone("network attitude", &network, &params);

    let mut depth = DepthBeams::new();
    for i in 0..3 {
        depth
            .push(
                DepthBeams::row()
                    .with("Depth", 25.0 + 0.01 * i as f64)
                    .unwrap()
                    .with("AcrossTrack", -4.0 + 2.0 * i as f64)
                    .unwrap()
                    .with("BeamAzimuthAngle", 90.5)
                    .unwrap()
                    .with("Reflectivity", -20.5)
                    .unwrap(),
            )
            .unwrap();
    }
    jiggle_standalone("depth beams", &depth, &params);

    let mut xyz = XyzBeams::new();
    xyz.push(
        XyzBeams::row()
            .with("Depth", 31.5)
            .unwrap()
            .with("AcrossTrack", -12.25)
            .unwrap()
            .with("IncidenceAngleAdjustment", -0.3)
            .unwrap()
            .with("Reflectivity", -22.4)
            .unwrap(),
    )
    .unwrap();
    jiggle_standalone("xyz beams", &xyz, &params);

    let mut tx = RawRangeTx::new();
    tx.push(
        RawRangeTx::row()
            .with("TiltAngle", -1.25)
            .unwrap()
            .with("SignalLength", 0.002)
            .unwrap()
            .with("CentreFrequency", 300_000.0)
            .unwrap(),
    )
    .unwrap();
    jiggle_standalone("raw range tx", &tx, &params);

    let mut rx = RawRangeRx::new();
    for b in 0..2 {
        rx.push(
            RawRangeRx::row()
                .with("BeamPointingAngle", 45.0 - b as f64)
                .unwrap()
                .with("TwoWayTravelTime", 0.035)
                .unwrap()
                .with("Dcorr", -2)
                .unwrap(),
        )
        .unwrap();
    }
    jiggle_standalone("raw range rx", &rx, &params);

    // Ширина полосы кодируется шагом 10 Гц, поэтому берётся кратное значение
    let mut tx102 = RawRange102Tx::new();
    tx102
        .push(
            RawRange102Tx::row()
                .with("TiltAngle", 0.75)
                .unwrap()
                .with("SignalBandwidth", 1_000.0)
                .unwrap(),
        )
        .unwrap();
    jiggle_standalone("raw range 102 tx", &tx102, &params);

    let mut rx102 = RawRange102Rx::new();
    rx102
        .push(
            RawRange102Rx::row()
                .with("BeamNumber", -12)
                .unwrap()
                .with("TwoWayTravelTime", 120.25)
                .unwrap(),
        )
        .unwrap();
    jiggle_standalone("raw range 102 rx", &rx102, &params);

    let mut wc_tx = WaterColumnTx::new();
    wc_tx
        .push(
            WaterColumnTx::row()
                .with("TiltAngle", 0.5)
                .unwrap()
                .with("CentreFrequency", 300_000.0)
                .unwrap(),
        )
        .unwrap();
    jiggle_standalone("water column tx", &wc_tx, &params);

    let wc_beams = WaterColumnBeams {
        beams: (0..3)
            .map(|b| {
                WaterColumnBeam::new(
                    WaterColumnBeam::row()
                        .with("BeamPointingAngle", -30.0 + 30.0 * b as f64)
                        .unwrap(),
                    vec![-50.0, -49.5, -49.0 + b as f64],
                )
            })
            .collect(),
    };
    jiggle_standalone("water column beams", &wc_beams, &params);

    let mut surface = SurfaceSoundSpeeds::new();
    surface
        .push(
            SurfaceSoundSpeeds::row()
                .with("Time", T0 + 5.0)
                .unwrap()
                .with("SoundSpeed", 1482.3)
                .unwrap(),
        )
        .unwrap();
    jiggle_standalone("surface sound speed", &surface, &params);

    let mut profile = SoundSpeedProfile::new();
    for (z, c) in [(0.5, 1480.1), (10.0, 1479.4), (55.25, 1476.0)] {
        profile
            .push(
                SoundSpeedProfile::row()
                    .with("Depth", z)
                    .unwrap()
                    .with("SoundSpeed", c)
                    .unwrap(),
            )
            .unwrap();
    }
    jiggle_standalone("sound speed profile", &profile, &params);

    let gga = Gga::parse(&gga_sentence()).unwrap();
    jiggle_standalone("gga", &gga, &params);

    // SubRecord::decode читает формат 89
    jiggle_standalone("seabed image 89", &seabed_image(SeabedFormat::Packed), &params);
}

fn seabed_image(format: SeabedFormat) -> SeabedImage {
    let mut image = SeabedImage::new(format);
    for b in 0..2 {
        let beam = image.beam().with("SortingDirection", -1).unwrap();
        let samples: Vec<f64> = (0..b + 2).map(|i| -30.0 + 0.5 * i as f64).collect();
        image.push_beam(beam, &samples).unwrap();
    }
    image
}

#[test]
fn test_jiggle_seabed_image_83() {
    let params = Params::new();
    let original = seabed_image(SeabedFormat::Old);
    let decode = |bytes: &[u8], endian| {
        let mut cur = ByteCursor::new(bytes, endian);
        SeabedImage::decode_with(SeabedFormat::Old, &mut cur, original.count(), &params).unwrap()
    };

    for endian in [Endian::Little, Endian::Big] {
        let mut shifted = original.clone();
        shifted.shift_numeric(1.0);
        let mut back = decode(&shifted.to_bytes(endian, &params).unwrap(), endian);
        assert_eq!(back.samples.values()[0], -29.0);
        assert!(!original.approx_eq(&back, &params));

        back.shift_numeric(-1.0);
        let back = decode(&back.to_bytes(endian, &params).unwrap(), endian);
        assert!(
            original.approx_eq(&back, &params),
            "{endian}: {:?}",
            original.mismatch(&back, &params)
        );
        // Шаг 0.5 дБ: значения восстанавливаются точно
        assert_eq!(back.samples.values(), original.samples.values());
    }
}

// ===========================================================================
// Построитель индекса: остановка, прогресс, параллельность
// ===========================================================================

#[test]
fn test_stop_flag_before_start() {
    let data = build_file(&sample_records(), Endian::Little);
    let stop = Arc::new(AtomicBool::new(true));
    let index = IndexBuilder::new(IndexConfig::default())
        .with_stop_flag(stop)
        .build(&data)
        .unwrap();
    assert_eq!(index.total_records(), 0);
    assert!(!index.is_complete());
}

#[test]
fn test_progress_over_channel() {
    let mut data = Vec::new();
    for _ in 0..20 {
        data.extend(build_file(&sample_records(), Endian::Little));
    }

    let (tx, rx) = bounded::<IndexProgress>(1024);
    let index = IndexBuilder::new(IndexConfig {
        progress_every_bytes: 4096,
        ..IndexConfig::default()
    })
    .with_progress_channel(tx)
    .build(&data)
    .unwrap();

    let reports: Vec<_> = rx.try_iter().collect();
    assert!(reports.len() >= 2);
    let last = reports.last().unwrap();
    assert_eq!(last.bytes_scanned, data.len() as u64);
    assert_eq!(last.records, index.total_records());
}

#[test]
fn test_full_progress_channel_does_not_block() {
    let data = build_file(&sample_records(), Endian::Little);
    let (tx, rx) = bounded::<IndexProgress>(1);
    let index = IndexBuilder::new(IndexConfig {
        progress_every_bytes: 16,
        ..IndexConfig::default()
    })
    .with_progress_channel(tx)
    .build(&data)
    .unwrap();
    assert!(index.is_complete());
    assert_eq!(rx.try_iter().count(), 1);
}

#[test]
fn test_build_many_matches_sequential() {
    let little = build_file(&sample_records(), Endian::Little);
    let big = build_file(&sample_records(), Endian::Big);
    let junk = vec![0u8; 100];

    let results = build_many(&[&little, &big, &junk], &IndexConfig::default());
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap(), &build_index(&little).unwrap());
    assert_eq!(results[1].as_ref().unwrap().endian(), Endian::Big);
    let junk_index = results[2].as_ref().unwrap();
    assert_eq!(junk_index.total_records(), 0);
    assert_eq!(junk_index.gaps().len(), 1);
}

#[test]
fn test_open_file_from_disk() {
    init_logger();
    let records = sample_records();
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(&build_file(&records, Endian::Little)).unwrap();
    tmp.flush().unwrap();

    let file = AllFile::open(tmp.path(), &IndexConfig::default()).unwrap();
    assert_eq!(file.index().total_records(), records.len());

    let attitude: Vec<_> = file
        .records(DatagramKind::Attitude)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(attitude.len(), 1);
    assert_eq!(attitude[0].time(), Some(T0 + 1.5));

    let summary = serde_json::to_value(file.index().summary()).unwrap();
    assert_eq!(summary["total_records"], records.len());
    assert_eq!(summary["complete"], true);
}

#[test]
fn test_open_missing_file() {
    let err = AllFile::open("/nonexistent/dir/file.all", &IndexConfig::default()).unwrap_err();
    assert!(matches!(err, DgmError::Io(_)));
}
