//! Индекс файла: однократное сканирование кадров и доступ к n-й записи
//! типа без повторного чтения.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Instant,
};

use crossbeam_channel::{Sender, TrySendError};
use emdgm_types::{DatagramKind, DgmError, DgmResult, Endian};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    format::{detect_endian, probe, Frame, Probe},
    record::Record,
};

/// Сколько байт от начала файла просматривается при определении
/// порядка байт.
pub const ENDIAN_SEARCH_LIMIT: usize = 1024 * 1024;

/// Положение записи в файле.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub offset: u64,
    /// Полный размер кадра, включая поле длины
    pub length: usize,
}

impl IndexEntry {
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

impl From<Frame> for IndexEntry {
    fn from(frame: Frame) -> Self {
        Self {
            offset: frame.offset,
            length: frame.length,
        }
    }
}

/// Причина пропуска участка файла.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GapReason {
    /// В этих байтах не найдено ни одного корректного кадра
    Framing,
    /// Корректный кадр неподдерживаемого типа
    Unsupported(u8),
}

/// Участок файла, не вошедший в индекс.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Gap {
    pub offset: u64,
    pub length: u64,
    pub reason: GapReason,
}

/// Настройки построения индекса.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Шаг продвижения после некорректного кадра (байт)
    pub resync_step: usize,
    /// Проверять контрольную сумму кадров
    pub verify_checksum: bool,
    /// Период отчётов о прогрессе (байт)
    pub progress_every_bytes: u64,
    /// Ограничение числа записей (0 = без ограничения)
    pub max_records: usize,
    /// Порядок байт (None = определить по первому кадру)
    pub byte_order: Option<Endian>,
}

impl IndexConfig {
    pub fn validate(&self) -> DgmResult<()> {
        if self.resync_step == 0 {
            return Err(DgmError::format_violation("resync_step must be at least 1"));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            resync_step: 1,
            verify_checksum: true,
            progress_every_bytes: 1024 * 1024,
            max_records: 0,
            byte_order: None,
        }
    }
}

/// Состояние сканирования для отчёта о прогрессе.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexProgress {
    pub bytes_scanned: u64,
    pub total_bytes: u64,
    pub records: usize,
}

impl IndexProgress {
    /// Доля просмотренного файла, 0.0..=1.0.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            1.0
        } else {
            self.bytes_scanned as f64 / self.total_bytes as f64
        }
    }
}

/// Получатель отчётов о прогрессе. Не должен блокировать сканирование.
pub trait ProgressSink {
    fn report(
        &mut self,
        progress: &IndexProgress,
    );
}

impl<F: FnMut(&IndexProgress)> ProgressSink for F {
    fn report(
        &mut self,
        progress: &IndexProgress,
    ) {
        self(progress)
    }
}

impl ProgressSink for Sender<IndexProgress> {
    fn report(
        &mut self,
        progress: &IndexProgress,
    ) {
        // Полный канал: отчёт теряется
        if let Err(TrySendError::Disconnected(_)) = self.try_send(*progress) {
            debug!("progress receiver disconnected");
        }
    }
}

/// Количество записей по типам.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub byte_order: Endian,
    pub total_records: usize,
    pub counts: BTreeMap<u8, usize>,
    pub gaps: usize,
    pub gap_bytes: u64,
    pub complete: bool,
}

/// Индекс одного файла.
#[derive(Debug, Clone, PartialEq)]
pub struct FileIndex {
    endian: Endian,
    table: Vec<Vec<IndexEntry>>,
    /// (id типа, номер записи этого типа) в порядке следования в файле
    sequence: Vec<(u8, u32)>,
    gaps: Vec<Gap>,
    bytes_scanned: u64,
    total_bytes: u64,
    complete: bool,
    verify_checksum: bool,
}

////////////////////////////////////////////////////////////////////////////////
// FileIndex
////////////////////////////////////////////////////////////////////////////////

impl FileIndex {
    fn empty(
        endian: Endian,
        total_bytes: u64,
        verify_checksum: bool,
    ) -> Self {
        Self {
            endian,
            table: vec![Vec::new(); 256],
            sequence: Vec::new(),
            gaps: Vec::new(),
            bytes_scanned: 0,
            total_bytes,
            complete: true,
            verify_checksum,
        }
    }

    fn push(
        &mut self,
        frame: Frame,
    ) {
        let slot = &mut self.table[frame.kind_id as usize];
        self.sequence.push((frame.kind_id, slot.len() as u32));
        slot.push(frame.into());
    }

    /// Добавляет пропуск; соседние пропуски кадрирования сливаются.
    fn push_gap(
        &mut self,
        gap: Gap,
    ) {
        if let Some(last) = self.gaps.last_mut() {
            if last.reason == GapReason::Framing
                && gap.reason == GapReason::Framing
                && last.offset + last.length == gap.offset
            {
                last.length += gap.length;
                return;
            }
        }
        self.gaps.push(gap);
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn count(
        &self,
        kind: DatagramKind,
    ) -> usize {
        self.table[kind.as_u8() as usize].len()
    }

    pub fn entries(
        &self,
        kind: DatagramKind,
    ) -> &[IndexEntry] {
        &self.table[kind.as_u8() as usize]
    }

    /// Положение `n`-й (с нуля) записи типа.
    pub fn entry(
        &self,
        kind: DatagramKind,
        n: usize,
    ) -> Option<IndexEntry> {
        self.entries(kind).get(n).copied()
    }

    pub fn total_records(&self) -> usize {
        self.sequence.len()
    }

    /// Типы, встретившиеся в файле.
    pub fn kinds(&self) -> impl Iterator<Item = DatagramKind> + '_ {
        DatagramKind::ALL
            .into_iter()
            .filter(move |&k| self.count(k) > 0)
    }

    /// Все записи в порядке следования в файле.
    pub fn iter(&self) -> impl Iterator<Item = (DatagramKind, IndexEntry)> + '_ {
        self.sequence.iter().filter_map(move |&(id, n)| {
            let kind = DatagramKind::from_u8(id).ok()?;
            Some((kind, self.table[id as usize][n as usize]))
        })
    }

    pub fn gaps(&self) -> &[Gap] {
        &self.gaps
    }

    pub fn bytes_scanned(&self) -> u64 {
        self.bytes_scanned
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// `false`, если сканирование было остановлено досрочно.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            byte_order: self.endian,
            total_records: self.total_records(),
            counts: self
                .kinds()
                .map(|k| (k.as_u8(), self.count(k)))
                .collect(),
            gaps: self.gaps.len(),
            gap_bytes: self.gaps.iter().map(|g| g.length).sum(),
            complete: self.complete,
        }
    }

    /// Байты записи из буфера, по которому построен индекс.
    pub fn slice<'a>(
        &self,
        data: &'a [u8],
        entry: IndexEntry,
    ) -> DgmResult<&'a [u8]> {
        if data.len() as u64 != self.total_bytes {
            return Err(DgmError::format_violation(format!(
                "index was built for {} bytes, got {}",
                self.total_bytes,
                data.len()
            )));
        }
        let start = entry.offset as usize;
        data.get(start..start + entry.length)
            .ok_or_else(|| DgmError::truncated("indexed record", entry.length, data.len() - start.min(data.len())))
    }

    /// Декодирует `n`-ю запись типа `kind`. Отсутствие записи — `Ok(None)`.
    pub fn get_record(
        &self,
        data: &[u8],
        kind: DatagramKind,
        n: usize,
    ) -> DgmResult<Option<Record>> {
        let Some(entry) = self.entry(kind, n) else {
            return Ok(None);
        };
        let bytes = self.slice(data, entry)?;
        Record::decode(bytes, self.endian, self.verify_checksum).map(Some)
    }
}

////////////////////////////////////////////////////////////////////////////////
// IndexBuilder
////////////////////////////////////////////////////////////////////////////////

/// Построитель индекса с необязательным прогрессом и флагом остановки.
pub struct IndexBuilder<'a> {
    config: IndexConfig,
    progress: Option<Box<dyn ProgressSink + Send + 'a>>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            progress: None,
            stop_flag: None,
        }
    }

    pub fn with_progress(
        mut self,
        sink: impl ProgressSink + Send + 'a,
    ) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Отчёты о прогрессе в канал (`try_send`, без блокировки).
    pub fn with_progress_channel(
        self,
        tx: Sender<IndexProgress>,
    ) -> Self {
        self.with_progress(tx)
    }

    /// Флаг досрочной остановки. Проверяется между кадрами.
    pub fn with_stop_flag(
        mut self,
        flag: Arc<AtomicBool>,
    ) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    fn resolve_endian(
        &self,
        buf: &[u8],
    ) -> Endian {
        if let Some(endian) = self.config.byte_order {
            return endian;
        }
        detect_endian(
            buf,
            self.config.resync_step,
            ENDIAN_SEARCH_LIMIT,
            self.config.verify_checksum,
        )
        .unwrap_or_else(|| {
            warn!("no valid frame in the first {ENDIAN_SEARCH_LIMIT} bytes, assuming little-endian");
            Endian::Little
        })
    }

    fn stopped(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    fn report(
        &mut self,
        progress: IndexProgress,
    ) {
        if let Some(sink) = self.progress.as_mut() {
            sink.report(&progress);
        }
    }

    /// Сканирует буфер целиком (или до остановки) и возвращает индекс.
    pub fn build(
        mut self,
        buf: &[u8],
    ) -> DgmResult<FileIndex> {
        self.config.validate()?;

        let started = Instant::now();
        let endian = self.resolve_endian(buf);
        let total = buf.len() as u64;
        let verify = self.config.verify_checksum;
        let step = self.config.resync_step;
        let every = self.config.progress_every_bytes.max(1);

        info!("indexing {total} bytes ({endian})");

        let mut index = FileIndex::empty(endian, total, verify);
        let mut off = 0usize;
        // Начало текущего участка без кадров и первая причина
        let mut gap: Option<(usize, DgmError)> = None;
        let mut next_report = every;

        while off < buf.len() {
            if self.stopped() {
                index.complete = false;
                break;
            }
            if self.config.max_records > 0 && index.total_records() >= self.config.max_records {
                index.complete = false;
                break;
            }

            match probe(buf, off, endian, verify) {
                Probe::Valid(frame) => {
                    close_gap(&mut index, &mut gap, off);
                    index.push(frame);
                    off += frame.length;
                }
                Probe::Unsupported(frame) => {
                    close_gap(&mut index, &mut gap, off);
                    debug!(
                        "unsupported datagram type {} at offset {off}, {} bytes skipped",
                        frame.kind_id, frame.length
                    );
                    index.push_gap(Gap {
                        offset: frame.offset,
                        length: frame.length as u64,
                        reason: GapReason::Unsupported(frame.kind_id),
                    });
                    off += frame.length;
                }
                Probe::Invalid(e) => {
                    gap.get_or_insert((off, e));
                    off += step;
                }
            }

            if off as u64 >= next_report {
                self.report(IndexProgress {
                    bytes_scanned: (off as u64).min(total),
                    total_bytes: total,
                    records: index.total_records(),
                });
                next_report = off as u64 + every;
            }
        }

        let end = off.min(buf.len());
        close_gap(&mut index, &mut gap, end);
        index.bytes_scanned = end as u64;

        self.report(IndexProgress {
            bytes_scanned: index.bytes_scanned,
            total_bytes: total,
            records: index.total_records(),
        });

        info!(
            "indexed {} records of {} types, {} gaps, {}/{} bytes in {:?}{}",
            index.total_records(),
            index.kinds().count(),
            index.gaps.len(),
            index.bytes_scanned,
            total,
            started.elapsed(),
            if index.complete { "" } else { " (stopped early)" }
        );

        Ok(index)
    }
}

fn close_gap(
    index: &mut FileIndex,
    gap: &mut Option<(usize, DgmError)>,
    end: usize,
) {
    if let Some((start, reason)) = gap.take() {
        let length = end.saturating_sub(start) as u64;
        debug!("skipped {length} bytes at offset {start}: {reason}");
        index.push_gap(Gap {
            offset: start as u64,
            length,
            reason: GapReason::Framing,
        });
    }
}

/// Строит индекс с настройками по умолчанию.
pub fn build_index(buf: &[u8]) -> DgmResult<FileIndex> {
    IndexBuilder::new(IndexConfig::default()).build(buf)
}

/// Индексирует независимые буферы параллельно, по потоку на буфер.
/// Результаты в порядке входных буферов.
pub fn build_many(
    buffers: &[&[u8]],
    config: &IndexConfig,
) -> Vec<DgmResult<FileIndex>> {
    thread::scope(|s| {
        let handles: Vec<_> = buffers
            .iter()
            .map(|&buf| {
                let config = config.clone();
                s.spawn(move || IndexBuilder::new(config).build(buf))
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join().unwrap_or_else(|_| {
                    Err(DgmError::format_violation("index worker panicked"))
                })
            })
            .collect()
    })
}
