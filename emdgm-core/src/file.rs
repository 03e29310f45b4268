//! Файл `.all` в памяти вместе с индексом.

use std::{path::Path, sync::Arc};

use emdgm_types::{DatagramKind, DgmResult};
use log::info;

use crate::{
    index::{FileIndex, IndexBuilder, IndexConfig},
    record::Record,
};

/// Содержимое файла и его индекс. Буфер разделяемый, поэтому
/// клонирование дешёвое; записи копируют свои байты при декодировании.
#[derive(Debug, Clone)]
pub struct AllFile {
    data: Arc<[u8]>,
    index: FileIndex,
}

impl AllFile {
    /// Читает файл целиком и строит индекс.
    pub fn open<P: AsRef<Path>>(
        path: P,
        config: &IndexConfig,
    ) -> DgmResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        info!("opened {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data, config)
    }

    pub fn from_bytes(
        data: impl Into<Arc<[u8]>>,
        config: &IndexConfig,
    ) -> DgmResult<Self> {
        Self::with_builder(data, IndexBuilder::new(config.clone()))
    }

    /// Индекс строится переданным построителем (прогресс, остановка).
    pub fn with_builder(
        data: impl Into<Arc<[u8]>>,
        builder: IndexBuilder<'_>,
    ) -> DgmResult<Self> {
        let data = data.into();
        let index = builder.build(&data)?;
        Ok(Self { data, index })
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn count(
        &self,
        kind: DatagramKind,
    ) -> usize {
        self.index.count(kind)
    }

    /// `n`-я запись типа `kind`; `Ok(None)`, если её нет.
    pub fn get_record(
        &self,
        kind: DatagramKind,
        n: usize,
    ) -> DgmResult<Option<Record>> {
        self.index.get_record(&self.data, kind, n)
    }

    /// Все записи типа по порядку.
    pub fn records(
        &self,
        kind: DatagramKind,
    ) -> impl Iterator<Item = DgmResult<Record>> + '_ {
        (0..self.count(kind)).filter_map(move |n| self.get_record(kind, n).transpose())
    }
}
