//! Под-записи: структуры внутри тела датаграммы, которые декодируются и
//! кодируются независимо от родителя.
//!
//! Число элементов всегда берётся из заголовка родителя и передаётся
//! явно; контекст (время записи, разрешения) — через [`Params`].

use emdgm_types::{DgmError, DgmResult, Endian};
use serde::Serialize;

use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Params, Rule, Value},
    tolerance::{compare_value, Mismatch, Tolerant},
};

/// Общий интерфейс под-записей.
pub trait SubRecord: Sized {
    /// Декодирует `count` элементов с текущей позиции курсора.
    fn decode(
        cur: &mut ByteCursor<'_>,
        count: usize,
        params: &Params,
    ) -> DgmResult<Self>;

    fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()>;

    /// Число элементов (значение поля-счётчика у родителя).
    fn count(&self) -> usize;

    /// Прибавляет `delta` ко всем сдвигаемым числовым полям.
    fn shift_numeric(
        &mut self,
        delta: f64,
    );

    /// Отдельное декодирование. Возвращает значение и число
    /// прочитанных байт.
    fn from_bytes(
        bytes: &[u8],
        count: usize,
        endian: Endian,
        params: &Params,
    ) -> DgmResult<(Self, usize)> {
        let mut cur = ByteCursor::new(bytes, endian);
        let value = Self::decode(&mut cur, count, params)?;
        Ok((value, cur.position()))
    }

    fn to_bytes(
        &self,
        endian: Endian,
        params: &Params,
    ) -> DgmResult<Vec<u8>> {
        let mut w = ByteWriter::new(endian);
        self.encode(&mut w, params)?;
        Ok(w.into_inner())
    }
}

/// Под-запись, которая является массивом строк одной схемы.
macro_rules! table_subrecord {
    ($(#[$meta:meta])* $name:ident, $schema:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(pub $crate::schema::Table);

        impl $name {
            pub fn new() -> Self {
                Self($crate::schema::Table::new(&$schema))
            }

            pub fn schema() -> &'static $crate::schema::Schema {
                &$schema
            }

            /// Пустая строка этой схемы для заполнения.
            pub fn row() -> $crate::schema::Fields {
                $crate::schema::Fields::zeroed(&$schema)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = $crate::schema::Table;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl $crate::subrecord::SubRecord for $name {
            fn decode(
                cur: &mut $crate::binary::ByteCursor<'_>,
                count: usize,
                params: &$crate::schema::Params,
            ) -> emdgm_types::DgmResult<Self> {
                $crate::schema::Table::decode(&$schema, cur, count, params).map(Self)
            }

            fn encode(
                &self,
                w: &mut $crate::binary::ByteWriter,
                params: &$crate::schema::Params,
            ) -> emdgm_types::DgmResult<()> {
                self.0.encode(w, params)
            }

            fn count(&self) -> usize {
                self.0.len()
            }

            fn shift_numeric(
                &mut self,
                delta: f64,
            ) {
                self.0.shift_numeric(delta)
            }
        }

        impl $crate::tolerance::Tolerant for $name {
            fn mismatch(
                &self,
                other: &Self,
                params: &$crate::schema::Params,
            ) -> Option<$crate::tolerance::Mismatch> {
                $crate::tolerance::Tolerant::mismatch(&self.0, &other.0, params)
            }
        }
    };
}

pub(crate) use table_subrecord;

pub mod attitude;
pub mod beams;
pub mod gga;
pub mod seabed;
pub mod sound_speed;
pub mod water_column;
pub mod xyz;

pub use attitude::*;
pub use beams::*;
pub use gga::*;
pub use seabed::*;
pub use sound_speed::*;
pub use water_column::*;
pub use xyz::*;

/// Вектор выборок, закодированных одним правилом (амплитуды
/// обратного рассеяния, водяной столб, отсчёты стейвов).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Samples {
    #[serde(skip)]
    rule: Rule,
    values: Vec<f64>,
}

impl Samples {
    pub fn new(
        rule: Rule,
        values: Vec<f64>,
    ) -> Self {
        Self { rule, values }
    }

    pub fn decode(
        cur: &mut ByteCursor<'_>,
        count: usize,
        rule: Rule,
        params: &Params,
    ) -> DgmResult<Self> {
        let needed = count
            .checked_mul(rule.width())
            .ok_or_else(|| DgmError::format_violation("sample count overflow"))?;
        cur.ensure(needed, "samples")?;

        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            match rule.decode(cur, params)? {
                Value::Float(v) => values.push(v),
                Value::Int(v) => values.push(v as f64),
                other => {
                    return Err(DgmError::format_violation(format!(
                        "non-numeric sample {other:?}"
                    )))
                }
            }
        }

        Ok(Self { rule, values })
    }

    pub fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()> {
        for &v in &self.values {
            let value = match self.rule {
                Rule::Int(_) => Value::Int(v.round() as i64),
                _ => Value::Float(v),
            };
            self.rule.encode(w, "sample", &value, params)?;
        }
        Ok(())
    }

    pub fn rule(&self) -> Rule {
        self.rule
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Vec<f64> {
        &mut self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.values.len() * self.rule.width()
    }

    pub fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        if self.rule.is_shiftable() {
            self.values.iter_mut().for_each(|v| *v += delta);
        }
    }
}

impl Tolerant for Samples {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        if self.len() != other.len() {
            return Some(Mismatch::length("len", self.len(), other.len()));
        }

        self.values
            .iter()
            .zip(&other.values)
            .enumerate()
            .find_map(|(i, (&a, &b))| {
                compare_value(
                    "sample",
                    &self.rule,
                    &Value::Float(a),
                    &Value::Float(b),
                    params,
                )
                .map(|m| m.within(format!("[{i}]")))
            })
    }
}

/// Поле-счётчик: проверяет, что длина массива помещается в его разрядность.
pub(crate) fn count_value(
    field: &'static str,
    n: usize,
    max: usize,
) -> DgmResult<i64> {
    if n > max {
        return Err(DgmError::FieldEncoding {
            field,
            value: n as f64,
        });
    }
    Ok(n as i64)
}
