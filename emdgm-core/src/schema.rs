//! Правила кодирования полей и схемы заголовков.
//!
//! Схема — это упорядоченный список `(имя, правило)`. Декодер и энкодер
//! проходят по одной и той же схеме, поэтому раскладка не может разойтись
//! между направлениями.

use emdgm_types::{DgmError, DgmResult, Endian};
use half::f16;
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::binary::{latin1_bytes, ByteCursor, ByteWriter};

/// Целочисленное представление на диске.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Raw {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
}

impl Raw {
    pub const fn width(&self) -> usize {
        match self {
            Raw::U8 | Raw::I8 => 1,
            Raw::U16 | Raw::I16 => 2,
            Raw::U32 | Raw::I32 => 4,
        }
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Raw::I8 | Raw::I16 | Raw::I32)
    }

    pub const fn min(&self) -> i64 {
        match self {
            Raw::U8 | Raw::U16 | Raw::U32 => 0,
            Raw::I8 => i8::MIN as i64,
            Raw::I16 => i16::MIN as i64,
            Raw::I32 => i32::MIN as i64,
        }
    }

    pub const fn max(&self) -> i64 {
        match self {
            Raw::U8 => u8::MAX as i64,
            Raw::I8 => i8::MAX as i64,
            Raw::U16 => u16::MAX as i64,
            Raw::I16 => i16::MAX as i64,
            Raw::U32 => u32::MAX as i64,
            Raw::I32 => i32::MAX as i64,
        }
    }

    pub fn read(
        &self,
        cur: &mut ByteCursor<'_>,
    ) -> DgmResult<i64> {
        Ok(match self {
            Raw::U8 => cur.read_u8()? as i64,
            Raw::I8 => cur.read_i8()? as i64,
            Raw::U16 => cur.read_u16()? as i64,
            Raw::I16 => cur.read_i16()? as i64,
            Raw::U32 => cur.read_u32()? as i64,
            Raw::I32 => cur.read_i32()? as i64,
        })
    }

    /// Пишет значение, проверяя диапазон.
    pub fn write(
        &self,
        w: &mut ByteWriter,
        field: &'static str,
        v: i64,
    ) -> DgmResult<()> {
        if v < self.min() || v > self.max() {
            return Err(DgmError::FieldEncoding {
                field,
                value: v as f64,
            });
        }
        match self {
            Raw::U8 => w.put_u8(v as u8),
            Raw::I8 => w.put_i8(v as i8),
            Raw::U16 => w.put_u16(v as u16),
            Raw::I16 => w.put_i16(v as i16),
            Raw::U32 => w.put_u32(v as u32),
            Raw::I32 => w.put_i32(v as i32),
        }
        Ok(())
    }
}

/// Контекстный параметр, который не хранится в самих байтах поля.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    /// POSIX-время датаграммы (секунды)
    RecordTime,
    /// Разрешение по глубине Z (м)
    ZResolution,
    /// Разрешение по X/Y (м)
    XyResolution,
    /// Разрешение глубины профиля скорости звука (м)
    DepthResolution,
}

impl Param {
    pub fn name(&self) -> &'static str {
        match self {
            Param::RecordTime => "record time",
            Param::ZResolution => "z resolution",
            Param::XyResolution => "xy resolution",
            Param::DepthResolution => "depth resolution",
        }
    }
}

/// Масштаб или смещение: константа или параметр контекста.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Factor {
    Const(f64),
    Param(Param),
}

impl Factor {
    pub fn resolve(
        &self,
        params: &Params,
    ) -> DgmResult<f64> {
        match self {
            Factor::Const(v) => Ok(*v),
            Factor::Param(p) => params.get(*p),
        }
    }
}

/// Явно передаваемые значения контекстных параметров.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Params {
    pub record_time: Option<f64>,
    pub z_resolution: Option<f64>,
    pub xy_resolution: Option<f64>,
    pub depth_resolution: Option<f64>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        param: Param,
        value: f64,
    ) -> Self {
        *self.slot(param) = Some(value);
        self
    }

    pub fn get(
        &self,
        param: Param,
    ) -> DgmResult<f64> {
        let v = match param {
            Param::RecordTime => self.record_time,
            Param::ZResolution => self.z_resolution,
            Param::XyResolution => self.xy_resolution,
            Param::DepthResolution => self.depth_resolution,
        };
        v.ok_or(DgmError::MissingContext(param.name()))
    }

    fn slot(
        &mut self,
        param: Param,
    ) -> &mut Option<f64> {
        match param {
            Param::RecordTime => &mut self.record_time,
            Param::ZResolution => &mut self.z_resolution,
            Param::XyResolution => &mut self.xy_resolution,
            Param::DepthResolution => &mut self.depth_resolution,
        }
    }
}

/// Правило кодирования одного поля.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// Целое без преобразования
    Int(Raw),
    /// IEEE 754 binary32
    F32,
    /// IEEE 754 binary64
    F64,
    /// Фиксированная точка: `value = raw * scale + offset`
    Scaled {
        raw: Raw,
        scale: Factor,
        offset: Factor,
    },
    /// Фиксированная точка на диске, значение хранится с точностью
    /// binary16 (упакованные амплитуды выборок)
    Packed { raw: Raw, scale: f64 },
    /// Текст фиксированной длины, дополненный NUL
    Chars(usize),
    /// Непрозрачные байты фиксированной длины
    Bytes(usize),
}

impl Rule {
    pub const U8: Rule = Rule::Int(Raw::U8);
    pub const I8: Rule = Rule::Int(Raw::I8);
    pub const U16: Rule = Rule::Int(Raw::U16);
    pub const I16: Rule = Rule::Int(Raw::I16);
    pub const U32: Rule = Rule::Int(Raw::U32);
    pub const I32: Rule = Rule::Int(Raw::I32);

    pub const fn scaled(
        raw: Raw,
        scale: f64,
    ) -> Rule {
        Rule::Scaled {
            raw,
            scale: Factor::Const(scale),
            offset: Factor::Const(0.0),
        }
    }

    /// Масштаб берётся из контекста (разрешение из заголовка родителя).
    pub const fn scaled_by(
        raw: Raw,
        param: Param,
    ) -> Rule {
        Rule::Scaled {
            raw,
            scale: Factor::Param(param),
            offset: Factor::Const(0.0),
        }
    }

    /// Смещение относительно времени датаграммы.
    pub const fn time_offset(
        raw: Raw,
        scale: f64,
    ) -> Rule {
        Rule::Scaled {
            raw,
            scale: Factor::Const(scale),
            offset: Factor::Param(Param::RecordTime),
        }
    }

    pub const fn packed(
        raw: Raw,
        scale: f64,
    ) -> Rule {
        Rule::Packed { raw, scale }
    }

    pub const fn width(&self) -> usize {
        match self {
            Rule::Int(raw) | Rule::Scaled { raw, .. } | Rule::Packed { raw, .. } => raw.width(),
            Rule::F32 => 4,
            Rule::F64 => 8,
            Rule::Chars(n) | Rule::Bytes(n) => *n,
        }
    }

    /// Значение хранится как число с плавающей точкой.
    pub const fn is_float(&self) -> bool {
        matches!(
            self,
            Rule::F32 | Rule::F64 | Rule::Scaled { .. } | Rule::Packed { .. }
        )
    }

    /// Поле участвует в сдвиге `shift_numeric`: знаковые целые и все
    /// вещественные. Беззнаковые целые (счётчики, идентификаторы, флаги)
    /// не трогаются.
    pub const fn is_shiftable(&self) -> bool {
        match self {
            Rule::Int(raw) => raw.is_signed(),
            _ => self.is_float(),
        }
    }

    pub fn zero(&self) -> Value {
        match self {
            Rule::Int(_) => Value::Int(0),
            Rule::Chars(_) => Value::Text(String::new()),
            Rule::Bytes(n) => Value::Bytes(vec![0; *n]),
            _ => Value::Float(0.0),
        }
    }

    pub fn decode(
        &self,
        cur: &mut ByteCursor<'_>,
        params: &Params,
    ) -> DgmResult<Value> {
        Ok(match self {
            Rule::Int(raw) => Value::Int(raw.read(cur)?),
            Rule::F32 => Value::Float(cur.read_f32()? as f64),
            Rule::F64 => Value::Float(cur.read_f64()?),
            Rule::Scaled { raw, scale, offset } => {
                let scale = scale.resolve(params)?;
                let offset = offset.resolve(params)?;
                Value::Float(raw.read(cur)? as f64 * scale + offset)
            }
            Rule::Packed { raw, scale } => {
                let v = raw.read(cur)? as f64 * scale;
                Value::Float(f16::from_f64(v).to_f64())
            }
            Rule::Chars(n) => Value::Text(cur.read_chars(*n)?),
            Rule::Bytes(n) => Value::Bytes(cur.read_bytes(*n)?.to_vec()),
        })
    }

    pub fn encode(
        &self,
        w: &mut ByteWriter,
        field: &'static str,
        value: &Value,
        params: &Params,
    ) -> DgmResult<()> {
        match (self, value) {
            (Rule::Int(raw), Value::Int(v)) => raw.write(w, field, *v),
            (Rule::F32, Value::Float(v)) => {
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(DgmError::FieldEncoding { field, value: *v });
                }
                w.put_f32(*v as f32);
                Ok(())
            }
            (Rule::F64, Value::Float(v)) => {
                w.put_f64(*v);
                Ok(())
            }
            (Rule::Scaled { raw, scale, offset }, Value::Float(v)) => {
                let scale = scale.resolve(params)?;
                let offset = offset.resolve(params)?;
                raw.write(w, field, quantize(field, (v - offset) / scale)?)
            }
            (Rule::Packed { raw, scale }, Value::Float(v)) => {
                raw.write(w, field, quantize(field, v / scale)?)
            }
            (Rule::Chars(n), Value::Text(s)) => {
                let len = s.chars().count();
                if len > *n || latin1_bytes(s).is_none() {
                    return Err(DgmError::FieldEncoding {
                        field,
                        value: len as f64,
                    });
                }
                w.put_chars(s, *n)
            }
            (Rule::Bytes(n), Value::Bytes(b)) => {
                if b.len() != *n {
                    return Err(DgmError::FieldEncoding {
                        field,
                        value: b.len() as f64,
                    });
                }
                w.put_bytes(b);
                Ok(())
            }
            _ => Err(DgmError::format_violation(format!(
                "field '{field}': value {value:?} does not match rule {self:?}"
            ))),
        }
    }

    /// Приводит значение к виду, который ожидает правило.
    pub fn coerce(
        &self,
        field: &'static str,
        value: Value,
    ) -> DgmResult<Value> {
        match (self, value) {
            (Rule::Int(_), Value::Float(v)) if v.fract() == 0.0 => Ok(Value::Int(v as i64)),
            (r, Value::Int(v)) if r.is_float() => Ok(Value::Float(v as f64)),
            (_, v) => {
                if self.zero().same_variant(&v) {
                    Ok(v)
                } else {
                    Err(DgmError::format_violation(format!(
                        "field '{field}': cannot store {v:?} under rule {self:?}"
                    )))
                }
            }
        }
    }

    /// Допуск при сравнении после декодирования → кодирования →
    /// декодирования, выведенный из разрядности и масштаба поля.
    ///
    /// `magnitude` — модуль сравниваемых значений с учётом единичного
    /// сдвига. Масштаб из отсутствующего параметра контекста даёт
    /// [`DgmError::MissingContext`].
    pub fn tolerance(
        &self,
        magnitude: f64,
        params: &Params,
    ) -> DgmResult<f64> {
        let m = magnitude.abs();
        Ok(match self {
            Rule::Int(_) | Rule::Chars(_) | Rule::Bytes(_) => 0.0,
            Rule::F32 => 2.0 * f32::EPSILON as f64 * m.max(1.0),
            Rule::F64 => 2.0 * f64::EPSILON * m.max(1.0),
            Rule::Scaled { scale, .. } => {
                let scale = scale.resolve(params)?.abs();
                scale / 2.0 + 4.0 * f64::EPSILON * m.max(1.0)
            }
            Rule::Packed { scale, .. } => scale.abs() / 2.0 + half_ulp_f16(m),
        })
    }
}

fn quantize(
    field: &'static str,
    v: f64,
) -> DgmResult<i64> {
    if !v.is_finite() || v.abs() > i64::MAX as f64 {
        return Err(DgmError::FieldEncoding { field, value: v });
    }
    Ok(v.round() as i64)
}

/// Половина расстояния между соседними binary16 вблизи `m`.
pub fn half_ulp_f16(m: f64) -> f64 {
    let m = m.abs().max(f16::MIN_POSITIVE.to_f64());
    // 10 бит мантиссы
    2f64.powi(m.log2().floor() as i32 - 11)
}

/// Декодированное значение поля.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn same_variant(
        &self,
        other: &Value,
    ) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

macro_rules! int_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

int_value!(i8, u8, i16, u16, i32, u32, i64, usize);

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Одно именованное поле схемы.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Field {
    pub name: &'static str,
    pub rule: Rule,
}

impl Field {
    pub const fn new(
        name: &'static str,
        rule: Rule,
    ) -> Self {
        Self { name, rule }
    }
}

/// Упорядоченный список полей фиксированной ширины.
#[derive(Debug, PartialEq)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub const fn new(
        name: &'static str,
        fields: &'static [Field],
    ) -> Self {
        Self { name, fields }
    }

    /// Ширина одной строки в байтах.
    pub const fn width(&self) -> usize {
        let mut total = 0;
        let mut i = 0;
        while i < self.fields.len() {
            total += self.fields[i].rule.width();
            i += 1;
        }
        total
    }

    pub fn index_of(
        &self,
        name: &str,
    ) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Одна декодированная строка схемы (заголовок или элемент массива).
#[derive(Debug, Clone, PartialEq)]
pub struct Fields {
    schema: &'static Schema,
    values: Vec<Value>,
}

impl Fields {
    /// Строка с нулевыми значениями — отправная точка для сборки записи.
    pub fn zeroed(schema: &'static Schema) -> Self {
        Self {
            schema,
            values: schema.fields.iter().map(|f| f.rule.zero()).collect(),
        }
    }

    pub fn decode(
        schema: &'static Schema,
        cur: &mut ByteCursor<'_>,
        params: &Params,
    ) -> DgmResult<Self> {
        cur.ensure(schema.width(), schema.name)?;

        let mut values = Vec::with_capacity(schema.fields.len());
        for f in schema.fields {
            values.push(f.rule.decode(cur, params)?);
        }

        Ok(Self { schema, values })
    }

    pub fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()> {
        for (f, v) in self.schema.fields.iter().zip(&self.values) {
            f.rule.encode(w, f.name, v, params)?;
        }
        Ok(())
    }

    pub fn from_bytes(
        schema: &'static Schema,
        bytes: &[u8],
        endian: Endian,
        params: &Params,
    ) -> DgmResult<Self> {
        let mut cur = ByteCursor::new(bytes, endian);
        Self::decode(schema, &mut cur, params)
    }

    pub fn to_bytes(
        &self,
        endian: Endian,
        params: &Params,
    ) -> DgmResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(endian, self.schema.width());
        self.encode(&mut w, params)?;
        Ok(w.into_inner())
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static Field, &Value)> {
        self.schema.fields.iter().zip(self.values.iter())
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.schema.index_of(name).map(|i| &self.values[i])
    }

    pub fn value(
        &self,
        name: &str,
    ) -> DgmResult<&Value> {
        self.get(name).ok_or_else(|| {
            DgmError::format_violation(format!("{} has no field '{name}'", self.schema.name))
        })
    }

    pub fn f64(
        &self,
        name: &str,
    ) -> DgmResult<f64> {
        self.value(name)?.as_f64().ok_or_else(|| {
            DgmError::format_violation(format!("field '{name}' is not numeric"))
        })
    }

    pub fn int(
        &self,
        name: &str,
    ) -> DgmResult<i64> {
        self.value(name)?.as_i64().ok_or_else(|| {
            DgmError::format_violation(format!("field '{name}' is not an integer"))
        })
    }

    /// Количество элементов из поля-счётчика (не может быть отрицательным).
    pub fn count(
        &self,
        name: &str,
    ) -> DgmResult<usize> {
        let v = self.int(name)?;
        usize::try_from(v)
            .map_err(|_| DgmError::format_violation(format!("negative count '{name}': {v}")))
    }

    pub fn set<V: Into<Value>>(
        &mut self,
        name: &str,
        value: V,
    ) -> DgmResult<()> {
        let i = self.schema.index_of(name).ok_or_else(|| {
            DgmError::format_violation(format!("{} has no field '{name}'", self.schema.name))
        })?;
        let field = &self.schema.fields[i];
        self.values[i] = field.rule.coerce(field.name, value.into())?;
        Ok(())
    }

    pub fn with<V: Into<Value>>(
        mut self,
        name: &str,
        value: V,
    ) -> DgmResult<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Прибавляет `delta` ко всем сдвигаемым числовым полям.
    pub fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        for (f, v) in self.schema.fields.iter().zip(self.values.iter_mut()) {
            if !f.rule.is_shiftable() {
                continue;
            }
            match v {
                Value::Int(i) => *i += delta.round() as i64,
                Value::Float(x) => *x += delta,
                _ => {}
            }
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (f, v) in self.iter() {
            map.serialize_entry(f.name, v)?;
        }
        map.end()
    }
}

/// Массив строк одной схемы (под-запись фиксированной ширины).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Table {
    rows: Vec<Fields>,
    #[serde(skip)]
    schema: Option<&'static Schema>,
}

impl Table {
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            rows: Vec::new(),
            schema: Some(schema),
        }
    }

    /// Декодирует `count` строк, предварительно проверив длину.
    pub fn decode(
        schema: &'static Schema,
        cur: &mut ByteCursor<'_>,
        count: usize,
        params: &Params,
    ) -> DgmResult<Self> {
        let needed = count
            .checked_mul(schema.width())
            .ok_or_else(|| DgmError::format_violation(format!("{}: count overflow", schema.name)))?;
        cur.ensure(needed, schema.name)?;

        let mut rows = Vec::with_capacity(count);
        for _ in 0..count {
            rows.push(Fields::decode(schema, cur, params)?);
        }

        Ok(Self {
            rows,
            schema: Some(schema),
        })
    }

    pub fn encode(
        &self,
        w: &mut ByteWriter,
        params: &Params,
    ) -> DgmResult<()> {
        for row in &self.rows {
            row.encode(w, params)?;
        }
        Ok(())
    }

    /// Отдельное декодирование: число строк выводится из длины среза.
    pub fn from_bytes(
        schema: &'static Schema,
        bytes: &[u8],
        endian: Endian,
        params: &Params,
    ) -> DgmResult<Self> {
        let width = schema.width();
        if width == 0 || bytes.len() % width != 0 {
            return Err(DgmError::format_violation(format!(
                "{}: {} bytes is not a whole number of {width}-byte rows",
                schema.name,
                bytes.len()
            )));
        }
        let mut cur = ByteCursor::new(bytes, endian);
        Self::decode(schema, &mut cur, bytes.len() / width, params)
    }

    pub fn to_bytes(
        &self,
        endian: Endian,
        params: &Params,
    ) -> DgmResult<Vec<u8>> {
        let mut w = ByteWriter::with_capacity(endian, self.byte_len());
        self.encode(&mut w, params)?;
        Ok(w.into_inner())
    }

    pub fn schema(&self) -> Option<&'static Schema> {
        self.schema.or_else(|| self.rows.first().map(|r| r.schema()))
    }

    pub fn byte_len(&self) -> usize {
        self.schema().map_or(0, |s| s.width() * self.rows.len())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Fields] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Fields] {
        &mut self.rows
    }

    pub fn row(
        &self,
        i: usize,
    ) -> Option<&Fields> {
        self.rows.get(i)
    }

    pub fn push(
        &mut self,
        row: Fields,
    ) -> DgmResult<()> {
        if let Some(schema) = self.schema() {
            if !std::ptr::eq(schema, row.schema()) {
                return Err(DgmError::format_violation(format!(
                    "row of '{}' pushed into table of '{}'",
                    row.schema().name,
                    schema.name
                )));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Значения одной колонки.
    pub fn column(
        &self,
        name: &str,
    ) -> DgmResult<Vec<f64>> {
        self.rows.iter().map(|r| r.f64(name)).collect()
    }

    pub fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        for row in &mut self.rows {
            row.shift_numeric(delta);
        }
    }
}
