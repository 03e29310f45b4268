//! Сравнение декодированных значений с допуском, выведенным из правил
//! кодирования полей.

use std::fmt;

use log::{debug, warn};

use crate::schema::{Fields, Params, Rule, Table, Value};

/// Первое расхождение, найденное при сравнении.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Путь к полю, например `beams[3].Roll`
    pub path: String,
    pub left: Value,
    pub right: Value,
    pub tolerance: f64,
}

impl Mismatch {
    pub fn new(
        path: impl Into<String>,
        left: Value,
        right: Value,
        tolerance: f64,
    ) -> Self {
        Self {
            path: path.into(),
            left,
            right,
            tolerance,
        }
    }

    /// Расхождение в длине массива.
    pub fn length(
        path: impl Into<String>,
        left: usize,
        right: usize,
    ) -> Self {
        Self::new(
            path,
            Value::Int(left as i64),
            Value::Int(right as i64),
            0.0,
        )
    }

    /// Добавляет префикс к пути.
    pub fn within(
        mut self,
        prefix: impl fmt::Display,
    ) -> Self {
        self.path = if self.path.starts_with('[') || self.path.is_empty() {
            format!("{prefix}{}", self.path)
        } else {
            format!("{prefix}.{}", self.path)
        };
        self
    }
}

impl fmt::Display for Mismatch {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{}: {:?} != {:?} (tolerance {})",
            self.path, self.left, self.right, self.tolerance
        )
    }
}

/// Сравнение «равно с точностью до потерь кодирования».
pub trait Tolerant {
    /// Первое расхождение или `None`, если значения совпадают в пределах
    /// допуска.
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch>;

    fn approx_eq(
        &self,
        other: &Self,
        params: &Params,
    ) -> bool {
        self.mismatch(other, params).is_none()
    }

    /// То же, что [`Tolerant::mismatch`], с префиксом пути.
    fn mismatch_within(
        &self,
        other: &Self,
        params: &Params,
        prefix: &str,
    ) -> Option<Mismatch> {
        self.mismatch(other, params).map(|m| m.within(prefix))
    }
}

/// Сравнивает два значения одного поля.
pub fn compare_value(
    name: &str,
    rule: &Rule,
    left: &Value,
    right: &Value,
    params: &Params,
) -> Option<Mismatch> {
    match (left, right) {
        (Value::Float(a), Value::Float(b)) => {
            if a.is_nan() && b.is_nan() {
                return None;
            }
            // Допуск берётся в масштабе единичного сдвига значения
            let magnitude = a.abs().max(b.abs()) + 1.0;
            match rule.tolerance(magnitude, params) {
                Ok(tol) if (a - b).abs() <= tol => None,
                Ok(tol) => Some(Mismatch::new(name, left.clone(), right.clone(), tol)),
                // Допуск не определён: равны только совпадающие значения,
                // расхождение помечается допуском NaN
                Err(e) if a == b => {
                    debug!("{name}: {e}");
                    None
                }
                Err(e) => {
                    warn!("{name}: {e}");
                    Some(Mismatch::new(name, left.clone(), right.clone(), f64::NAN))
                }
            }
        }
        _ if left == right => None,
        _ => Some(Mismatch::new(name, left.clone(), right.clone(), 0.0)),
    }
}

impl Tolerant for Fields {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        if !std::ptr::eq(self.schema(), other.schema()) {
            return Some(Mismatch::new(
                "schema",
                Value::Text(self.schema().name.to_string()),
                Value::Text(other.schema().name.to_string()),
                0.0,
            ));
        }

        self.iter()
            .zip(other.values())
            .find_map(|((field, a), b)| compare_value(field.name, &field.rule, a, b, params))
    }
}

impl Tolerant for Table {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        if self.len() != other.len() {
            return Some(Mismatch::length("len", self.len(), other.len()));
        }

        self.rows()
            .iter()
            .zip(other.rows())
            .enumerate()
            .find_map(|(i, (a, b))| a.mismatch(b, params).map(|m| m.within(format!("[{i}]"))))
    }
}

impl<T: Tolerant> Tolerant for Option<T> {
    fn mismatch(
        &self,
        other: &Self,
        params: &Params,
    ) -> Option<Mismatch> {
        match (self, other) {
            (Some(a), Some(b)) => a.mismatch(b, params),
            (None, None) => None,
            _ => Some(Mismatch::new(
                "presence",
                Value::Int(self.is_some() as i64),
                Value::Int(other.is_some() as i64),
                0.0,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, Param, Raw, Schema};

    static ROW: Schema = Schema::new(
        "row",
        &[
            Field::new("Id", Rule::U8),
            Field::new("Roll", Rule::scaled(Raw::I16, 0.01)),
            Field::new("Depth", Rule::scaled_by(Raw::I16, Param::ZResolution)),
        ],
    );

    fn row(
        id: i64,
        roll: f64,
        depth: f64,
    ) -> Fields {
        Fields::zeroed(&ROW)
            .with("Id", id)
            .unwrap()
            .with("Roll", roll)
            .unwrap()
            .with("Depth", depth)
            .unwrap()
    }

    #[test]
    fn test_scaled_within_half_step() {
        let p = Params::new().with(Param::ZResolution, 0.02);
        assert!(row(1, 1.0, 5.0).approx_eq(&row(1, 1.004, 5.0), &p));
        assert!(!row(1, 1.0, 5.0).approx_eq(&row(1, 1.02, 5.0), &p));
        // Допуск по глубине определяется разрешением из контекста
        assert!(row(1, 1.0, 5.0).approx_eq(&row(1, 1.0, 5.009), &p));
    }

    #[test]
    fn test_missing_resolution_is_not_a_zero_tolerance() {
        let p = Params::new();
        assert!(row(1, 1.0, 5.0).approx_eq(&row(1, 1.0, 5.0), &p));

        let m = row(1, 1.0, 5.0).mismatch(&row(1, 1.0, 5.001), &p).unwrap();
        assert_eq!(m.path, "Depth");
        assert!(m.tolerance.is_nan());
        assert!(m.to_string().contains("tolerance NaN"));
    }

    #[test]
    fn test_integers_exact() {
        let p = Params::new().with(Param::ZResolution, 0.02);
        let m = row(1, 0.0, 0.0).mismatch(&row(2, 0.0, 0.0), &p).unwrap();
        assert_eq!(m.path, "Id");
        assert_eq!(m.tolerance, 0.0);
    }

    #[test]
    fn test_table_mismatch_path() {
        let p = Params::new().with(Param::ZResolution, 0.01);
        let mut a = Table::new(&ROW);
        let mut b = Table::new(&ROW);
        for i in 0..3 {
            a.push(row(i, 0.5, 1.0)).unwrap();
            b.push(row(i, if i == 2 { 0.9 } else { 0.5 }, 1.0)).unwrap();
        }
        let m = a.mismatch(&b, &p).unwrap().within("attitude");
        assert_eq!(m.path, "attitude[2].Roll");
        assert!(m.to_string().contains("attitude[2].Roll"));

        b.rows_mut()[2].set("Roll", 0.5).unwrap();
        assert!(a.approx_eq(&b, &p));
    }
}
