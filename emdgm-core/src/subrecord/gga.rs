//! Разбор NMEA `$--GGA` из исходного входного сообщения датаграммы
//! положения (80).

use std::fmt::Write as _;

use emdgm_types::{DgmError, DgmResult};
use serde::Serialize;

use super::SubRecord;
use crate::{
    binary::{ByteCursor, ByteWriter},
    schema::{Params, Value},
    tolerance::{Mismatch, Tolerant},
};

/// Допуски, соответствующие числу знаков при форматировании.
const TIME_TOL: f64 = 0.005;
const DEGREE_TOL: f64 = 0.5e-6 / 60.0;
const HDOP_TOL: f64 = 0.005;
const HEIGHT_TOL: f64 = 0.0005;
const AGE_TOL: f64 = 0.05;

/// Данные фиксации положения GGA.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gga {
    /// Источник, например `GP`, `GN`, `IN`
    pub talker: String,
    /// Секунды от полуночи UTC
    pub time: Option<f64>,
    /// Широта в градусах, север положителен
    pub latitude: Option<f64>,
    /// Долгота в градусах, восток положителен
    pub longitude: Option<f64>,
    pub quality: u8,
    pub satellites: u8,
    pub hdop: Option<f64>,
    /// Высота антенны над геоидом (м)
    pub altitude: Option<f64>,
    /// Превышение геоида над эллипсоидом (м)
    pub geoid_separation: Option<f64>,
    /// Возраст дифференциальных поправок (с)
    pub dgps_age: Option<f64>,
    pub dgps_station: Option<u16>,
}

impl Gga {
    /// Разбирает сообщение `$--GGA`. Другие сообщения и битая
    /// контрольная сумма дают ошибку.
    pub fn parse(input: &[u8]) -> DgmResult<Self> {
        if !input.is_ascii() {
            return Err(DgmError::format_violation("NMEA input is not ASCII"));
        }
        let text = std::str::from_utf8(input)
            .map_err(|_| DgmError::format_violation("NMEA input is not ASCII"))?
            .trim_end_matches(['\r', '\n', '\0']);

        let body = text
            .strip_prefix('$')
            .ok_or_else(|| DgmError::format_violation("NMEA sentence must start with '$'"))?;

        let body = match body.rsplit_once('*') {
            Some((payload, sum)) => {
                let expected = u8::from_str_radix(sum, 16)
                    .map_err(|_| DgmError::format_violation(format!("bad NMEA checksum '{sum}'")))?;
                let found = nmea_checksum(payload);
                if expected != found {
                    return Err(DgmError::ChecksumMismatch {
                        expected: expected as u16,
                        found: found as u16,
                    });
                }
                payload
            }
            None => body,
        };

        let parts: Vec<&str> = body.split(',').collect();
        let head = parts[0];
        if head.len() != 5 || !head.ends_with("GGA") {
            return Err(DgmError::format_violation(format!("not a GGA sentence: {head}")));
        }
        if parts.len() < 15 {
            return Err(DgmError::format_violation(format!(
                "GGA sentence has {} fields, expected 15",
                parts.len()
            )));
        }

        Ok(Self {
            talker: head[..2].to_string(),
            time: parse_time(parts[1])?,
            latitude: parse_angle(parts[2], parts[3], 2, 'S')?,
            longitude: parse_angle(parts[4], parts[5], 3, 'W')?,
            quality: parse_opt(parts[6])?.unwrap_or(0),
            satellites: parse_opt(parts[7])?.unwrap_or(0),
            hdop: parse_opt(parts[8])?,
            altitude: parse_opt(parts[9])?,
            geoid_separation: parse_opt(parts[11])?,
            dgps_age: parse_opt(parts[13])?,
            dgps_station: parse_opt(parts[14])?,
        })
    }

    /// Сообщение с контрольной суммой и `\r\n`.
    pub fn to_sentence(&self) -> String {
        let mut s = format!("{}GGA,", self.talker);

        if let Some(t) = self.time {
            let cs = (t * 100.0).round() as u64;
            let (h, rest) = (cs / 360_000, cs % 360_000);
            let (m, rest) = (rest / 6_000, rest % 6_000);
            let _ = write!(s, "{h:02}{m:02}{:05.2}", rest as f64 / 100.0);
        }
        s.push(',');
        push_angle(&mut s, self.latitude, 2, ('N', 'S'));
        s.push(',');
        push_angle(&mut s, self.longitude, 3, ('E', 'W'));
        let _ = write!(s, ",{},{:02},", self.quality, self.satellites);
        push_opt(&mut s, self.hdop, 2);
        s.push(',');
        push_opt(&mut s, self.altitude, 3);
        s.push_str(",M,");
        push_opt(&mut s, self.geoid_separation, 3);
        s.push_str(",M,");
        push_opt(&mut s, self.dgps_age, 1);
        s.push(',');
        if let Some(station) = self.dgps_station {
            let _ = write!(s, "{station:04}");
        }

        let sum = nmea_checksum(&s);
        format!("${s}*{sum:02X}\r\n")
    }

    pub fn sentence_bytes(&self) -> Vec<u8> {
        self.to_sentence().into_bytes()
    }
}

fn nmea_checksum(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}

fn parse_opt<T: std::str::FromStr>(s: &str) -> DgmResult<Option<T>> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse()
        .map(Some)
        .map_err(|_| DgmError::format_violation(format!("bad NMEA number '{s}'")))
}

fn parse_time(s: &str) -> DgmResult<Option<f64>> {
    if s.len() < 6 {
        return parse_opt::<f64>(s).and(Ok(None));
    }
    let h: f64 = parse_opt(&s[0..2])?.unwrap_or(0.0);
    let m: f64 = parse_opt(&s[2..4])?.unwrap_or(0.0);
    let sec: f64 = parse_opt(&s[4..])?.unwrap_or(0.0);
    Ok(Some(h * 3600.0 + m * 60.0 + sec))
}

/// `ddmm.mmmm` / `dddmm.mmmm` и полушарие.
fn parse_angle(
    value: &str,
    hemisphere: &str,
    degree_digits: usize,
    negative: char,
) -> DgmResult<Option<f64>> {
    if value.is_empty() {
        return Ok(None);
    }
    if value.len() < degree_digits {
        return Err(DgmError::format_violation(format!("bad NMEA angle '{value}'")));
    }
    let deg: f64 = parse_opt(&value[..degree_digits])?.unwrap_or(0.0);
    let min: f64 = parse_opt(&value[degree_digits..])?.unwrap_or(0.0);
    let v = deg + min / 60.0;
    Ok(Some(if hemisphere.starts_with(negative) { -v } else { v }))
}

fn push_angle(
    s: &mut String,
    v: Option<f64>,
    degree_digits: usize,
    (pos, neg): (char, char),
) {
    if let Some(v) = v {
        let a = v.abs();
        let mut deg = a.trunc();
        let mut min = ((a - deg) * 60.0 * 1e6).round() / 1e6;
        if min >= 60.0 {
            deg += 1.0;
            min -= 60.0;
        }
        let _ = write!(
            s,
            "{:0w$}{:09.6},{}",
            deg as u32,
            min,
            if v < 0.0 { neg } else { pos },
            w = degree_digits
        );
    } else {
        s.push(',');
    }
}

fn push_opt(
    s: &mut String,
    v: Option<f64>,
    decimals: usize,
) {
    if let Some(v) = v {
        let _ = write!(s, "{v:.decimals$}");
    }
}

fn compare_opt(
    name: &str,
    a: Option<f64>,
    b: Option<f64>,
    tol: f64,
) -> Option<Mismatch> {
    let ok = match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() <= tol + f64::EPSILON * x.abs().max(1.0) * 4.0,
        (None, None) => true,
        _ => false,
    };
    (!ok).then(|| {
        Mismatch::new(
            name,
            Value::Float(a.unwrap_or(f64::NAN)),
            Value::Float(b.unwrap_or(f64::NAN)),
            tol,
        )
    })
}

/// Под-запись из `count` байт входного сообщения; `count` — значение
/// `InputLength` родителя.
impl SubRecord for Gga {
    fn decode(
        cur: &mut ByteCursor<'_>,
        count: usize,
        _params: &Params,
    ) -> DgmResult<Self> {
        cur.ensure(count, "GGA input")?;
        Self::parse(cur.read_bytes(count)?)
    }

    fn encode(
        &self,
        w: &mut ByteWriter,
        _params: &Params,
    ) -> DgmResult<()> {
        w.put_bytes(self.to_sentence().as_bytes());
        Ok(())
    }

    fn count(&self) -> usize {
        self.to_sentence().len()
    }

    /// Сдвигает время, координаты, высоты, HDOP и возраст поправок.
    fn shift_numeric(
        &mut self,
        delta: f64,
    ) {
        for v in [
            &mut self.time,
            &mut self.latitude,
            &mut self.longitude,
            &mut self.hdop,
            &mut self.altitude,
            &mut self.geoid_separation,
            &mut self.dgps_age,
        ]
        .into_iter()
        .flatten()
        {
            *v += delta;
        }
    }
}

impl Tolerant for Gga {
    fn mismatch(
        &self,
        other: &Self,
        _params: &Params,
    ) -> Option<Mismatch> {
        if self.talker != other.talker {
            return Some(Mismatch::new(
                "talker",
                Value::Text(self.talker.clone()),
                Value::Text(other.talker.clone()),
                0.0,
            ));
        }
        let exact = [
            ("quality", self.quality as i64, other.quality as i64),
            ("satellites", self.satellites as i64, other.satellites as i64),
            (
                "dgps_station",
                self.dgps_station.map_or(-1, i64::from),
                other.dgps_station.map_or(-1, i64::from),
            ),
        ];
        if let Some((name, a, b)) = exact.into_iter().find(|(_, a, b)| a != b) {
            return Some(Mismatch::new(name, Value::Int(a), Value::Int(b), 0.0));
        }

        compare_opt("time", self.time, other.time, TIME_TOL)
            .or_else(|| compare_opt("latitude", self.latitude, other.latitude, DEGREE_TOL))
            .or_else(|| compare_opt("longitude", self.longitude, other.longitude, DEGREE_TOL))
            .or_else(|| compare_opt("hdop", self.hdop, other.hdop, HDOP_TOL))
            .or_else(|| compare_opt("altitude", self.altitude, other.altitude, HEIGHT_TOL))
            .or_else(|| {
                compare_opt(
                    "geoid_separation",
                    self.geoid_separation,
                    other.geoid_separation,
                    HEIGHT_TOL,
                )
            })
            .or_else(|| compare_opt("dgps_age", self.dgps_age, other.dgps_age, AGE_TOL))
    }
}
