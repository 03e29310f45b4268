use emdgm_types::DatagramKind;

use super::header_only;
use crate::schema::{Field, Rule, Schema};

pub static CLOCK_HEADER: Schema = Schema::new(
    "clock header",
    &[
        Field::new("Counter", Rule::U16),
        Field::new("SerialNumber", Rule::U16),
        Field::new("ExternalDate", Rule::U32),
        Field::new("ExternalTimeMs", Rule::U32),
        Field::new("PpsInUse", Rule::U8),
    ],
);

header_only!(
    /// Время внешних часов (67).
    ClockDatagram,
    DatagramKind::Clock,
    CLOCK_HEADER
);

impl ClockDatagram {
    /// POSIX-время внешних часов.
    pub fn external_time(&self) -> Option<f64> {
        let date = self.header.int("ExternalDate").ok()?;
        let ms = self.header.int("ExternalTimeMs").ok()?;
        crate::format::posix_time(date as u32, ms as u32)
    }
}
