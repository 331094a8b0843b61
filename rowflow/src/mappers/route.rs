use chrono::{NaiveDateTime, Timelike};

use crate::error::{FlowError, Result};
use crate::row::Row;
use crate::types::{Mapper, Rows};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Timestamp shapes accepted by [ProcessTime], including the compact
/// `YYYYMMDDThhmmss.ffffff` form used by the travel-time data.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

fn parse_timestamp(text: &str, field: &str) -> Result<NaiveDateTime> {
    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(parsed);
        }
    }
    Err(FlowError::Field {
        field: field.to_string(),
        reason: format!("unrecognised timestamp {text:?}"),
    })
}

fn lon_lat(row: &Row, field: &str) -> Result<(f64, f64)> {
    let pair = row.list_field(field)?;
    match pair {
        [lon, lat] => match (lon.as_f64(), lat.as_f64()) {
            (Some(lon), Some(lat)) => Ok((lon, lat)),
            _ => Err(bad_coordinates(field)),
        },
        _ => Err(bad_coordinates(field)),
    }
}

fn bad_coordinates(field: &str) -> FlowError {
    FlowError::Field {
        field: field.to_string(),
        reason: "expected a [lon, lat] pair".to_string(),
    }
}

/// Writes the great-circle distance in kilometres between two
/// `[lon, lat]` coordinate pairs, via the haversine formula.
pub struct ProcessLength {
    start: String,
    end: String,
    length: String,
}

impl ProcessLength {
    pub fn new(
        start: impl Into<String>,
        end: impl Into<String>,
        length: impl Into<String>,
    ) -> ProcessLength {
        ProcessLength {
            start: start.into(),
            end: end.into(),
            length: length.into(),
        }
    }
}

impl Mapper for ProcessLength {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let (lon1, lat1) = lon_lat(&row, &self.start)?;
        let (lon2, lat2) = lon_lat(&row, &self.end)?;
        let (lon1, lat1) = (lon1.to_radians(), lat1.to_radians());
        let (lon2, lat2) = (lon2.to_radians(), lat2.to_radians());
        let half_dlat = (lat2 - lat1) / 2.0;
        let half_dlon = (lon2 - lon1) / 2.0;
        let h = half_dlat.sin().powi(2) + lat1.cos() * lat2.cos() * half_dlon.sin().powi(2);
        row.set(self.length.clone(), EARTH_RADIUS_KM * 2.0 * h.sqrt().asin());
        out.push(row);
        Ok(())
    }
}

/// Parses the enter and leave timestamps of an edge traversal and
/// writes the short weekday name and hour of entry plus the traversal
/// duration in seconds.
pub struct ProcessTime {
    enter: String,
    leave: String,
    duration: String,
    weekday: String,
    hour: String,
}

impl ProcessTime {
    pub fn new(
        enter: impl Into<String>,
        leave: impl Into<String>,
        duration: impl Into<String>,
        weekday: impl Into<String>,
        hour: impl Into<String>,
    ) -> ProcessTime {
        ProcessTime {
            enter: enter.into(),
            leave: leave.into(),
            duration: duration.into(),
            weekday: weekday.into(),
            hour: hour.into(),
        }
    }
}

impl Mapper for ProcessTime {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let entered = parse_timestamp(row.str_field(&self.enter)?, &self.enter)?;
        let left = parse_timestamp(row.str_field(&self.leave)?, &self.leave)?;
        let delta = left - entered;
        let seconds = match delta.num_microseconds() {
            Some(us) => us as f64 / 1e6,
            None => delta.num_milliseconds() as f64 / 1e3,
        };
        row.set(self.weekday.clone(), entered.format("%a").to_string());
        row.set(self.hour.clone(), entered.hour() as i64);
        row.set(self.duration.clone(), seconds);
        out.push(row);
        Ok(())
    }
}

/// Speed in km/h from a length in kilometres and a duration in seconds.
pub struct ProcessSpeed {
    length: String,
    duration: String,
    speed: String,
}

impl ProcessSpeed {
    pub fn new(
        length: impl Into<String>,
        duration: impl Into<String>,
        speed: impl Into<String>,
    ) -> ProcessSpeed {
        ProcessSpeed {
            length: length.into(),
            duration: duration.into(),
            speed: speed.into(),
        }
    }
}

impl Mapper for ProcessSpeed {
    fn apply(&self, mut row: Row, out: &mut Rows) -> Result<()> {
        let length = row.num_field(&self.length)?;
        let duration = row.num_field(&self.duration)?;
        row.set(self.speed.clone(), length / duration * 3600.0);
        out.push(row);
        Ok(())
    }
}
