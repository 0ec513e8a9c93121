use std::f64::consts::PI;

use chrono::{Datelike, Timelike};

use super::frame::FeatureFrame;
use super::PipelineError;

/// Calendar feature columns, in frame order.
pub const TEMPORAL_COLUMNS: [&str; 15] = [
    "hour",
    "day_of_week",
    "day_of_month",
    "month",
    "year",
    "week_of_year",
    "hour_sin",
    "hour_cos",
    "day_sin",
    "day_cos",
    "month_sin",
    "month_cos",
    "is_weekend",
    "is_business_hours",
    "is_rush_hour",
];

/// `(sin, cos)` of `value` on a circle with the given period.
pub fn cyclical_encode(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Calendar features for a single timestamp, in [`TEMPORAL_COLUMNS`] order.
pub fn temporal_values<Tz: chrono::TimeZone>(ts: &chrono::DateTime<Tz>) -> [f64; 15] {
    let hour = ts.hour();
    // Monday = 0
    let dow = ts.weekday().num_days_from_monday();
    let month = ts.month();

    let (hour_sin, hour_cos) = cyclical_encode(hour as f64, 24.0);
    let (day_sin, day_cos) = cyclical_encode(dow as f64, 7.0);
    let (month_sin, month_cos) = cyclical_encode(month as f64, 12.0);

    let flag = |b: bool| if b { 1.0 } else { 0.0 };

    [
        hour as f64,
        dow as f64,
        ts.day() as f64,
        month as f64,
        ts.year() as f64,
        ts.iso_week().week() as f64,
        hour_sin,
        hour_cos,
        day_sin,
        day_cos,
        month_sin,
        month_cos,
        flag(dow >= 5),
        flag((8..=18).contains(&hour)),
        flag((7..=9).contains(&hour) || (16..=19).contains(&hour)),
    ]
}

pub fn add_temporal_features(frame: &mut FeatureFrame) -> Result<(), PipelineError> {
    let rows: Vec<[f64; 15]> = frame.keys().iter().map(|k| temporal_values(&k.timestamp)).collect();
    for (idx, name) in TEMPORAL_COLUMNS.iter().enumerate() {
        let column = rows.iter().map(|r| Some(r[idx])).collect();
        frame.add_column(*name, column)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at(y: i32, m: u32, d: u32, h: u32) -> chrono::DateTime<FixedOffset> {
        FixedOffset::east_opt(3600).unwrap().with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    fn value(values: &[f64; 15], name: &str) -> f64 {
        let idx = TEMPORAL_COLUMNS.iter().position(|c| *c == name).unwrap();
        values[idx]
    }

    #[test]
    fn cyclical_encoding_wraps() {
        let (s0, c0) = cyclical_encode(0.0, 24.0);
        let (s24, c24) = cyclical_encode(24.0, 24.0);
        assert!((s0 - s24).abs() < 1e-9);
        assert!((c0 - c24).abs() < 1e-9);

        let (s6, c6) = cyclical_encode(6.0, 24.0);
        assert!((s6 - 1.0).abs() < 1e-9);
        assert!(c6.abs() < 1e-9);
    }

    #[test]
    fn weekday_morning_rush() {
        // Monday 2024-03-04 08:30
        let v = temporal_values(&at(2024, 3, 4, 8));
        assert_eq!(value(&v, "hour"), 8.0);
        assert_eq!(value(&v, "day_of_week"), 0.0);
        assert_eq!(value(&v, "day_of_month"), 4.0);
        assert_eq!(value(&v, "month"), 3.0);
        assert_eq!(value(&v, "year"), 2024.0);
        assert_eq!(value(&v, "week_of_year"), 10.0);
        assert_eq!(value(&v, "is_weekend"), 0.0);
        assert_eq!(value(&v, "is_business_hours"), 1.0);
        assert_eq!(value(&v, "is_rush_hour"), 1.0);
    }

    #[test]
    fn weekend_evening() {
        // Sunday 2024-03-10 19:30
        let v = temporal_values(&at(2024, 3, 10, 19));
        assert_eq!(value(&v, "day_of_week"), 6.0);
        assert_eq!(value(&v, "is_weekend"), 1.0);
        assert_eq!(value(&v, "is_business_hours"), 0.0);
        assert_eq!(value(&v, "is_rush_hour"), 1.0);
    }

    #[test]
    fn iso_week_at_year_boundary() {
        // 2024-12-30 is a Monday in ISO week 1 of 2025
        let v = temporal_values(&at(2024, 12, 30, 12));
        assert_eq!(value(&v, "week_of_year"), 1.0);
        assert_eq!(value(&v, "year"), 2024.0);
        assert_eq!(value(&v, "is_rush_hour"), 0.0);
    }

    #[test]
    fn uses_recorded_wall_clock() {
        // 23:30 at +01:00 is 22:30 UTC; the feature keeps 23
        let v = temporal_values(&at(2024, 3, 4, 23));
        assert_eq!(value(&v, "hour"), 23.0);
    }
}
