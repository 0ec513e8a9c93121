use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Parking lot identifier as issued by the upstream feed (e.g. "dresdenaltmarkt").
pub type LotId = String;

/// A parking lot or garage with its static metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingLot {
    pub id: LotId,
    pub city: String,
    pub name: String,
    pub address: Option<String>,
    pub lot_type: Option<String>,
    pub total: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub region: Option<String>,
}

/// A stored snapshot of free spaces for one lot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub lot_id: LotId,
    pub city: String,
    pub timestamp: DateTime<FixedOffset>,
    pub free: i64,
    pub state: String,
}

/// A reading that has not been assigned a row id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub lot_id: LotId,
    pub city: String,
    pub timestamp: DateTime<FixedOffset>,
    pub free: i64,
    pub state: String,
}

/// A reading joined with its lot, carrying the derived occupancy target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub reading_id: i64,
    pub lot_id: LotId,
    pub name: String,
    pub total: i64,
    pub lot_type: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: DateTime<FixedOffset>,
    pub free: i64,
    pub occupied: i64,
    /// `None` when the lot reports zero capacity.
    pub occupancy_rate: Option<f64>,
}

impl OccupancyRecord {
    pub fn from_parts(reading: &Reading, lot: &ParkingLot) -> Self {
        let occupied = lot.total - reading.free;
        Self {
            reading_id: reading.id,
            lot_id: reading.lot_id.clone(),
            name: lot.name.clone(),
            total: lot.total,
            lot_type: lot.lot_type.clone(),
            latitude: lot.latitude,
            longitude: lot.longitude,
            timestamp: reading.timestamp,
            free: reading.free,
            occupied,
            occupancy_rate: occupancy_rate(lot.total, reading.free),
        }
    }
}

/// `(total - free) / total * 100`, or `None` for a zero-capacity lot.
pub fn occupancy_rate(total: i64, free: i64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some((total - free) as f64 / total as f64 * 100.0)
}
