use chrono::{DateTime, FixedOffset};
use sqlx::{FromRow, SqliteConnection};

use parkcast_core::{parse_timestamp, NewReading, OccupancyRecord, ParkingLot, Reading};

use crate::{Database, StorageError};

/// Optional filters for reading queries. Empty filter = every reading.
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    /// Inclusive lower bound.
    pub start: Option<DateTime<FixedOffset>>,
    /// Inclusive upper bound.
    pub end: Option<DateTime<FixedOffset>>,
    pub lot_ids: Vec<String>,
}

impl ReadingFilter {
    pub fn for_lot(lot_id: &str) -> Self {
        Self {
            lot_ids: vec![lot_id.to_string()],
            ..Default::default()
        }
    }

    /// Append `AND ...` clauses for column prefix `alias` and return the bind values in order.
    fn where_clause(&self, alias: &str) -> (String, Vec<String>) {
        let mut sql = String::from(" WHERE 1=1");
        let mut params = Vec::new();

        if let Some(start) = &self.start {
            sql.push_str(&format!(" AND {alias}timestamp >= ?"));
            params.push(start.to_rfc3339());
        }
        if let Some(end) = &self.end {
            sql.push_str(&format!(" AND {alias}timestamp <= ?"));
            params.push(end.to_rfc3339());
        }
        if !self.lot_ids.is_empty() {
            let placeholders = vec!["?"; self.lot_ids.len()].join(",");
            sql.push_str(&format!(" AND {alias}lot_id IN ({placeholders})"));
            params.extend(self.lot_ids.iter().cloned());
        }

        (sql, params)
    }
}

#[derive(FromRow)]
struct ReadingRow {
    id: i64,
    lot_id: String,
    city: String,
    timestamp: String,
    free: i64,
    state: String,
}

impl ReadingRow {
    fn into_reading(self) -> Result<Reading, StorageError> {
        Ok(Reading {
            id: self.id,
            timestamp: parse_timestamp(&self.timestamp)?,
            lot_id: self.lot_id,
            city: self.city,
            free: self.free,
            state: self.state,
        })
    }
}

#[derive(FromRow)]
struct CombinedRow {
    #[sqlx(flatten)]
    reading: ReadingRow,
    name: String,
    total: i64,
    lot_type: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    lot_city: String,
    address: Option<String>,
    region: Option<String>,
}

impl CombinedRow {
    fn into_record(self) -> Result<OccupancyRecord, StorageError> {
        let lot = ParkingLot {
            id: self.reading.lot_id.clone(),
            city: self.lot_city,
            name: self.name,
            address: self.address,
            lot_type: self.lot_type,
            total: self.total,
            latitude: self.latitude,
            longitude: self.longitude,
            region: self.region,
        };
        let reading = self.reading.into_reading()?;
        Ok(OccupancyRecord::from_parts(&reading, &lot))
    }
}

// Timestamps come back as TEXT regardless of how the writer stored them.
const READING_COLUMNS: &str =
    "r.id, r.lot_id, r.city, CAST(r.timestamp AS TEXT) AS timestamp, r.free, r.state";

const LOT_COLUMNS: &str = "l.name, l.total, l.lot_type, l.latitude, l.longitude, \
    l.city AS lot_city, l.address, l.region";

/// Most recent reading per lot: highest timestamp, ties broken by id.
const LATEST_PER_LOT: &str = "r.id = (SELECT r2.id FROM parking_readings r2 \
    WHERE r2.lot_id = r.lot_id ORDER BY r2.timestamp DESC, r2.id DESC LIMIT 1)";

impl Database {
    /// Readings matching `filter`, in chronological order.
    pub async fn load_readings(&self, filter: &ReadingFilter) -> Result<Vec<Reading>, StorageError> {
        let (where_sql, params) = filter.where_clause("r.");
        let sql = format!(
            "SELECT {READING_COLUMNS} FROM parking_readings r{where_sql} ORDER BY r.timestamp, r.id"
        );

        let mut query = sqlx::query_as::<_, ReadingRow>(&sql);
        for p in &params {
            query = query.bind(p);
        }
        let rows = query.fetch_all(self.pool()).await?;
        rows.into_iter().map(ReadingRow::into_reading).collect()
    }

    /// Chronological readings for a single lot.
    pub async fn time_series(&self, lot_id: &str) -> Result<Vec<Reading>, StorageError> {
        self.load_readings(&ReadingFilter::for_lot(lot_id)).await
    }

    /// Readings joined with their lot, carrying occupancy.
    ///
    /// Readings whose lot row is missing are dropped (inner join).
    pub async fn load_combined(&self, filter: &ReadingFilter) -> Result<Vec<OccupancyRecord>, StorageError> {
        let (where_sql, params) = filter.where_clause("r.");
        let sql = format!(
            "SELECT {READING_COLUMNS}, {LOT_COLUMNS} FROM parking_readings r \
             JOIN parking_lots l ON l.id = r.lot_id{where_sql} ORDER BY r.timestamp, r.id"
        );

        let mut query = sqlx::query_as::<_, CombinedRow>(&sql);
        for p in &params {
            query = query.bind(p);
        }
        let rows = query.fetch_all(self.pool()).await?;
        rows.into_iter().map(CombinedRow::into_record).collect()
    }

    /// Latest reading of each lot, optionally restricted to one lot.
    pub async fn latest_readings(&self, lot_id: Option<&str>) -> Result<Vec<Reading>, StorageError> {
        let mut sql = format!("SELECT {READING_COLUMNS} FROM parking_readings r WHERE {LATEST_PER_LOT}");
        if lot_id.is_some() {
            sql.push_str(" AND r.lot_id = ?");
        }
        sql.push_str(" ORDER BY r.timestamp, r.id");

        let mut query = sqlx::query_as::<_, ReadingRow>(&sql);
        if let Some(id) = lot_id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(self.pool()).await?;
        rows.into_iter().map(ReadingRow::into_reading).collect()
    }

    /// Latest reading of each known lot, joined with its metadata.
    pub async fn load_current(&self, lot_id: Option<&str>) -> Result<Vec<OccupancyRecord>, StorageError> {
        let mut sql = format!(
            "SELECT {READING_COLUMNS}, {LOT_COLUMNS} FROM parking_readings r \
             JOIN parking_lots l ON l.id = r.lot_id WHERE {LATEST_PER_LOT}"
        );
        if lot_id.is_some() {
            sql.push_str(" AND r.lot_id = ?");
        }
        sql.push_str(" ORDER BY r.timestamp, r.id");

        let mut query = sqlx::query_as::<_, CombinedRow>(&sql);
        if let Some(id) = lot_id {
            query = query.bind(id);
        }
        let rows = query.fetch_all(self.pool()).await?;
        rows.into_iter().map(CombinedRow::into_record).collect()
    }

    pub async fn insert_reading(&self, reading: &NewReading) -> Result<i64, StorageError> {
        let mut conn = self.pool().acquire().await?;
        insert_reading_tx(&mut conn, reading).await
    }
}

/// Insert a reading on an existing connection or transaction; returns its row id.
pub async fn insert_reading_tx(conn: &mut SqliteConnection, reading: &NewReading) -> Result<i64, StorageError> {
    let result = sqlx::query(
        "INSERT INTO parking_readings (lot_id, city, timestamp, free, state) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&reading.lot_id)
    .bind(&reading.city)
    .bind(reading.timestamp.to_rfc3339())
    .bind(reading.free)
    .bind(&reading.state)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 4, 8, 0, 0)
            .unwrap()
    }

    fn lot(id: &str, total: i64) -> ParkingLot {
        ParkingLot {
            id: id.into(),
            city: "Dresden".into(),
            name: format!("Lot {id}"),
            address: None,
            lot_type: None,
            total,
            latitude: None,
            longitude: None,
            region: None,
        }
    }

    fn new_reading(lot_id: &str, minutes: i64, free: i64) -> NewReading {
        NewReading {
            lot_id: lot_id.into(),
            city: "Dresden".into(),
            timestamp: base() + Duration::minutes(minutes),
            free,
            state: "open".into(),
        }
    }

    async fn seeded() -> Database {
        let db = Database::in_memory().await.unwrap();
        db.upsert_lot(&lot("a", 100)).await.unwrap();
        db.upsert_lot(&lot("b", 200)).await.unwrap();
        for (i, free) in [80, 60, 40].iter().enumerate() {
            db.insert_reading(&new_reading("a", i as i64 * 15, *free)).await.unwrap();
            db.insert_reading(&new_reading("b", i as i64 * 15 + 5, *free)).await.unwrap();
        }
        // reading for a lot that has no metadata row
        db.insert_reading(&new_reading("ghost", 3, 1)).await.unwrap();
        db
    }

    #[tokio::test]
    async fn readings_are_chronological() {
        let db = seeded().await;
        let all = db.load_readings(&ReadingFilter::default()).await.unwrap();
        assert_eq!(all.len(), 7);
        assert!(all.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(all[0].timestamp, base());
    }

    #[tokio::test]
    async fn filter_by_lot_and_range() {
        let db = seeded().await;
        let filter = ReadingFilter {
            start: Some(base() + Duration::minutes(10)),
            end: Some(base() + Duration::minutes(30)),
            lot_ids: vec!["a".into(), "b".into()],
        };
        let rows = db.load_readings(&filter).await.unwrap();
        let minutes: Vec<i64> = rows
            .iter()
            .map(|r| (r.timestamp - base()).num_minutes())
            .collect();
        assert_eq!(minutes, vec![15, 20, 30]);

        let series = db.time_series("b").await.unwrap();
        assert_eq!(series.len(), 3);
        assert!(series.iter().all(|r| r.lot_id == "b"));
    }

    #[tokio::test]
    async fn combined_joins_and_drops_unknown_lots() {
        let db = seeded().await;
        let records = db.load_combined(&ReadingFilter::default()).await.unwrap();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.lot_id != "ghost"));

        let first_b = records.iter().find(|r| r.lot_id == "b").unwrap();
        assert_eq!(first_b.total, 200);
        assert_eq!(first_b.occupied, 120);
        assert!((first_b.occupancy_rate.unwrap() - 60.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn latest_per_lot() {
        let db = seeded().await;
        let latest = db.latest_readings(None).await.unwrap();
        assert_eq!(latest.len(), 3);
        let a = latest.iter().find(|r| r.lot_id == "a").unwrap();
        assert_eq!(a.free, 40);
        assert_eq!((a.timestamp - base()).num_minutes(), 30);

        let only_b = db.latest_readings(Some("b")).await.unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].lot_id, "b");

        let current = db.load_current(None).await.unwrap();
        assert_eq!(current.len(), 2);
        assert!(current.iter().all(|r| r.free == 40));
    }

    #[tokio::test]
    async fn insert_in_transaction() {
        let db = Database::in_memory().await.unwrap();
        let mut tx = db.begin().await.unwrap();
        crate::upsert_lot_tx(&mut *tx, &lot("t", 10)).await.unwrap();
        let id = insert_reading_tx(&mut *tx, &new_reading("t", 0, 5)).await.unwrap();
        tx.commit().await.unwrap();

        assert!(id > 0);
        let current = db.load_current(Some("t")).await.unwrap();
        assert_eq!(current.len(), 1);
        assert!((current[0].occupancy_rate.unwrap() - 50.0).abs() < 1e-10);
    }

    #[tokio::test]
    async fn reads_go_driver_timestamps() {
        let db = Database::in_memory().await.unwrap();
        db.upsert_lot(&lot("g", 10)).await.unwrap();
        sqlx::query(
            "INSERT INTO parking_readings (lot_id, city, timestamp, free, state) \
             VALUES ('g', 'Dresden', '2024-03-04 09:15:00.123+01:00', 3, 'open')",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let rows = db.time_series("g").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].timestamp.offset().local_minus_utc(), 3600);
    }
}
