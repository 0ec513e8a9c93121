use sqlx::{FromRow, SqliteConnection};

use parkcast_core::ParkingLot;

use crate::{Database, StorageError};

const UPSERT_LOT: &str = "\
    INSERT INTO parking_lots ( \
        id, city, name, address, lot_type, total, \
        latitude, longitude, region, updated_at \
    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP) \
    ON CONFLICT(id) DO UPDATE SET \
        name = excluded.name, \
        address = excluded.address, \
        lot_type = excluded.lot_type, \
        total = excluded.total, \
        latitude = excluded.latitude, \
        longitude = excluded.longitude, \
        region = excluded.region, \
        updated_at = CURRENT_TIMESTAMP";

const SELECT_LOT: &str = "\
    SELECT id, city, name, address, lot_type, total, latitude, longitude, region \
    FROM parking_lots";

#[derive(FromRow)]
struct LotRow {
    id: String,
    city: String,
    name: String,
    address: Option<String>,
    lot_type: Option<String>,
    total: i64,
    latitude: Option<f64>,
    longitude: Option<f64>,
    region: Option<String>,
}

impl From<LotRow> for ParkingLot {
    fn from(row: LotRow) -> Self {
        ParkingLot {
            id: row.id,
            city: row.city,
            name: row.name,
            address: row.address,
            lot_type: row.lot_type,
            total: row.total,
            latitude: row.latitude,
            longitude: row.longitude,
            region: row.region,
        }
    }
}

impl Database {
    /// All parking lots, ordered by id.
    pub async fn load_parking_lots(&self) -> Result<Vec<ParkingLot>, StorageError> {
        let rows: Vec<LotRow> = sqlx::query_as(&format!("{SELECT_LOT} ORDER BY id"))
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(ParkingLot::from).collect())
    }

    pub async fn find_lot(&self, lot_id: &str) -> Result<Option<ParkingLot>, StorageError> {
        let row: Option<LotRow> = sqlx::query_as(&format!("{SELECT_LOT} WHERE id = ?"))
            .bind(lot_id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.map(ParkingLot::from))
    }

    pub async fn count_lots(&self) -> Result<i64, StorageError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parking_lots")
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }

    /// Insert a lot or refresh its metadata. `city` is kept from the first insert.
    pub async fn upsert_lot(&self, lot: &ParkingLot) -> Result<(), StorageError> {
        let mut conn = self.pool().acquire().await?;
        upsert_lot_tx(&mut conn, lot).await
    }
}

/// Upsert a lot on an existing connection or transaction.
pub async fn upsert_lot_tx(conn: &mut SqliteConnection, lot: &ParkingLot) -> Result<(), StorageError> {
    sqlx::query(UPSERT_LOT)
        .bind(&lot.id)
        .bind(&lot.city)
        .bind(&lot.name)
        .bind(&lot.address)
        .bind(&lot.lot_type)
        .bind(lot.total)
        .bind(lot.latitude)
        .bind(lot.longitude)
        .bind(&lot.region)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
