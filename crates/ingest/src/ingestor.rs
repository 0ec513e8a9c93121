use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use parkcast_core::NewReading;
use parkcast_storage::{insert_reading_tx, upsert_lot_tx, Database};

use crate::error::IngestError;
use crate::parkendd::ParkingFeed;

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub cities_ok: usize,
    pub cities_failed: usize,
    pub lots_stored: usize,
}

/// Periodically snapshots every configured city into the database.
pub struct Ingestor {
    db: Database,
    feed: Arc<dyn ParkingFeed>,
    cities: Vec<String>,
    interval: Duration,
}

impl Ingestor {
    pub fn new(db: Database, feed: Arc<dyn ParkingFeed>, cities: Vec<String>, interval: Duration) -> Self {
        Self {
            db,
            feed,
            cities,
            interval,
        }
    }

    /// Poll every city once. A failing city is logged and skipped.
    pub async fn poll_once(&self) -> PollSummary {
        let now = Local::now().fixed_offset();
        info!("Starting poll cycle at {}", now.to_rfc3339());

        let mut summary = PollSummary::default();
        for city in &self.cities {
            match self.poll_city(city, now).await {
                Ok(stored) => {
                    info!(city = %city, lots = stored, "polled city");
                    summary.cities_ok += 1;
                    summary.lots_stored += stored;
                }
                Err(e) => {
                    error!(city = %city, error = %e, "error polling city");
                    summary.cities_failed += 1;
                }
            }
        }
        summary
    }

    /// Fetch one city and store it in a single transaction.
    pub async fn poll_city(&self, city: &str, timestamp: DateTime<FixedOffset>) -> Result<usize, IngestError> {
        let snapshot = self.feed.city_snapshot(city).await?;
        let (lots, readings) = snapshot.into_records(city);

        let mut tx = self.db.begin().await?;
        for (lot, reading) in lots.iter().zip(&readings) {
            upsert_lot_tx(&mut *tx, lot).await?;
            insert_reading_tx(
                &mut *tx,
                &NewReading {
                    lot_id: reading.lot_id.clone(),
                    city: city.to_string(),
                    timestamp,
                    free: reading.free,
                    state: reading.state.clone(),
                },
            )
            .await?;
        }
        tx.commit().await.map_err(parkcast_storage::StorageError::from)?;

        Ok(lots.len())
    }

    /// Poll immediately, then every interval until `shutdown` is notified.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        if self.cities.is_empty() {
            warn!("no cities configured; nothing to poll");
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.poll_once().await;
                    info!(
                        ok = summary.cities_ok,
                        failed = summary.cities_failed,
                        lots = summary.lots_stored,
                        "poll cycle complete"
                    );
                }
                _ = shutdown.notified() => {
                    info!("ingestor shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::*;
    use crate::parkendd::{CityInfo, CitySnapshot};

    /// Serves canned snapshots and counts calls.
    struct FakeFeed {
        snapshots: HashMap<String, String>,
        calls: Mutex<usize>,
    }

    impl FakeFeed {
        fn new() -> Self {
            let mut snapshots = HashMap::new();
            snapshots.insert(
                "Dresden".to_string(),
                r#"{"lots": [
                    {"id": "altmarkt", "name": "Altmarkt", "total": 400, "free": 100, "state": "open",
                     "coords": {"lat": 51.05, "lng": 13.73}},
                    {"id": "postplatz", "name": "Postplatz", "total": 200, "free": 50, "state": "open"}
                ]}"#
                .to_string(),
            );
            Self {
                snapshots,
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl ParkingFeed for FakeFeed {
        async fn cities(&self) -> Result<HashMap<String, CityInfo>, IngestError> {
            Ok(HashMap::new())
        }

        async fn city_snapshot(&self, city: &str) -> Result<CitySnapshot, IngestError> {
            *self.calls.lock().await += 1;
            match self.snapshots.get(city) {
                Some(raw) => Ok(serde_json::from_str(raw).unwrap()),
                None => Err(IngestError::Api {
                    status: 404,
                    url: format!("fake/{city}"),
                    body: "unknown city".into(),
                }),
            }
        }
    }

    async fn ingestor(cities: &[&str]) -> (Ingestor, Database, Arc<FakeFeed>) {
        let db = Database::in_memory().await.unwrap();
        let feed = Arc::new(FakeFeed::new());
        let ing = Ingestor::new(
            db.clone(),
            feed.clone(),
            cities.iter().map(|c| c.to_string()).collect(),
            Duration::from_millis(20),
        );
        (ing, db, feed)
    }

    #[tokio::test]
    async fn poll_stores_lots_and_readings() {
        let (ing, db, _) = ingestor(&["Dresden"]).await;
        let summary = ing.poll_once().await;
        assert_eq!(
            summary,
            PollSummary {
                cities_ok: 1,
                cities_failed: 0,
                lots_stored: 2
            }
        );

        assert_eq!(db.count_lots().await.unwrap(), 2);
        let lot = db.find_lot("altmarkt").await.unwrap().unwrap();
        assert_eq!(lot.city, "Dresden");
        assert_eq!(lot.longitude, Some(13.73));

        let latest = db.latest_readings(None).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert!(latest.iter().all(|r| r.city == "Dresden"));
        // one timestamp per cycle
        assert_eq!(latest[0].timestamp, latest[1].timestamp);
    }

    #[tokio::test]
    async fn failing_city_is_skipped() {
        let (ing, db, _) = ingestor(&["Atlantis", "Dresden"]).await;
        let summary = ing.poll_once().await;
        assert_eq!(summary.cities_failed, 1);
        assert_eq!(summary.cities_ok, 1);
        assert_eq!(db.count_lots().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn repeated_polls_append_readings() {
        let (ing, db, _) = ingestor(&["Dresden"]).await;
        ing.poll_once().await;
        ing.poll_once().await;
        assert_eq!(db.count_lots().await.unwrap(), 2);
        assert_eq!(db.time_series("altmarkt").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn run_polls_until_shutdown() {
        let (ing, _db, feed) = ingestor(&["Dresden"]).await;
        let shutdown = Arc::new(Notify::new());

        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(70)).await;
            stopper.notify_one();
        });

        tokio::time::timeout(Duration::from_secs(5), ing.run(shutdown))
            .await
            .unwrap();
        assert!(*feed.calls.lock().await >= 2);
    }
}
