use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use parkcast_core::ParkingLot;

use crate::error::IngestError;

pub const DEFAULT_BASE_URL: &str = "https://api.parkendd.de";

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub active_support: bool,
    pub coords: Option<Coords>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CitiesResponse {
    cities: HashMap<String, CityInfo>,
}

/// One lot as reported by `GET /{city}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LotSnapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub coords: Option<Coords>,
    #[serde(default)]
    pub lot_type: String,
    #[serde(default)]
    pub free: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub forecast: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CitySnapshot {
    #[serde(default)]
    pub last_downloaded: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub lots: Vec<LotSnapshot>,
}

/// Free-space part of a lot snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LotReading {
    pub lot_id: String,
    pub free: i64,
    pub state: String,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl CitySnapshot {
    /// Split into lot metadata and readings, index-aligned.
    pub fn into_records(self, city: &str) -> (Vec<ParkingLot>, Vec<LotReading>) {
        self.lots
            .into_iter()
            .map(|lot| {
                let reading = LotReading {
                    lot_id: lot.id.clone(),
                    free: lot.free,
                    state: lot.state.clone(),
                };
                let meta = ParkingLot {
                    address: non_empty(&lot.address),
                    lot_type: non_empty(&lot.lot_type),
                    region: non_empty(&lot.region),
                    latitude: lot.coords.map(|c| c.lat),
                    longitude: lot.coords.map(|c| c.lng),
                    id: lot.id,
                    city: city.to_string(),
                    name: lot.name,
                    total: lot.total,
                };
                (meta, reading)
            })
            .unzip()
    }
}

/// Source of city snapshots.
#[async_trait]
pub trait ParkingFeed: Send + Sync {
    async fn cities(&self) -> Result<HashMap<String, CityInfo>, IngestError>;

    async fn city_snapshot(&self, city: &str) -> Result<CitySnapshot, IngestError>;
}

/// HTTP client for the ParkenDD API.
pub struct ParkenddClient {
    client: Client,
    base_url: String,
}

impl ParkenddClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: String) -> Result<T, IngestError> {
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Api { status, url, body });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ParkingFeed for ParkenddClient {
    async fn cities(&self) -> Result<HashMap<String, CityInfo>, IngestError> {
        let parsed: CitiesResponse = self.get_json(self.base_url.clone()).await?;
        Ok(parsed.cities)
    }

    async fn city_snapshot(&self, city: &str) -> Result<CitySnapshot, IngestError> {
        self.get_json(format!("{}/{}", self.base_url, city)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DRESDEN: &str = r#"{
        "last_downloaded": "2024-03-04T09:15:02",
        "last_updated": "2024-03-04T09:10:00",
        "lots": [
            {
                "id": "dresdenaltmarkt",
                "name": "Altmarkt",
                "address": "Wilsdruffer Straße",
                "coords": {"lat": 51.05, "lng": 13.737},
                "lot_type": "Tiefgarage",
                "free": 120,
                "total": 400,
                "state": "open",
                "region": "Innere Altstadt",
                "forecast": true
            },
            {
                "id": "dresdenpostplatz",
                "name": "Postplatz",
                "address": "",
                "lot_type": "",
                "free": 0,
                "total": 0,
                "state": "nodata"
            }
        ]
    }"#;

    #[test]
    fn snapshot_into_records() {
        let snapshot: CitySnapshot = serde_json::from_str(DRESDEN).unwrap();
        let (lots, readings) = snapshot.into_records("Dresden");

        assert_eq!(lots.len(), 2);
        assert_eq!(lots[0].id, "dresdenaltmarkt");
        assert_eq!(lots[0].city, "Dresden");
        assert_eq!(lots[0].address.as_deref(), Some("Wilsdruffer Straße"));
        assert_eq!(lots[0].latitude, Some(51.05));
        assert_eq!(lots[0].region.as_deref(), Some("Innere Altstadt"));

        assert_eq!(lots[1].address, None);
        assert_eq!(lots[1].lot_type, None);
        assert_eq!(lots[1].latitude, None);
        assert_eq!(lots[1].longitude, None);

        assert_eq!(
            readings[0],
            LotReading {
                lot_id: "dresdenaltmarkt".into(),
                free: 120,
                state: "open".into()
            }
        );
        assert_eq!(readings[1].state, "nodata");
    }

    #[test]
    fn cities_response_parses() {
        let raw = r#"{"api_version": "1.0", "cities": {
            "Dresden": {"name": "Dresden", "active_support": true,
                        "coords": {"lat": 51.05, "lng": 13.74},
                        "source": "https://www.dresden.de", "url": "https://www.dresden.de/parken"}
        }}"#;
        let parsed: CitiesResponse = serde_json::from_str(raw).unwrap();
        let dresden = &parsed.cities["Dresden"];
        assert!(dresden.active_support);
        assert_eq!(dresden.coords, Some(Coords { lat: 51.05, lng: 13.74 }));
    }

    #[test]
    fn client_trims_base_url() {
        let client = ParkenddClient::new("http://localhost:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9");
    }

    #[tokio::test]
    async fn unreachable_host_is_http_error() {
        let client = ParkenddClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let err = client.city_snapshot("Dresden").await.unwrap_err();
        assert!(matches!(err, IngestError::Http(_)));
    }
}
