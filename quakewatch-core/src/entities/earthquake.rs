use crate::entities::ParseError;
use crate::framework::DatabaseProcessor;
use crate::geo::{Coordinate, parse_coordinate_component, parse_hemisphere_component};
use kanau::processor::Processor;
use quakewatch_sdk::objects::Gempa;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// A normalised earthquake report.
///
/// Created once per ingestion cycle and never mutated afterwards; the next
/// cycle's event simply supersedes it.
#[derive(Debug, Clone, PartialEq)]
pub struct EarthquakeEvent {
    pub magnitude: f64,
    pub epicenter: Coordinate,
    /// Informational only, not used by the felt-radius model.
    pub depth_km: Option<f64>,
    pub occurred_at: OffsetDateTime,
    pub region: String,
    pub shakemap: String,
    pub fetched_at: OffsetDateTime,
    /// The upstream fields as received, kept for storage.
    pub raw: Gempa,
}

impl EarthquakeEvent {
    /// Normalise an upstream report.
    ///
    /// The signed `Coordinates` pair is preferred; when it is absent or
    /// malformed the hemisphere-suffixed `Lintang`/`Bujur` fields are used.
    /// An unparsable `DateTime` falls back to `fetched_at`.
    pub fn from_report(raw: Gempa, fetched_at: OffsetDateTime) -> Result<Self, ParseError> {
        let magnitude = raw
            .magnitude
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|m| m.is_finite())
            .ok_or_else(|| ParseError::Magnitude(raw.magnitude.clone()))?;

        let epicenter = parse_coordinate_pair(&raw.coordinates)
            .or_else(|| {
                Coordinate::new(
                    parse_hemisphere_component(&raw.lintang)?,
                    parse_hemisphere_component(&raw.bujur)?,
                )
            })
            .ok_or_else(|| ParseError::Epicenter {
                coordinates: raw.coordinates.clone(),
                latitude: raw.lintang.clone(),
                longitude: raw.bujur.clone(),
            })?;

        let occurred_at = match OffsetDateTime::parse(raw.date_time.trim(), &Rfc3339) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(
                    date_time = %raw.date_time,
                    error = %e,
                    "Unparsable event timestamp, using fetch time"
                );
                fetched_at
            }
        };

        Ok(Self {
            magnitude,
            epicenter,
            depth_km: parse_coordinate_component(&raw.kedalaman),
            occurred_at,
            region: raw.wilayah.clone(),
            shakemap: raw.shakemap.clone(),
            fetched_at,
            raw,
        })
    }

    /// Key identifying the physical event across polling cycles.
    pub fn identity(&self) -> &str {
        if self.shakemap.is_empty() {
            &self.raw.date_time
        } else {
            &self.shakemap
        }
    }
}

fn parse_coordinate_pair(input: &str) -> Option<Coordinate> {
    let (lat, lon) = input.split_once(',')?;
    Coordinate::new(
        parse_coordinate_component(lat)?,
        parse_coordinate_component(lon)?,
    )
}

#[derive(Debug, Clone)]
/// Store one fetched event together with its raw upstream fields.
pub struct InsertEarthquakeRecord {
    pub identity: String,
    pub magnitude: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub depth_km: Option<f64>,
    pub region: String,
    pub occurred_at: OffsetDateTime,
    pub fetched_at: OffsetDateTime,
    pub raw: serde_json::Value,
}

impl InsertEarthquakeRecord {
    pub fn from_event(event: &EarthquakeEvent) -> Result<Self, serde_json::Error> {
        Ok(Self {
            identity: event.identity().to_string(),
            magnitude: event.magnitude,
            latitude: event.epicenter.lat(),
            longitude: event.epicenter.lon(),
            depth_km: event.depth_km,
            region: event.region.clone(),
            occurred_at: event.occurred_at,
            fetched_at: event.fetched_at,
            raw: serde_json::to_value(&event.raw)?,
        })
    }
}

impl Processor<InsertEarthquakeRecord> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertEarthquakeRecord")]
    async fn process(&self, insert: InsertEarthquakeRecord) -> Result<i64, sqlx::Error> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO earthquakes
                (identity, magnitude, latitude, longitude, depth_km, region, occurred_at, fetched_at, raw)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(insert.identity)
        .bind(insert.magnitude)
        .bind(insert.latitude)
        .bind(insert.longitude)
        .bind(insert.depth_km)
        .bind(insert.region)
        .bind(insert.occurred_at)
        .bind(insert.fetched_at)
        .bind(insert.raw)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}

#[derive(Debug, Clone, Copy)]
/// Identity of the most recently fetched event, if any was ever stored.
pub struct GetLatestEarthquakeIdentity;

impl Processor<GetLatestEarthquakeIdentity> for DatabaseProcessor {
    type Output = Option<String>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetLatestEarthquakeIdentity")]
    async fn process(&self, _: GetLatestEarthquakeIdentity) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT identity FROM earthquakes
            ORDER BY fetched_at DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
    }
}
