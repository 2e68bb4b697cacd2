use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{LarkError, LarkResult};
use crate::http_utils::{handle_api_response, parse_json_response};

/// Enrichment data for one plan location, resolved through the Google
/// Places REST APIs.
#[derive(Debug, Clone)]
pub struct PlaceDetails {
    pub place_id: String,
    pub photo_url: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

// ── Google Places / Maps API response types ────────────────────────────

#[derive(Debug, Deserialize)]
struct FindPlaceResponse {
    candidates: Option<Vec<PlaceCandidate>>,
}

#[derive(Debug, Deserialize)]
struct PlaceCandidate {
    place_id: Option<String>,
    photos: Option<Vec<PlacePhoto>>,
}

#[derive(Debug, Deserialize)]
struct PlacePhoto {
    photo_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsResponse {
    result: Option<PlaceDetailsResult>,
}

#[derive(Debug, Deserialize)]
struct PlaceDetailsResult {
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Option<LatLng>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct TimeZoneResponse {
    #[serde(rename = "timeZoneId")]
    time_zone_id: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    routes: Option<Vec<DirectionsRoute>>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Option<Vec<DirectionsLeg>>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    duration: Option<DirectionsDuration>,
}

#[derive(Debug, Deserialize)]
struct DirectionsDuration {
    value: Option<i64>, // seconds
}

/// Client for the Google Places, Time Zone and Directions REST APIs
#[derive(Clone)]
pub struct PlacesService {
    api_key: String,
    photo_max_width: u32,
    http_client: reqwest::Client,
}

impl PlacesService {
    pub fn new(api_key: String, photo_max_width: u32) -> Self {
        Self {
            api_key,
            photo_max_width,
            http_client: reqwest::Client::new(),
        }
    }

    /// Resolve a free-text location to a place id, photo and coordinates.
    /// Returns None when no candidate matches.
    pub async fn find_place(&self, location: &str) -> LarkResult<Option<PlaceDetails>> {
        let location = location.trim();
        if location.is_empty() {
            return Err(LarkError::Validation {
                field: "location".to_string(),
                message: "location is empty".to_string(),
            });
        }

        debug!("Looking up place for location: {}", location);

        let response = self.http_client
            .get("https://maps.googleapis.com/maps/api/place/findplacefromtext/json")
            .query(&[
                ("input", location),
                ("inputtype", "textquery"),
                ("fields", "place_id,photos"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let response = handle_api_response(response, "Google Places").await?;
        let search: FindPlaceResponse = parse_json_response(response, "place search response").await?;

        let Some(candidate) = search.candidates.unwrap_or_default().into_iter().next() else {
            debug!("No place found for location: {}", location);
            return Ok(None);
        };

        let Some(place_id) = candidate.place_id else {
            return Ok(None);
        };

        let photo_url = candidate.photos
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|photo| photo.photo_reference)
            .map(|reference| self.photo_url(&reference));

        let Some((latitude, longitude)) = self.fetch_geometry(&place_id).await? else {
            warn!("Place {} has no geometry, skipping enrichment", place_id);
            return Ok(None);
        };

        Ok(Some(PlaceDetails {
            place_id,
            photo_url,
            latitude,
            longitude,
        }))
    }

    async fn fetch_geometry(&self, place_id: &str) -> LarkResult<Option<(f64, f64)>> {
        let response = self.http_client
            .get("https://maps.googleapis.com/maps/api/place/details/json")
            .query(&[
                ("place_id", place_id),
                ("fields", "geometry"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let response = handle_api_response(response, "Google Places").await?;
        let details: PlaceDetailsResponse = parse_json_response(response, "place details response").await?;

        Ok(details.result
            .and_then(|result| result.geometry)
            .and_then(|geometry| geometry.location)
            .map(|loc| (loc.lat, loc.lng)))
    }

    /// Resolve the IANA timezone at a coordinate for a given instant
    pub async fn resolve_timezone(&self, latitude: f64, longitude: f64, timestamp: i64) -> LarkResult<Option<Tz>> {
        let response = self.http_client
            .get("https://maps.googleapis.com/maps/api/timezone/json")
            .query(&[
                ("location", format!("{},{}", latitude, longitude)),
                ("timestamp", timestamp.to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let response = handle_api_response(response, "Google Time Zone").await?;
        let tz_response: TimeZoneResponse = parse_json_response(response, "timezone response").await?;

        if tz_response.status.as_deref() != Some("OK") {
            debug!("Time Zone API returned status {:?}", tz_response.status);
            return Ok(None);
        }

        let Some(zone_id) = tz_response.time_zone_id else {
            return Ok(None);
        };

        match zone_id.parse::<Tz>() {
            Ok(tz) => Ok(Some(tz)),
            Err(_) => {
                warn!("Time Zone API returned unknown zone id: {}", zone_id);
                Ok(None)
            }
        }
    }

    /// Travel duration in minutes between two coordinates, using the first
    /// route's first leg. Returns None when no route exists.
    pub async fn travel_minutes(
        &self,
        from: (f64, f64),
        to: (f64, f64),
        mode: &str,
    ) -> LarkResult<Option<i64>> {
        let response = self.http_client
            .get("https://maps.googleapis.com/maps/api/directions/json")
            .query(&[
                ("origin", format!("{},{}", from.0, from.1)),
                ("destination", format!("{},{}", to.0, to.1)),
                ("mode", mode.to_string()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await?;

        let response = handle_api_response(response, "Google Directions").await?;
        let directions: DirectionsResponse = parse_json_response(response, "directions response").await?;

        let seconds = directions.routes
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|route| route.legs.unwrap_or_default().into_iter().next())
            .and_then(|leg| leg.duration)
            .and_then(|duration| duration.value);

        // Round up so a 90-second hop still shows as travel time
        Ok(seconds.map(|s| (s + 59) / 60))
    }

    fn photo_url(&self, photo_reference: &str) -> String {
        format!(
            "https://maps.googleapis.com/maps/api/place/photo?maxwidth={}&photo_reference={}&key={}",
            self.photo_max_width,
            urlencoding::encode(photo_reference),
            self.api_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_url_encodes_reference() {
        let service = PlacesService::new("test-key".to_string(), 400);
        let url = service.photo_url("abc/def+g");
        assert!(url.contains("maxwidth=400"));
        assert!(url.contains("photo_reference=abc%2Fdef%2Bg"));
        assert!(url.contains("key=test-key"));
    }

    #[test]
    fn test_find_place_response_shape() {
        let raw = r#"{
            "candidates": [
                {"place_id": "ChIJxyz", "photos": [{"photo_reference": "ref123"}]}
            ],
            "status": "OK"
        }"#;
        let parsed: FindPlaceResponse = serde_json::from_str(raw).unwrap();
        let candidate = parsed.candidates.unwrap().into_iter().next().unwrap();
        assert_eq!(candidate.place_id.as_deref(), Some("ChIJxyz"));
    }

    #[test]
    fn test_directions_duration_extraction() {
        let raw = r#"{
            "routes": [{"legs": [{"duration": {"value": 1510, "text": "25 mins"}}]}]
        }"#;
        let parsed: DirectionsResponse = serde_json::from_str(raw).unwrap();
        let seconds = parsed.routes.unwrap()[0].legs.as_ref().unwrap()[0]
            .duration.as_ref().unwrap().value.unwrap();
        assert_eq!((seconds + 59) / 60, 26);
    }
}
