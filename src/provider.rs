//! Route provider: walking directions from an external routing service.
//!
//! `RouteProvider` is the seam the navigator fetches through. `OrsProvider`
//! talks to openrouteservice; tests plug in their own implementations.
//!
//! Providers never retry. A failed fetch is reported once and the caller
//! decides whether to keep its previous route.

use std::sync::Mutex;
use std::time::Instant;

use futures::future::BoxFuture;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, TravelProfile};
use crate::error::{NavError, OptionExt, Result};
use crate::route::{Route, RouteStep};
use crate::GeoPoint;

/// Source of routes between two points.
pub trait RouteProvider: Send + Sync {
    /// Fetch a route from `origin` to `destination`.
    ///
    /// Fails with `RouteUnavailable` on network errors, non-success status
    /// or an empty route list, and with `InvalidRoute` on malformed geometry.
    fn fetch_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Route>>;
}

/// Request body for the directions endpoint
#[derive(Debug, Serialize)]
struct DirectionsRequest<'a> {
    /// [lon, lat] pairs, origin first
    coordinates: [[f64; 2]; 2],
    instructions: bool,
    language: &'a str,
}

/// API response for the directions endpoint
#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<ApiRoute>,
}

#[derive(Debug, Deserialize)]
struct ApiRoute {
    #[serde(default)]
    summary: ApiSummary,
    #[serde(default)]
    segments: Vec<ApiSegment>,
    /// Encoded polyline, precision 5
    geometry: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiSummary {
    distance: Option<f64>,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    #[serde(default)]
    steps: Vec<ApiStep>,
}

#[derive(Debug, Deserialize)]
struct ApiStep {
    #[serde(default)]
    distance: f64,
    instruction: String,
    /// [first, last] polyline vertex covered by this step
    way_points: [usize; 2],
}

/// openrouteservice directions client.
pub struct OrsProvider {
    client: Client,
    config: ProviderConfig,
    profile: TravelProfile,
    last_route: Mutex<Option<Route>>,
}

impl OrsProvider {
    /// Create a client for the given travel profile.
    pub fn new(config: ProviderConfig, profile: TravelProfile) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(NavError::config("openrouteservice api_key is required"));
        }

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| NavError::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            profile,
            last_route: Mutex::new(None),
        })
    }

    pub fn profile(&self) -> TravelProfile {
        self.profile
    }

    /// The most recently fetched route, if any.
    pub fn last_route(&self) -> Option<Route> {
        self.last_route.lock().ok().and_then(|r| r.clone())
    }

    fn directions_url(&self) -> String {
        format!(
            "{}/v2/directions/{}",
            self.config.base_url.trim_end_matches('/'),
            self.profile.as_str()
        )
    }

    async fn request_route(&self, origin: GeoPoint, destination: GeoPoint) -> Result<Route> {
        let origin = origin.validated()?;
        let destination = destination.validated()?;

        let url = self.directions_url();
        let body = DirectionsRequest {
            coordinates: [
                [origin.longitude, origin.latitude],
                [destination.longitude, destination.latitude],
            ],
            instructions: true,
            language: &self.config.language,
        };

        let start = Instant::now();
        debug!("[OrsProvider] POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NavError::route_unavailable(format!("Request error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("[OrsProvider] HTTP {} from directions API", status);
            return Err(NavError::RouteUnavailable {
                message: api_error_message(&text),
                status_code: Some(status.as_u16()),
            });
        }

        let data: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| NavError::route_unavailable(format!("Parse error: {}", e)))?;

        let route = route_from_response(data)?;

        info!(
            "[OrsProvider] Route fetched: {} points, {} steps, {:.0} m ({} ms)",
            route.polyline().len(),
            route.steps().len(),
            route.distance_m,
            start.elapsed().as_millis()
        );

        if let Ok(mut last) = self.last_route.lock() {
            *last = Some(route.clone());
        }

        Ok(route)
    }
}

impl RouteProvider for OrsProvider {
    fn fetch_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> BoxFuture<'_, Result<Route>> {
        Box::pin(self.request_route(origin, destination))
    }
}

/// Parse a directions API JSON body into a `Route`, selecting the first
/// candidate route.
pub fn parse_directions_json(json: &str) -> Result<Route> {
    let data: DirectionsResponse = serde_json::from_str(json)
        .map_err(|e| NavError::route_unavailable(format!("Parse error: {}", e)))?;
    route_from_response(data)
}

fn route_from_response(data: DirectionsResponse) -> Result<Route> {
    let api_route = data
        .routes
        .into_iter()
        .next()
        .ok_or_route_unavailable("directions API returned no routes")?;

    let polyline = decode_geometry(&api_route.geometry)?;

    // A step's distance runs to the next step, so each RouteStep carries
    // the distance of the step before it.
    let mut steps = Vec::new();
    let mut previous_distance = 0.0;
    for api_step in api_route.segments.iter().flat_map(|s| s.steps.iter()) {
        let location = polyline
            .get(api_step.way_points[0])
            .copied()
            .ok_or_invalid_route(
                polyline.len(),
                &format!(
                    "step way point {} beyond geometry",
                    api_step.way_points[0]
                ),
            )?;
        steps.push(RouteStep::new(
            api_step.instruction.clone(),
            location,
            previous_distance,
        ));
        previous_distance = api_step.distance;
    }

    let route = Route::new(polyline, steps)?;
    Ok(match api_route.summary.distance {
        Some(distance) => route.with_summary(distance, api_route.summary.duration),
        None => route,
    })
}

fn decode_geometry(encoded: &str) -> Result<Vec<GeoPoint>> {
    let line = polyline::decode_polyline(encoded, 5).map_err(|e| NavError::InvalidRoute {
        point_count: 0,
        minimum_required: 2,
        message: format!("undecodable geometry: {}", e),
    })?;

    // geo coordinates are (x, y) = (lng, lat)
    Ok(line.coords().map(|c| GeoPoint::new(c.y, c.x)).collect())
}

/// Pull `error.message` out of an openrouteservice error body, falling back
/// to the raw text.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
