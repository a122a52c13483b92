//! Tour endpoints beyond plain CRUD: the top-5 alias, statistics, the
//! monthly plan and the geo queries

use super::factory::{self, Resource, list_envelope};
use super::{bookings, reviews};
use crate::auth::middleware::{STAFF, TOUR_PLANNERS};
use crate::auth::restricted;
use crate::core::entity::Entity;
use crate::core::error::{AppError, AppResult, ValidationError};
use crate::core::extractors::ApiQuery;
use crate::core::query::{Comparison, Condition};
use crate::core::service::DataService;
use crate::entities::Tour;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::Datelike;
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::collections::HashMap;

/// Earth radius used for geo queries
const EARTH_RADIUS_KM: f64 = 6378.1;
const EARTH_RADIUS_MI: f64 = 3963.2;
const METERS_TO_MILES: f64 = 0.000621371;
const METERS_TO_KM: f64 = 0.001;

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/top-5-cheap", get(top_tours))
        .route("/tour-stats", get(tour_stats))
        .route(
            "/monthly-plan/{year}",
            restricted(state, TOUR_PLANNERS, get(monthly_plan)),
        )
        .route(
            "/tours-within/{distance}/center/{latlng}/unit/{unit}",
            get(tours_within),
        )
        .route("/distances/{latlng}/unit/{unit}", get(distances))
        .route(
            "/",
            get(factory::list::<Tour>)
                .merge(restricted(state, STAFF, post(factory::create_one::<Tour>))),
        )
        .route(
            "/{tourId}",
            get(factory::get_one::<Tour>).merge(restricted(
                state,
                STAFF,
                patch(factory::update_one::<Tour>)
                    .delete(factory::delete_one::<Tour>),
            )),
        )
        .nest("/{tourId}/reviews", reviews::routes(state))
        .route("/{tourId}/bookings", bookings::nested_routes(state))
}

pub async fn top_tours(
    State(resource): State<Resource<Tour>>,
    ApiQuery(params): ApiQuery,
) -> AppResult<Json<Value>> {
    let params = params
        .with("limit", "5")
        .with("sort", "-ratingsAverage,price")
        .with("fields", "name,price,ratingsAverage,summary,difficulty");
    let docs = resource.get_all(&HashMap::new(), &params).await?;
    Ok(list_envelope(docs))
}

#[derive(Default)]
struct DifficultyStats {
    tours: u64,
    ratings: u64,
    rating_sum: f64,
    price_sum: f64,
    min_price: f64,
    max_price: f64,
}

/// Per-difficulty aggregates over well-rated tours
pub async fn tour_stats(State(resource): State<Resource<Tour>>) -> AppResult<Json<Value>> {
    let tours = resource
        .service()
        .find_all(vec![Condition::cmp("ratingsAverage", Comparison::Gte, 4.5)])
        .await?;

    let mut groups: IndexMap<&'static str, DifficultyStats> = IndexMap::new();
    for tour in &tours {
        let group = groups
            .entry(tour.difficulty.as_str())
            .or_insert_with(|| DifficultyStats {
                min_price: f64::MAX,
                max_price: f64::MIN,
                ..DifficultyStats::default()
            });
        group.tours += 1;
        group.ratings += u64::from(tour.ratings_quantity);
        group.rating_sum += tour.ratings_average;
        group.price_sum += tour.price;
        group.min_price = group.min_price.min(tour.price);
        group.max_price = group.max_price.max(tour.price);
    }

    let mut stats: Vec<(f64, Value)> = groups
        .into_iter()
        .map(|(difficulty, g)| {
            let avg_price = g.price_sum / g.tours as f64;
            let stat = json!({
                "_id": difficulty.to_uppercase(),
                "numTours": g.tours,
                "numRatings": g.ratings,
                "avgRating": g.rating_sum / g.tours as f64,
                "avgPrice": avg_price,
                "minPrice": g.min_price,
                "maxPrice": g.max_price,
            });
            (avg_price, stat)
        })
        .collect();
    stats.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok(Json(json!({
        "status": "success",
        "data": { "stats": stats.into_iter().map(|(_, s)| s).collect::<Vec<_>>() }
    })))
}

/// Tour starts per month of `year`, busiest month first
pub async fn monthly_plan(
    State(resource): State<Resource<Tour>>,
    Path(year): Path<String>,
) -> AppResult<Json<Value>> {
    let year: i32 = year.parse().map_err(|_| ValidationError::InvalidId {
        field: "year".to_string(),
        value: year.clone(),
    })?;

    let tours = resource.service().find_all(Vec::new()).await?;

    let mut months: IndexMap<u32, Vec<String>> = IndexMap::new();
    for tour in &tours {
        for start in tour.start_dates.iter().filter(|d| d.year() == year) {
            months.entry(start.month()).or_default().push(tour.name.clone());
        }
    }

    let mut plan: Vec<(u32, Vec<String>)> = months.into_iter().collect();
    plan.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));
    let plan: Vec<Value> = plan
        .into_iter()
        .take(12)
        .map(|(month, tours)| {
            json!({
                "month": month,
                "numTourStarts": tours.len(),
                "tours": tours,
            })
        })
        .collect();

    Ok(Json(json!({ "status": "success", "data": { "plan": plan } })))
}

// =============================================================================
// Geo queries
// =============================================================================

fn parse_center(latlng: &str) -> AppResult<(f64, f64)> {
    let parsed = latlng
        .split_once(',')
        .and_then(|(lat, lng)| Some((lat.trim().parse().ok()?, lng.trim().parse().ok()?)));
    parsed.ok_or_else(|| {
        AppError::bad_request("Please provide latitude and longitude in the format lat,lng.")
    })
}

/// Great-circle angle between two `(lat, lng)` points, in radians
fn angular_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lng1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lng2) = (b.0.to_radians(), b.1.to_radians());
    let h = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lng2 - lng1) / 2.0).sin().powi(2);
    2.0 * h.sqrt().min(1.0).asin()
}

async fn located_tours(service: &dyn DataService<Tour>) -> AppResult<Vec<(Tour, (f64, f64))>> {
    Ok(service
        .find_all(Vec::new())
        .await?
        .into_iter()
        .filter_map(|tour| {
            let point = tour.start_location.as_ref()?.lat_lng()?;
            Some((tour, point))
        })
        .collect())
}

pub async fn tours_within(
    State(resource): State<Resource<Tour>>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> AppResult<Json<Value>> {
    let distance: f64 = distance
        .parse()
        .map_err(|_| AppError::bad_request(format!("Invalid distance: {}", distance)))?;
    let center = parse_center(&latlng)?;
    let radius = if unit == "mi" {
        distance / EARTH_RADIUS_MI
    } else {
        distance / EARTH_RADIUS_KM
    };

    let docs = located_tours(resource.service().as_ref())
        .await?
        .into_iter()
        .filter(|(_, point)| angular_distance(center, *point) <= radius)
        .map(|(tour, _)| tour.to_document())
        .collect::<AppResult<Vec<_>>>()?;

    Ok(list_envelope(resource.finish(docs).await?))
}

pub async fn distances(
    State(resource): State<Resource<Tour>>,
    Path((latlng, unit)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let center = parse_center(&latlng)?;
    let multiplier = if unit == "mi" { METERS_TO_MILES } else { METERS_TO_KM };

    let mut results: Vec<(f64, String, String)> = located_tours(resource.service().as_ref())
        .await?
        .into_iter()
        .map(|(tour, point)| {
            let meters = angular_distance(center, point) * EARTH_RADIUS_KM * 1000.0;
            (meters * multiplier, tour.id.to_string(), tour.name)
        })
        .collect();
    results.sort_by(|a, b| a.0.total_cmp(&b.0));

    let data: Vec<Value> = results
        .into_iter()
        .map(|(distance, id, name)| json!({ "id": id, "name": name, "distance": distance }))
        .collect();

    Ok(Json(json!({ "status": "success", "data": { "data": data } })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_angular_distance() {
        let la = (34.0522, -118.2437);
        assert_eq!(angular_distance(la, la), 0.0);

        // Los Angeles to San Francisco is roughly 559 km
        let sf = (37.7749, -122.4194);
        let km = angular_distance(la, sf) * EARTH_RADIUS_KM;
        assert!((km - 559.0).abs() < 5.0, "got {}", km);
    }

    #[test]
    fn test_parse_center() {
        assert_eq!(parse_center("34.1,-118.1").unwrap(), (34.1, -118.1));
        assert!(parse_center("34.1").is_err());
        assert!(parse_center("north,south").is_err());
    }
}
