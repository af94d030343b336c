//!  Stopover Flight Search
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! HTTP front end: `GET /api/flights` runs one search end to end,
//! `GET /api/airports/autocomplete` looks up airports for search forms.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use stopover_flight_search::{
    AviasalesClient, CancellationToken, FlightSearchError, ProviderConfig, SearchRequest,
    SearchResult,
};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "stopover-flights-server")]
#[command(author, version, about = "HTTP front end for Aviasales flight search")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value = "8080")]
    port: u16,

    /// Provider configuration file, AVIASALES_* variables override it
    #[arg(long, env = "STOPOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Per-request budget for initiation plus polling, in seconds
    #[arg(long, default_value = "45")]
    deadline: u64,
}

#[derive(Clone)]
struct AppState {
    client: AviasalesClient,
    deadline: Duration,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlightsQuery {
    origin: String,
    destination: String,
    /// YYYY-MM-DD
    departure: String,
    #[serde(rename = "return")]
    return_date: Option<String>,
    adults: Option<String>,
    #[serde(rename = "tripType")]
    trip_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AutocompleteQuery {
    q: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    Upstream(FlightSearchError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Self::Upstream(FlightSearchError::Cancelled) => (
                StatusCode::GATEWAY_TIMEOUT,
                json!({ "error": "flight search timed out" }),
            ),
            Self::Upstream(e) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": "provider request failed", "kind": e.kind() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

/// First `X-Forwarded-For` hop when it is a valid IP, else the socket peer
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| ip.parse::<IpAddr>().is_ok())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid date: {s}, use YYYY-MM-DD")))
}

/// Economy, locale `en`. Unparseable or zero adults fall back to 1.
/// The inbound leg is added only for `tripType=round-trip` with a return date.
fn build_request(
    query: &FlightsQuery,
    user_ip: String,
    today: NaiveDate,
) -> Result<SearchRequest, ApiError> {
    if query.origin.is_empty() || query.destination.is_empty() || query.departure.is_empty() {
        return Err(ApiError::BadRequest(
            "missing required params: origin, destination, departure".to_string(),
        ));
    }

    let adults = query
        .adults
        .as_deref()
        .and_then(|a| a.parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1);

    let mut builder =
        SearchRequest::builder(&query.origin, &query.destination, parse_date(&query.departure)?)
            .adults(adults)
            .user_ip(user_ip);

    let return_date = query.return_date.as_deref().filter(|d| !d.is_empty());
    if let (Some("round-trip"), Some(rd)) = (query.trip_type.as_deref(), return_date) {
        builder = builder.return_date(parse_date(rd)?);
    }

    let request = builder
        .build()
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;
    request
        .ensure_not_in_past(today)
        .map_err(|e| ApiError::BadRequest(format!("{e:#}")))?;
    Ok(request)
}

async fn search_flights(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<FlightsQuery>,
) -> Result<Json<SearchResult>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let request = build_request(&query, client_ip(&headers, peer), today)?;
    tracing::info!(
        "[api/flights] {} -> {} on {} for {}",
        query.origin,
        query.destination,
        query.departure,
        request.user_ip
    );

    // Fires on deadline, or when the caller goes away and this future is dropped
    let cancel = CancellationToken::new();
    let _on_drop = cancel.clone().drop_guard();
    {
        let cancel = cancel.clone();
        let deadline = state.deadline;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(deadline) => {
                    tracing::warn!("[api/flights] Deadline of {:?} reached, cancelling", deadline);
                    cancel.cancel();
                }
            }
        });
    }

    let (session, report) = state.client.search(request, &cancel).await.map_err(|e| {
        tracing::warn!("[api/flights] Search failed ({}): {}", e.kind(), e);
        ApiError::Upstream(e)
    })?;

    tracing::info!(
        "[api/flights] Search ID: {}, {} proposals after {} fetches",
        session,
        report.result.len(),
        report.fetches
    );
    Ok(Json(report.result))
}

async fn airports_autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let term = query.q.trim();
    if term.is_empty() {
        return Err(ApiError::BadRequest(
            "missing query parameter 'q'".to_string(),
        ));
    }

    let items = state
        .client
        .autocomplete_airports(term, "en")
        .await
        .map_err(|e| {
            tracing::warn!("[api/autocomplete] Lookup failed ({}): {}", e.kind(), e);
            ApiError::Upstream(e)
        })?;
    Ok(Json(json!({ "items": items })))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Browser front ends may be served from any origin
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/flights", get(search_flights))
        .route("/api/airports/autocomplete", get(airports_autocomplete))
        .route("/healthz", get(healthz))
        .layer(cors())
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".to_string().into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .init();

    let args = Args::parse();
    tracing::debug!("Parsed args: {:?}", args);

    let config = ProviderConfig::load(args.config.as_deref())?;
    let client = AviasalesClient::new(config).context("Failed to create flights client")?;
    let state = AppState {
        client,
        deadline: Duration::from_secs(args.deadline),
    };

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("Invalid host:port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutting down");
    })
    .await
    .context("HTTP server error")?;

    Ok(())
}
