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

//! CLI for Aviasales flight search.

use std::cmp::max;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use stopover_flight_search::{
    AviasalesClient, CancellationToken, DEFAULT_MAX_ATTEMPTS, FlightSearchError, PollReport,
    PollStatus, Proposal, ProviderConfig, SearchRequest, TripClass,
};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::ChronoUtc;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "stopover-flights")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Origin airport code (e.g., DEL, LAX)
    #[arg(short, long)]
    from: String,

    /// Destination airport code (e.g., COK, CDG)
    #[arg(short, long)]
    to: String,

    /// Departure date (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(short, long)]
    date: String,

    /// Return date for round trips (YYYY-MM-DD or YYYY/MM/DD)
    #[arg(short = 'R', long)]
    return_date: Option<String>,

    /// Cabin class: economy, business
    #[arg(short, long, default_value = "economy")]
    cabin: String,

    #[arg(short, long, default_value = "1")]
    adults: u32,

    #[arg(long, default_value = "0")]
    children: u32,

    #[arg(long, default_value = "0")]
    infants: u32,

    #[arg(long, default_value = "en")]
    locale: String,

    /// End-user IP reported to the provider
    #[arg(long, env = "STOPOVER_USER_IP", default_value = "127.0.0.1")]
    user_ip: String,

    /// Maximum poll attempts before giving up on proposals
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    attempts: u32,

    /// Seconds between poll attempts
    #[arg(long, default_value = "2")]
    interval: u64,

    /// Provider configuration file (TOML/JSON/YAML), AVIASALES_* variables override it
    #[arg(long, env = "STOPOVER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Save the raw result snapshot as JSON
    #[arg(long)]
    save_json: Option<PathBuf>,
}

/// Configure logging based on verbosity level
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
}

fn parse_cabin(s: &str) -> Result<TripClass> {
    match s.to_lowercase().as_str() {
        "economy" | "e" | "y" => Ok(TripClass::Economy),
        "business" | "b" | "c" => Ok(TripClass::Business),
        _ => anyhow::bail!("Invalid cabin class: {}. Use: economy, business", s),
    }
}

/// Parse date string to NaiveDate
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .context(format!(
            "Invalid date format: {}. Use YYYY-MM-DD or YYYY/MM/DD",
            s
        ))
}

/// Format duration in hours/minutes.
fn fmt_duration(minutes: i64) -> String {
    let hrs = minutes / 60;
    let mins = minutes % 60;
    if mins == 0 {
        format!("{}h", hrs)
    } else if hrs == 0 {
        format!("{}m", mins)
    } else {
        format!("{}h {:02}m", hrs, mins)
    }
}

/// "DEL 06:10 → COK 09:20" for the outbound segment
fn fmt_route(proposal: &Proposal) -> String {
    let Some(flights) = proposal.segment.first().map(|s| &s.flight) else {
        return "??".to_string();
    };
    match (flights.first(), flights.last()) {
        (Some(first), Some(last)) => format!(
            "{} {} → {} {}",
            first.departure, first.departure_time, last.arrival, last.arrival_time
        ),
        _ => "??".to_string(),
    }
}

fn fmt_stops(proposal: &Proposal) -> String {
    match proposal.stops() {
        0 => "direct".to_string(),
        1 => "1 stop".to_string(),
        n => format!("{} stops", n),
    }
}

fn fmt_price(proposal: &Proposal) -> String {
    proposal
        .cheapest_term()
        .map(|(_, term)| format!("{:.0} {}", term.price, term.currency.to_uppercase()))
        .unwrap_or_else(|| "??".to_string())
}

/// Get terminal width for responsive tables
fn get_terminal_width() -> usize {
    term_size::dimensions().map(|(w, _)| w).unwrap_or(100)
}

/// Calculate terminal-aware column widths
fn calc_column_widths(proposals: &[&Proposal]) -> (usize, usize, usize, usize, usize) {
    let mut max_carriers = 8;
    let mut max_route = 20;
    let mut max_duration = 10;
    let mut max_stops = 8;

    for p in proposals {
        max_carriers = max(max_carriers, p.carriers.join(",").len());
        max_route = max(max_route, fmt_route(p).chars().count());
        max_duration = max(max_duration, fmt_duration(p.total_duration).len());
        max_stops = max(max_stops, fmt_stops(p).len());
    }

    let available_width = get_terminal_width().saturating_sub(25);
    let total_content = max_carriers + max_route + max_duration + max_stops;

    if total_content > available_width && available_width > 50 {
        let ratio = available_width as f64 / total_content as f64;
        max_carriers = max((max_carriers as f64 * ratio).floor() as usize, 4);
        max_route = max((max_route as f64 * ratio).floor() as usize, 10);
        max_duration = max((max_duration as f64 * ratio).floor() as usize, 5);
        max_stops = max((max_stops as f64 * ratio).floor() as usize, 6);
    }

    let rank_width = 5;
    (rank_width, max_carriers, max_route, max_duration, max_stops)
}

fn render_results(request: &SearchRequest, report: &PollReport) {
    let Some(outbound) = request.segments.first() else {
        return;
    };

    let title_bar = format!(
        "================================================================================================\n  🛫  {} → {} on {}\n================================================================================================",
        outbound.origin, outbound.destination, outbound.date
    );
    println!("{}\n", title_bar);

    let mut proposals: Vec<&Proposal> = report.result.proposals.iter().collect();
    proposals.sort_by(|a, b| {
        let pa = a.cheapest_term().map_or(f64::MAX, |(_, t)| t.unified_price);
        let pb = b.cheapest_term().map_or(f64::MAX, |(_, t)| t.unified_price);
        pa.total_cmp(&pb)
    });

    match report.status {
        PollStatus::Ready { attempt } => {
            println!("📊 Total Proposals: {} (attempt {})", proposals.len(), attempt)
        }
        PollStatus::ExhaustedNoProposals => {
            println!(
                "⚠️  No proposals after {} fetches, the provider may still be searching",
                report.fetches
            );
            return;
        }
    }
    if let Some(best) = proposals.first() {
        println!("💰 Best Price:  {}", fmt_price(best));
    }

    let top: Vec<&Proposal> = proposals.iter().take(5).copied().collect();
    let (rw, cw, tw, dw, sw) = calc_column_widths(&top);

    println!("\n🏆 Top {} Results:", top.len());
    println!("{}\n", dash_bar());

    let h1 = format!("  {:>w$}", "#", w = rw);
    let h2 = format!("{:<w$}", "CARRIERS", w = cw);
    let h3 = format!("{:<w$}", "ROUTE", w = tw);
    let h4 = format!("{:<w$}", "DURATION", w = dw);
    let h5 = format!("{:<w$}", "STOPS", w = sw);
    println!("{}  {}  {}  {}  {}   PRICE", h1, h2, h3, h4, h5);
    println!("{}\n", dash_bar());

    for (i, p) in top.iter().enumerate() {
        let c1 = format!("  {:>w$}", i + 1, w = rw);
        let c2 = format!("{:<w$}", p.carriers.join(","), w = cw);
        let c3 = format!("{:<w$}", fmt_route(p), w = tw);
        let c4 = format!("{:<w$}", fmt_duration(p.total_duration), w = dw);
        let c5 = format!("{:<w$}", fmt_stops(p), w = sw);
        println!("{}  {}  {}  {}  {}   {}", c1, c2, c3, c4, c5, fmt_price(p));
    }
}

fn dash_bar() -> String {
    "-".repeat(get_terminal_width().min(100))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    tracing::info!("Starting stopover-flights CLI");
    tracing::debug!("Args: {:?}", args);

    let cabin = parse_cabin(&args.cabin)?;
    let depart_date = parse_date(&args.date)?;
    let return_date = args.return_date.as_deref().map(parse_date).transpose()?;

    let mut builder = SearchRequest::builder(&args.from, &args.to, depart_date)
        .adults(args.adults)
        .children(args.children)
        .infants(args.infants)
        .trip_class(cabin)
        .locale(&args.locale)
        .user_ip(&args.user_ip);
    if let Some(rd) = return_date {
        builder = builder.return_date(rd);
    }
    let request = builder.build().context("Failed to build search request")?;
    request.ensure_not_in_past(chrono::Local::now().date_naive())?;

    let config = ProviderConfig::load(args.config.as_deref())?;
    let client = AviasalesClient::new(config)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling search");
            ctrl_c.cancel();
        }
    });

    let session = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FlightSearchError::Cancelled.into()),
        session = client.initiate(request.clone()) => session.context("Search initiation failed")?,
    };

    let report = client
        .poll_until_ready(
            &session,
            args.attempts,
            Duration::from_secs(args.interval),
            &cancel,
        )
        .await
        .context("Polling failed")?;

    if let Some(path) = &args.save_json {
        let json = serde_json::to_string_pretty(&report.result)?;
        std::fs::write(path, json).context("Failed to write JSON file")?;
        tracing::info!("Saved results to {}", path.display());
    }

    render_results(&request, &report);

    Ok(())
}
