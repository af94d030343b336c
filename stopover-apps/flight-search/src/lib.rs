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

// Library for stopover-flight-search
// Async client for the Aviasales/Travelpayouts flight search API

mod flights_autocomplete;
mod flights_config;
mod flights_error;
mod flights_models;
mod flights_polling;
mod flights_query_builder;
mod flights_results_parser;
mod flights_search;
mod flights_signature;
mod flights_transport;

pub use flights_autocomplete::{AirportSuggestion, decode_airport_suggestions};
pub use flights_config::*;
pub use flights_error::{BoxError, FlightSearchError};
pub use flights_models::*;
pub use flights_polling::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, PollReport, PollStatus,
};
pub use flights_query_builder::{MAX_PASSENGERS, SearchRequestBuilder};
pub use flights_results_parser::{
    ContentEncoding, MAX_DECODED_BYTES, decode_init_response, decode_search_results, decompress,
};
pub use flights_search::{ACCEPT_ENCODING, AviasalesClient};
pub use flights_signature::sign;
pub use flights_transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportFuture, WreqTransport,
};

// Re-exported so callers need no direct tokio-util dependency
pub use tokio_util::sync::CancellationToken;
