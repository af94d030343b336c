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

//! # Airport Autocomplete
//!
//! Lookup of airports by partial name or code through the public Travelpayouts
//! places endpoint. Unsigned, but paced by the client's limiter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::flights_error::FlightSearchError;
use crate::flights_results_parser::{ContentEncoding, decompress};
use crate::flights_search::AviasalesClient;
use crate::flights_transport::HttpRequest;

/// One airport match, trimmed to what a search form needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportSuggestion {
    pub code: String,
    pub name: String,
    pub city: String,
    pub country: String,
}

fn text_field(place: &Map<String, Value>, key: &str) -> String {
    place
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Decode a places response.
///
/// Entries without a code or a name are dropped. Other fields of unexpected
/// type read as empty.
pub fn decode_airport_suggestions(
    body: &[u8],
    content_encoding: Option<&str>,
) -> Result<Vec<AirportSuggestion>, FlightSearchError> {
    let raw = decompress(body, ContentEncoding::from_header(content_encoding)?)?;
    let places: Vec<Map<String, Value>> = serde_json::from_slice(&raw)
        .map_err(|e| FlightSearchError::decode_with("malformed autocomplete response", e))?;

    Ok(places
        .iter()
        .map(|place| AirportSuggestion {
            code: text_field(place, "code"),
            name: text_field(place, "name"),
            city: text_field(place, "city_name"),
            country: text_field(place, "country_name"),
        })
        .filter(|s| !s.code.is_empty() && !s.name.is_empty())
        .collect())
}

impl AviasalesClient {
    /// Airports matching `term`, names localized to `locale`
    pub async fn autocomplete_airports(
        &self,
        term: &str,
        locale: &str,
    ) -> Result<Vec<AirportSuggestion>, FlightSearchError> {
        let base = &self.config().autocomplete_url;
        let separator = if base.contains('?') { '&' } else { '?' };
        let url = format!(
            "{base}{separator}types[]=airport&locale={}&term={}",
            urlencoding::encode(locale),
            urlencoding::encode(term)
        );
        tracing::debug!("[autocomplete] Looking up: {}", url);

        let request = HttpRequest::get(url).with_header("Accept", "application/json");
        let response = self.send("autocomplete", request).await?;
        let suggestions =
            decode_airport_suggestions(&response.body, response.header("content-encoding"))
                .inspect_err(|e| tracing::warn!("[autocomplete] Decode failed: {}", e))?;

        tracing::debug!("[autocomplete] '{}': {} airports", term, suggestions.len());
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flights_config::ProviderConfig;
    use crate::flights_error::BoxError;
    use crate::flights_transport::{HttpResponse, HttpTransport, TransportFuture};
    use std::sync::{Arc, Mutex};

    const PLACES: &str = r#"[
        {"code":"COK","name":"Cochin International Airport","city_name":"Kochi","country_name":"India","type":"airport"},
        {"code":"","name":"Nameless"},
        {"code":"XXX","name":null},
        {"code":"TRV","name":"Trivandrum","city_name":null,"coordinates":{"lat":8.48,"lon":76.92}}
    ]"#;

    struct Canned {
        reply: Mutex<Option<Result<HttpResponse, BoxError>>>,
        urls: Mutex<Vec<String>>,
    }

    impl HttpTransport for Canned {
        fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
            self.urls.lock().unwrap().push(request.url);
            let reply = self
                .reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err("no reply scripted".into()));
            Box::pin(async move { reply })
        }
    }

    fn client(reply: Result<HttpResponse, BoxError>) -> (AviasalesClient, Arc<Canned>) {
        let canned = Arc::new(Canned {
            reply: Mutex::new(Some(reply)),
            urls: Mutex::new(Vec::new()),
        });
        let mut config = ProviderConfig::new("t", "m", "h");
        config.autocomplete_url = "https://places.test/places2".into();
        (AviasalesClient::with_transport(config, canned.clone()), canned)
    }

    #[test]
    fn incomplete_places_are_dropped() {
        let items = decode_airport_suggestions(PLACES.as_bytes(), None).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0],
            AirportSuggestion {
                code: "COK".into(),
                name: "Cochin International Airport".into(),
                city: "Kochi".into(),
                country: "India".into(),
            }
        );
        assert_eq!(items[1].code, "TRV");
        assert_eq!(items[1].city, "");
    }

    #[test]
    fn non_array_is_a_decode_error() {
        let err = decode_airport_suggestions(br#"{"error":"busy"}"#, None).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn lookup_encodes_term_and_locale() {
        let (client, canned) = client(Ok(HttpResponse::new(200, PLACES)));
        let items = client.autocomplete_airports("san jo", "en").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            canned.urls.lock().unwrap()[0],
            "https://places.test/places2?types[]=airport&locale=en&term=san%20jo"
        );
    }

    #[tokio::test]
    async fn upstream_status_is_a_protocol_error() {
        let (client, _) = client(Ok(HttpResponse::new(500, "oops")));
        let err = client.autocomplete_airports("coc", "en").await.unwrap_err();
        assert_eq!(err.kind(), "protocol");
    }
}
