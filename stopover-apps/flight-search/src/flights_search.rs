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

//! # Aviasales Flight Search Client
//!
//! Effectful (time, network) operations: one initiation call and one poll
//! call per invocation. No retries happen here, see `flights_polling`.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use stopover_poll_loop::QpsLimiter;

use crate::flights_config::ProviderConfig;
use crate::flights_error::FlightSearchError;
use crate::flights_models::{SearchRequest, SearchResult, SearchSession};
use crate::flights_results_parser::{
    ContentEncoding, decode_init_response, decode_search_results, decompress,
};
use crate::flights_transport::{HttpRequest, HttpResponse, HttpTransport, WreqTransport};

pub const ACCEPT_ENCODING: &str = "gzip,deflate";

#[derive(Clone)]
pub struct AviasalesClient {
    transport: Arc<dyn HttpTransport>,
    config: Arc<ProviderConfig>,
    limiter: QpsLimiter,
}

impl AviasalesClient {
    /// Client over a pooled wreq transport using the configured timeout.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate().context("Invalid provider configuration")?;
        let transport = WreqTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ProviderConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let limiter = QpsLimiter::new(config.queries_per_second);
        Self {
            transport,
            config: Arc::new(config),
            limiter,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Submit a search and return the provider's session handle.
    ///
    /// Marker and host are taken from the configuration when the request
    /// leaves them empty. The request is always re-signed afterwards.
    pub async fn initiate(
        &self,
        mut request: SearchRequest,
    ) -> Result<SearchSession, FlightSearchError> {
        tracing::debug!("[initiate] Preparing request");

        if request.host.is_empty() {
            request.host = self.config.host.clone();
        }
        if request.marker.is_empty() {
            request.marker = self.config.marker.clone();
        }
        request.sign(&self.config.token);
        tracing::debug!("[initiate] Generated signature: {}", request.signature);

        let body = serde_json::to_vec(&request)
            .map_err(|e| FlightSearchError::decode_with("failed to serialize search request", e))?;

        let http_request = HttpRequest::post(self.config.init_search_url.as_str())
            .with_header("Content-Type", "application/json")
            .with_header("Accept", "application/json")
            .with_body(body);

        let response = self.send("initiate", http_request).await?;
        let session = decode_init_response(&response.body).inspect_err(|e| {
            tracing::warn!("[initiate] Failed to decode response: {}", e);
        })?;

        tracing::info!("[initiate] Search initialized with ID: {}", session);
        Ok(session)
    }

    /// One poll for the current snapshot of `session`.
    ///
    /// An empty proposal list means the provider is still collecting offers.
    pub async fn fetch_once(
        &self,
        session: &SearchSession,
    ) -> Result<SearchResult, FlightSearchError> {
        let url = self.config.result_url(session);
        tracing::debug!("[fetch_once] Fetching results from URL: {}", url);

        let http_request = HttpRequest::get(url).with_header("Accept-Encoding", ACCEPT_ENCODING);
        let response = self.send("fetch_once", http_request).await?;

        let result = decode_search_results(&response.body, response.header("content-encoding"))
            .inspect_err(|e| {
                tracing::warn!("[fetch_once] Search ID: {}, decode failed: {}", session, e);
            })?;

        tracing::debug!(
            "[fetch_once] Search ID: {}, proposals: {}",
            session,
            result.len()
        );
        Ok(result)
    }

    pub(crate) async fn send(
        &self,
        call: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, FlightSearchError> {
        self.limiter.acquire().await;

        let http_start = Instant::now();
        let response = self.transport.execute(request).await.map_err(|e| {
            tracing::warn!("[{}] HTTP request failed after {:?}: {}", call, http_start.elapsed(), e);
            FlightSearchError::Transport(e)
        })?;
        tracing::debug!(
            "[{}] HTTP {} in {:?}, {} KB",
            call,
            response.status,
            http_start.elapsed(),
            response.body.len() / 1024
        );

        if !response.is_success() {
            let body = readable_body(&response);
            let body_preview = body.chars().take(500).collect::<String>();
            tracing::warn!(
                "[{}] Non-success status: {}\nBody: {}",
                call,
                response.status,
                body_preview
            );
            return Err(FlightSearchError::Protocol {
                status: response.status,
                body,
            });
        }

        Ok(response)
    }
}

/// Error bodies are kept for diagnostics, decompressed when possible.
fn readable_body(response: &HttpResponse) -> String {
    let decoded = ContentEncoding::from_header(response.header("content-encoding"))
        .and_then(|encoding| decompress(&response.body, encoding));
    match decoded {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::from_utf8_lossy(&response.body).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flights_error::BoxError;
    use crate::flights_transport::{HttpMethod, TransportFuture};
    use chrono::NaiveDate;
    use std::sync::Mutex;

    /// Records requests and answers each with the next canned reply.
    struct Recorder {
        replies: Mutex<Vec<Result<HttpResponse, BoxError>>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Recorder {
        fn new(replies: Vec<Result<HttpResponse, BoxError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl HttpTransport for Recorder {
        fn execute<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
            self.seen.lock().unwrap().push(request);
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err("no reply scripted".into()));
            Box::pin(async move { reply })
        }
    }

    fn config() -> ProviderConfig {
        ProviderConfig::new("s3cret", "12345", "example.com").with_urls(
            "https://provider.test/v1/flight_search",
            "https://provider.test/v1/flight_search_results?uuid={search_id}",
        )
    }

    fn request() -> SearchRequest {
        SearchRequest::builder("DEL", "COK", NaiveDate::from_ymd_opt(2025, 10, 1).unwrap())
            .user_ip("73.115.209.223")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn initiate_fills_defaults_and_signs() {
        let recorder = Recorder::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"search_id":"abc-123"}"#,
        ))]);
        let client = AviasalesClient::with_transport(config(), recorder.clone());

        let session = client.initiate(request()).await.unwrap();
        assert_eq!(session.as_str(), "abc-123");

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert_eq!(seen[0].url, "https://provider.test/v1/flight_search");
        assert_eq!(seen[0].header("content-type"), Some("application/json"));
        let sent: SearchRequest = serde_json::from_slice(seen[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent.marker, "12345");
        assert_eq!(sent.host, "example.com");
        assert_eq!(sent.signature, "3cb094676549f07d7d9a34f85c616f8e");
        assert!(sent.is_signed_with("s3cret"));
    }

    #[tokio::test]
    async fn initiate_resigns_with_caller_marker() {
        let recorder = Recorder::new(vec![Ok(HttpResponse::new(200, r#"{"search_id":"x"}"#))]);
        let client = AviasalesClient::with_transport(config(), recorder.clone());

        let mut req = request();
        req.marker = "99999".into();
        req.signature = "stale".into();
        client.initiate(req).await.unwrap();

        let seen = recorder.seen.lock().unwrap();
        let sent: SearchRequest = serde_json::from_slice(seen[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(sent.marker, "99999");
        assert_ne!(sent.signature, "stale");
        assert!(sent.is_signed_with("s3cret"));
    }

    #[tokio::test]
    async fn initiate_maps_error_kinds() {
        let recorder = Recorder::new(vec![
            Err("dns failure".into()),
            Ok(HttpResponse::new(403, "bad signature")),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        let client = AviasalesClient::with_transport(config(), recorder);

        let err = client.initiate(request()).await.unwrap_err();
        assert_eq!(err.kind(), "transport");

        match client.initiate(request()).await.unwrap_err() {
            FlightSearchError::Protocol { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "bad signature");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = client.initiate(request()).await.unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn fetch_once_requests_compression_and_templates_url() {
        let recorder = Recorder::new(vec![Ok(HttpResponse::new(
            200,
            r#"[{"search_id":"abc 1","proposals":[]}]"#,
        ))]);
        let client = AviasalesClient::with_transport(config(), recorder.clone());

        let result = client.fetch_once(&SearchSession::new("abc 1")).await.unwrap();
        assert!(result.is_empty());

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0].method, HttpMethod::Get);
        assert_eq!(
            seen[0].url,
            "https://provider.test/v1/flight_search_results?uuid=abc%201"
        );
        assert_eq!(seen[0].header("accept-encoding"), Some(ACCEPT_ENCODING));
    }

    #[tokio::test]
    async fn fetch_once_empty_array_is_decode_error() {
        let recorder = Recorder::new(vec![Ok(HttpResponse::new(200, "[]"))]);
        let client = AviasalesClient::with_transport(config(), recorder);
        let err = client.fetch_once(&SearchSession::new("s")).await.unwrap_err();
        assert_eq!(err.kind(), "decode");
    }
}
