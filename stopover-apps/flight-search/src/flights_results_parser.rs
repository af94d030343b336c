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

//! # Flights Results Parser
//!
//! Side-effect free decoding of provider responses.
//! Handles gzip/deflate bodies and the single-element result array.

use std::borrow::Cow;
use std::io::{self, Read};

use flate2::read::{DeflateDecoder, MultiGzDecoder, ZlibDecoder};
use serde::Deserialize;

use crate::flights_error::FlightSearchError;
use crate::flights_models::{SearchResult, SearchSession};

/// Body encoding announced by the `Content-Encoding` response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn from_header(value: Option<&str>) -> Result<Self, FlightSearchError> {
        let Some(value) = value else {
            return Ok(Self::Identity);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Ok(Self::Identity),
            "gzip" | "x-gzip" => Ok(Self::Gzip),
            "deflate" => Ok(Self::Deflate),
            other => Err(FlightSearchError::decode(format!(
                "unsupported content-encoding: {other}"
            ))),
        }
    }
}

/// Largest decompressed body accepted, in bytes
pub const MAX_DECODED_BYTES: u64 = 32 * 1024 * 1024;

/// Decompress `body` according to `encoding`.
///
/// Output beyond [`MAX_DECODED_BYTES`] is a `Decode` error.
pub fn decompress(body: &[u8], encoding: ContentEncoding) -> Result<Cow<'_, [u8]>, FlightSearchError> {
    decompress_capped(body, encoding, MAX_DECODED_BYTES)
}

fn decompress_capped(
    body: &[u8],
    encoding: ContentEncoding,
    limit: u64,
) -> Result<Cow<'_, [u8]>, FlightSearchError> {
    match encoding {
        ContentEncoding::Identity => Ok(Cow::Borrowed(body)),
        ContentEncoding::Gzip => read_capped(MultiGzDecoder::new(body), body.len(), limit)
            .map(Cow::Owned)
            .map_err(|e| FlightSearchError::decode_with("gzip decompression failed", e)),
        ContentEncoding::Deflate => {
            // RFC 9110 says zlib-wrapped, some servers send raw deflate anyway
            match read_capped(ZlibDecoder::new(body), body.len(), limit) {
                Ok(out) => Ok(Cow::Owned(out)),
                Err(e) if e.kind() == io::ErrorKind::FileTooLarge => {
                    Err(FlightSearchError::decode_with("deflate decompression failed", e))
                }
                Err(_) => read_capped(DeflateDecoder::new(body), body.len(), limit)
                    .map(Cow::Owned)
                    .map_err(|e| FlightSearchError::decode_with("deflate decompression failed", e)),
            }
        }
    }
}

fn read_capped(decoder: impl Read, wire_len: usize, limit: u64) -> io::Result<Vec<u8>> {
    let cap = usize::try_from(limit).unwrap_or(usize::MAX);
    let mut out = Vec::with_capacity(wire_len.saturating_mul(4).min(cap));
    decoder.take(limit.saturating_add(1)).read_to_end(&mut out)?;
    if out.len() as u64 > limit {
        return Err(io::Error::new(
            io::ErrorKind::FileTooLarge,
            format!("decoded body exceeds {limit} bytes"),
        ));
    }
    Ok(out)
}

/// Decode a poll response body into the session's current snapshot.
///
/// The provider wraps the snapshot in a one-element array. An empty array is
/// an error; a snapshot with no proposals is not.
pub fn decode_search_results(
    body: &[u8],
    content_encoding: Option<&str>,
) -> Result<SearchResult, FlightSearchError> {
    let encoding = ContentEncoding::from_header(content_encoding)?;
    let raw = decompress(body, encoding)?;
    tracing::trace!(
        "[decode_search_results] {:?} body: {} bytes on the wire, {} bytes decoded",
        encoding,
        body.len(),
        raw.len()
    );

    let results: Vec<SearchResult> = serde_json::from_slice(&raw)
        .map_err(|e| FlightSearchError::decode_with("malformed search results", e))?;

    results
        .into_iter()
        .next()
        .ok_or_else(|| FlightSearchError::decode("empty result array"))
}

#[derive(Debug, Deserialize)]
struct InitResponse {
    #[serde(default)]
    search_id: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
}

/// Decode the initiation response into a session handle.
///
/// `search_id` is preferred; `uuid` carries the same value on current API
/// versions and is used when `search_id` is missing.
pub fn decode_init_response(body: &[u8]) -> Result<SearchSession, FlightSearchError> {
    let init: InitResponse = serde_json::from_slice(body)
        .map_err(|e| FlightSearchError::decode_with("malformed init response", e))?;

    [init.search_id, init.uuid]
        .into_iter()
        .flatten()
        .map(|id| id.trim().to_string())
        .find(|id| !id.is_empty())
        .map(SearchSession::new)
        .ok_or_else(|| FlightSearchError::decode("init response has no search id"))
}
