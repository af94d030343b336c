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

//! # Request Signature
//!
//! Side-effect free signing of flight search requests.
//!
//! The provider recomputes the same digest on its side, so the field order,
//! separators and number formatting must stay byte-for-byte identical:
//!
//! ```text
//! md5("{secret}:{host}:{locale}:{marker}:{adults}:{children}:{infants}:
//!      {date}:{destination}:{origin}:...:{trip_class}:{user_ip}")
//! ```

use std::fmt::Write;

use md5::{Digest, Md5};

use crate::flights_models::{Passengers, SearchRequest, Segment, TripClass};

/// Compute the lowercase hex MD5 signature of a search request.
#[allow(clippy::too_many_arguments)]
pub fn sign(
    secret: &str,
    marker: &str,
    host: &str,
    locale: &str,
    trip_class: TripClass,
    user_ip: &str,
    passengers: &Passengers,
    segments: &[Segment],
) -> String {
    let signing_str = signing_string(
        secret, marker, host, locale, trip_class, user_ip, passengers, segments,
    );
    let digest = Md5::digest(signing_str.as_bytes());

    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn signing_string(
    secret: &str,
    marker: &str,
    host: &str,
    locale: &str,
    trip_class: TripClass,
    user_ip: &str,
    passengers: &Passengers,
    segments: &[Segment],
) -> String {
    let adults = passengers.adults.to_string();
    let children = passengers.children.to_string();
    let infants = passengers.infants.to_string();

    let mut parts: Vec<&str> = vec![
        secret,
        host,
        locale,
        marker,
        adults.as_str(),
        children.as_str(),
        infants.as_str(),
    ];
    for seg in segments {
        parts.extend([seg.date.as_str(), seg.destination.as_str(), seg.origin.as_str()]);
    }
    parts.extend([trip_class.code(), user_ip]);

    parts.join(":")
}

impl SearchRequest {
    /// Recompute `signature` from the current field values.
    pub fn sign(&mut self, secret: &str) {
        self.signature = sign(
            secret,
            &self.marker,
            &self.host,
            &self.locale,
            self.trip_class,
            &self.user_ip,
            &self.passengers,
            &self.segments,
        );
    }

    /// Whether `signature` matches the current field values
    pub fn is_signed_with(&self, secret: &str) -> bool {
        let expected = sign(
            secret,
            &self.marker,
            &self.host,
            &self.locale,
            self.trip_class,
            &self.user_ip,
            &self.passengers,
            &self.segments,
        );
        expected == self.signature
    }
}
