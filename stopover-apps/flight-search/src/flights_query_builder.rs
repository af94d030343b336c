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

//! # Flights Query Builder
//!
//! Side-effect free construction and validation of search requests.
//! Signing happens later, in the client, once marker and host are final.

use std::net::IpAddr;

use anyhow::{Context, Result, ensure};
use chrono::NaiveDate;

use crate::flights_models::{Passengers, SearchRequest, Segment, TripClass};

/// Provider limit on passengers per search
pub const MAX_PASSENGERS: u32 = 9;

fn is_airport_code(code: &str) -> bool {
    code.len() == 3 && code.chars().all(|c| c.is_ascii_uppercase())
}

impl SearchRequest {
    pub fn builder(
        origin: impl Into<String>,
        destination: impl Into<String>,
        depart_date: NaiveDate,
    ) -> SearchRequestBuilder {
        SearchRequestBuilder {
            origin: origin.into(),
            destination: destination.into(),
            depart_date,
            return_date: None,
            passengers: Passengers::default(),
            trip_class: TripClass::Economy,
            locale: "en".to_string(),
            user_ip: None,
            marker: String::new(),
            host: String::new(),
        }
    }

    pub fn is_round_trip(&self) -> bool {
        self.segments.len() == 2
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            matches!(self.segments.len(), 1 | 2),
            "Expected 1 or 2 segments, got {}",
            self.segments.len()
        );

        let mut previous: Option<NaiveDate> = None;
        for seg in &self.segments {
            ensure!(
                is_airport_code(&seg.origin),
                "Invalid origin airport code: '{}'",
                seg.origin
            );
            ensure!(
                is_airport_code(&seg.destination),
                "Invalid destination airport code: '{}'",
                seg.destination
            );
            ensure!(
                seg.origin != seg.destination,
                "Origin and destination are the same: {}",
                seg.origin
            );
            let date = NaiveDate::parse_from_str(&seg.date, "%Y-%m-%d")
                .context(format!("Invalid segment date: {}", seg.date))?;
            if let Some(prev) = previous {
                ensure!(
                    date >= prev,
                    "Return date {} is before departure date {}",
                    date,
                    prev
                );
            }
            previous = Some(date);
        }

        let p = &self.passengers;
        ensure!(p.adults > 0, "At least one adult is required");
        ensure!(
            p.infants <= p.adults,
            "Cannot have more infants ({}) than adults ({})",
            p.infants,
            p.adults
        );
        p.total()
            .filter(|&n| n <= MAX_PASSENGERS)
            .with_context(|| {
                format!(
                    "At most {} passengers per search, got {} adults, {} children, {} infants",
                    MAX_PASSENGERS, p.adults, p.children, p.infants
                )
            })?;

        ensure!(!self.locale.is_empty(), "Locale is required");
        self.user_ip
            .parse::<IpAddr>()
            .context(format!("Invalid user IP: '{}'", self.user_ip))?;

        Ok(())
    }

    /// Reject searches with a leg dated before `today`.
    pub fn ensure_not_in_past(&self, today: NaiveDate) -> Result<()> {
        for seg in &self.segments {
            let date = NaiveDate::parse_from_str(&seg.date, "%Y-%m-%d")
                .context(format!("Invalid segment date: {}", seg.date))?;
            ensure!(date >= today, "Date {} is in the past", seg.date);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SearchRequestBuilder {
    origin: String,
    destination: String,
    depart_date: NaiveDate,
    return_date: Option<NaiveDate>,
    passengers: Passengers,
    trip_class: TripClass,
    locale: String,
    user_ip: Option<String>,
    marker: String,
    host: String,
}

impl SearchRequestBuilder {
    /// Adds the inbound leg (destination to origin) on `return_date`.
    pub fn return_date(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    pub fn passengers(mut self, passengers: Passengers) -> Self {
        self.passengers = passengers;
        self
    }

    pub fn adults(mut self, adults: u32) -> Self {
        self.passengers.adults = adults;
        self
    }

    pub fn children(mut self, children: u32) -> Self {
        self.passengers.children = children;
        self
    }

    pub fn infants(mut self, infants: u32) -> Self {
        self.passengers.infants = infants;
        self
    }

    pub fn trip_class(mut self, trip_class: TripClass) -> Self {
        self.trip_class = trip_class;
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn user_ip(mut self, user_ip: impl Into<String>) -> Self {
        self.user_ip = Some(user_ip.into());
        self
    }

    /// Partner marker. Left empty, the client fills it from its configuration.
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// Provider host. Left empty, the client fills it from its configuration.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn build(self) -> Result<SearchRequest> {
        let origin = self.origin.trim().to_uppercase();
        let destination = self.destination.trim().to_uppercase();

        let mut segments = vec![Segment::new(
            origin.clone(),
            destination.clone(),
            self.depart_date,
        )];
        if let Some(rd) = self.return_date {
            segments.push(Segment::new(destination, origin, rd));
        }

        let request = SearchRequest {
            signature: String::new(),
            marker: self.marker,
            host: self.host,
            user_ip: self.user_ip.context("User IP is required")?,
            locale: self.locale,
            trip_class: self.trip_class,
            passengers: self.passengers,
            segments,
        };
        request.validate()?;
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn one_way_has_a_single_segment() {
        let request = SearchRequest::builder("del", "cok", date(2025, 10, 1))
            .user_ip("73.115.209.223")
            .build()
            .unwrap();
        assert_eq!(request.segments.len(), 1);
        assert_eq!(request.segments[0].origin, "DEL");
        assert_eq!(request.segments[0].destination, "COK");
        assert_eq!(request.segments[0].date, "2025-10-01");
        assert_eq!(request.locale, "en");
        assert_eq!(request.trip_class, TripClass::Economy);
        assert!(request.signature.is_empty());
        assert!(!request.is_round_trip());
    }

    #[test]
    fn round_trip_appends_inbound_leg() {
        let request = SearchRequest::builder("LAX", "CDG", date(2025, 8, 1))
            .return_date(date(2025, 8, 15))
            .adults(2)
            .trip_class(TripClass::Business)
            .user_ip("2001:db8::1")
            .build()
            .unwrap();
        assert!(request.is_round_trip());
        assert_eq!(request.segments[1].origin, "CDG");
        assert_eq!(request.segments[1].destination, "LAX");
        assert_eq!(request.segments[1].date, "2025-08-15");
    }

    #[test]
    fn passenger_validation() {
        let base = SearchRequest::builder("SFO", "JFK", date(2025, 7, 15)).user_ip("10.0.0.1");

        assert!(base.clone().adults(1).children(1).build().is_ok());
        assert!(base.clone().adults(0).children(1).build().is_err());
        assert!(base.clone().adults(1).infants(2).build().is_err());
        assert!(base.clone().adults(5).children(5).build().is_err());
    }

    #[test]
    fn huge_passenger_counts_do_not_wrap() {
        let base = SearchRequest::builder("DEL", "COK", date(2025, 10, 1)).user_ip("1.1.1.1");

        let err = base.clone().adults(u32::MAX).children(2).build().unwrap_err();
        assert!(format!("{err:#}").contains("At most 9 passengers"), "{err:#}");
        assert!(base.clone().adults(u32::MAX).infants(u32::MAX).build().is_err());
        assert_eq!(
            Passengers { adults: u32::MAX, children: 1, infants: 0 }.total(),
            None
        );
        assert_eq!(Passengers::default().total(), Some(1));
    }

    #[test]
    fn rejects_bad_codes_dates_and_ips() {
        let d = date(2025, 7, 15);
        assert!(SearchRequest::builder("SFOX", "JFK", d).user_ip("10.0.0.1").build().is_err());
        assert!(SearchRequest::builder("SFO", "SFO", d).user_ip("10.0.0.1").build().is_err());
        assert!(SearchRequest::builder("SFO", "JFK", d).user_ip("not-an-ip").build().is_err());
        assert!(SearchRequest::builder("SFO", "JFK", d).build().is_err());
        assert!(
            SearchRequest::builder("SFO", "JFK", d)
                .return_date(date(2025, 7, 10))
                .user_ip("10.0.0.1")
                .build()
                .is_err()
        );
    }

    #[test]
    fn past_dates_are_flagged() {
        let request = SearchRequest::builder("SFO", "JFK", date(2025, 7, 15))
            .user_ip("10.0.0.1")
            .build()
            .unwrap();
        assert!(request.ensure_not_in_past(date(2025, 7, 15)).is_ok());
        assert!(request.ensure_not_in_past(date(2025, 7, 16)).is_err());
    }
}
