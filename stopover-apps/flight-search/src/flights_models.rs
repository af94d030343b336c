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

//! # Flight Search Wire Models
//!
//! Request and response shapes of the Aviasales flight search API.
//! Pure data, no I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

// =============================================================================
// Request side
// =============================================================================

/// Cabin class, serialized with the provider's single-letter codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TripClass {
    #[default]
    #[serde(rename = "Y")]
    Economy,
    #[serde(rename = "C")]
    Business,
}

impl TripClass {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Economy => "Y",
            Self::Business => "C",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Y" => Some(Self::Economy),
            "C" => Some(Self::Business),
            _ => None,
        }
    }
}

impl fmt::Display for TripClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passengers {
    pub adults: u32,
    pub children: u32,
    pub infants: u32,
}

impl Default for Passengers {
    fn default() -> Self {
        Self {
            adults: 1,
            children: 0,
            infants: 0,
        }
    }
}

impl Passengers {
    /// Head count, `None` when it does not fit in a `u32`
    pub fn total(&self) -> Option<u32> {
        self.adults
            .checked_add(self.children)?
            .checked_add(self.infants)
    }
}

/// One directed leg. `date` is `YYYY-MM-DD`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub origin: String,
    pub destination: String,
    pub date: String,
}

impl Segment {
    pub fn new(
        origin: impl Into<String>,
        destination: impl Into<String>,
        date: chrono::NaiveDate,
    ) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
            date: date.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Body of the initiation call.
///
/// `signature` covers every other field; see [`crate::sign`]. Any change to
/// a signed field after signing invalidates it, so sign last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub signature: String,
    pub marker: String,
    pub host: String,
    pub user_ip: String,
    pub locale: String,
    pub trip_class: TripClass,
    pub passengers: Passengers,
    pub segments: Vec<Segment>,
}

/// Provider-assigned search identifier, the correlation key for polls
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSession(String);

impl SearchSession {
    pub fn new(search_id: impl Into<String>) -> Self {
        Self(search_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Response side
// =============================================================================

/// One snapshot of a search session. Later snapshots replace earlier ones.
///
/// The provider sends `null` for scalars it has no value for yet; those
/// decode as the type's default, like missing fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResult {
    #[serde(deserialize_with = "null_as_default")]
    pub proposals: Vec<Proposal>,
    #[serde(deserialize_with = "null_as_default")]
    pub search_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airports: Option<BTreeMap<String, Airport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airlines: Option<BTreeMap<String, Airline>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }
}

/// One priceable itinerary
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Proposal {
    #[serde(deserialize_with = "null_as_default")]
    pub terms: BTreeMap<String, TermData>,
    #[serde(deserialize_with = "null_as_default")]
    pub segment: Vec<FlightSegment>,
    #[serde(deserialize_with = "null_as_default")]
    pub total_duration: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub carriers: Vec<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub is_direct: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub sign: String,
}

impl Proposal {
    /// Number of intermediate landings across all segments
    pub fn stops(&self) -> usize {
        self.segment
            .iter()
            .map(|s| s.flight.len().saturating_sub(1))
            .sum()
    }

    /// Gate and term with the lowest normalized price
    pub fn cheapest_term(&self) -> Option<(&str, &TermData)> {
        self.terms
            .iter()
            .min_by(|a, b| a.1.unified_price.total_cmp(&b.1.unified_price))
            .map(|(gate, term)| (gate.as_str(), term))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TermData {
    #[serde(deserialize_with = "null_as_default")]
    pub currency: String,
    #[serde(deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub unified_price: f64,
    pub url: FlexibleUrl,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightSegment {
    #[serde(deserialize_with = "null_as_default")]
    pub flight: Vec<Flight>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Flight {
    pub aircraft: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub arrival: String,
    #[serde(deserialize_with = "null_as_default")]
    pub arrival_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub arrival_time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub departure: String,
    #[serde(deserialize_with = "null_as_default")]
    pub departure_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub departure_time: String,
    #[serde(deserialize_with = "null_as_default")]
    pub duration: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub marketing_carrier: String,
    pub operating_carrier: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub number: String,
    pub trip_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Airport {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(deserialize_with = "null_as_default")]
    pub city_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(deserialize_with = "null_as_default")]
    pub country_code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Airline {
    #[serde(deserialize_with = "null_as_default")]
    pub iata: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// FlexibleUrl
// =============================================================================

/// The term URL field, which the provider sends as a string, a number or null.
///
/// The wire shape is kept. `Display` gives the canonical string form:
/// text as is, integral numbers without a decimal point, absent as "".
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FlexibleUrl {
    Text(String),
    Number(serde_json::Number),
    #[default]
    Absent,
}

impl FlexibleUrl {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for FlexibleUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) if n.is_f64() => match n.as_f64() {
                Some(v) if v.fract() == 0.0 => write!(f, "{v:.0}"),
                Some(v) => write!(f, "{v}"),
                None => write!(f, "{n}"),
            },
            Self::Number(n) => write!(f, "{n}"),
            Self::Absent => Ok(()),
        }
    }
}

impl Serialize for FlexibleUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => n.serialize(serializer),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FlexibleUrl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexibleUrlVisitor)
    }
}

struct FlexibleUrlVisitor;

impl<'de> Visitor<'de> for FlexibleUrlVisitor {
    type Value = FlexibleUrl;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a string, a number or null")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(FlexibleUrl::Text(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
        Ok(FlexibleUrl::Text(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(FlexibleUrl::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(FlexibleUrl::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        serde_json::Number::from_f64(v)
            .map(FlexibleUrl::Number)
            .ok_or_else(|| E::custom("non-finite number in url field"))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FlexibleUrl::Absent)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FlexibleUrl::Absent)
    }
}
