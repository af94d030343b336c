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

//! Integration tests for the response decoder using a captured result snapshot.
//!
//! The fixture mixes every shape the provider uses for term URLs (string,
//! integer, float, null) and null collections, plain and gzip-compressed.

use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;
use stopover_flight_search::{FlexibleUrl, FlightSearchError, decode_search_results};

const FIXTURE: &str = include_str!("fixtures/results_del_cok.json");

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::best());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

struct UrlCase {
    json: &'static str,
    expected: &'static str,
    description: &'static str,
}

const URL_CASES: &[UrlCase] = &[
    UrlCase {
        json: r#""123""#,
        expected: "123",
        description: "string is kept verbatim",
    },
    UrlCase {
        json: "123",
        expected: "123",
        description: "integer renders in decimal",
    },
    UrlCase {
        json: "123.0",
        expected: "123",
        description: "integral float renders without a decimal point",
    },
    UrlCase {
        json: r#""https://www.aviasales.com/click/123""#,
        expected: "https://www.aviasales.com/click/123",
        description: "full link",
    },
    UrlCase {
        json: "null",
        expected: "",
        description: "null is absent",
    },
];

#[test]
fn url_shapes_decode_to_canonical_strings() {
    for case in URL_CASES {
        let body = format!(
            r#"[{{"search_id":"s","proposals":[{{"terms":{{"1":{{"currency":"usd","price":1,"unified_price":1,"url":{}}}}}}}]}}]"#,
            case.json
        );
        let result = decode_search_results(body.as_bytes(), None)
            .unwrap_or_else(|e| panic!("{}: {e}", case.description));
        let url = &result.proposals[0].terms["1"].url;
        assert_eq!(url.to_string(), case.expected, "{}", case.description);
    }
}

#[test]
fn url_of_unexpected_shape_fails_the_snapshot() {
    let body = r#"[{"search_id":"s","proposals":[{"terms":{"1":{"url":{"href":"x"}}}}]}]"#;
    let err = decode_search_results(body.as_bytes(), None).unwrap_err();
    assert!(matches!(err, FlightSearchError::Decode { .. }), "{err}");
}

#[test]
fn fixture_decodes_fully() {
    let result = decode_search_results(FIXTURE.as_bytes(), None).unwrap();

    assert_eq!(result.search_id, "4b3c1f2e-9d7a-4c1b-8e55-0a6f3d2b9c11");
    assert_eq!(result.currency.as_deref(), Some("rub"));
    assert_eq!(result.len(), 3);

    let direct = &result.proposals[0];
    assert!(direct.is_direct);
    assert_eq!(direct.stops(), 0);
    assert_eq!(direct.terms["20"].url.to_string(), "2000001");
    assert_eq!(direct.terms["74"].url, FlexibleUrl::Text("7400017".into()));
    assert_eq!(direct.terms["74"].price, 66.5);
    let (gate, _) = direct.cheapest_term().unwrap();
    assert_eq!(gate, "20");

    let one_stop = &result.proposals[1];
    assert_eq!(one_stop.stops(), 1);
    assert_eq!(one_stop.terms["42"].url.to_string(), "4200000");
    let first_leg = &one_stop.segment[0].flight[0];
    assert_eq!(first_leg.operating_carrier, None);
    assert_eq!(first_leg.aircraft, None);

    let sparse = &result.proposals[2];
    assert!(sparse.segment.is_empty());
    assert!(sparse.carriers.is_empty());
    assert!(sparse.terms["91"].url.is_absent());

    let airports = result.airports.as_ref().unwrap();
    assert_eq!(airports["COK"].city, "Kochi");
    assert_eq!(result.airlines.as_ref().unwrap()["6E"].name, "IndiGo");
}

#[test]
fn gzip_and_plain_bodies_decode_identically() {
    let plain = decode_search_results(FIXTURE.as_bytes(), None).unwrap();
    let compressed = gzip(FIXTURE.as_bytes());
    assert!(compressed.len() < FIXTURE.len());

    for header in ["gzip", "GZIP", "x-gzip"] {
        let zipped = decode_search_results(&compressed, Some(header)).unwrap();
        assert_eq!(plain, zipped, "content-encoding: {header}");
    }
}

#[test]
fn compressed_body_without_header_is_a_decode_error() {
    let compressed = gzip(FIXTURE.as_bytes());
    let err = decode_search_results(&compressed, None).unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[test]
fn truncated_gzip_is_a_decode_error() {
    let compressed = gzip(FIXTURE.as_bytes());
    let truncated = &compressed[..compressed.len() / 2];
    let err = decode_search_results(truncated, Some("gzip")).unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[test]
fn only_the_first_snapshot_is_used() {
    let body = r#"[{"search_id":"first","proposals":[]},{"search_id":"second","proposals":[]}]"#;
    let result = decode_search_results(body.as_bytes(), None).unwrap();
    assert_eq!(result.search_id, "first");
    assert!(result.is_empty());
}

#[test]
fn null_proposals_mean_no_offers_yet() {
    let result =
        decode_search_results(br#"[{"search_id":"s","proposals":null}]"#, None).unwrap();
    assert!(result.is_empty());
    assert!(result.airports.is_none());
}

#[test]
fn null_scalars_keep_the_snapshot() {
    let body = br#"[{"search_id":null,"proposals":[
        {"terms":{"3":{"currency":"usd","price":null,"unified_price":4100,"url":300}},
         "total_duration":null,"is_direct":null,"sign":null,"carriers":["AI"]}
    ],"airports":{"COK":{"name":"Cochin","city":null,"country":null}}}]"#;
    let result = decode_search_results(body, None).unwrap();
    assert_eq!(result.search_id, "");
    assert_eq!(result.len(), 1);

    let proposal = &result.proposals[0];
    assert!(!proposal.is_direct);
    assert_eq!(proposal.total_duration, 0);
    assert_eq!(proposal.terms["3"].price, 0.0);
    assert_eq!(proposal.terms["3"].url.to_string(), "300");
    assert_eq!(result.airports.as_ref().unwrap()["COK"].city, "");
}

#[test]
fn non_array_bodies_are_rejected() {
    for body in [r#"{"search_id":"s"}"#, "", "[]", "<html>busy</html>"] {
        let err = decode_search_results(body.as_bytes(), None).unwrap_err();
        assert_eq!(err.kind(), "decode", "body: {body:?}");
    }
}
