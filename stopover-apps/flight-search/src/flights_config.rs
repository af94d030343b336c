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

//! # Provider Configuration
//!
//! Immutable settings the client needs at construction: credentials, host and
//! endpoint URLs. Loaded from an optional file, then `AVIASALES_*` variables.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::flights_models::SearchSession;

pub const DEFAULT_INIT_SEARCH_URL: &str = "https://api.travelpayouts.com/v1/flight_search";
pub const DEFAULT_RESULT_SEARCH_URL: &str =
    "https://api.travelpayouts.com/v1/flight_search_results?uuid={search_id}";
pub const DEFAULT_AUTOCOMPLETE_URL: &str = "https://autocomplete.travelpayouts.com/places2";
pub const SEARCH_ID_PLACEHOLDER: &str = "{search_id}";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_QUERIES_PER_SECOND: u32 = 4;
pub const ENV_PREFIX: &str = "AVIASALES";

fn default_init_search_url() -> String {
    DEFAULT_INIT_SEARCH_URL.to_string()
}

fn default_result_search_url() -> String {
    DEFAULT_RESULT_SEARCH_URL.to_string()
}

fn default_autocomplete_url() -> String {
    DEFAULT_AUTOCOMPLETE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_queries_per_second() -> u32 {
    DEFAULT_QUERIES_PER_SECOND
}

#[derive(Clone, Deserialize)]
pub struct ProviderConfig {
    /// Shared signing secret
    pub token: String,
    /// Partner identity
    pub marker: String,
    pub host: String,
    #[serde(default = "default_init_search_url")]
    pub init_search_url: String,
    /// Poll endpoint, `{search_id}` is replaced by the url-encoded session id
    #[serde(default = "default_result_search_url")]
    pub result_search_url: String,
    /// Public airport lookup, no credentials needed
    #[serde(default = "default_autocomplete_url")]
    pub autocomplete_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_queries_per_second")]
    pub queries_per_second: u32,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("token", &"<redacted>")
            .field("marker", &self.marker)
            .field("host", &self.host)
            .field("init_search_url", &self.init_search_url)
            .field("result_search_url", &self.result_search_url)
            .field("autocomplete_url", &self.autocomplete_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("queries_per_second", &self.queries_per_second)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(
        token: impl Into<String>,
        marker: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            marker: marker.into(),
            host: host.into(),
            init_search_url: default_init_search_url(),
            result_search_url: default_result_search_url(),
            autocomplete_url: default_autocomplete_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            queries_per_second: DEFAULT_QUERIES_PER_SECOND,
        }
    }

    pub fn with_urls(
        mut self,
        init_search_url: impl Into<String>,
        result_search_url: impl Into<String>,
    ) -> Self {
        self.init_search_url = init_search_url.into();
        self.result_search_url = result_search_url.into();
        self
    }

    /// Load from `file` (if any), then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with_env(file, None)
    }

    /// Like [`ProviderConfig::load`], reading variables from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(
        file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX).source(env),
        );

        let cfg: Self = builder
            .build()
            .context("Failed to read provider configuration")?
            .try_deserialize()
            .context("Invalid provider configuration")?;
        cfg.validate()?;
        tracing::debug!("Loaded provider configuration: {:?}", cfg);
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.token.is_empty(), "Provider token is required");
        ensure!(!self.marker.is_empty(), "Provider marker is required");
        ensure!(!self.host.is_empty(), "Provider host is required");
        for url in [
            &self.init_search_url,
            &self.result_search_url,
            &self.autocomplete_url,
        ] {
            ensure!(
                url.starts_with("http://") || url.starts_with("https://"),
                "Provider URL must be http(s): {}",
                url
            );
        }
        ensure!(
            self.result_search_url.contains(SEARCH_ID_PLACEHOLDER),
            "Result URL template must contain {}: {}",
            SEARCH_ID_PLACEHOLDER,
            self.result_search_url
        );
        ensure!(self.timeout_secs > 0, "Timeout must be at least 1 second");
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Poll URL for `session`
    pub fn result_url(&self, session: &SearchSession) -> String {
        self.result_search_url.replace(
            SEARCH_ID_PLACEHOLDER,
            &urlencoding::encode(session.as_str()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn loads_from_environment_with_defaults() {
        let cfg = ProviderConfig::load_with_env(
            None,
            Some(env(&[
                ("AVIASALES_TOKEN", "secret"),
                ("AVIASALES_MARKER", "12345"),
                ("AVIASALES_HOST", "stopover.example"),
                ("AVIASALES_TIMEOUT_SECS", "5"),
            ])),
        )
        .unwrap();
        assert_eq!(cfg.marker, "12345");
        assert_eq!(cfg.timeout(), Duration::from_secs(5));
        assert_eq!(cfg.init_search_url, DEFAULT_INIT_SEARCH_URL);
        assert_eq!(cfg.queries_per_second, DEFAULT_QUERIES_PER_SECOND);
        assert_eq!(cfg.autocomplete_url, DEFAULT_AUTOCOMPLETE_URL);
    }

    #[test]
    fn environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "token = \"from-file\"\nmarker = \"1\"\nhost = \"file.example\"\n\
             result_search_url = \"http://localhost:9000/results/{{search_id}}\""
        )
        .unwrap();

        let cfg = ProviderConfig::load_with_env(
            Some(file.path()),
            Some(env(&[("AVIASALES_MARKER", "2")])),
        )
        .unwrap();
        assert_eq!(cfg.token, "from-file");
        assert_eq!(cfg.marker, "2");
        assert_eq!(
            cfg.result_url(&SearchSession::new("a b")),
            "http://localhost:9000/results/a%20b"
        );
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let err = ProviderConfig::load_with_env(None, Some(env(&[("AVIASALES_TOKEN", "x")])));
        assert!(err.is_err());
    }

    #[test]
    fn template_must_carry_placeholder() {
        let cfg = ProviderConfig::new("t", "m", "h")
            .with_urls("https://a.test/init", "https://a.test/results");
        assert!(cfg.validate().is_err());
        assert!(ProviderConfig::new("t", "m", "h").validate().is_ok());

        let mut cfg = ProviderConfig::new("t", "m", "h");
        cfg.autocomplete_url = "ftp://places.test".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_output_hides_token() {
        let shown = format!("{:?}", ProviderConfig::new("very-secret", "m", "h"));
        assert!(!shown.contains("very-secret"));
    }
}
