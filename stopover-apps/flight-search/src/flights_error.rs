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

//! # Flight Search Errors

use stopover_poll_loop::PollError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const BODY_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Error)]
pub enum FlightSearchError {
    /// The outbound call could not complete (DNS, connect, timeout, reset).
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    /// The provider answered with a non-success status. `body` is kept whole.
    #[error("provider returned HTTP {status}: {}", body_preview(.body))]
    Protocol { status: u16, body: String },

    #[error("decode error: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("search cancelled")]
    Cancelled,
}

impl FlightSearchError {
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    pub fn decode_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Decode {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport(source.into())
    }

    /// Short label used in logs and by front ends
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Protocol { .. } => "protocol",
            Self::Decode { .. } => "decode",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<PollError<FlightSearchError>> for FlightSearchError {
    fn from(err: PollError<FlightSearchError>) -> Self {
        match err {
            PollError::Cancelled => Self::Cancelled,
            PollError::Failed { source, .. } => source,
        }
    }
}

fn body_preview(body: &str) -> String {
    if body.chars().count() <= BODY_PREVIEW_CHARS {
        return body.to_string();
    }
    let mut preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}
