//! Protocol Responder
//!
//! The one place that knows the Dyndns2 wire text. Routers match on the
//! first word of each line, so bodies must be exact.

use http::StatusCode;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Addresses echoed back in `good` / `nochg`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Addresses {
    /// Requested IPv4 address
    pub v4: Option<Ipv4Addr>,
    /// Requested IPv6 address
    pub v6: Option<Ipv6Addr>,
}

impl Addresses {
    /// Create an address pair
    pub fn new(v4: Option<Ipv4Addr>, v6: Option<Ipv6Addr>) -> Self {
        Self { v4, v6 }
    }
}

impl fmt::Display for Addresses {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.v4, self.v6) {
            (Some(v4), Some(v6)) => write!(f, "{},{}", v4, v6),
            (Some(v4), None) => write!(f, "{}", v4),
            (None, Some(v6)) => write!(f, "{}", v6),
            (None, None) => Ok(()),
        }
    }
}

/// Terminal result of processing one hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was changed
    Good(Addresses),
    /// The record already held the requested addresses
    NoChange(Addresses),
    /// Authentication failed
    BadAuth,
    /// Hostname not allow-listed
    NotFound,
    /// Hostname blocked
    Abuse,
    /// Malformed request
    NumHost,
    /// Upstream record store failure
    DnsError,
}

impl UpdateOutcome {
    /// Dyndns2 return code
    pub fn code(&self) -> &'static str {
        match self {
            UpdateOutcome::Good(_) => "good",
            UpdateOutcome::NoChange(_) => "nochg",
            UpdateOutcome::BadAuth => "badauth",
            UpdateOutcome::NotFound => "nohost",
            UpdateOutcome::Abuse => "abuse",
            UpdateOutcome::NumHost => "numhost",
            UpdateOutcome::DnsError => "dnserr",
        }
    }

    /// HTTP status for this outcome
    pub fn status(&self) -> StatusCode {
        match self {
            UpdateOutcome::Good(_) | UpdateOutcome::NoChange(_) => StatusCode::OK,
            UpdateOutcome::BadAuth => StatusCode::UNAUTHORIZED,
            UpdateOutcome::NotFound => StatusCode::NOT_FOUND,
            UpdateOutcome::Abuse => StatusCode::FORBIDDEN,
            UpdateOutcome::NumHost => StatusCode::BAD_REQUEST,
            UpdateOutcome::DnsError => StatusCode::BAD_GATEWAY,
        }
    }

    /// Whether processing may continue with the next hostname
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Good(_) | UpdateOutcome::NoChange(_))
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::Good(addrs) | UpdateOutcome::NoChange(addrs) => {
                write!(f, "{} {}", self.code(), addrs)
            }
            _ => f.write_str(self.code()),
        }
    }
}

/// HTTP-facing response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP status
    pub status: StatusCode,
    /// Plain-text body
    pub body: String,
}

impl Reply {
    /// Whether the reply must carry a Basic authentication challenge
    pub fn is_auth_challenge(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }
}

/// Render a single outcome
pub fn render(outcome: &UpdateOutcome) -> Reply {
    Reply {
        status: outcome.status(),
        body: outcome.to_string(),
    }
}

/// Render one line per outcome; the status is that of the last line
///
/// An empty slice renders as `dnserr`, which never happens for a parsed
/// request.
pub fn render_batch(outcomes: &[UpdateOutcome]) -> Reply {
    let Some(last) = outcomes.last() else {
        return render(&UpdateOutcome::DnsError);
    };

    let body = outcomes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");

    Reply {
        status: last.status(),
        body,
    }
}
