//! Update request parsing
//!
//! Turns the raw Dyndns2 query into a validated `UpdateRequest`. Every
//! rejection here is answered with `numhost`.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use thiserror::Error;

use crate::allowlist::{is_valid_hostname, normalize_name};
use crate::auth::ClientCredentials;
use crate::config::UpdateConfig;

/// Raw query parameters of an update call
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UpdateQuery {
    /// Comma-separated qualified hostnames
    pub hostname: Option<String>,
    /// IPv4 and/or IPv6 address(es), comma-separated
    pub myip: Option<String>,
    /// IPv6 address
    pub myip6: Option<String>,
    /// IPv6 address (alias used by some clients)
    pub ipv6: Option<String>,
}

impl UpdateQuery {
    /// Query for a single hostname and address
    pub fn new(hostname: impl Into<String>, myip: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            myip: Some(myip.into()),
            ..Self::default()
        }
    }
}

/// Why a query was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No hostname parameter
    #[error("missing hostname")]
    MissingHostname,

    /// A hostname is not a valid domain name
    #[error("invalid hostname '{0}'")]
    InvalidHostname(String),

    /// More hostnames than allowed per request
    #[error("too many hostnames: {count} (maximum {max})")]
    TooManyHostnames {
        /// Hostnames supplied
        count: usize,
        /// Configured maximum
        max: usize,
    },

    /// An address parameter does not parse or has the wrong family
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// More than one distinct address for one family
    #[error("more than one {0} address")]
    MultipleAddresses(&'static str),

    /// No address in the query and none usable from the connection
    #[error("no address supplied")]
    NoAddress,
}

/// A validated update request
#[derive(Debug, Clone)]
pub struct UpdateRequest {
    /// Normalized qualified hostnames, in request order
    pub hostnames: Vec<String>,
    /// Requested IPv4 address
    pub ipv4: Option<Ipv4Addr>,
    /// Requested IPv6 address
    pub ipv6: Option<Ipv6Addr>,
    /// Presented credentials, if any
    pub credentials: Option<ClientCredentials>,
}

impl UpdateRequest {
    /// Validate a raw query
    ///
    /// `forwarded_for` is the client address reported by a fronting proxy;
    /// it is used only when the query carries no address and
    /// `trust_forwarded_for` is enabled.
    pub fn parse(
        query: &UpdateQuery,
        credentials: Option<ClientCredentials>,
        forwarded_for: Option<IpAddr>,
        config: &UpdateConfig,
    ) -> Result<Self, RequestError> {
        let hostnames = parse_hostnames(query.hostname.as_deref(), config.max_hostnames)?;

        let mut ipv4 = None;
        let mut ipv6 = None;

        for raw in split_list(query.myip.as_deref()) {
            let addr: IpAddr = raw
                .parse()
                .map_err(|_| RequestError::InvalidAddress(raw.to_string()))?;
            match addr {
                IpAddr::V4(v4) => set_once(&mut ipv4, v4, "IPv4")?,
                IpAddr::V6(v6) => set_once(&mut ipv6, v6, "IPv6")?,
            }
        }

        for raw in split_list(query.myip6.as_deref()).chain(split_list(query.ipv6.as_deref())) {
            let v6: Ipv6Addr = raw
                .parse()
                .map_err(|_| RequestError::InvalidAddress(raw.to_string()))?;
            set_once(&mut ipv6, v6, "IPv6")?;
        }

        if ipv4.is_none() && ipv6.is_none() && config.trust_forwarded_for {
            match forwarded_for {
                Some(IpAddr::V4(v4)) => ipv4 = Some(v4),
                Some(IpAddr::V6(v6)) => ipv6 = Some(v6),
                None => {}
            }
        }

        if ipv4.is_none() && ipv6.is_none() {
            return Err(RequestError::NoAddress);
        }

        Ok(Self {
            hostnames,
            ipv4,
            ipv6,
            credentials,
        })
    }
}

fn parse_hostnames(raw: Option<&str>, max: usize) -> Result<Vec<String>, RequestError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(RequestError::MissingHostname);
    }

    let hostnames = raw
        .split(',')
        .map(|host| {
            let normalized = normalize_name(host);
            if is_valid_hostname(&normalized) {
                Ok(normalized)
            } else {
                Err(RequestError::InvalidHostname(host.trim().to_string()))
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    if hostnames.len() > max {
        return Err(RequestError::TooManyHostnames {
            count: hostnames.len(),
            max,
        });
    }

    Ok(hostnames)
}

/// Comma-separated values, blanks dropped (`myip=` counts as absent)
fn split_list(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.into_iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn set_once<T: PartialEq>(
    slot: &mut Option<T>,
    value: T,
    family: &'static str,
) -> Result<(), RequestError> {
    match slot {
        Some(existing) if *existing != value => Err(RequestError::MultipleAddresses(family)),
        Some(_) => Ok(()),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}
