//! Zone/Record Authorizer
//!
//! The allow-list is built once from configuration and is read-only
//! afterwards. A qualified hostname is authorized when its longest matching
//! zone suffix is configured and the remaining prefix is one of that zone's
//! allowed record names.

use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

use crate::config::ZoneConfig;

/// Configuration spelling of the zone apex
pub(crate) const APEX_ALIAS: &str = "@";

/// Maximum length of a domain name (RFC 1035)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// A hostname that resolved to an allow-listed zone and record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    /// Zone name
    pub zone: String,
    /// Record name relative to the zone, empty for the apex
    pub record_name: String,
}

/// The hostname is not covered by the allow-list
///
/// Deliberately carries no detail about *why*: unknown zone and unlisted
/// record are the same rejection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hostname '{hostname}' is not allow-listed")]
pub struct Unauthorized {
    /// The normalized hostname that was rejected
    pub hostname: String,
}

/// Static allow-list keyed by normalized zone name
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    zones: HashMap<String, HashSet<String>>,
}

impl Allowlist {
    /// Build the allow-list from configuration
    ///
    /// Zone and record names are normalized (lowercase, no trailing dot);
    /// `@` becomes the empty apex name.
    pub fn new(zones: &BTreeMap<String, ZoneConfig>) -> Self {
        let zones = zones
            .iter()
            .map(|(zone, config)| {
                let records = config
                    .allowed_records
                    .iter()
                    .map(|record| {
                        if record == APEX_ALIAS {
                            String::new()
                        } else {
                            normalize_name(record)
                        }
                    })
                    .collect();
                (normalize_name(zone), records)
            })
            .collect();

        Self { zones }
    }

    /// Number of configured zones
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Resolve a qualified hostname into `(zone, record_name)`
    ///
    /// The longest configured zone that is a suffix of `hostname` on a label
    /// boundary wins. A shorter zone is never consulted once a longer one
    /// matched, even if the record is not allowed there.
    pub fn authorize(&self, hostname: &str) -> Result<Authorized, Unauthorized> {
        let host = normalize_name(hostname);
        let unauthorized = || Unauthorized {
            hostname: host.clone(),
        };

        if host.is_empty() {
            return Err(unauthorized());
        }

        let mut candidate = host.as_str();
        loop {
            if let Some(records) = self.zones.get(candidate) {
                let record_name = if candidate.len() == host.len() {
                    ""
                } else {
                    // strip "<candidate>" and the separating dot
                    &host[..host.len() - candidate.len() - 1]
                };

                if records.contains(record_name) {
                    return Ok(Authorized {
                        zone: candidate.to_string(),
                        record_name: record_name.to_string(),
                    });
                }
                return Err(unauthorized());
            }

            match candidate.find('.') {
                Some(dot) => candidate = &candidate[dot + 1..],
                None => return Err(unauthorized()),
            }
        }
    }
}

/// Normalize a domain name for comparison
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Basic RFC 1035 domain name validation
///
/// Labels are 1-63 characters of ASCII alphanumerics and hyphens and may not
/// start or end with a hyphen; the whole name is at most 253 characters.
pub fn is_valid_hostname(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return false;
    }
    name.split('.').all(is_valid_label)
}

/// Validate a record name relative to its zone (may span several labels)
pub fn is_valid_record_name(name: &str) -> bool {
    is_valid_hostname(name)
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}
