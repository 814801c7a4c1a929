//! Daemon configuration from `DYNR_*` environment variables
//!
//! ## Variables
//!
//! ### Listener
//! - `DYNR_LISTEN_ADDR`: Socket address to bind (default `0.0.0.0:8080`)
//! - `DYNR_UPDATE_PATHS`: Comma-separated update paths (default `/nic/update`)
//! - `DYNR_PUBLIC_DOCS`: Serve `/docs` and `/openapi.json` without auth (default false)
//!
//! ### Allow-list
//! - `DYNR_ALLOWED_ZONES`: JSON allow-list, e.g. `{"example.com":{"allowed_records":["vpn"]}}`
//! - `DYNR_ALLOWED_ZONES_FILE`: Path to a file holding the same JSON
//! - `DYNR_BLOCKED_HOSTNAMES`: Comma-separated hostnames answered with `abuse`
//!
//! ### Credentials
//! - `DYNR_USERNAME`: Accepted username (default `admin`)
//! - `DYNR_SECRET_ID`: Secret identifier (default `dynr/users/admin`)
//! - `DYNR_SECRET_STORE_TYPE`: `env` or `file` (default `env`)
//! - `DYNR_SECRET_STORE_DIR`: Directory for the `file` secret store
//!
//! ### Record store
//! - `DYNR_RECORD_STORE_TYPE`: `cloudflare`, `file` or `memory` (default `cloudflare`)
//! - `DYNR_RECORD_STORE_PATH`: Path for the `file` record store
//! - `DYNR_CLOUDFLARE_API_TOKEN`: API token for the `cloudflare` record store
//! - `DYNR_CLOUDFLARE_ZONE_IDS`: Optional `zone=id` pairs, comma-separated
//!
//! ### Updates
//! - `DYNR_RECORD_TTL`: TTL in seconds (default 60)
//! - `DYNR_MAX_HOSTNAMES`: Hostnames per request (default 20)
//! - `DYNR_TRUST_FORWARDED_FOR`: Use `X-Forwarded-For` as address fallback (default true)
//! - `DYNR_MAX_RETRIES`: Retries for transient store failures (default 2)
//! - `DYNR_RETRY_BASE_DELAY_MS`: First retry delay (default 100)
//! - `DYNR_STORE_TIMEOUT_MS`: Deadline per store call (default 5000)
//!
//! ### Logging
//! - `DYNR_LOG_LEVEL`: trace, debug, info, warn, error (default info)

use anyhow::{Context, Result, bail};
use dynr_core::config::{AuthConfig, DynrConfig, RecordStoreConfig, SecretStoreConfig};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

use crate::http::HttpSettings;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_UPDATE_PATH: &str = "/nic/update";

/// Paths owned by the documentation routes
const RESERVED_PATHS: [&str; 2] = ["/openapi.json", "/docs"];

/// Everything the daemon needs to start
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Socket address to bind
    pub listen_addr: SocketAddr,
    /// Route settings
    pub http: HttpSettings,
    /// Log level name
    pub log_level: String,
    /// Request handling configuration
    pub dynr: DynrConfig,
}

impl DaemonConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = var("DYNR_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse()
            .context("DYNR_LISTEN_ADDR must be a socket address such as 0.0.0.0:8080")?;

        let update_paths = match var("DYNR_UPDATE_PATHS") {
            Some(paths) => split_list(&paths),
            None => vec![DEFAULT_UPDATE_PATH.to_string()],
        };

        let allowed_zones = match (var("DYNR_ALLOWED_ZONES"), var("DYNR_ALLOWED_ZONES_FILE")) {
            (Some(_), Some(_)) => {
                bail!("Set only one of DYNR_ALLOWED_ZONES and DYNR_ALLOWED_ZONES_FILE")
            }
            (Some(json), None) => DynrConfig::parse_allowed_zones(&json)?,
            (None, Some(path)) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read DYNR_ALLOWED_ZONES_FILE {}", path))?;
                DynrConfig::parse_allowed_zones(&json)?
            }
            (None, None) => bail!(
                "DYNR_ALLOWED_ZONES is required. \
                Set it via: export DYNR_ALLOWED_ZONES='{{\"example.com\":{{\"allowed_records\":[\"vpn\"]}}}}'"
            ),
        };

        let mut dynr = DynrConfig::new(allowed_zones);
        dynr.blocked_hostnames = var("DYNR_BLOCKED_HOSTNAMES")
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let defaults = AuthConfig::default();
        dynr.auth = AuthConfig {
            username: var("DYNR_USERNAME").unwrap_or(defaults.username),
            secret_id: var("DYNR_SECRET_ID").unwrap_or(defaults.secret_id),
            cache_secret: defaults.cache_secret,
        };

        dynr.secret_store = match var("DYNR_SECRET_STORE_TYPE").as_deref() {
            None | Some("env") => SecretStoreConfig::Env,
            Some("file") => SecretStoreConfig::File {
                dir: var("DYNR_SECRET_STORE_DIR").context(
                    "DYNR_SECRET_STORE_DIR is required when DYNR_SECRET_STORE_TYPE=file",
                )?,
            },
            Some(other) => bail!(
                "DYNR_SECRET_STORE_TYPE '{}' is not supported. Supported types: env, file",
                other
            ),
        };

        dynr.record_store = match var("DYNR_RECORD_STORE_TYPE").as_deref() {
            None | Some("cloudflare") => RecordStoreConfig::Cloudflare {
                api_token: var("DYNR_CLOUDFLARE_API_TOKEN").context(
                    "DYNR_CLOUDFLARE_API_TOKEN is required. \
                    Set it via: export DYNR_CLOUDFLARE_API_TOKEN=your_token",
                )?,
                zone_ids: var("DYNR_CLOUDFLARE_ZONE_IDS")
                    .map(|v| parse_zone_ids(&v))
                    .transpose()?
                    .unwrap_or_default(),
            },
            Some("file") => RecordStoreConfig::File {
                path: var("DYNR_RECORD_STORE_PATH").context(
                    "DYNR_RECORD_STORE_PATH is required when DYNR_RECORD_STORE_TYPE=file. \
                    Set it via: export DYNR_RECORD_STORE_PATH=/var/lib/dynr/records.json",
                )?,
            },
            Some("memory") => RecordStoreConfig::Memory,
            Some(other) => bail!(
                "DYNR_RECORD_STORE_TYPE '{}' is not supported. \
                Supported types: cloudflare, file, memory",
                other
            ),
        };

        if let Some(ttl) = parse_var(&var, "DYNR_RECORD_TTL")? {
            dynr.update.ttl = ttl;
        }
        if let Some(max) = parse_var(&var, "DYNR_MAX_HOSTNAMES")? {
            dynr.update.max_hostnames = max;
        }
        if let Some(trust) = parse_bool(&var, "DYNR_TRUST_FORWARDED_FOR")? {
            dynr.update.trust_forwarded_for = trust;
        }
        if let Some(retries) = parse_var(&var, "DYNR_MAX_RETRIES")? {
            dynr.retry.max_retries = retries;
        }
        if let Some(delay) = parse_var(&var, "DYNR_RETRY_BASE_DELAY_MS")? {
            dynr.retry.base_delay_ms = delay;
        }
        if let Some(timeout) = parse_var(&var, "DYNR_STORE_TIMEOUT_MS")? {
            dynr.retry.attempt_timeout_ms = timeout;
        }

        Ok(Self {
            listen_addr,
            http: HttpSettings {
                update_paths,
                public_docs: parse_bool(&var, "DYNR_PUBLIC_DOCS")?.unwrap_or(false),
            },
            log_level: var("DYNR_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            dynr,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.http.update_paths.is_empty() {
            bail!("DYNR_UPDATE_PATHS must contain at least one path");
        }

        for (i, path) in self.http.update_paths.iter().enumerate() {
            if self.http.update_paths[..i].contains(path) {
                bail!("Update path {} is listed more than once", path);
            }
            if !path.starts_with('/') {
                bail!("Update path must start with '/'. Got: {}", path);
            }
            if RESERVED_PATHS.contains(&path.as_str()) {
                bail!("Update path {} collides with the documentation routes", path);
            }
        }

        if let RecordStoreConfig::File { path } = &self.dynr.record_store
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            bail!(
                "DYNR_RECORD_STORE_PATH parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        self.log_level()?;

        self.dynr
            .validate()
            .context("Invalid request handling configuration")?;

        Ok(())
    }

    /// Parsed log level
    pub fn log_level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => bail!(
                "DYNR_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_var<T, F>(var: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e))
        })
        .transpose()
}

fn parse_bool<F>(var: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => bail!("{} must be true or false. Got: {}", key, raw),
        })
        .transpose()
}

/// Parse `example.com=abc123,example.org=def456`
fn parse_zone_ids(value: &str) -> Result<BTreeMap<String, String>> {
    split_list(value)
        .into_iter()
        .map(|pair| match pair.split_once('=') {
            Some((zone, id)) if !zone.trim().is_empty() && !id.trim().is_empty() => {
                Ok((zone.trim().to_string(), id.trim().to_string()))
            }
            _ => bail!(
                "DYNR_CLOUDFLARE_ZONE_IDS entries must look like zone=id. Got: {}",
                pair
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ZONES: &str = r#"{"example.com":{"allowed_records":["vpn","@"]}}"#;

    fn load(vars: &[(&str, &str)]) -> Result<DaemonConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn memory(extra: &[(&str, &str)]) -> Result<DaemonConfig> {
        let mut vars = vec![
            ("DYNR_ALLOWED_ZONES", ZONES),
            ("DYNR_RECORD_STORE_TYPE", "memory"),
        ];
        vars.extend_from_slice(extra);
        load(&vars)
    }

    #[test]
    fn test_defaults() {
        let config = memory(&[]).unwrap();
        config.validate().unwrap();

        assert_eq!(config.listen_addr.port(), 8080);
        assert_eq!(config.http.update_paths, vec!["/nic/update"]);
        assert!(!config.http.public_docs);
        assert_eq!(config.dynr.auth.username, "admin");
        assert_eq!(config.dynr.auth.secret_id, "dynr/users/admin");
        assert_eq!(config.dynr.update.ttl, 60);
        assert_eq!(config.dynr.retry.max_retries, 2);
        assert!(matches!(config.dynr.secret_store, SecretStoreConfig::Env));
        assert_eq!(config.log_level().unwrap(), Level::INFO);
    }

    #[test]
    fn test_allowed_zones_required() {
        let err = load(&[("DYNR_RECORD_STORE_TYPE", "memory")]).unwrap_err();
        assert!(err.to_string().contains("DYNR_ALLOWED_ZONES"));
    }

    #[test]
    fn test_allowed_zones_from_file() {
        let dir = std::env::temp_dir().join(format!("dynrd-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("zones.json");
        std::fs::write(&path, ZONES).unwrap();

        let config = load(&[
            ("DYNR_ALLOWED_ZONES_FILE", path.to_str().unwrap()),
            ("DYNR_RECORD_STORE_TYPE", "memory"),
        ])
        .unwrap();
        assert!(config.dynr.allowed_zones.contains_key("example.com"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cloudflare_requires_token() {
        let err = load(&[("DYNR_ALLOWED_ZONES", ZONES)]).unwrap_err();
        assert!(err.to_string().contains("DYNR_CLOUDFLARE_API_TOKEN"));
    }

    #[test]
    fn test_cloudflare_zone_ids() {
        let config = load(&[
            ("DYNR_ALLOWED_ZONES", ZONES),
            ("DYNR_CLOUDFLARE_API_TOKEN", "token-value"),
            ("DYNR_CLOUDFLARE_ZONE_IDS", "example.com=abc123"),
        ])
        .unwrap();

        match &config.dynr.record_store {
            RecordStoreConfig::Cloudflare { zone_ids, .. } => {
                assert_eq!(zone_ids.get("example.com").map(String::as_str), Some("abc123"));
            }
            other => panic!("unexpected record store {:?}", other),
        }
        assert!(!format!("{:?}", config).contains("token-value"));
    }

    #[test]
    fn test_malformed_zone_ids_rejected() {
        let err = load(&[
            ("DYNR_ALLOWED_ZONES", ZONES),
            ("DYNR_CLOUDFLARE_API_TOKEN", "token-value"),
            ("DYNR_CLOUDFLARE_ZONE_IDS", "example.com"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("zone=id"));
    }

    #[test]
    fn test_numeric_overrides() {
        let config = memory(&[
            ("DYNR_RECORD_TTL", "300"),
            ("DYNR_MAX_HOSTNAMES", "5"),
            ("DYNR_MAX_RETRIES", "0"),
            ("DYNR_STORE_TIMEOUT_MS", "250"),
            ("DYNR_TRUST_FORWARDED_FOR", "false"),
        ])
        .unwrap();

        assert_eq!(config.dynr.update.ttl, 300);
        assert_eq!(config.dynr.update.max_hostnames, 5);
        assert_eq!(config.dynr.retry.max_retries, 0);
        assert_eq!(config.dynr.retry.attempt_timeout_ms, 250);
        assert!(!config.dynr.update.trust_forwarded_for);
    }

    #[test]
    fn test_invalid_number_is_error() {
        let err = memory(&[("DYNR_RECORD_TTL", "soon")]).unwrap_err();
        assert!(err.to_string().contains("DYNR_RECORD_TTL"));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let cases: [&[(&str, &str)]; 5] = [
            &[("DYNR_LOG_LEVEL", "loud")],
            &[("DYNR_UPDATE_PATHS", "nic/update")],
            &[("DYNR_UPDATE_PATHS", "/docs")],
            &[("DYNR_UPDATE_PATHS", "/nic/update,/nic/update")],
            &[("DYNR_MAX_RETRIES", "50")],
        ];

        for vars in cases {
            let config = memory(vars).unwrap();
            assert!(config.validate().is_err(), "{:?} should be rejected", vars);
        }
    }

    #[test]
    fn test_unknown_store_types_rejected() {
        assert!(memory(&[("DYNR_SECRET_STORE_TYPE", "vault")]).is_err());
        assert!(
            load(&[
                ("DYNR_ALLOWED_ZONES", ZONES),
                ("DYNR_RECORD_STORE_TYPE", "route53"),
            ])
            .is_err()
        );
    }

    #[test]
    fn test_multiple_update_paths() {
        let config = memory(&[("DYNR_UPDATE_PATHS", "/nic/update, /v3/update")]).unwrap();
        assert_eq!(config.http.update_paths, vec!["/nic/update", "/v3/update"]);
        config.validate().unwrap();
    }
}
