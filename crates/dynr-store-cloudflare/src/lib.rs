// # Cloudflare Record Store
//
// RecordStore implementation backed by the Cloudflare v4 DNS API.
//
// ## Contract
//
// - Single-shot: one logical operation per call. Retries, backoff and
//   timeouts belong to `RecordMutator`.
// - No caching of records; zone IDs come from configuration or a lookup per
//   call.
// - A name/type value set is replaced through the batch endpoint, so the
//   deletes, patches and posts of one upsert apply atomically.
// - An upsert that would change nothing makes no write call.
//
// ## Security
//
// - The API token never appears in logs, errors, or `Debug` output
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Batch DNS Records: POST `/zones/:zone_id/dns_records/batch`

use async_trait::async_trait;
use dynr_core::config::RecordStoreConfig;
use dynr_core::registry::StoreRegistry;
use dynr_core::traits::{RecordStore, RecordStoreFactory, RecordType, ZoneRecord};
use dynr_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// HTTP timeout for a single API request
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Page size for record listings; a name/type set never comes close
const RECORDS_PER_PAGE: &str = "100";

const STORE_NAME: &str = "cloudflare";

/// Cloudflare record store
pub struct CloudflareRecordStore {
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone name → zone ID, skips the zone lookup when present
    zone_ids: BTreeMap<String, String>,

    base_url: String,

    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl fmt::Debug for CloudflareRecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudflareRecordStore")
            .field("api_token", &"<REDACTED>")
            .field("zone_ids", &self.zone_ids)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Envelope of every Cloudflare v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct DnsRecord {
    id: String,
    content: String,
    ttl: u32,
}

#[derive(Debug, Default, Serialize)]
struct BatchRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    deletes: Vec<BatchDelete>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patches: Vec<BatchPatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    posts: Vec<BatchPost>,
}

impl BatchRequest {
    fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.patches.is_empty() && self.posts.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct BatchDelete {
    id: String,
}

#[derive(Debug, Serialize)]
struct BatchPatch {
    id: String,
    content: String,
    ttl: u32,
}

#[derive(Debug, Serialize)]
struct BatchPost {
    name: String,
    #[serde(rename = "type")]
    record_type: &'static str,
    content: String,
    ttl: u32,
    proxied: bool,
}

impl CloudflareRecordStore {
    /// Create a store talking to the public Cloudflare API
    pub fn new(api_token: impl Into<String>, zone_ids: BTreeMap<String, String>) -> Result<Self> {
        Self::with_base_url(api_token, zone_ids, CLOUDFLARE_API_BASE)
    }

    /// Create a store talking to a custom API base URL (tests, proxies)
    pub fn with_base_url(
        api_token: impl Into<String>,
        zone_ids: BTreeMap<String, String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let zone_ids = zone_ids
            .into_iter()
            .map(|(zone, id)| (normalize_zone(&zone), id))
            .collect();

        Ok(Self {
            api_token,
            zone_ids,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Resolve a zone name to its ID
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn zone_id(&self, zone: &str) -> Result<String> {
        if let Some(id) = self.zone_ids.get(&normalize_zone(zone)) {
            tracing::debug!("Using pre-configured zone ID for {}", zone);
            return Ok(id.clone());
        }

        tracing::debug!("Looking up zone ID for {}", zone);
        let url = format!("{}/zones", self.base_url);
        let request = self.client.get(&url).query(&[("name", zone)]);

        let zones: Vec<Zone> = self.send(request, zone).await?;
        let id = zones
            .into_iter()
            .next()
            .map(|z| z.id)
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone)))?;

        tracing::debug!("Found zone ID for {}", zone);
        Ok(id)
    }

    /// List the records of one name/type
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=vpn.example.com&type=A
    /// ```
    async fn list_records(
        &self,
        zone_id: &str,
        fqdn: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, zone_id);
        let request = self.client.get(&url).query(&[
            ("name", fqdn),
            ("type", record_type.as_str()),
            ("per_page", RECORDS_PER_PAGE),
        ]);

        self.send(request, fqdn).await
    }

    /// Apply deletes, patches and posts in one transaction
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records/batch
    /// { "deletes": [...], "patches": [...], "posts": [...] }
    /// ```
    async fn batch(&self, zone_id: &str, fqdn: &str, batch: &BatchRequest) -> Result<()> {
        let url = format!("{}/zones/{}/dns_records/batch", self.base_url, zone_id);
        let request = self.client.post(&url).json(batch);

        let _: serde_json::Value = self.send(request, fqdn).await?;
        Ok(())
    }

    /// Send an authenticated request and unwrap the v4 envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        subject: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::http(format!("Cloudflare request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, subject, &body));
        }

        let envelope: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::store(STORE_NAME, format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            return Err(Error::store(STORE_NAME, describe(&envelope.errors)));
        }

        envelope
            .result
            .ok_or_else(|| Error::store(STORE_NAME, "Response has no result"))
    }
}

/// Map an HTTP error status to the core error taxonomy
fn classify_status(status: reqwest::StatusCode, subject: &str, body: &str) -> Error {
    let detail = serde_json::from_str::<ApiResponse<serde_json::Value>>(body)
        .map(|r| describe(&r.errors))
        .unwrap_or_else(|_| status.to_string());

    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions for {}: {}",
            subject, detail
        )),
        404 => Error::not_found(format!("{}: {}", subject, detail)),
        400 | 422 => Error::invalid_input(format!("{}: {}", subject, detail)),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded: {}", detail)),
        500..=599 => Error::unavailable(format!("Cloudflare server error {}: {}", status, detail)),
        _ => Error::store(STORE_NAME, format!("Unexpected status {}: {}", status, detail)),
    }
}

fn describe(errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return "request was not successful".to_string();
    }
    errors
        .iter()
        .map(|e| format!("{} ({})", e.message, e.code))
        .collect::<Vec<_>>()
        .join("; ")
}

fn normalize_zone(zone: &str) -> String {
    zone.trim_end_matches('.').to_ascii_lowercase()
}

fn parse_content(record: &DnsRecord, record_type: RecordType) -> Result<IpAddr> {
    let addr: IpAddr = record.content.parse().map_err(|_| {
        Error::store(
            STORE_NAME,
            format!("Record {} has a non-address content", record.id),
        )
    })?;
    if !record_type.accepts(&addr) {
        return Err(Error::store(
            STORE_NAME,
            format!("Record {} holds {} in a {} record", record.id, addr, record_type),
        ));
    }
    Ok(addr)
}

/// Work out the batch that turns `existing` into exactly `desired`
///
/// Records already holding a desired value are kept (TTL patched if needed);
/// leftover records are repointed before new ones are posted; anything
/// still left over is deleted.
fn plan(
    existing: &[DnsRecord],
    record: &ZoneRecord,
    record_type: RecordType,
) -> Result<BatchRequest> {
    let mut remaining: BTreeSet<IpAddr> = record.values.clone();
    let mut spare = Vec::new();
    let mut batch = BatchRequest::default();

    for current in existing {
        let addr = parse_content(current, record_type)?;
        if remaining.remove(&addr) {
            if current.ttl != record.ttl {
                batch.patches.push(BatchPatch {
                    id: current.id.clone(),
                    content: current.content.clone(),
                    ttl: record.ttl,
                });
            }
        } else {
            spare.push(current);
        }
    }

    let mut spare = spare.into_iter();
    for addr in remaining {
        match spare.next() {
            Some(reused) => batch.patches.push(BatchPatch {
                id: reused.id.clone(),
                content: addr.to_string(),
                ttl: record.ttl,
            }),
            None => batch.posts.push(BatchPost {
                name: record.fqdn(),
                record_type: record_type.as_str(),
                content: addr.to_string(),
                ttl: record.ttl,
                proxied: false,
            }),
        }
    }

    batch
        .deletes
        .extend(spare.map(|r| BatchDelete { id: r.id.clone() }));

    Ok(batch)
}

#[async_trait]
impl RecordStore for CloudflareRecordStore {
    async fn get_record(
        &self,
        zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<Option<ZoneRecord>> {
        let zone_id = self.zone_id(zone).await?;
        let fqdn = dynr_core::traits::fqdn(zone, name);
        let records = self.list_records(&zone_id, &fqdn, record_type).await?;

        let Some(first) = records.first() else {
            return Ok(None);
        };
        let ttl = first.ttl;

        let values = records
            .iter()
            .map(|r| parse_content(r, record_type))
            .collect::<Result<BTreeSet<_>>>()?;

        Ok(Some(ZoneRecord {
            zone: zone.to_string(),
            name: name.to_string(),
            record_type,
            values,
            ttl,
        }))
    }

    async fn upsert_record(&self, record: &ZoneRecord) -> Result<()> {
        let fqdn = record.fqdn();
        let zone_id = self.zone_id(&record.zone).await?;
        let existing = self
            .list_records(&zone_id, &fqdn, record.record_type)
            .await?;

        let batch = plan(&existing, record, record.record_type)?;
        if batch.is_empty() {
            tracing::debug!("{} {} already up to date", record.record_type, fqdn);
            return Ok(());
        }

        tracing::info!(
            "Replacing {} {}: {} delete(s), {} patch(es), {} post(s)",
            record.record_type,
            fqdn,
            batch.deletes.len(),
            batch.patches.len(),
            batch.posts.len()
        );
        self.batch(&zone_id, &fqdn, &batch).await
    }

    fn store_name(&self) -> &'static str {
        STORE_NAME
    }
}

/// Factory for `cloudflare` record stores
pub struct CloudflareFactory;

#[async_trait]
impl RecordStoreFactory for CloudflareFactory {
    async fn create(&self, config: &RecordStoreConfig) -> Result<Arc<dyn RecordStore>> {
        match config {
            RecordStoreConfig::Cloudflare {
                api_token,
                zone_ids,
            } => Ok(Arc::new(CloudflareRecordStore::new(
                api_token.clone(),
                zone_ids.clone(),
            )?)),
            other => Err(Error::config(format!(
                "cloudflare factory cannot build a '{}' record store",
                other.type_name()
            ))),
        }
    }
}

/// Register the Cloudflare record store with a registry
///
/// # Example
///
/// ```rust
/// use dynr_core::StoreRegistry;
///
/// let registry = StoreRegistry::with_builtins();
/// dynr_store_cloudflare::register(&registry);
/// assert!(registry.has_record_store("cloudflare"));
/// ```
pub fn register(registry: &StoreRegistry) {
    registry.register_record_store(STORE_NAME, Box::new(CloudflareFactory));
}
