//! HTTP client for the device-management API.

use std::sync::Arc;
use std::time::Duration;

use iapfeed_cache::{CacheKey, CacheStore};
use iapfeed_common::{Device, DeviceGroup, Interface, LiSupport, LoopbackInterface, Subnet, Vendor};
use iapfeed_config::{resolve_secret, CacheConfig, InventoryConfig};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::api::{
    find_cmts_diagnostic, latest_snapshot, CmtsSubnetDiagnostic, RawConfigSnapshot, RawDevice,
    RawDeviceDetail, RawDiagnosticResult, RawInterface, IN_PRODUCTION,
};
use crate::diagnostics::{config_attribute, extract_li_source, extract_oss10_alias, scan_li_support};
use crate::error::InventoryError;
use crate::loopback::{interfaces_from_raw, select_loopback};
use crate::platform::{vendor_for_diagnostic, vendor_for_family};
use crate::subnets::derive_subnets;

/// Header carrying the API token.
const TOKEN_HEADER: &str = "X-Netshot-API-Token";

/// Longest response body kept in a [`InventoryError::Status`].
const MAX_ERROR_BODY: usize = 200;

const OP_DEVICES: &str = "production_devices";
const OP_INTERFACES: &str = "device_interfaces";
const OP_DETAIL: &str = "device_detail";
const OP_DIAGNOSTICS: &str = "device_diagnostics";
const OP_CONFIGS: &str = "device_configs";
const OP_CONFIG_TEXT: &str = "device_config";

/// How the client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryAuth {
    /// API token sent with every request.
    Token(String),
    /// Session login; the cookie lives in the client's own store.
    Session {
        /// Login name.
        username: String,
        /// Password.
        password: String,
    },
}

/// Resolved client settings.
#[derive(Debug, Clone)]
pub struct InventorySettings {
    /// API base URL, without trailing slash.
    pub base_url: String,
    /// Authentication mode.
    pub auth: InventoryAuth,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Whether to verify the server certificate.
    pub verify_tls: bool,
    /// Upper bound on concurrent per-device fetches.
    pub max_concurrency: usize,
    /// Loopback candidates inside this range win the tie-break.
    pub preferred_range: Option<Subnet>,
    /// Name substrings that exclude a device.
    pub exclude_names: Vec<String>,
    /// TTL of cached responses.
    pub cache_ttl: Duration,
    /// When `false`, every call behaves as a forced refresh.
    pub cache_enabled: bool,
}

impl InventorySettings {
    /// Builds settings from configuration, resolving secrets.
    pub fn from_config(
        inventory: &InventoryConfig,
        cache: &CacheConfig,
    ) -> Result<Self, InventoryError> {
        let config_err = |e: iapfeed_config::ConfigError| InventoryError::Config {
            reason: e.to_string(),
        };
        let token = resolve_secret(
            "inventory.api_token",
            inventory.api_token.as_deref(),
            inventory.api_token_env.as_deref(),
        )
        .map_err(config_err)?;

        let auth = match (token, inventory.username.as_deref()) {
            (Some(token), _) => InventoryAuth::Token(token),
            (None, Some(username)) => {
                let password = resolve_secret(
                    "inventory.password",
                    inventory.password.as_deref(),
                    inventory.password_env.as_deref(),
                )
                .map_err(config_err)?
                .unwrap_or_default();
                InventoryAuth::Session {
                    username: username.to_string(),
                    password,
                }
            }
            (None, None) => {
                return Err(InventoryError::Config {
                    reason: "neither an API token nor a username is configured".to_string(),
                })
            }
        };

        let preferred_range = inventory
            .loopback_preferred_range
            .as_deref()
            .map(|r| Subnet::parse(r, "", iapfeed_common::InclusionReason::Inventory))
            .transpose()
            .map_err(|e| InventoryError::Config {
                reason: format!("inventory.loopback_preferred_range: {e}"),
            })?;

        Ok(Self {
            base_url: inventory.base_url.trim_end_matches('/').to_string(),
            auth,
            timeout: Duration::from_secs(inventory.timeout_secs),
            verify_tls: inventory.verify_tls,
            max_concurrency: inventory.max_concurrency.max(1),
            preferred_range,
            exclude_names: inventory.exclude_names.clone(),
            cache_ttl: Duration::from_secs(cache.ttl_secs),
            cache_enabled: cache.enabled,
        })
    }
}

/// A production device as listed, before per-device details are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    /// Inventory identifier.
    pub id: u64,
    /// Normalized hostname.
    pub name: String,
    /// Upstream family string.
    pub family: String,
    /// Platform derived from the family.
    pub vendor: Vendor,
    /// Group the device was listed for.
    pub group: DeviceGroup,
}

/// A device dropped from a group fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDevice {
    /// Device name.
    pub name: String,
    /// Why it was dropped.
    pub reason: String,
}

/// Result of [`InventoryClient::fetch_group`].
#[derive(Debug, Clone, Default)]
pub struct GroupFetch {
    /// Fetched devices, sorted by name.
    pub devices: Vec<Device>,
    /// Devices whose detail fetch failed.
    pub dropped: Vec<DroppedDevice>,
}

/// Client for the device-management API.
///
/// Cheap to clone; clones share the HTTP client, session and cache.
#[derive(Clone)]
pub struct InventoryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    settings: InventorySettings,
    cache: Arc<CacheStore>,
    logged_in: Mutex<bool>,
}

impl InventoryClient {
    /// Creates a client. No request is sent until the first call.
    pub fn new(settings: InventorySettings, cache: Arc<CacheStore>) -> Result<Self, InventoryError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| InventoryError::Config {
                reason: e.to_string(),
            })?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                settings,
                cache,
                logged_in: Mutex::new(false),
            }),
        })
    }

    /// Returns the client settings.
    pub fn settings(&self) -> &InventorySettings {
        &self.inner.settings
    }

    /// Lists the in-production devices of an inventory group.
    ///
    /// Devices with any other status, and devices whose name contains a
    /// configured exclusion substring, are left out.
    pub async fn list_production_devices(
        &self,
        group: DeviceGroup,
        inventory_group: u64,
        force_refresh: bool,
    ) -> Result<Vec<DeviceSummary>, InventoryError> {
        let group_id = inventory_group.to_string();
        let path = format!("devices?group={group_id}");
        let raw: Vec<RawDevice> = self
            .cached_json(OP_DEVICES, &[group_id.as_str()], &path, force_refresh)
            .await?;

        let excluded: Vec<String> = self
            .inner
            .settings
            .exclude_names
            .iter()
            .map(|s| s.to_ascii_uppercase())
            .collect();

        let mut devices: Vec<DeviceSummary> = raw
            .into_iter()
            .filter(|d| d.status == IN_PRODUCTION)
            .filter_map(|d| {
                let name = Device::normalize_name(&d.name);
                if name.is_empty() || excluded.iter().any(|x| name.contains(x.as_str())) {
                    tracing::debug!(device = %name, id = d.id, "excluded by name");
                    return None;
                }
                Some(DeviceSummary {
                    id: d.id,
                    vendor: vendor_for_family(&d.family, group),
                    family: d.family,
                    name,
                    group,
                })
            })
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!(group = %group, count = devices.len(), "listed production devices");
        Ok(devices)
    }

    /// Selects the loopback of a device.
    ///
    /// For Nokia devices the loopback is the LI mirror source address found
    /// in the configuration, falling back to interface selection.
    pub async fn get_loopback(
        &self,
        device: &DeviceSummary,
        force_refresh: bool,
    ) -> Result<Option<LoopbackInterface>, InventoryError> {
        let interfaces = self.interfaces(device.id, force_refresh).await?;
        let config = if device.vendor == Vendor::NokiaSrosMd {
            self.config_text(device.id, &device.vendor, force_refresh).await?
        } else {
            None
        };
        Ok(self.pick_loopback(device, &interfaces, config.as_deref()))
    }

    /// Derives the subnets of a device, merging the CMTS diagnostic for
    /// CMTS devices.
    pub async fn get_subnets(
        &self,
        device: &DeviceSummary,
        force_refresh: bool,
    ) -> Result<Vec<Subnet>, InventoryError> {
        let interfaces = self.interfaces(device.id, force_refresh).await?;
        let diagnostic = self.diagnostic_for(device, force_refresh).await?;
        Ok(derive_subnets(&device.name, &interfaces, diagnostic.as_ref()))
    }

    /// Scans the latest configuration for LI support.
    ///
    /// `None` for platforms that are not scanned. A scanned platform without
    /// a configuration snapshot is `Unknown`.
    pub async fn get_li_support(
        &self,
        device: &DeviceSummary,
        force_refresh: bool,
    ) -> Result<Option<LiSupport>, InventoryError> {
        if config_attribute(&device.vendor).is_none() {
            return Ok(None);
        }
        let config = self
            .config_text(device.id, &device.vendor, force_refresh)
            .await?;
        Ok(li_support_of(&device.vendor, config.as_deref()))
    }

    /// Fetches everything about one device and builds its record.
    pub async fn fetch_device(
        &self,
        summary: &DeviceSummary,
        force_refresh: bool,
    ) -> Result<Device, InventoryError> {
        let interfaces = self.interfaces(summary.id, force_refresh).await?;
        let config = self
            .config_text(summary.id, &summary.vendor, force_refresh)
            .await?;
        let diagnostic = self.diagnostic_for(summary, force_refresh).await?;
        let comments = self.comments(summary.id, force_refresh).await?;

        let vendor = diagnostic
            .as_ref()
            .and_then(|d| d.vendor.as_deref())
            .and_then(vendor_for_diagnostic)
            .filter(|_| !summary.vendor.is_recognized() || summary.vendor.is_cmts())
            .unwrap_or_else(|| summary.vendor.clone());

        let loopback = self.pick_loopback(summary, &interfaces, config.as_deref());
        if loopback.is_none() {
            tracing::warn!(device = %summary.name, "no loopback address found");
        }
        let subnets = derive_subnets(&summary.name, &interfaces, diagnostic.as_ref());
        let li_support = li_support_of(&summary.vendor, config.as_deref());
        let alias = comments.as_deref().and_then(extract_oss10_alias);

        Ok(Device {
            id: summary.id,
            name: summary.name.clone(),
            vendor,
            in_production: true,
            group: summary.group,
            loopback,
            interfaces,
            subnets,
            alias,
            li_support,
        })
    }

    /// Lists a group and fetches every device with a bounded worker pool.
    ///
    /// A device whose fetch fails is logged and dropped. An authentication
    /// failure aborts the remaining workers and is returned.
    pub async fn fetch_group(
        &self,
        group: DeviceGroup,
        inventory_group: u64,
        force_refresh: bool,
    ) -> Result<GroupFetch, InventoryError> {
        let summaries = self
            .list_production_devices(group, inventory_group, force_refresh)
            .await?;

        let semaphore = Arc::new(Semaphore::new(self.inner.settings.max_concurrency));
        let mut handles = Vec::with_capacity(summaries.len());

        for summary in summaries {
            let client = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let name = summary.name.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| InventoryError::Worker {
                        reason: e.to_string(),
                    })?;
                client.fetch_device(&summary, force_refresh).await
            });
            handles.push((name, handle));
        }

        let mut fetched = collect_workers(handles).await?;
        fetched.devices.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!(
            group = %group,
            devices = fetched.devices.len(),
            dropped = fetched.dropped.len(),
            "fetched group"
        );
        Ok(fetched)
    }

    fn pick_loopback(
        &self,
        device: &DeviceSummary,
        interfaces: &[Interface],
        config: Option<&str>,
    ) -> Option<LoopbackInterface> {
        if device.vendor == Vendor::NokiaSrosMd {
            if let Some(address) = config.and_then(extract_li_source) {
                let owner = interfaces
                    .iter()
                    .find(|i| i.addresses.iter().any(|a| a.address == address));
                return Some(LoopbackInterface {
                    address,
                    index: owner.map_or(0, |i| i.index),
                    name: owner.map_or_else(|| "system".to_string(), |i| i.name.clone()),
                });
            }
            tracing::debug!(device = %device.name, "no LI mirror source in configuration");
        }
        select_loopback(
            &device.name,
            interfaces,
            self.inner.settings.preferred_range.as_ref(),
        )
    }

    async fn interfaces(&self, id: u64, force: bool) -> Result<Vec<Interface>, InventoryError> {
        let id = id.to_string();
        let raw: Vec<RawInterface> = self
            .cached_json(OP_INTERFACES, &[id.as_str()], &format!("devices/{id}/interfaces"), force)
            .await?;
        Ok(interfaces_from_raw(raw))
    }

    async fn comments(&self, id: u64, force: bool) -> Result<Option<String>, InventoryError> {
        let id = id.to_string();
        let detail: RawDeviceDetail = self
            .cached_json(OP_DETAIL, &[id.as_str()], &format!("devices/{id}"), force)
            .await?;
        Ok(detail.comments)
    }

    async fn diagnostic_for(
        &self,
        device: &DeviceSummary,
        force: bool,
    ) -> Result<Option<CmtsSubnetDiagnostic>, InventoryError> {
        if device.group != DeviceGroup::Cmts && !device.vendor.is_cmts() {
            return Ok(None);
        }
        let id = device.id.to_string();
        let results: Vec<RawDiagnosticResult> = self
            .cached_json(
                OP_DIAGNOSTICS,
                &[id.as_str()],
                &format!("devices/{id}/diagnosticresults"),
                force,
            )
            .await?;
        Ok(find_cmts_diagnostic(&results))
    }

    async fn config_text(
        &self,
        id: u64,
        vendor: &Vendor,
        force: bool,
    ) -> Result<Option<String>, InventoryError> {
        let Some(attribute) = config_attribute(vendor) else {
            return Ok(None);
        };
        let id = id.to_string();
        let snapshots: Vec<RawConfigSnapshot> = self
            .cached_json(OP_CONFIGS, &[id.as_str()], &format!("devices/{id}/configs"), force)
            .await?;
        let Some(latest) = latest_snapshot(&snapshots) else {
            tracing::debug!(device_id = %id, "no configuration snapshot");
            return Ok(None);
        };
        let config_id = latest.id.to_string();
        let path = format!("configs/{config_id}/{attribute}");
        let bytes = self
            .cached_get(OP_CONFIG_TEXT, &[config_id.as_str(), attribute], &path, "*/*", force)
            .await?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Serves a JSON GET from the cache, or fetches and decodes it.
    ///
    /// Only bodies that decode are stored. A cached body that no longer
    /// decodes is invalidated and fetched again.
    async fn cached_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: &[&str],
        path: &str,
        force: bool,
    ) -> Result<T, InventoryError> {
        let key = self.cache_key(operation, args);
        if let Some(bytes) = self.cache_lookup(&key, force) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "undecodable cache entry, refetching");
                    if let Err(e) = self.inner.cache.invalidate(&key) {
                        tracing::warn!(%key, error = %e, "cannot invalidate cache entry");
                    }
                }
            }
        }

        let bytes = self.get_raw(path, "application/json").await?;
        let value = serde_json::from_slice(&bytes).map_err(|e| InventoryError::Decode {
            url: self.url(path),
            reason: e.to_string(),
        })?;
        self.cache_store(&key, &bytes);
        Ok(value)
    }

    /// Serves a raw GET from the cache, or fetches it once and stores the body.
    async fn cached_get(
        &self,
        operation: &str,
        args: &[&str],
        path: &str,
        accept: &str,
        force: bool,
    ) -> Result<Vec<u8>, InventoryError> {
        let key = self.cache_key(operation, args);
        if let Some(bytes) = self.cache_lookup(&key, force) {
            return Ok(bytes);
        }
        let bytes = self.get_raw(path, accept).await?;
        self.cache_store(&key, &bytes);
        Ok(bytes)
    }

    fn cache_key(&self, operation: &str, args: &[&str]) -> CacheKey {
        let mut key_args = Vec::with_capacity(args.len() + 1);
        key_args.push(self.inner.settings.base_url.as_str());
        key_args.extend_from_slice(args);
        CacheKey::new(operation, &key_args)
    }

    fn cache_lookup(&self, key: &CacheKey, force: bool) -> Option<Vec<u8>> {
        if !self.inner.settings.cache_enabled || force {
            tracing::debug!(%key, force, "cache bypassed");
            return None;
        }
        let hit = self.inner.cache.get(key);
        tracing::debug!(%key, hit = hit.is_some(), "cache lookup");
        hit
    }

    fn cache_store(&self, key: &CacheKey, bytes: &[u8]) {
        if !self.inner.settings.cache_enabled {
            return;
        }
        if let Err(e) = self.inner.cache.set(key, bytes, self.inner.settings.cache_ttl) {
            tracing::warn!(%key, error = %e, "cannot write cache entry");
        }
    }

    async fn get_raw(&self, path: &str, accept: &str) -> Result<Vec<u8>, InventoryError> {
        self.ensure_session().await?;
        let url = self.url(path);
        let mut request = self.inner.http.get(&url).header(ACCEPT, accept);
        if let InventoryAuth::Token(token) = &self.inner.settings.auth {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request
            .send()
            .await
            .map_err(|source| InventoryError::Http {
                url: url.clone(),
                source,
            })?;
        let response = check_status(&url, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| InventoryError::Http { url, source })?;
        Ok(body.to_vec())
    }

    async fn ensure_session(&self) -> Result<(), InventoryError> {
        let InventoryAuth::Session { username, password } = &self.inner.settings.auth else {
            return Ok(());
        };
        let mut logged_in = self.inner.logged_in.lock().await;
        if *logged_in {
            return Ok(());
        }
        let url = self.url("user");
        let response = self
            .inner
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(|source| InventoryError::Login {
                url: url.clone(),
                reason: source.to_string(),
            })?;
        check_status(&url, response).await.map_err(|e| match e {
            InventoryError::Auth { .. } => e,
            other => InventoryError::Login {
                url: url.clone(),
                reason: other.to_string(),
            },
        })?;
        tracing::info!(user = %username, "inventory session established");
        *logged_in = true;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.inner.settings.base_url, path)
    }
}

type DeviceWorker = (String, JoinHandle<Result<Device, InventoryError>>);

/// Awaits per-device workers in order, keeping each device's name with its
/// outcome. A fatal error aborts the workers still pending.
async fn collect_workers(handles: Vec<DeviceWorker>) -> Result<GroupFetch, InventoryError> {
    let mut fetched = GroupFetch::default();
    let mut pending = handles.into_iter();
    while let Some((name, handle)) = pending.next() {
        let error = match handle.await {
            Ok(Ok(device)) => {
                fetched.devices.push(device);
                continue;
            }
            Ok(Err(e)) if e.is_fatal() => {
                tracing::error!(device = %name, error = %e, "aborting group fetch");
                for (_, rest) in pending {
                    rest.abort();
                }
                return Err(e);
            }
            Ok(Err(e)) => e,
            Err(e) => InventoryError::Worker {
                reason: e.to_string(),
            },
        };
        tracing::warn!(device = %name, error = %error, "dropping device");
        fetched.dropped.push(DroppedDevice {
            name,
            reason: error.to_string(),
        });
    }
    Ok(fetched)
}

fn li_support_of(vendor: &Vendor, config: Option<&str>) -> Option<LiSupport> {
    config_attribute(vendor)?;
    match config {
        Some(text) => scan_li_support(vendor, text),
        None => Some(LiSupport::Unknown),
    }
}

async fn check_status(
    url: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, InventoryError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(InventoryError::Auth {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    if !status.is_success() {
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        return Err(InventoryError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
