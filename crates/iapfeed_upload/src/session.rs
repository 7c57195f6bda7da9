//! Login and import against the LI platform.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use iapfeed_config::{resolve_secret, UploadConfig};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::REFERER;
use reqwest::Url;
use serde::Serialize;

use crate::error::UploadError;

const LOGIN_PATH: &str = "api/1/accounts/actions/login/";
const IMPORT_PATH: &str = "api/1/iaps/actions/import_xml/";
const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";
const MAX_ERROR_BODY: usize = 200;

/// Resolved upload settings.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    /// Platform base URL, also sent as `Referer`.
    pub base_url: String,
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Log in but skip the import POST.
    pub verification_mode: bool,
    /// Whether to verify the server certificate.
    pub verify_tls: bool,
}

impl UploadSettings {
    /// Builds settings from configuration, resolving the password.
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let password = resolve_secret(
            "upload.password",
            config.password.as_deref(),
            config.password_env.as_deref(),
        )
        .map_err(|e| UploadError::Config {
            reason: e.to_string(),
        })?
        .unwrap_or_default();
        Ok(Self {
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password,
            timeout: Duration::from_secs(config.timeout_secs),
            verification_mode: config.verification_mode,
            verify_tls: config.verify_tls,
        })
    }
}

/// Result of an import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The platform accepted the document.
    Imported {
        /// HTTP status of the import response.
        status: u16,
    },
    /// Verification mode: the import POST was skipped.
    DryRun {
        /// Size of the escaped payload that would have been sent.
        bytes: usize,
    },
}

#[derive(Serialize)]
struct ImportRequest<'a> {
    iap_groups: &'a [u32],
    xml: String,
}

/// One login session with the import endpoint.
///
/// Each session has its own client and cookie jar.
pub struct UploadSession {
    http: reqwest::Client,
    jar: Arc<Jar>,
    base: Url,
    settings: UploadSettings,
    csrf_token: Option<String>,
}

impl UploadSession {
    /// Creates a session. Nothing is sent until [`login`](Self::login).
    pub fn new(settings: UploadSettings) -> Result<Self, UploadError> {
        let mut base_text = settings.base_url.trim_end_matches('/').to_string();
        base_text.push('/');
        let base = Url::parse(&base_text).map_err(|e| UploadError::Config {
            reason: format!("upload.base_url '{}': {e}", settings.base_url),
        })?;
        let jar = Arc::new(Jar::default());
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .cookie_provider(Arc::clone(&jar))
            .danger_accept_invalid_certs(!settings.verify_tls)
            .build()
            .map_err(|e| UploadError::Config {
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            jar,
            base,
            settings,
            csrf_token: None,
        })
    }

    /// Returns `true` once a CSRF token has been obtained.
    pub fn is_logged_in(&self) -> bool {
        self.csrf_token.is_some()
    }

    /// Logs in and stores the CSRF token set by the platform.
    pub async fn login(&mut self) -> Result<(), UploadError> {
        let url = self.endpoint(LOGIN_PATH)?;
        let response = self
            .http
            .post(url.clone())
            .header(REFERER, self.settings.base_url.as_str())
            .json(&serde_json::json!({
                "username": self.settings.username,
                "password": self.settings.password,
            }))
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url = %url, status = status.as_u16(), "upload login rejected");
            return Err(UploadError::Login {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let token = self
            .jar
            .cookies(&url)
            .and_then(|header| header.to_str().ok().and_then(find_csrf_token))
            .ok_or_else(|| UploadError::MissingToken {
                url: url.to_string(),
            })?;
        tracing::info!(user = %self.settings.username, "upload session established");
        self.csrf_token = Some(token);
        Ok(())
    }

    /// Imports a document into the given groups.
    ///
    /// In verification mode the request is logged and skipped. No retry is
    /// attempted on failure.
    pub async fn import(&self, xml: &str, groups: &[u32]) -> Result<ImportOutcome, UploadError> {
        let token = self.csrf_token.as_deref().ok_or(UploadError::NotLoggedIn)?;
        let payload = escape_xml_payload(xml);

        if self.settings.verification_mode {
            tracing::info!(
                bytes = payload.len(),
                groups = ?groups,
                "verification mode: skipping import"
            );
            return Ok(ImportOutcome::DryRun {
                bytes: payload.len(),
            });
        }

        let url = self.endpoint(IMPORT_PATH)?;
        let response = self
            .http
            .post(url.clone())
            .header(CSRF_HEADER, token)
            .header(REFERER, self.settings.base_url.as_str())
            .json(&ImportRequest {
                iap_groups: groups,
                xml: payload,
            })
            .send()
            .await
            .map_err(|source| UploadError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate(&mut body, MAX_ERROR_BODY);
            return Err(UploadError::Import {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        tracing::info!(status = status.as_u16(), groups = ?groups, "import accepted");
        Ok(ImportOutcome::Imported {
            status: status.as_u16(),
        })
    }

    /// Uploads an existing artifact file, logging in first if needed.
    pub async fn upload_file(
        &mut self,
        path: &Path,
        groups: &[u32],
    ) -> Result<ImportOutcome, UploadError> {
        let xml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| UploadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !self.is_logged_in() {
            self.login().await?;
        }
        self.import(&xml, groups).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, UploadError> {
        self.base.join(path).map_err(|e| UploadError::Config {
            reason: e.to_string(),
        })
    }
}

/// Flattens the document for the import payload: CR and LF are removed
/// and double quotes backslash-escaped.
pub fn escape_xml_payload(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len());
    for c in xml.chars() {
        match c {
            '\r' | '\n' => {}
            '"' => out.push_str("\\\""),
            other => out.push(other),
        }
    }
    out
}

fn find_csrf_token(cookies: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CSRF_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn truncate(body: &mut String, max: usize) {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
}
