//! Remote media acquisition.
//!
//! Downloads render inputs by URL, with special handling for the storage
//! provider's share links: link normalization to a direct-download
//! endpoint, an authenticated by-id channel when a readonly credential is
//! configured, and recovery from the HTML "confirmation" interstitial the
//! provider returns for some anonymous downloads. The interstitial
//! follow-up happens at most once per request; there is no retry loop.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::{Response, StatusCode};

use crate::config::DriveConfig;

/// Direct-download endpoint share links are rewritten to.
const DIRECT_DOWNLOAD_BASE: &str = "https://drive.google.com/uc?export=download";
/// Authenticated by-id media endpoint.
const FILES_API_BASE: &str = "https://www.googleapis.com/drive/v3/files";
/// Header set making anonymous requests look like a browser; the provider
/// serves different content to obvious bots.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";
/// How much of an interstitial body is scanned for a confirmation token.
const INTERSTITIAL_SCAN_LIMIT: usize = 64 * 1024;

static PATH_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/file/d/([A-Za-z0-9_-]{10,})").unwrap());
static QUERY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]id=([A-Za-z0-9_-]{10,})").unwrap());
static CONFIRM_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="confirm"\s+value="([^"]+)""#).unwrap());
static CONFIRM_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"confirm=([0-9A-Za-z_-]+)").unwrap());
static SESSION_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"name="uuid"\s+value="([^"]+)""#).unwrap());
static FALLBACK_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*export=download[^"]*)""#).unwrap());

/// Errors from the download path.
#[derive(Debug, thiserror::Error)]
pub enum AcquireError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} fetching {url}")]
    Status { status: StatusCode, url: String },

    #[error("interstitial page: {0}")]
    Interstitial(String),

    #[error("download produced an empty file: {}", .0.display())]
    EmptyDownload(PathBuf),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Readonly-scope access token for the authenticated download channel.
///
/// Resolved exactly once at process start and injected into the acquirer;
/// never re-read per call.
#[derive(Clone)]
pub struct DriveCredential(String);

impl DriveCredential {
    /// Resolve the credential from config: inline token first, token file
    /// second, `None` when neither is configured.
    pub fn resolve(config: &DriveConfig) -> Result<Option<Self>, AcquireError> {
        if let Some(token) = config.access_token.as_deref() {
            if !token.is_empty() {
                return Ok(Some(Self(token.to_string())));
            }
        }
        if let Some(path) = &config.token_file {
            let token = std::fs::read_to_string(path).map_err(|e| {
                AcquireError::Credential(format!(
                    "cannot read token file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let token = token.trim();
            if token.is_empty() {
                return Err(AcquireError::Credential(format!(
                    "token file is empty: {}",
                    path.display()
                )));
            }
            return Ok(Some(Self(token.to_string())));
        }
        Ok(None)
    }
}

impl std::fmt::Debug for DriveCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DriveCredential(..)")
    }
}

/// Downloads bytes for a URL or provider document id into a destination
/// file, defeating the provider's interstitial confirmation pages.
pub struct RemoteAcquirer {
    client: reqwest::Client,
    credential: Option<DriveCredential>,
}

impl RemoteAcquirer {
    /// Build an acquirer with a bounded per-request timeout.
    pub fn new(credential: Option<DriveCredential>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self { client, credential }
    }

    /// Fetch `url` into `destination`, returning the byte count.
    ///
    /// Share links are rewritten to a direct-download endpoint (or routed
    /// through the authenticated channel when a credential is configured);
    /// any other URL is fetched as-is. Fails on network errors, non-2xx
    /// statuses, a persistent interstitial, or an empty download.
    pub async fn acquire(&self, url: &str, destination: &Path) -> Result<u64, AcquireError> {
        if let Some(id) = extract_drive_id(url) {
            tracing::debug!(id = %id, "share link normalized to document id");
            if let Some(ref credential) = self.credential {
                return self.fetch_by_id(&id, credential, destination).await;
            }
            let direct = format!("{}&id={}", DIRECT_DOWNLOAD_BASE, id);
            return self.fetch_anonymous(&direct, destination).await;
        }
        self.fetch_anonymous(url, destination).await
    }

    /// Authenticated by-id download.
    async fn fetch_by_id(
        &self,
        id: &str,
        credential: &DriveCredential,
        destination: &Path,
    ) -> Result<u64, AcquireError> {
        let url = format!("{}/{}?alt=media", FILES_API_BASE, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&credential.0)
            .send()
            .await?;
        let response = check_status(response, &url)?;
        let written = stream_to_file(response, destination).await?;
        ensure_non_empty(written, destination)
    }

    /// Anonymous download with at most one interstitial follow-up.
    async fn fetch_anonymous(&self, url: &str, destination: &Path) -> Result<u64, AcquireError> {
        let response = self.get_browser_like(url).await?;

        if !is_html(&response) {
            let written = stream_to_file(response, destination).await?;
            return ensure_non_empty(written, destination);
        }

        // Interstitial warning page. Scan a bounded prefix for the
        // confirmation token (plus session id), falling back to a literal
        // download hyperlink embedded in the page.
        let prefix = read_prefix(response, INTERSTITIAL_SCAN_LIMIT).await?;
        let retry_url = confirmation_url(url, &prefix)
            .or_else(|| fallback_link(&prefix))
            .ok_or_else(|| {
                AcquireError::Interstitial(
                    "no confirmation token or download link found".to_string(),
                )
            })?;

        tracing::debug!(url = %retry_url, "following interstitial confirmation");
        let retry = self.get_browser_like(&retry_url).await?;
        if is_html(&retry) {
            return Err(AcquireError::Interstitial(
                "interstitial persisted after confirmation retry".to_string(),
            ));
        }

        let written = stream_to_file(retry, destination).await?;
        ensure_non_empty(written, destination)
    }

    async fn get_browser_like(&self, url: &str) -> Result<Response, AcquireError> {
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "*/*")
            .send()
            .await?;
        check_status(response, url)
    }
}

/// Extract a document id from a share link, trying the path-segment form
/// before the query-parameter form. Non-provider URLs yield `None`.
fn extract_drive_id(url: &str) -> Option<String> {
    if !url.contains("drive.google.com") && !url.contains("docs.google.com") {
        return None;
    }
    PATH_ID_RE
        .captures(url)
        .or_else(|| QUERY_ID_RE.captures(url))
        .map(|c| c[1].to_string())
}

/// Build the confirmation follow-up URL: the original request with the
/// token (and session id, when present) appended as query parameters.
fn confirmation_url(url: &str, body_prefix: &str) -> Option<String> {
    let token = CONFIRM_FIELD_RE
        .captures(body_prefix)
        .or_else(|| CONFIRM_PARAM_RE.captures(body_prefix))
        .map(|c| c[1].to_string())?;

    let mut retry = append_query(url, "confirm", &token);
    if let Some(session) = SESSION_FIELD_RE.captures(body_prefix) {
        retry = append_query(&retry, "uuid", &session[1]);
    }
    Some(retry)
}

/// Find a literal secondary download hyperlink in the interstitial body.
fn fallback_link(body_prefix: &str) -> Option<String> {
    let href = FALLBACK_LINK_RE.captures(body_prefix)?[1].replace("&amp;", "&");
    if href.starts_with("http://") || href.starts_with("https://") {
        Some(href)
    } else {
        Some(format!("https://drive.google.com{}", href))
    }
}

fn append_query(url: &str, key: &str, value: &str) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, sep, key, value)
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("text/html"))
        .unwrap_or(false)
}

fn check_status(response: Response, url: &str) -> Result<Response, AcquireError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AcquireError::Status {
            status,
            url: url.to_string(),
        });
    }
    Ok(response)
}

fn ensure_non_empty(written: u64, destination: &Path) -> Result<u64, AcquireError> {
    if written == 0 {
        return Err(AcquireError::EmptyDownload(destination.to_path_buf()));
    }
    Ok(written)
}

/// Stream the response body to a file in bounded chunks.
async fn stream_to_file(response: Response, destination: &Path) -> Result<u64, AcquireError> {
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    Ok(written)
}

/// Read at most `limit` bytes of the body, lossily decoded.
async fn read_prefix(response: Response, limit: usize) -> Result<String, AcquireError> {
    use futures::StreamExt;

    let mut buf: Vec<u8> = Vec::with_capacity(limit.min(16 * 1024));
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let take = (limit - buf.len()).min(chunk.len());
        buf.extend_from_slice(&chunk[..take]);
        if buf.len() >= limit {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_id_path_segment_form() {
        let id = extract_drive_id(
            "https://drive.google.com/file/d/1aBcDeFgHiJkLmNoP/view?usp=sharing",
        );
        assert_eq!(id.as_deref(), Some("1aBcDeFgHiJkLmNoP"));
    }

    #[test]
    fn test_extract_id_query_parameter_form() {
        let id = extract_drive_id("https://drive.google.com/open?id=0B_abcdefGHIJKL");
        assert_eq!(id.as_deref(), Some("0B_abcdefGHIJKL"));
    }

    #[test]
    fn test_path_form_preferred_over_query_form() {
        let id = extract_drive_id(
            "https://drive.google.com/file/d/PATHSEGMENTID1/view?id=QUERYPARAMID2",
        );
        assert_eq!(id.as_deref(), Some("PATHSEGMENTID1"));
    }

    #[test]
    fn test_non_provider_urls_pass_through() {
        assert_eq!(extract_drive_id("https://example.com/file/d/1aBcDeFgHiJkLmNoP"), None);
        assert_eq!(extract_drive_id("https://cdn.example.com/video.mp4"), None);
    }

    #[test]
    fn test_confirmation_url_from_form_field() {
        let body = r#"<form><input type="hidden" name="confirm" value="t0k3n">"#;
        let url = confirmation_url("https://host/dl?id=x", body).unwrap();
        assert_eq!(url, "https://host/dl?id=x&confirm=t0k3n");
    }

    #[test]
    fn test_confirmation_url_includes_session_id() {
        let body = concat!(
            r#"<input type="hidden" name="confirm" value="abc">"#,
            r#"<input type="hidden" name="uuid" value="session-1">"#,
        );
        let url = confirmation_url("https://host/dl", body).unwrap();
        assert_eq!(url, "https://host/dl?confirm=abc&uuid=session-1");
    }

    #[test]
    fn test_confirmation_url_from_embedded_param() {
        let body = r#"<a href="/uc?export=download&confirm=xyz9&id=f">Download anyway</a>"#;
        let url = confirmation_url("https://host/dl?id=f", body).unwrap();
        assert_eq!(url, "https://host/dl?id=f&confirm=xyz9");
    }

    #[test]
    fn test_no_token_yields_none() {
        assert_eq!(confirmation_url("https://host/dl", "<html>virus scan</html>"), None);
    }

    #[test]
    fn test_fallback_link_unescapes_entities() {
        let body = r#"<a href="https://mirror/uc?export=download&amp;id=f">here</a>"#;
        assert_eq!(
            fallback_link(body).as_deref(),
            Some("https://mirror/uc?export=download&id=f")
        );
    }

    #[test]
    fn test_fallback_link_resolves_relative() {
        let body = r#"<a href="/uc?export=download&id=f">here</a>"#;
        assert_eq!(
            fallback_link(body).as_deref(),
            Some("https://drive.google.com/uc?export=download&id=f")
        );
    }

    #[test]
    fn test_credential_resolution_order() {
        let config = DriveConfig {
            access_token: Some("inline".to_string()),
            token_file: Some(PathBuf::from("/nonexistent")),
        };
        // Inline token wins; the file is never touched.
        assert!(DriveCredential::resolve(&config).unwrap().is_some());

        let config = DriveConfig {
            access_token: None,
            token_file: Some(PathBuf::from("/nonexistent/token")),
        };
        assert!(matches!(
            DriveCredential::resolve(&config),
            Err(AcquireError::Credential(_))
        ));

        assert!(DriveCredential::resolve(&DriveConfig::default())
            .unwrap()
            .is_none());
    }
}
