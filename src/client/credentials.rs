//! Two-tier credential lifecycle and request signing
//!
//! Level 1: a one-time wallet-signed handshake that issues an API
//! key/secret/passphrase triple. Level 2: an HMAC signature computed
//! per request from that secret.
//!
//! Credentials are cached for the process lifetime. The first
//! authorization failure invalidates the cache and permanently flags
//! preconfigured credentials as exhausted, so the next fetch derives a
//! fresh set instead of oscillating between a bad static triple and a
//! derived one.

use crate::client::auth::WalletSigner;
use crate::error::{AgentError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::Mutex;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// API credential triple used for Level 2 request signing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

#[derive(Debug, Deserialize)]
struct CredentialResponse {
    #[serde(rename = "apiKey")]
    api_key: Option<String>,
    secret: Option<String>,
    passphrase: Option<String>,
}

impl CredentialResponse {
    fn into_credentials(self) -> Result<ApiCredentials> {
        match (self.api_key, self.secret, self.passphrase) {
            (Some(api_key), Some(secret), Some(passphrase)) => Ok(ApiCredentials {
                api_key,
                secret,
                passphrase,
            }),
            _ => Err(AgentError::Auth(
                "Credential response missing apiKey/secret/passphrase".into(),
            )),
        }
    }
}

#[derive(Default)]
struct CredentialState {
    cached: Option<ApiCredentials>,
    /// Sticky for the process lifetime: once preconfigured credentials
    /// fail authorization they are never tried again
    preconfigured_exhausted: bool,
}

/// Owns credential caching, derivation, and authenticated requests
pub struct CredentialManager {
    http: Client,
    base_url: String,
    signer: WalletSigner,
    preconfigured: Option<ApiCredentials>,
    state: Mutex<CredentialState>,
}

impl CredentialManager {
    pub fn new(
        http: Client,
        base_url: &str,
        signer: WalletSigner,
        preconfigured: Option<ApiCredentials>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
            preconfigured,
            state: Mutex::new(CredentialState::default()),
        }
    }

    pub fn address_hex(&self) -> String {
        self.signer.address_hex()
    }

    /// Cached credentials, else preconfigured (unless exhausted), else a
    /// fresh wallet-signed derivation. Derivation runs inside the state
    /// lock so racing callers never derive twice.
    pub async fn get_credentials(&self) -> Result<ApiCredentials> {
        let mut state = self.state.lock().await;
        if let Some(creds) = &state.cached {
            return Ok(creds.clone());
        }

        if !state.preconfigured_exhausted {
            if let Some(creds) = &self.preconfigured {
                state.cached = Some(creds.clone());
                return Ok(creds.clone());
            }
        }

        let creds = self.derive_credentials().await?;
        state.cached = Some(creds.clone());
        Ok(creds)
    }

    /// Drop the cache and permanently exhaust preconfigured credentials;
    /// the next `get_credentials` performs a fresh derivation.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.cached = None;
        state.preconfigured_exhausted = true;
        warn!("API credentials invalidated; next call will derive a fresh set");
    }

    /// Level 1 handshake: sign the ClobAuth attestation and exchange it
    /// for an API credential triple. Tries the create endpoint first and
    /// falls back to the derive endpoint.
    async fn derive_credentials(&self) -> Result<ApiCredentials> {
        let timestamp = crate::utils::unix_timestamp();
        let nonce = 0u64;
        let signature = self.signer.sign_auth_attestation(timestamp, nonce)?;
        let address = self.signer.address_hex();

        let l1_headers = [
            ("POLY_ADDRESS", address.clone()),
            ("POLY_SIGNATURE", signature),
            ("POLY_TIMESTAMP", timestamp.to_string()),
            ("POLY_NONCE", nonce.to_string()),
        ];

        let create_url = format!("{}/auth/api-key", self.base_url);
        let mut req = self.http.post(&create_url);
        for (k, v) in &l1_headers {
            req = req.header(*k, v);
        }
        let resp = req.send().await?;

        let resp = if resp.status().is_success() {
            resp
        } else {
            info!(
                status = %resp.status(),
                "Credential create endpoint refused, falling back to derive"
            );
            let derive_url = format!("{}/auth/derive-api-key", self.base_url);
            let mut req = self.http.get(&derive_url);
            for (k, v) in &l1_headers {
                req = req.header(*k, v);
            }
            let resp = req.send().await?;
            if !resp.status().is_success() {
                return Err(AgentError::Auth(format!(
                    "Credential derivation failed: {}",
                    resp.status()
                )));
            }
            resp
        };

        let parsed: CredentialResponse = resp.json().await?;
        let creds = parsed.into_credentials()?;
        info!(api_key = %creds.api_key, "Derived fresh API credentials");
        Ok(creds)
    }

    /// Level 2 signature: HMAC-SHA256 over `timestamp + method + path
    /// [+ body]`, base64 with `+`/`/` mapped to their URL-safe forms.
    pub fn l2_signature(
        creds: &ApiCredentials,
        timestamp: i64,
        method: &str,
        path: &str,
        body: Option<&str>,
    ) -> Result<String> {
        let key = URL_SAFE
            .decode(&creds.secret)
            .or_else(|_| STANDARD.decode(&creds.secret))
            .map_err(|_| AgentError::Auth("API secret is not valid base64".into()))?;

        let mut message = format!("{}{}{}", timestamp, method, path);
        if let Some(body) = body {
            message.push_str(body);
        }

        let mut mac = HmacSha256::new_from_slice(&key)
            .map_err(|e| AgentError::Auth(format!("HMAC key error: {}", e)))?;
        mac.update(message.as_bytes());
        let digest = mac.finalize().into_bytes();

        Ok(STANDARD.encode(digest).replace('+', "-").replace('/', "_"))
    }

    async fn send_authed(
        &self,
        method: Method,
        path: &str,
        creds: &ApiCredentials,
        body: Option<&str>,
    ) -> Result<reqwest::Response> {
        let timestamp = crate::utils::unix_timestamp();
        let signature = Self::l2_signature(creds, timestamp, method.as_str(), path, body)?;
        let url = format!("{}{}", self.base_url, path);

        let mut req = self
            .http
            .request(method, &url)
            .header("POLY_ADDRESS", self.signer.address_hex())
            .header("POLY_SIGNATURE", signature)
            .header("POLY_TIMESTAMP", timestamp.to_string())
            .header("POLY_API_KEY", &creds.api_key)
            .header("POLY_PASSPHRASE", &creds.passphrase);
        if let Some(body) = body {
            req = req
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        Ok(req.send().await?)
    }

    /// Authenticated request with one-shot auth recovery. The body is
    /// built from the active credentials so credential-dependent fields
    /// (e.g. an `owner` field equal to the API key) are re-serialized
    /// after a re-derivation. Exactly one retry; a second authorization
    /// failure is fatal for the call.
    pub async fn request_authed<F>(
        &self,
        method: Method,
        path: &str,
        build_body: F,
    ) -> Result<serde_json::Value>
    where
        F: Fn(&ApiCredentials) -> Option<serde_json::Value>,
    {
        let creds = self.get_credentials().await?;
        let body = build_body(&creds).map(|v| v.to_string());
        let resp = self
            .send_authed(method.clone(), path, &creds, body.as_deref())
            .await?;

        let resp = if is_auth_failure(resp.status()) {
            warn!(path, "Authorization failure, re-deriving credentials and retrying once");
            self.invalidate().await;
            let fresh = self.get_credentials().await?;
            let body = build_body(&fresh).map(|v| v.to_string());
            let retry = self
                .send_authed(method, path, &fresh, body.as_deref())
                .await?;
            if is_auth_failure(retry.status()) {
                return Err(AgentError::Auth(format!(
                    "Authorization failed twice for {}",
                    path
                )));
            }
            retry
        } else {
            resp
        };

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AgentError::Api(format!("{} -> {}: {}", path, status, text)));
        }
        if text.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get_authed(&self, path: &str) -> Result<serde_json::Value> {
        self.request_authed(Method::GET, path, |_| None).await
    }

    pub async fn delete_authed(&self, path: &str) -> Result<serde_json::Value> {
        self.request_authed(Method::DELETE, path, |_| None).await
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_creds() -> ApiCredentials {
        ApiCredentials {
            api_key: "key-1".into(),
            // base64 of "super-secret-hmac-key"
            secret: STANDARD.encode(b"super-secret-hmac-key"),
            passphrase: "pass".into(),
        }
    }

    #[test]
    fn test_l2_signature_is_url_safe() {
        let creds = test_creds();
        for ts in [1_700_000_000i64, 1_700_000_001, 1_700_000_002] {
            let sig =
                CredentialManager::l2_signature(&creds, ts, "POST", "/order", Some("{\"a\":1}"))
                    .unwrap();
            assert!(!sig.contains('+'));
            assert!(!sig.contains('/'));
        }
    }

    #[test]
    fn test_l2_signature_covers_body() {
        let creds = test_creds();
        let without =
            CredentialManager::l2_signature(&creds, 1_700_000_000, "POST", "/order", None).unwrap();
        let with = CredentialManager::l2_signature(
            &creds,
            1_700_000_000,
            "POST",
            "/order",
            Some("{\"a\":1}"),
        )
        .unwrap();
        assert_ne!(without, with);
    }

    #[test]
    fn test_l2_signature_rejects_bad_secret() {
        let creds = ApiCredentials {
            api_key: "k".into(),
            secret: "!!not-base64!!".into(),
            passphrase: "p".into(),
        };
        let err = CredentialManager::l2_signature(&creds, 0, "GET", "/x", None).unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[test]
    fn test_missing_field_fails_loudly() {
        let resp: CredentialResponse =
            serde_json::from_str(r#"{"apiKey":"k","secret":"s"}"#).unwrap();
        assert!(resp.into_credentials().is_err());
    }
}
