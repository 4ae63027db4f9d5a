//! GCP authentication using a service account
//!
//! Exchanges a self-signed RS256 JWT for an OAuth2 access token and caches it
//! until shortly before it expires.

use base64::Engine;
use serde::Deserialize;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::error::{Error, Result};

const SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Fields of a service account JSON key we need
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// GCP authentication manager
pub struct GcpAuth {
    key: ServiceAccountKey,
    project_id: String,
    http: reqwest::Client,
    token: RwLock<Option<CachedToken>>,
}

impl GcpAuth {
    /// Load a service account JSON key file
    pub fn from_service_account(key_path: impl AsRef<Path>, project_id: String) -> Result<Self> {
        let key_path = key_path.as_ref();
        let content = std::fs::read_to_string(key_path).map_err(|e| {
            Error::Config(format!(
                "Failed to read service account key {}: {}",
                key_path.display(),
                e
            ))
        })?;

        Self::from_json(&content, project_id)
    }

    fn from_json(content: &str, project_id: String) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid service account key format: {}", e)))?;

        Ok(Self {
            key,
            project_id,
            http: reqwest::Client::new(),
            token: RwLock::new(None),
        })
    }

    /// Get project ID
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Get a valid access token (refreshing if needed)
    pub async fn get_token(&self) -> Result<String> {
        {
            let token = self.token.read().await;
            if let Some(cached) = token.as_ref() {
                if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let mut token = self.token.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = token.as_ref() {
            if cached.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(cached.access_token.clone());
            }
        }

        let response = self.exchange_token().await?;
        tracing::debug!("Refreshed GCP access token (expires in {}s)", response.expires_in);

        *token = Some(CachedToken {
            access_token: response.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        });

        Ok(response.access_token)
    }

    /// `Authorization` header value for the current token
    pub async fn bearer(&self) -> Result<String> {
        Ok(format!("Bearer {}", self.get_token().await?))
    }

    async fn exchange_token(&self) -> Result<TokenResponse> {
        let jwt = build_assertion(&self.key, chrono::Utc::now().timestamp())?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", jwt.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Config(format!("Token exchange request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Config(format!(
                "Token exchange failed ({}): {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Config(format!("Failed to parse token response: {}", e)))
    }
}

/// Signed JWT assertion (RS256) for the token endpoint
fn build_assertion(key: &ServiceAccountKey, now: i64) -> Result<String> {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;

    let claims = serde_json::json!({
        "iss": key.client_email,
        "scope": SCOPE,
        "aud": key.token_uri,
        "iat": now,
        "exp": now + 3600,
    });

    let header = engine.encode(r#"{"alg":"RS256","typ":"JWT"}"#.as_bytes());
    let payload = engine.encode(claims.to_string().as_bytes());
    let signing_input = format!("{}.{}", header, payload);

    let private_key = key.private_key.replace("\\n", "\n");
    let pem = pem::parse(&private_key)
        .map_err(|e| Error::Config(format!("Failed to parse private key PEM: {}", e)))?;
    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(pem.contents())
        .map_err(|e| Error::Config(format!("Failed to parse private key: {:?}", e)))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| Error::Config(format!("Failed to sign JWT: {:?}", e)))?;

    Ok(format!("{}.{}", signing_input, engine.encode(&signature)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_malformed_key_file() {
        assert!(matches!(
            GcpAuth::from_json("{}", "project".to_string()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_bad_private_key_is_a_config_error() {
        let auth = GcpAuth::from_json(
            r#"{
                "client_email": "svc@project.iam.gserviceaccount.com",
                "private_key": "not a pem",
                "token_uri": "https://oauth2.googleapis.com/token"
            }"#,
            "project".to_string(),
        )
        .unwrap();

        assert_eq!(auth.project_id(), "project");
        assert!(matches!(build_assertion(&auth.key, 0), Err(Error::Config(_))));
    }
}
