use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::{debug, info};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::sign::Signer;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::constants::{AUTH_SCOPES, TOKEN_URI};
use crate::error::{Error, Result};

fn default_token_uri() -> String {
    TOKEN_URI.to_string()
}

/// OAuth client plus a long-lived refresh token.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

/// Key file of a service account, exchanged through a signed JWT assertion.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// RS256-signed assertion valid for one hour from `issued_at` (seconds).
    pub fn assertion(&self, issued_at: u64) -> Result<String> {
        let mut header = json!({"alg": "RS256", "typ": "JWT"});
        if let Some(kid) = &self.private_key_id {
            header["kid"] = json!(kid);
        }
        let claims = json!({
            "iss": self.client_email,
            "scope": AUTH_SCOPES.join(" "),
            "aud": self.token_uri,
            "iat": issued_at,
            "exp": issued_at + 3600,
        });
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );

        let key = PKey::private_key_from_pem(self.private_key.as_bytes())
            .map_err(|e| Error::Auth(format!("service account private key is unreadable: {}", e)))?;
        let signature = Signer::new(MessageDigest::sha256(), &key)
            .and_then(|mut signer| {
                signer.update(signing_input.as_bytes())?;
                signer.sign_to_vec()
            })
            .map_err(|e| Error::Auth(format!("signing the token assertion failed: {}", e)))?;

        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }
}

#[derive(Debug, Clone)]
pub enum Credentials {
    AuthorizedUser(AuthorizedUser),
    ServiceAccount(ServiceAccount),
    /// A bearer token issued out of band, used as is.
    AccessToken(String),
}

#[derive(Debug, Clone)]
pub struct TokenInfo {
    pub access_token: String,
    pub expires_at: SystemTime,
}

impl Credentials {
    /// Parse a credential JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| Error::Auth(format!("credential JSON is not valid JSON: {}", e)))?;

        match value.get("type").and_then(|t| t.as_str()) {
            Some("authorized_user") | None => serde_json::from_value(value)
                .map(Credentials::AuthorizedUser)
                .map_err(|e| Error::Auth(format!("incomplete authorized_user credential: {}", e))),
            Some("service_account") => serde_json::from_value(value)
                .map(Credentials::ServiceAccount)
                .map_err(|e| Error::Auth(format!("incomplete service_account credential: {}", e))),
            Some(other) => Err(Error::Auth(format!("unsupported credential type '{}'", other))),
        }
    }

    /// Obtain a bearer token, exchanging the refresh token or a signed
    /// assertion when needed.
    pub async fn authenticate(&self, http: &reqwest::Client) -> Result<TokenInfo> {
        match self {
            Credentials::AccessToken(token) => {
                if token.trim().is_empty() {
                    return Err(Error::Auth("access token is empty".to_string()));
                }
                Ok(TokenInfo {
                    access_token: token.clone(),
                    expires_at: SystemTime::now() + Duration::from_secs(3600),
                })
            }
            Credentials::AuthorizedUser(user) => {
                info!("Exchanging refresh token for client {}", user.client_id);

                request_token(
                    http,
                    &user.token_uri,
                    &[
                        ("grant_type", "refresh_token"),
                        ("client_id", user.client_id.as_str()),
                        ("client_secret", user.client_secret.as_str()),
                        ("refresh_token", user.refresh_token.as_str()),
                    ],
                )
                .await
            }
            Credentials::ServiceAccount(account) => {
                info!("Requesting token for service account {}", account.client_email);

                let issued_at = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| Error::Auth(format!("system clock before epoch: {}", e)))?
                    .as_secs();
                let assertion = account.assertion(issued_at)?;
                request_token(
                    http,
                    &account.token_uri,
                    &[
                        ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                        ("assertion", assertion.as_str()),
                    ],
                )
                .await
            }
        }
    }
}

async fn request_token(http: &reqwest::Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenInfo> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Auth(format!("token request failed: {}", e)))?;

    debug!("Token request status: {}", response.status());

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("token endpoint returned {}: {}", status, error_text)));
    }

    let token_data: serde_json::Value = response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("unreadable token response: {}", e)))?;
    parse_token_response(&token_data)
}

fn parse_token_response(token_data: &serde_json::Value) -> Result<TokenInfo> {
    let access_token = token_data
        .get("access_token")
        .and_then(|t| t.as_str())
        .ok_or_else(|| Error::Auth("no access token in response".to_string()))?;

    // Default to one hour if not provided
    let expires_in = token_data
        .get("expires_in")
        .and_then(|e| e.as_u64())
        .unwrap_or(3600);

    Ok(TokenInfo {
        access_token: access_token.to_string(),
        expires_at: SystemTime::now() + Duration::from_secs(expires_in),
    })
}
