//! Application credentials and access-token exchange.
//!
//! The remote issues short-lived app access tokens in exchange for an app
//! id and secret. One token is fetched per run and attached to every call
//! as a bearer token.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Path of the token exchange endpoint, relative to the API base URL.
pub const TOKEN_PATH: &str = "/open-apis/auth/v3/app_access_token/internal/";

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The app id or secret is empty.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The exchange request did not complete.
    #[error("token request failed: {0}")]
    Request(String),

    /// The remote refused the credentials.
    #[error("token rejected ({code}): {msg}")]
    Rejected {
        /// Remote status code.
        code: i64,
        /// Remote message.
        msg: String,
    },
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Request(e.to_string())
    }
}

/// App id and secret used to obtain access tokens.
///
/// The secret is wiped from memory when the credentials are dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AppCredentials {
    app_id: String,
    app_secret: String,
}

impl AppCredentials {
    /// Create credentials, rejecting empty values.
    pub fn new(app_id: &str, app_secret: &str) -> Result<Self, AuthError> {
        if app_id.trim().is_empty() {
            return Err(AuthError::MissingCredential("app_id"));
        }
        if app_secret.is_empty() {
            return Err(AuthError::MissingCredential("app_secret"));
        }
        Ok(Self {
            app_id: app_id.trim().to_string(),
            app_secret: app_secret.to_string(),
        })
    }

    /// The app id.
    pub fn app_id(&self) -> &str {
        &self.app_id
    }
}

// Intentionally opaque debug to avoid logging secrets
impl std::fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AppCredentials({}, [REDACTED])", self.app_id)
    }
}

/// A bearer token for API calls.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for the `Authorization` header.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken([REDACTED])")
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    app_id: &'a str,
    app_secret: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    app_access_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<AccessToken, AuthError> {
        if self.code != 0 {
            return Err(AuthError::Rejected {
                code: self.code,
                msg: self.msg,
            });
        }
        match self.app_access_token {
            Some(token) if !token.is_empty() => Ok(AccessToken::new(token)),
            _ => Err(AuthError::Rejected {
                code: self.code,
                msg: "response carried no token".into(),
            }),
        }
    }
}

/// Exchange app credentials for an access token.
pub async fn fetch_app_access_token(
    http: &reqwest::Client,
    base_url: &str,
    credentials: &AppCredentials,
) -> Result<AccessToken, AuthError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH);
    tracing::debug!("Requesting app access token for {}", credentials.app_id);

    let response = http
        .post(&url)
        .json(&TokenRequest {
            app_id: &credentials.app_id,
            app_secret: &credentials.app_secret,
        })
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(AuthError::Request(format!(
            "token endpoint returned {}",
            response.status()
        )));
    }

    response.json::<TokenResponse>().await?.into_token()
}
