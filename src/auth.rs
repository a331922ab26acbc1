//! Identity provider used at login.

use std::fmt::Debug;

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";

/// Identity returned by a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, derive_new::new)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: String,
    /// Email address; empty when the provider hides it.
    pub email: String,
}

/// Login failure with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Auth error: {} at {}:{}", message, file, line)]
pub struct AuthError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl AuthError {
    /// Creates a new auth error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        let message = message.into();
        error!(error_message = %message, "Auth error created");
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Exchanges one-time login codes for identities.
#[async_trait]
pub trait IdentityProvider: Debug + Send + Sync {
    /// Resolves a one-time code to the user it was issued for.
    async fn exchange_code(&self, code: &str) -> Result<Identity, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
    email: Option<String>,
}

/// GitHub OAuth app client.
#[derive(Debug, Clone)]
pub struct GithubOAuth {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
}

impl GithubOAuth {
    /// Creates a client for the OAuth app identified by `client_id`.
    #[instrument(skip(client, client_secret))]
    pub fn new(client: reqwest::Client, client_id: String, client_secret: String) -> Self {
        info!("Creating GitHub OAuth client");
        Self {
            client,
            client_id,
            client_secret,
        }
    }

    #[instrument(skip(self, code))]
    async fn access_token(&self, code: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(GITHUB_TOKEN_URL)
            .header("accept", "application/json")
            .json(&serde_json::json!({
                "client_id": self.client_id,
                "client_secret": self.client_secret,
                "code": code,
            }))
            .send()
            .await
            .map_err(|e| AuthError::new(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::new(format!(
                "Token request returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::new(format!("Failed to parse token response: {}", e)))?;

        match (token.access_token, token.error) {
            (Some(access_token), _) => Ok(access_token),
            (None, Some(err)) => Err(AuthError::new(format!("Code rejected: {}", err))),
            (None, None) => Err(AuthError::new("No access token in response")),
        }
    }
}

#[async_trait]
impl IdentityProvider for GithubOAuth {
    #[instrument(skip(self, code))]
    async fn exchange_code(&self, code: &str) -> Result<Identity, AuthError> {
        let token = self.access_token(code).await?;
        debug!("Access token obtained");

        let response = self
            .client
            .get(GITHUB_USER_URL)
            .header("authorization", format!("token {}", token))
            .header("user-agent", "gridmatch")
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::new(format!("User request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AuthError::new(format!(
                "User request returned {}",
                response.status()
            )));
        }

        let user: GithubUser = response
            .json()
            .await
            .map_err(|e| AuthError::new(format!("Failed to parse user: {}", e)))?;

        info!(user_id = %user.login, "User authenticated");
        Ok(Identity::new(user.login, user.email.unwrap_or_default()))
    }
}
