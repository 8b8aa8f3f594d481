//! GoTrue (Supabase Auth) REST client.
//!
//! Thin HTTP wrapper over `/auth/v1/*`. Every request carries the public
//! `apikey`; user-scoped calls add `Authorization: Bearer <access token>`.
//! Response parsing lives in pure functions for testability.

use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AuthSession, AuthTokens, Identity, IdentityError, IdentityProvider};
use crate::config::IdentityConfig;

const AUTH_PREFIX: &str = "/auth/v1";

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl GoTrueClient {
    /// Build a client for the configured identity service.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| IdentityError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: config.url.clone(), anon_key: config.anon_key.clone() })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{AUTH_PREFIX}{path}", self.base_url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.anon_key)
    }

    /// Send a request and return the JSON body of a 2xx answer.
    async fn send(&self, builder: RequestBuilder) -> Result<Value, IdentityError> {
        let response = builder
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| IdentityError::Parse(e.to_string()))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str, display_name: &str) -> Result<Option<Identity>, IdentityError> {
        let body = json!({
            "email": email,
            "password": password,
            "data": { "full_name": display_name },
        });
        let value = self
            .send(self.request(Method::POST, "/signup").json(&body))
            .await?;
        Ok(parse_signup(&value))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthSession, IdentityError> {
        let body = json!({ "email": email, "password": password });
        let value = self
            .send(
                self.request(Method::POST, "/token")
                    .query(&[("grant_type", "password")])
                    .json(&body),
            )
            .await?;
        parse_session(&value)
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> Result<String, IdentityError> {
        let url = Url::parse_with_params(
            &self.endpoint("/authorize"),
            &[
                ("provider", provider),
                ("redirect_to", redirect_to),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "s256"),
            ],
        )
        .map_err(|e| IdentityError::Parse(format!("authorize url: {e}")))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<AuthSession, IdentityError> {
        let body = json!({ "auth_code": auth_code, "code_verifier": code_verifier });
        let value = self
            .send(
                self.request(Method::POST, "/token")
                    .query(&[("grant_type", "pkce")])
                    .json(&body),
            )
            .await?;
        parse_session(&value)
    }

    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, IdentityError> {
        let result = self
            .send(
                self.request(Method::GET, "/user")
                    .bearer_auth(access_token),
            )
            .await;
        match result {
            Ok(value) => parse_user(&value).map(Some),
            Err(IdentityError::Api { status: 401 | 403, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, IdentityError> {
        let body = json!({ "refresh_token": refresh_token });
        let value = self
            .send(
                self.request(Method::POST, "/token")
                    .query(&[("grant_type", "refresh_token")])
                    .json(&body),
            )
            .await?;
        parse_session(&value)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        self.send(
            self.request(Method::POST, "/logout")
                .bearer_auth(access_token),
        )
        .await?;
        Ok(())
    }

    async fn resend_signup(&self, email: &str) -> Result<(), IdentityError> {
        let body = json!({ "type": "signup", "email": email });
        self.send(self.request(Method::POST, "/resend").json(&body))
            .await?;
        Ok(())
    }

    async fn verify_signup_otp(&self, email: &str, token: &str) -> Result<AuthSession, IdentityError> {
        let body = json!({ "type": "signup", "email": email, "token": token });
        let value = self
            .send(self.request(Method::POST, "/verify").json(&body))
            .await?;
        parse_session(&value)
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Debug, Deserialize)]
struct RawUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

#[derive(Debug, Deserialize)]
struct RawSession {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
    user: Value,
}

/// Error envelope. GoTrue has used both `{code, error_code, msg}` and the
/// OAuth-style `{error, error_description}` shapes.
#[derive(Debug, Default, Deserialize)]
struct RawError {
    error_code: Option<String>,
    error: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
}

pub(crate) fn parse_user(value: &Value) -> Result<Identity, IdentityError> {
    let raw: RawUser = serde_json::from_value(value.clone()).map_err(|e| IdentityError::Parse(e.to_string()))?;
    let display_name = ["full_name", "name"]
        .iter()
        .find_map(|key| raw.user_metadata.get(*key).and_then(Value::as_str))
        .filter(|name| !name.trim().is_empty())
        .map(str::to_owned);
    Ok(Identity { id: raw.id, email: raw.email, display_name, metadata: raw.user_metadata })
}

pub(crate) fn parse_session(value: &Value) -> Result<AuthSession, IdentityError> {
    let raw: RawSession = serde_json::from_value(value.clone()).map_err(|e| IdentityError::Parse(e.to_string()))?;
    let identity = parse_user(&raw.user)?;
    Ok(AuthSession {
        tokens: AuthTokens {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            expires_in: raw.expires_in,
        },
        identity,
    })
}

/// Sign-up answers with a bare user when confirmation is required, or with a
/// full session when auto-confirm is on.
pub(crate) fn parse_signup(value: &Value) -> Option<Identity> {
    if let Some(user) = value.get("user").filter(|u| !u.is_null()) {
        return parse_user(user).ok();
    }
    parse_user(value).ok()
}

pub(crate) fn parse_error(status: u16, body: &str) -> IdentityError {
    let raw: RawError = serde_json::from_str(body).unwrap_or_default();
    let code = raw.error_code.or_else(|| raw.error.clone());
    let message = raw
        .msg
        .or(raw.message)
        .or(raw.error_description)
        .or(raw.error)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() { format!("status {status}") } else { trimmed.to_owned() }
        });
    IdentityError::Api { status, code, message }
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
