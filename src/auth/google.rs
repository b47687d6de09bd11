//! Google sign-in.
//!
//! The browser hands us either a Google ID token (`credential`, from the One Tap
//! button) or an OAuth access token (`userInfo.accessToken`, from the popup flow).
//! ID tokens are checked against the tokeninfo endpoint, which also enforces the
//! signature and expiry; the audience must equal our configured client id.
//! Access tokens are resolved through the userinfo endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};

use crate::errors::ServiceError;

/// What the caller presented to prove their Google identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoogleCredential {
    IdToken(String),
    AccessToken(String),
}

/// Verified identity returned by Google
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleProfile {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[async_trait]
pub trait GoogleIdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &GoogleCredential) -> Result<GoogleProfile, ServiceError>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: Option<String>,
    sub: Option<String>,
    email: Option<String>,
    // tokeninfo encodes booleans as strings
    email_verified: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// HTTP verifier backed by Google's public OAuth endpoints
#[derive(Clone)]
pub struct GoogleClient {
    client: reqwest::Client,
    client_id: Option<String>,
    tokeninfo_url: String,
    userinfo_url: String,
}

impl GoogleClient {
    pub fn new(
        client_id: Option<String>,
        tokeninfo_url: String,
        userinfo_url: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client error: {e}")))?;
        Ok(Self {
            client,
            client_id,
            tokeninfo_url,
            userinfo_url,
        })
    }

    pub fn from_config(cfg: &crate::config::AppConfig) -> Result<Self, ServiceError> {
        Self::new(
            cfg.google_client_id.clone(),
            cfg.google_tokeninfo_url.clone(),
            cfg.google_userinfo_url.clone(),
            cfg.http_timeout(),
        )
    }

    async fn verify_id_token(&self, id_token: &str) -> Result<GoogleProfile, ServiceError> {
        let client_id = self.client_id.as_deref().ok_or_else(|| {
            ServiceError::ExternalServiceError("Google client id is not configured".to_string())
        })?;

        let response = self
            .client
            .get(&self.tokeninfo_url)
            .query(&[("id_token", id_token)])
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Google tokeninfo: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Google rejected the ID token");
            return Err(ServiceError::AuthError("Token Google inválido".to_string()));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Google tokeninfo: {e}")))?;

        if info.aud.as_deref() != Some(client_id) {
            warn!(aud = ?info.aud, "Google ID token issued for another client");
            return Err(ServiceError::AuthError("Token Google inválido".to_string()));
        }
        if info.email_verified.as_deref() == Some("false") {
            return Err(ServiceError::AuthError("E-mail Google não verificado".to_string()));
        }

        profile(info.sub, info.email, info.name)
    }

    async fn verify_access_token(&self, access_token: &str) -> Result<GoogleProfile, ServiceError> {
        let response = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Google userinfo: {e}")))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "Google rejected the access token");
            return Err(ServiceError::AuthError("Token Google inválido".to_string()));
        }

        let info: UserInfo = response
            .json()
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Google userinfo: {e}")))?;

        if info.email_verified == Some(false) {
            return Err(ServiceError::AuthError("E-mail Google não verificado".to_string()));
        }

        profile(info.sub, info.email, info.name)
    }
}

fn profile(
    sub: Option<String>,
    email: Option<String>,
    name: Option<String>,
) -> Result<GoogleProfile, ServiceError> {
    match (sub, email) {
        (Some(subject), Some(email)) if !email.is_empty() => Ok(GoogleProfile {
            subject,
            email: email.to_lowercase(),
            name: name.filter(|n| !n.trim().is_empty()),
        }),
        _ => Err(ServiceError::InvalidInput("Token inválido".to_string())),
    }
}

#[async_trait]
impl GoogleIdentityVerifier for GoogleClient {
    #[instrument(skip_all)]
    async fn verify(&self, credential: &GoogleCredential) -> Result<GoogleProfile, ServiceError> {
        match credential {
            GoogleCredential::IdToken(token) => self.verify_id_token(token).await,
            GoogleCredential::AccessToken(token) => self.verify_access_token(token).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleClient {
        GoogleClient::new(
            Some("client-123.apps.googleusercontent.com".into()),
            format!("{}/tokeninfo", server.uri()),
            format!("{}/userinfo", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn id_token_for_our_audience_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .and(query_param("id_token", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aud": "client-123.apps.googleusercontent.com",
                "sub": "1089",
                "email": "Leitora@Gmail.com",
                "email_verified": "true",
                "name": "Ana Leitora"
            })))
            .mount(&server)
            .await;

        let profile = client(&server)
            .verify(&GoogleCredential::IdToken("abc".into()))
            .await
            .unwrap();
        assert_eq!(profile.email, "leitora@gmail.com");
        assert_eq!(profile.subject, "1089");
        assert_eq!(profile.name.as_deref(), Some("Ana Leitora"));
    }

    #[tokio::test]
    async fn id_token_for_another_audience_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tokeninfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "aud": "someone-else",
                "sub": "1",
                "email": "x@y.com"
            })))
            .mount(&server)
            .await;

        let result = client(&server)
            .verify(&GoogleCredential::IdToken("abc".into()))
            .await;
        assert_matches!(result, Err(ServiceError::AuthError(_)));
    }

    #[tokio::test]
    async fn access_token_is_resolved_through_userinfo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "77",
                "email": "bia@gmail.com",
                "email_verified": true
            })))
            .mount(&server)
            .await;

        let profile = client(&server)
            .verify(&GoogleCredential::AccessToken("ya29.token".into()))
            .await
            .unwrap();
        assert_eq!(profile.email, "bia@gmail.com");
        assert_eq!(profile.name, None);
    }

    #[tokio::test]
    async fn rejected_access_token_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client(&server)
            .verify(&GoogleCredential::AccessToken("expired".into()))
            .await;
        assert_matches!(result, Err(ServiceError::AuthError(_)));
    }
}
