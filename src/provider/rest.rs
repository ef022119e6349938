//! HTTP identity provider client.
//!
//! Talks to an Identity-Toolkit-style REST API: JSON bodies, the API key as
//! a query parameter, and error payloads of the form
//! `{"error": {"message": "CODE"}}`. Auth-state changes are synthesized
//! locally and pushed on a broadcast channel, since a plain REST transport
//! has no push stream of its own.
//!
//! # Copyright
//! Copyright (c) 2025
//! All rights reserved.
//!
//! # License
//! Licensed under the AGPLv3 license.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info};

use crate::config::AuthConfig;
use crate::error::ProviderError;
use crate::identity::ProviderIdentity;
use crate::provider::{
    AccountCredential, Credential, IdentityEvents, IdentityProvider, PhoneVerificationUpdate,
};

/// Capacity of the identity-events broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Seconds a token is assumed valid when the provider omits `expiresIn`.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendCodeRequest<'a> {
    phone_number: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PhoneSignInRequest<'a> {
    session_info: &'a str,
    code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    local_id: String,
    id_token: String,
    /// Seconds, serialized as a string by the provider.
    expires_in: Option<String>,
    email: Option<String>,
    display_name: Option<String>,
    phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendCodeResponse {
    #[serde(rename = "sessionInfo")]
    session_info: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Token material held for the current session.
#[derive(Debug, Clone)]
struct TokenSession {
    id_token: String,
    expires_at: DateTime<Utc>,
    identity: ProviderIdentity,
}

/// REST implementation of [`IdentityProvider`].
pub struct RestProvider {
    client: reqwest::Client,
    config: AuthConfig,
    session: Arc<RwLock<Option<TokenSession>>>,
    events: broadcast::Sender<Option<ProviderIdentity>>,
}

impl RestProvider {
    pub fn new(config: AuthConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
            events,
        })
    }

    fn endpoint(&self, operation: &str) -> String {
        format!(
            "{}/v1/accounts:{}?key={}",
            self.config.api_url, operation, self.config.api_key
        )
    }

    /// POSTs a JSON body and decodes the success payload, converting
    /// non-success statuses into [`ProviderError::Api`].
    async fn post_json<B, R>(&self, operation: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(self.endpoint(operation))
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let code = extract_error_code(&text);
            error!(%status, code, "provider rejected accounts:{}", operation);
            return Err(ProviderError::api(code));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    /// Stores the exchanged token and pushes the signed-in identity event.
    fn establish_session(&self, token: TokenResponse) {
        let identity = ProviderIdentity {
            uid: token.local_id,
            display_name: token.display_name,
            email: token.email,
            phone_number: token.phone_number,
        };

        let ttl = token
            .expires_in
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        let session = TokenSession {
            id_token: token.id_token,
            expires_at: Utc::now() + chrono::Duration::seconds(ttl),
            identity: identity.clone(),
        };
        debug!(
            uid = %session.identity.uid,
            token_len = session.id_token.len(),
            expires_at = %session.expires_at,
            "storing token session"
        );
        *self.session.write().unwrap() = Some(session);

        // Nobody subscribed yet is fine; the cache catches up on the next event.
        let _ = self.events.send(Some(identity));
    }
}

#[async_trait]
impl IdentityProvider for RestProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccountCredential, ProviderError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let token: TokenResponse = self.post_json("signUp", &request).await?;

        info!(uid = %token.local_id, "account created");

        Ok(AccountCredential {
            credential: Credential::EmailPassword {
                email: email.to_string(),
                password: password.to_string(),
            },
            user_id: Some(token.local_id),
        })
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ProviderError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let token: TokenResponse = self.post_json("signInWithPassword", &request).await?;

        info!(uid = %token.local_id, "password sign-in succeeded");
        self.establish_session(token);
        Ok(())
    }

    async fn sign_in_with_credential(
        &self,
        credential: Credential,
    ) -> Result<(), ProviderError> {
        match credential {
            Credential::EmailPassword { email, password } => {
                self.sign_in_with_password(&email, &password).await
            }
            Credential::Phone {
                verification_id,
                code,
            } => {
                let request = PhoneSignInRequest {
                    session_info: &verification_id,
                    code: &code,
                };
                let token: TokenResponse =
                    self.post_json("signInWithPhoneNumber", &request).await?;

                info!(uid = %token.local_id, "phone sign-in succeeded");
                self.establish_session(token);
                Ok(())
            }
        }
    }

    async fn start_phone_verification(
        &self,
        phone_number: &str,
        updates: mpsc::Sender<PhoneVerificationUpdate>,
    ) -> Result<(), ProviderError> {
        let request = SendCodeRequest { phone_number };
        let response: SendCodeResponse = self.post_json("sendVerificationCode", &request).await?;

        info!(phone_number, "verification code requested");

        let verification_id = response.session_info;
        let _ = updates
            .send(PhoneVerificationUpdate::CodeSent {
                verification_id: verification_id.clone(),
            })
            .await;

        // A REST transport cannot observe the incoming SMS, so this client
        // never produces `AutoVerified`; after the configured window it
        // reports that automatic retrieval is over.
        let timeout = Duration::from_secs(self.config.verification_timeout_secs);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = updates
                .send(PhoneVerificationUpdate::AutoRetrievalTimedOut { verification_id })
                .await;
        });

        Ok(())
    }

    fn phone_credential(&self, verification_id: &str, code: &str) -> Credential {
        Credential::Phone {
            verification_id: verification_id.to_string(),
            code: code.to_string(),
        }
    }

    async fn sign_out(&self) {
        if let Some(session) = self.session.write().unwrap().take() {
            debug!(uid = %session.identity.uid, "clearing token session");
        }
        let _ = self.events.send(None);
    }

    fn identity_events(&self) -> IdentityEvents {
        let receiver = self.events.subscribe();
        // Lagged subscribers skip to the live edge rather than erroring out.
        Box::pin(BroadcastStream::new(receiver).filter_map(|event| event.ok()))
    }
}

/// Pulls the failure code out of an error payload.
///
/// The provider sometimes appends detail after the code
/// (`"WEAK_PASSWORD : Password should be ..."`), so only the leading token
/// is kept. Unparseable bodies yield an empty code, which normalizes to the
/// fallback message.
fn extract_error_code(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| {
            e.error
                .message
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    fn config(api_url: String, timeout_secs: u64) -> AuthConfig {
        AuthConfig {
            api_url,
            api_key: "test-key".to_string(),
            verification_timeout_secs: timeout_secs,
        }
    }

    fn provider(server: &mockito::ServerGuard) -> RestProvider {
        RestProvider::new(config(server.url(), 0)).unwrap()
    }

    #[tokio::test]
    async fn create_account_returns_credential_and_uid() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(mockito::Matcher::UrlEncoded(
                "key".into(),
                "test-key".into(),
            ))
            .with_status(200)
            .with_body(r#"{"localId":"uid-1","idToken":"tok","expiresIn":"3600","email":"a@x.com"}"#)
            .create_async()
            .await;

        let provider = provider(&server);
        let account = provider.create_account("a@x.com", "pw123456").await.unwrap();

        mock.assert_async().await;
        assert_eq!(account.user_id.as_deref(), Some("uid-1"));
        assert_eq!(
            account.credential,
            Credential::EmailPassword {
                email: "a@x.com".to_string(),
                password: "pw123456".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn password_sign_in_emits_identity_event() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signInWithPassword")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"localId":"uid-1","idToken":"tok","expiresIn":"3600","email":"a@x.com","displayName":"Ada"}"#,
            )
            .create_async()
            .await;

        let provider = provider(&server);
        let mut events = provider.identity_events();

        provider.sign_in_with_password("a@x.com", "pw123456").await.unwrap();

        let event = events.next().await.unwrap().unwrap();
        assert_eq!(event.uid, "uid-1");
        assert_eq!(event.display_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn rejection_surfaces_the_api_code() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:signUp")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"EMAIL_EXISTS","code":400}}"#)
            .create_async()
            .await;

        let provider = provider(&server);
        let err = provider.create_account("a@x.com", "pw123456").await.unwrap_err();

        match err {
            ProviderError::Api { code } => assert_eq!(code, "EMAIL_EXISTS"),
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn phone_verification_pushes_code_sent_then_timeout() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/accounts:sendVerificationCode")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"sessionInfo":"vid-9"}"#)
            .create_async()
            .await;

        let provider = provider(&server);
        let (tx, mut rx) = mpsc::channel(8);
        provider
            .start_phone_verification("+15551234567", tx)
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            PhoneVerificationUpdate::CodeSent { verification_id } => {
                assert_eq!(verification_id, "vid-9")
            }
            other => panic!("expected CodeSent, got {other:?}"),
        }
        // Timeout configured to zero seconds in tests.
        match rx.recv().await.unwrap() {
            PhoneVerificationUpdate::AutoRetrievalTimedOut { verification_id } => {
                assert_eq!(verification_id, "vid-9")
            }
            other => panic!("expected AutoRetrievalTimedOut, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn phone_credential_sign_in_hits_the_phone_endpoint() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/accounts:signInWithPhoneNumber")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"localId":"uid-7","idToken":"tok","expiresIn":"3600","phoneNumber":"+15551234567"}"#,
            )
            .create_async()
            .await;

        let provider = provider(&server);
        let credential = provider.phone_credential("vid-9", "123456");
        provider.sign_in_with_credential(credential).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn sign_out_emits_the_signed_out_event() {
        let server = mockito::Server::new_async().await;
        let provider = provider(&server);
        let mut events = provider.identity_events();

        provider.sign_out().await;

        assert!(events.next().await.unwrap().is_none());
    }

    #[test]
    fn error_code_extraction_keeps_only_the_leading_token() {
        let body = r#"{"error":{"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#;
        assert_eq!(extract_error_code(body), "WEAK_PASSWORD");

        assert_eq!(extract_error_code("not json"), "");
        assert_eq!(extract_error_code(r#"{"error":{"message":""}}"#), "");
    }
}
