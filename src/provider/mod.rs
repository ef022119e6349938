//! Identity provider capability interface.
//!
//! The orchestrator consumes the provider exclusively through
//! [`IdentityProvider`]; the provider itself (credential validation, token
//! issuance, SMS delivery) stays behind this seam. [`rest::RestProvider`] is
//! the HTTP implementation.

use std::pin::Pin;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::Stream;

use crate::error::ProviderError;
use crate::identity::ProviderIdentity;

pub mod rest;

/// Sign-in material accepted by [`IdentityProvider::sign_in_with_credential`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    EmailPassword { email: String, password: String },
    Phone { verification_id: String, code: String },
}

/// Result of account creation: the credential to establish a session with,
/// plus the provider-assigned identifier when the provider returned one.
#[derive(Debug, Clone)]
pub struct AccountCredential {
    pub credential: Credential,
    pub user_id: Option<String>,
}

/// Out-of-band progress updates for one phone-verification request.
///
/// The provider pushes these into the channel handed to
/// [`IdentityProvider::start_phone_verification`]; the orchestrator
/// correlates them with the attempt that registered the channel.
#[derive(Debug)]
pub enum PhoneVerificationUpdate {
    /// The provider verified the number itself and supplied a credential.
    AutoVerified(Credential),
    /// A code was delivered; the id must accompany the submitted code.
    CodeSent { verification_id: String },
    /// Automatic code retrieval gave up; manual entry is still valid.
    AutoRetrievalTimedOut { verification_id: String },
    /// The verification request failed.
    Failed(ProviderError),
}

/// Push stream of identity-change events: `Some` after a credential
/// exchange, `None` after sign-out.
pub type IdentityEvents = Pin<Box<dyn Stream<Item = Option<ProviderIdentity>> + Send>>;

/// Capability interface over the external identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an account for the given email.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AccountCredential, ProviderError>;

    /// Verifies an email/password pair and establishes a session.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), ProviderError>;

    /// Establishes a session from a previously obtained credential.
    async fn sign_in_with_credential(
        &self,
        credential: Credential,
    ) -> Result<(), ProviderError>;

    /// Starts phone verification for an E.164 number.
    ///
    /// Progress arrives through `updates`; the returned result only covers
    /// accepting the request itself.
    async fn start_phone_verification(
        &self,
        phone_number: &str,
        updates: mpsc::Sender<PhoneVerificationUpdate>,
    ) -> Result<(), ProviderError>;

    /// Builds the credential for a delivered code.
    fn phone_credential(&self, verification_id: &str, code: &str) -> Credential;

    /// Ends the current session. Emits the signed-out identity event.
    async fn sign_out(&self);

    /// Subscribes to identity-change events.
    ///
    /// Each call returns a fresh subscription; events emitted before the
    /// call are not replayed.
    fn identity_events(&self) -> IdentityEvents;
}
