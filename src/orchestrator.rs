//! Authentication orchestrator.
//!
//! Composes the identity provider and the session cache behind one surface:
//! account creation, password sign-in, the phone-verification state machine,
//! sign-out, the current-identity accessor, and the live identity stream.
//! Provider failures never cross this boundary raw; they are normalized to
//! stable messages in `error::normalize_error_code`.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::SessionCache;
use crate::error::{AuthError, ProviderError};
use crate::identity::Identity;
use crate::provider::{Credential, IdentityProvider, PhoneVerificationUpdate};
use crate::verification::VerificationSession;

/// Buffer for verification update/event channels.
const UPDATE_CAPACITY: usize = 8;

/// Progress notifications for one phone-verification attempt, delivered on
/// the receiver returned by [`AuthOrchestrator::start_phone_verification`].
///
/// `AutoVerified` and `Failed` are terminal: exactly one of them is
/// delivered per attempt, after which the channel closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhoneVerificationEvent {
    /// A code was delivered; pass the id back to `submit_code`.
    CodeSent { verification_id: String },
    /// Automatic retrieval gave up; prompt for manual code entry.
    AutoRetrievalTimedOut { verification_id: String },
    /// The provider verified the number and the session is established.
    AutoVerified,
    /// The attempt failed with a normalized message.
    Failed { message: &'static str },
}

type VerificationSlot = Arc<Mutex<Option<VerificationSession>>>;

/// Session/authentication orchestration over an [`IdentityProvider`].
pub struct AuthOrchestrator {
    provider: Arc<dyn IdentityProvider>,
    cache: SessionCache,
    verification: VerificationSlot,
}

impl AuthOrchestrator {
    pub fn new(provider: Arc<dyn IdentityProvider>, cache: SessionCache) -> Self {
        Self {
            provider,
            cache,
            verification: Arc::new(Mutex::new(None)),
        }
    }

    /// Live stream of identity changes, one element per provider event.
    ///
    /// Each element is written to the session cache before it is yielded, so
    /// `current_identity` is never behind the last value a subscriber saw.
    /// Every call starts a fresh subscription; past events are not replayed.
    pub fn identity_changes(&self) -> impl Stream<Item = Identity> + Send {
        let cache = self.cache.clone();
        self.provider.identity_events().map(move |event| {
            let identity = event.map(Identity::from).unwrap_or_else(Identity::empty);
            cache.put(identity.clone());
            identity
        })
    }

    /// Last-known identity, synchronously from the cache.
    pub fn current_identity(&self) -> Identity {
        self.cache.get()
    }

    /// Creates an account and establishes a session for it.
    ///
    /// Returns the provider-assigned identifier when the provider reported
    /// one. Account creation does not imply a session; the returned
    /// credential is signed in explicitly.
    pub async fn create_account(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<String>, AuthError> {
        let account = self
            .provider
            .create_account(email, password)
            .await
            .map_err(AuthError::from)?;

        self.provider
            .sign_in_with_credential(account.credential)
            .await
            .map_err(AuthError::from)?;

        info!(user_id = ?account.user_id, "account created and signed in");
        Ok(account.user_id)
    }

    /// Verifies an email/password pair.
    ///
    /// Does not touch the session cache; consistency flows through
    /// [`Self::identity_changes`], which the provider feeds after a
    /// successful sign-in.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.provider
            .sign_in_with_password(email, password)
            .await
            .map_err(AuthError::from)
    }

    /// Starts phone verification, superseding any pending attempt.
    ///
    /// Progress arrives on the returned receiver. Updates that belong to a
    /// superseded attempt are correlated by an attempt token minted here and
    /// discarded before they become observable.
    pub async fn start_phone_verification(
        &self,
        phone_number: &str,
    ) -> Result<mpsc::Receiver<PhoneVerificationEvent>, AuthError> {
        let e164 = normalize_phone_number(phone_number)?;
        let attempt = Uuid::new_v4();

        {
            let mut slot = self.verification.lock().await;
            if let Some(previous) = slot.replace(VerificationSession::new(attempt, e164.clone())) {
                debug!(
                    superseded = %previous.attempt,
                    attempt = %attempt,
                    "superseding pending verification attempt"
                );
            }
        }

        let (provider_tx, provider_rx) = mpsc::channel(UPDATE_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(UPDATE_CAPACITY);

        if let Err(err) = self
            .provider
            .start_phone_verification(&e164, provider_tx)
            .await
        {
            let mut slot = self.verification.lock().await;
            if slot.as_ref().is_some_and(|s| s.attempt == attempt) {
                *slot = None;
            }
            return Err(err.into());
        }

        info!(%attempt, "phone verification started");

        tokio::spawn(forward_updates(
            attempt,
            provider_rx,
            event_tx,
            Arc::clone(&self.verification),
            Arc::clone(&self.provider),
        ));

        Ok(event_rx)
    }

    /// Exchanges a delivered code for a session.
    ///
    /// The verification id must be the one surfaced with `CodeSent`. Stale
    /// or unknown ids are still forwarded; the provider is the sole arbiter
    /// of validity and its rejection comes back normalized.
    pub async fn submit_code(
        &self,
        code: &str,
        verification_id: &str,
    ) -> Result<(), AuthError> {
        {
            let mut slot = self.verification.lock().await;
            if let Some(session) = matching_session(&mut slot, verification_id) {
                session.begin_verifying();
            }
        }

        let credential = self.provider.phone_credential(verification_id, code);
        match self.provider.sign_in_with_credential(credential).await {
            Ok(()) => {
                let mut slot = self.verification.lock().await;
                if let Some(session) = matching_session(&mut slot, verification_id) {
                    session.verified();
                }
                info!("phone verification completed");
                Ok(())
            }
            Err(err) => {
                let mut slot = self.verification.lock().await;
                if let Some(session) = matching_session(&mut slot, verification_id) {
                    session.failed();
                }
                Err(err.into())
            }
        }
    }

    /// Signs out and abandons any in-flight verification attempt.
    ///
    /// Safe to call when already signed out; the provider emits the empty
    /// identity event either way.
    pub async fn sign_out(&self) {
        self.provider.sign_out().await;
        *self.verification.lock().await = None;
        info!("signed out");
    }
}

fn matching_session<'a>(
    slot: &'a mut Option<VerificationSession>,
    verification_id: &str,
) -> Option<&'a mut VerificationSession> {
    slot.as_mut()
        .filter(|s| s.verification_id.as_deref() == Some(verification_id))
}

/// Validates and formats a phone number to E.164.
///
/// Only syntactic validation happens here; whether the number can actually
/// receive a code is the provider's call.
fn normalize_phone_number(phone: &str) -> Result<String, AuthError> {
    let parsed = phonenumber::parse(None, phone)
        .map_err(|_| AuthError::from(ProviderError::api("INVALID_PHONE_NUMBER")))?;
    Ok(parsed.format().mode(phonenumber::Mode::E164).to_string())
}

/// Per-attempt bridge from provider updates to caller events.
///
/// Every update is correlated against the currently active attempt; stale
/// ones are dropped. The task ends after the first terminal event, so an
/// attempt never reports both a success and a failure.
async fn forward_updates(
    attempt: Uuid,
    mut updates: mpsc::Receiver<PhoneVerificationUpdate>,
    events: mpsc::Sender<PhoneVerificationEvent>,
    verification: VerificationSlot,
    provider: Arc<dyn IdentityProvider>,
) {
    enum Step {
        Emit(PhoneVerificationEvent),
        SignIn(Credential),
        Skip,
    }

    while let Some(update) = updates.recv().await {
        let step = {
            let mut slot = verification.lock().await;
            let session = match slot.as_mut() {
                Some(s) if s.attempt == attempt => s,
                _ => {
                    debug!(%attempt, "discarding update for superseded verification attempt");
                    return;
                }
            };

            match update {
                PhoneVerificationUpdate::CodeSent { verification_id } => {
                    if session.code_sent(&verification_id) {
                        Step::Emit(PhoneVerificationEvent::CodeSent { verification_id })
                    } else {
                        Step::Skip
                    }
                }
                PhoneVerificationUpdate::AutoRetrievalTimedOut { verification_id } => {
                    if session.auto_retrieval_timed_out() {
                        Step::Emit(PhoneVerificationEvent::AutoRetrievalTimedOut {
                            verification_id,
                        })
                    } else {
                        Step::Skip
                    }
                }
                PhoneVerificationUpdate::Failed(err) => {
                    if session.failed() {
                        Step::Emit(PhoneVerificationEvent::Failed {
                            message: AuthError::from(err).message,
                        })
                    } else {
                        Step::Skip
                    }
                }
                PhoneVerificationUpdate::AutoVerified(credential) => {
                    if session.auto_verified() {
                        Step::SignIn(credential)
                    } else {
                        Step::Skip
                    }
                }
            }
        };

        match step {
            Step::Skip => continue,
            Step::Emit(event) => {
                let terminal = matches!(event, PhoneVerificationEvent::Failed { .. });
                if events.send(event).await.is_err() {
                    return;
                }
                if terminal {
                    return;
                }
            }
            Step::SignIn(credential) => {
                // Sign in outside the slot lock; this awaits provider I/O.
                let result = provider.sign_in_with_credential(credential).await;

                // A newer attempt may have superseded this one during the
                // await; its outcome must not become observable.
                let still_current = {
                    let mut slot = verification.lock().await;
                    match slot.as_mut() {
                        Some(s) if s.attempt == attempt => {
                            if result.is_err() {
                                s.failed();
                            }
                            true
                        }
                        _ => false,
                    }
                };
                if !still_current {
                    debug!(%attempt, "discarding auto-verification for superseded attempt");
                    return;
                }

                let event = match result {
                    Ok(()) => PhoneVerificationEvent::AutoVerified,
                    Err(err) => PhoneVerificationEvent::Failed {
                        message: AuthError::from(err).message,
                    },
                };
                let _ = events.send(event).await;
                return;
            }
        }
    }
}
