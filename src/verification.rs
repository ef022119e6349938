use tracing::warn;
use uuid::Uuid;

/// Progress of one phone-verification attempt.
///
/// `Idle` (no attempt at all) is represented by the absence of a
/// [`VerificationSession`], so the enum starts at `CodeRequested`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    /// The provider has been asked to send a code.
    CodeRequested,
    /// The provider delivered a code and issued a verification id.
    CodeSent,
    /// A submitted code is being exchanged for a session.
    Verifying,
    /// The provider verified the number without a code-entry step.
    AutoVerified,
    /// Automatic code retrieval timed out; manual entry is still possible.
    TimedOut,
    /// A submitted code was accepted.
    Verified,
    /// The attempt failed.
    Failed,
}

impl VerificationState {
    /// Terminal states receive no further provider updates.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AutoVerified | Self::Verified | Self::Failed)
    }

    /// Whether a code may be submitted from this state.
    pub fn accepts_code(self) -> bool {
        matches!(self, Self::CodeSent | Self::TimedOut)
    }
}

/// One in-flight phone-verification attempt.
///
/// The attempt token is minted when verification starts and correlates every
/// provider update with the attempt that initiated it; updates carrying a
/// stale token are discarded by the orchestrator.
#[derive(Debug, Clone)]
pub struct VerificationSession {
    pub attempt: Uuid,
    pub phone_number: String,
    pub verification_id: Option<String>,
    pub state: VerificationState,
}

impl VerificationSession {
    pub fn new(attempt: Uuid, phone_number: String) -> Self {
        Self {
            attempt,
            phone_number,
            verification_id: None,
            state: VerificationState::CodeRequested,
        }
    }

    /// Records the provider-issued verification id.
    ///
    /// Legal only while the code request is outstanding; a terminal attempt
    /// keeps its state.
    pub fn code_sent(&mut self, verification_id: &str) -> bool {
        if self.state != VerificationState::CodeRequested {
            self.refuse("code_sent");
            return false;
        }
        self.verification_id = Some(verification_id.to_string());
        self.state = VerificationState::CodeSent;
        true
    }

    /// Marks automatic code retrieval as timed out.
    pub fn auto_retrieval_timed_out(&mut self) -> bool {
        if !matches!(
            self.state,
            VerificationState::CodeRequested | VerificationState::CodeSent
        ) {
            self.refuse("auto_retrieval_timed_out");
            return false;
        }
        self.state = VerificationState::TimedOut;
        true
    }

    /// Marks the attempt auto-verified by the provider.
    pub fn auto_verified(&mut self) -> bool {
        if self.state.is_terminal() {
            self.refuse("auto_verified");
            return false;
        }
        self.state = VerificationState::AutoVerified;
        true
    }

    /// Begins exchanging a submitted code for a session.
    pub fn begin_verifying(&mut self) -> bool {
        if !self.state.accepts_code() {
            self.refuse("begin_verifying");
            return false;
        }
        self.state = VerificationState::Verifying;
        true
    }

    /// Marks a submitted code as accepted.
    pub fn verified(&mut self) -> bool {
        if self.state != VerificationState::Verifying {
            self.refuse("verified");
            return false;
        }
        self.state = VerificationState::Verified;
        true
    }

    /// Marks the attempt failed.
    ///
    /// Reachable from `AutoVerified` as well: the sign-in performed with an
    /// auto-supplied credential can still be rejected.
    pub fn failed(&mut self) -> bool {
        if matches!(
            self.state,
            VerificationState::Verified | VerificationState::Failed
        ) {
            self.refuse("failed");
            return false;
        }
        self.state = VerificationState::Failed;
        true
    }

    fn refuse(&self, transition: &str) {
        warn!(
            attempt = %self.attempt,
            state = ?self.state,
            transition,
            "refusing illegal verification transition"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> VerificationSession {
        VerificationSession::new(Uuid::new_v4(), "+15551234567".to_string())
    }

    #[test]
    fn code_sent_records_the_verification_id() {
        let mut s = session();
        assert!(s.code_sent("vid-9"));
        assert_eq!(s.verification_id.as_deref(), Some("vid-9"));
        assert_eq!(s.state, VerificationState::CodeSent);
    }

    #[test]
    fn manual_entry_path_reaches_verified() {
        let mut s = session();
        assert!(s.code_sent("vid-9"));
        assert!(s.begin_verifying());
        assert!(s.verified());
        assert!(s.state.is_terminal());
    }

    #[test]
    fn timeout_still_accepts_a_code() {
        let mut s = session();
        assert!(s.code_sent("vid-9"));
        assert!(s.auto_retrieval_timed_out());
        assert!(s.state.accepts_code());
        assert!(s.begin_verifying());
    }

    #[test]
    fn auto_verified_is_terminal_for_provider_updates() {
        let mut s = session();
        assert!(s.auto_verified());
        assert!(s.state.is_terminal());
        assert!(!s.code_sent("vid-late"));
        assert_eq!(s.state, VerificationState::AutoVerified);
    }

    #[test]
    fn rejected_auto_credential_moves_to_failed() {
        let mut s = session();
        assert!(s.auto_verified());
        assert!(s.failed());
        assert_eq!(s.state, VerificationState::Failed);
    }

    #[test]
    fn failure_wins_only_once() {
        let mut s = session();
        assert!(s.code_sent("vid-9"));
        assert!(s.failed());
        assert!(!s.auto_verified());
        assert_eq!(s.state, VerificationState::Failed);
    }

    #[test]
    fn code_cannot_be_submitted_before_code_sent() {
        let mut s = session();
        assert!(!s.begin_verifying());
        assert_eq!(s.state, VerificationState::CodeRequested);
    }

    #[test]
    fn late_code_sent_does_not_resurrect_a_failed_attempt() {
        let mut s = session();
        assert!(s.failed());
        assert!(!s.code_sent("vid-late"));
        assert_eq!(s.state, VerificationState::Failed);
        assert!(s.verification_id.is_none());
    }
}
