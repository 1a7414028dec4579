use std::fmt;

use thiserror::Error;

/// Convenience alias for results produced by the envelope core.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the envelope signing and verification core.
///
/// None of these are recovered internally; each aborts the current
/// operation and is handed back to the caller as-is.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON or base64 in an envelope or payload.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Incompatible options for the selected mode, or an unusable verifier set.
    #[error("configuration error: {0}")]
    Config(String),
    /// The signer capability failed, including cancellation.
    #[error("signing failed: {0}")]
    Signing(#[source] CapabilityError),
    /// The signer's identifying key could not be determined.
    #[error("unable to resolve key ID: {0}")]
    KeyResolution(#[source] anyhow::Error),
    /// The verification threshold was not met, or verification was interrupted.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The envelope could not be re-encoded.
    #[error("unable to serialize envelope: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

/// Decoding failures for persisted envelopes and payloads.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON in {what}: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed base64 in {what}: {source}")]
    Base64 {
        what: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}

/// Failure reported by a signer or verifier capability.
///
/// Cancellation and deadline expiry are kept apart from ordinary failures so
/// callers can tell an aborted call from a rejected one.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CapabilityError {
    /// True for cancellation or deadline expiry.
    pub fn is_interrupted(&self) -> bool {
        matches!(
            self,
            CapabilityError::Cancelled | CapabilityError::DeadlineExceeded
        )
    }
}

/// Threshold verification failures.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("{0}")]
    ThresholdNotMet(ThresholdFailure),
    #[error("verification interrupted: {0}")]
    Interrupted(#[source] CapabilityError),
}

/// Diagnostics for an unmet threshold.
#[derive(Debug, Clone)]
pub struct ThresholdFailure {
    /// Number of distinct verifiers required.
    pub needed: usize,
    /// Number of distinct verifiers credited.
    pub obtained: usize,
    /// Key IDs of the credited verifiers.
    pub accepted: Vec<String>,
    /// Every (signature, verifier) pair that was tried.
    pub attempts: Vec<VerificationAttempt>,
}

/// A single signature/verifier check performed during threshold verification.
#[derive(Debug, Clone)]
pub struct VerificationAttempt {
    /// Position of the signature in the envelope.
    pub signature_index: usize,
    /// Key ID declared by the signature, empty if none.
    pub signature_keyid: String,
    /// Key ID of the verifier that was tried.
    pub verifier_keyid: String,
    /// Rejection reason, `None` if the signature was accepted.
    pub error: Option<String>,
}

impl fmt::Display for ThresholdFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted signatures do not meet threshold: {} of {}",
            self.obtained, self.needed
        )?;
        if self.attempts.is_empty() {
            return write!(f, " (no signature matched any verifier key ID)");
        }
        write!(f, "; attempted:")?;
        for attempt in &self.attempts {
            let keyid = if attempt.signature_keyid.is_empty() {
                "<none>"
            } else {
                attempt.signature_keyid.as_str()
            };
            match &attempt.error {
                None => write!(
                    f,
                    " [signature #{} (keyid {keyid}) by {}: ok]",
                    attempt.signature_index, attempt.verifier_keyid
                )?,
                Some(e) => write!(
                    f,
                    " [signature #{} (keyid {keyid}) by {}: {e}]",
                    attempt.signature_index, attempt.verifier_keyid
                )?,
            }
        }
        Ok(())
    }
}
