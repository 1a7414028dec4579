/// Verifier for did:key identities (ED25519, P-256)
pub mod did_key_verifier;
/// Identity-based verifier for Fulcio-issued certificates
pub mod fulcio_verifier;

use async_trait::async_trait;
pub use did_key_verifier::*;
pub use fulcio_verifier::*;

use crate::{context::Context, dsse::Extension, error::CapabilityError};

/// Checks a signature over opaque bytes.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Verifies `sig` over `data`.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Cancellation scope for the call.
    /// * `keyid` - Key ID declared by the signature, empty if none.
    /// * `data` - The signed bytes (the PAE of the envelope).
    /// * `sig` - The raw signature bytes.
    /// * `extension` - Verification material attached to the signature, if any.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the signature is accepted. Rejections are reported as
    /// [`CapabilityError::Failed`].
    async fn verify(
        &self,
        ctx: &Context,
        keyid: &str,
        data: &[u8],
        sig: &[u8],
        extension: Option<&Extension>,
    ) -> Result<(), CapabilityError>;

    /// Identifier used to pre-select signatures that declare a key ID.
    fn key_id(&self) -> String;

    /// What this verifier trusts. Verifiers may share a key ID and still
    /// trust different material; two verifiers with equal identities are
    /// duplicates.
    fn identity(&self) -> String {
        self.key_id()
    }
}
