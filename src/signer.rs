/// Ed25519 elliptic curve signer
pub mod ed25519_signer;
/// P-256 (secp256r1) elliptic curve signer
pub mod p256_signer;
/// Remote signing service returning Sigstore bundles
#[cfg(feature = "signer-sigstore")]
pub mod sigstore_signer;

use std::{fs, path::Path, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
pub use ed25519_signer::*;
pub use p256_signer::*;
use serde::{Deserialize, Serialize};
#[cfg(feature = "signer-sigstore")]
pub use sigstore_signer::*;

use crate::{
    context::Context,
    dsse::Signature,
    error::{CapabilityError, Error, Result},
    sigstore_bundle::SigstoreBundle,
};

/// Supported cryptographic key types for local signing keys.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Debug,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::Display,
)]
pub enum KeyType {
    /// secp256r1/P-256 elliptic curve (NIST standard)
    #[serde(alias = "secp256r1")]
    #[strum(serialize = "secp256r1")]
    SECP256R1,
    /// Ed25519 elliptic curve (EdDSA)
    #[serde(alias = "ed25519")]
    #[strum(serialize = "ed25519")]
    ED25519,
}

/// Signer producing a raw signature over opaque bytes.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Signs `data` and returns the raw signature bytes.
    async fn sign(&self, ctx: &Context, data: &[u8]) -> Result<Vec<u8>, CapabilityError>;

    /// Returns the identifier of the signing key.
    fn key_id(&self) -> anyhow::Result<String>;
}

/// Signer producing a structured Sigstore bundle instead of a bare signature.
#[async_trait]
pub trait BundleSigner: Send + Sync {
    /// Signs `data` and returns the bundle carrying signature and verification material.
    async fn sign_bundle(&self, ctx: &Context, data: &[u8])
        -> Result<SigstoreBundle, CapabilityError>;

    /// Returns the identity the bundle's certificate is issued to.
    fn key_id(&self) -> anyhow::Result<String>;
}

/// The signing capability handed to the signing workflow.
///
/// Bundle unpacking is chosen by the variant, never by inspecting output bytes.
#[derive(Clone)]
pub enum EnvelopeSigner {
    /// A local key pair producing raw signatures.
    LocalKey(Arc<dyn Signer>),
    /// A remote, transparency-backed signer producing bundles.
    RemoteBundle(Arc<dyn BundleSigner>),
}

impl EnvelopeSigner {
    /// Signs the pre-authentication encoding `pae` and builds the signature record.
    pub async fn sign_pae(&self, ctx: &Context, pae: &[u8]) -> Result<Signature> {
        match self {
            EnvelopeSigner::LocalKey(signer) => {
                let sig = signer.sign(ctx, pae).await.map_err(Error::Signing)?;
                let keyid = signer.key_id().map_err(Error::KeyResolution)?;
                log::debug!("Signed with local key {keyid}");

                Ok(Signature::new(keyid, sig))
            }
            EnvelopeSigner::RemoteBundle(signer) => {
                let bundle = signer.sign_bundle(ctx, pae).await.map_err(Error::Signing)?;
                let keyid = signer.key_id().map_err(Error::KeyResolution)?;
                log::debug!("Received Sigstore bundle for {keyid}");

                bundle.into_signature(keyid, pae)
            }
        }
    }
}

impl std::fmt::Debug for EnvelopeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeSigner::LocalKey(_) => f.write_str("EnvelopeSigner::LocalKey"),
            EnvelopeSigner::RemoteBundle(_) => f.write_str("EnvelopeSigner::RemoteBundle"),
        }
    }
}

/// Enum representing all local signer implementations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SignerType {
    /// Ed25519 local signer
    ED25519(Ed25519Signer),
    /// P-256 local signer
    P256(P256Signer),
}

impl SignerType {
    /// Creates a signer with a fresh random key of the given type.
    pub fn create(key_type: KeyType) -> anyhow::Result<Self> {
        let signer = match key_type {
            KeyType::ED25519 => SignerType::ED25519(Ed25519Signer::create()?),
            KeyType::SECP256R1 => SignerType::P256(P256Signer::create()?),
        };
        Ok(signer)
    }

    /// Returns the did:key identifier of this signer.
    pub fn did(&self) -> &str {
        match self {
            SignerType::ED25519(signer) => &signer.did_doc.id,
            SignerType::P256(signer) => &signer.did_doc.id,
        }
    }
}

#[async_trait]
impl Signer for SignerType {
    async fn sign(&self, ctx: &Context, data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        match self {
            SignerType::ED25519(signer) => signer.sign(ctx, data).await,
            SignerType::P256(signer) => signer.sign(ctx, data).await,
        }
    }

    fn key_id(&self) -> anyhow::Result<String> {
        match self {
            SignerType::ED25519(signer) => signer.key_id(),
            SignerType::P256(signer) => signer.key_id(),
        }
    }
}

/// Saves a signer to `path`.
///
/// The signer is serialized to JSON and base64-encoded before writing.
pub fn save_signer(signer: &SignerType, path: &Path) -> anyhow::Result<()> {
    let signer_str = serde_json::to_string(&signer)?;

    let signer_base64 = BASE64.encode(signer_str);
    fs::write(path, signer_base64)
        .map_err(|e| anyhow!("Failed to write to {}: {e}", path.display()))?;
    Ok(())
}

/// Loads a signer from a file written by [`save_signer`].
pub fn load_signer(path: &Path) -> anyhow::Result<SignerType> {
    let signer_base64 = fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read {}: {e}", path.display()))?;
    let signer_bytes = BASE64.decode(signer_base64.trim())?;
    let signer_str = String::from_utf8(signer_bytes)?;
    let signer = serde_json::from_str(&signer_str)?;
    Ok(signer)
}
