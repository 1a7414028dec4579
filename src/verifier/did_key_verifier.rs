use std::{fs, path::Path};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ed25519_dalek::Verifier as _;
use p256::ecdsa::{signature::Verifier as _, Signature as EcdsaSignature, VerifyingKey};

use crate::{
    context::Context,
    dsse::Extension,
    error::CapabilityError,
    signer::{load_signer, Signer},
    verifier::Verifier,
};

/// Multicodec prefix of an Ed25519 public key.
const ED25519_CODEC: [u8; 2] = [0xed, 0x01];
/// Multicodec prefix of a compressed P-256 public key.
const P256_CODEC: [u8; 2] = [0x80, 0x24];

/// Public key carried by a did:key identifier.
#[derive(Debug, Clone)]
enum DidPublicKey {
    Ed25519(ed25519_dalek::PublicKey),
    P256(VerifyingKey),
}

impl DidPublicKey {
    /// Decodes the multibase key of `did`.
    ///
    /// Only the key types the local signers produce are accepted.
    fn decode(did: &str) -> Result<Self> {
        let Some(fingerprint) = did.strip_prefix("did:key:") else {
            bail!("'{did}' is not a did:key identifier");
        };
        let Some(encoded) = fingerprint.strip_prefix('z') else {
            bail!("'{did}' is not base58btc encoded");
        };
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| anyhow!("invalid base58 in '{did}': {e}"))?;
        if bytes.len() < 2 {
            bail!("'{did}' does not carry a key");
        }

        let (codec, key) = bytes.split_at(2);
        match [codec[0], codec[1]] {
            ED25519_CODEC => ed25519_dalek::PublicKey::from_bytes(key)
                .map(DidPublicKey::Ed25519)
                .map_err(|e| anyhow!("invalid Ed25519 key in '{did}': {e}")),
            P256_CODEC => VerifyingKey::from_sec1_bytes(key)
                .map(DidPublicKey::P256)
                .map_err(|e| anyhow!("invalid P-256 key in '{did}': {e}")),
            _ => bail!("unsupported key type in '{did}'"),
        }
    }

    fn verify(&self, data: &[u8], sig: &[u8]) -> Result<()> {
        match self {
            DidPublicKey::Ed25519(key) => {
                let sig = ed25519_dalek::Signature::try_from(sig)
                    .map_err(|e| anyhow!("malformed Ed25519 signature: {e}"))?;
                key.verify(data, &sig)
                    .map_err(|_| anyhow!("Ed25519 signature does not verify"))
            }
            DidPublicKey::P256(key) => {
                let sig = EcdsaSignature::from_slice(sig)
                    .or_else(|_| EcdsaSignature::from_der(sig))
                    .map_err(|e| anyhow!("malformed ECDSA signature: {e}"))?;
                key.verify(data, &sig)
                    .map_err(|_| anyhow!("ECDSA signature does not verify"))
            }
        }
    }
}

/// Verifies signatures made by a did:key identity.
///
/// The key ID is the DID itself, which is also what the local signers
/// record in the signatures they produce.
#[derive(Debug, Clone)]
pub struct DidKeyVerifier {
    did: String,
    key: DidPublicKey,
}

impl DidKeyVerifier {
    /// Creates a verifier for `did`, failing if it does not decode to a
    /// supported public key.
    pub fn new(did: &str) -> Result<Self> {
        let did = did.trim();
        let key = DidPublicKey::decode(did)?;

        Ok(Self {
            did: did.to_owned(),
            key,
        })
    }

    /// Loads a verifier from a file holding either a did:key identifier or a
    /// signer file written by `save_signer`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read {}: {e}", path.display()))?;
        let contents = contents.trim();

        if contents.starts_with("did:key:") {
            return Self::new(contents);
        }

        log::debug!(
            "{} is not a did:key identifier, loading it as a signer file",
            path.display()
        );
        let signer = load_signer(path)?;
        Self::new(&signer.key_id()?)
    }

    pub fn did(&self) -> &str {
        &self.did
    }
}

#[async_trait]
impl Verifier for DidKeyVerifier {
    async fn verify(
        &self,
        ctx: &Context,
        _keyid: &str,
        data: &[u8],
        sig: &[u8],
        _extension: Option<&Extension>,
    ) -> Result<(), CapabilityError> {
        ctx.check()?;

        self.key
            .verify(data, sig)
            .map_err(|e| anyhow!("{e} against {}", self.did))?;

        log::trace!("Signature verified against {}", self.did);
        Ok(())
    }

    fn key_id(&self) -> String {
        self.did.clone()
    }
}
