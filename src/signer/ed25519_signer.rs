use anyhow::Result;
use async_trait::async_trait;
use did_key::{CoreSign, DIDCore, Document, Ed25519KeyPair, Generate, KeyMaterial};
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::CapabilityError, signer::Signer};

/// Represents a signer that uses an Ed25519 key pair for signing.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Ed25519Signer {
    secret_key: Vec<u8>,
    /// DID document derived from the Ed25519 public key
    pub did_doc: Document,
}

impl Ed25519Signer {
    /// Creates a new Ed25519Signer instance with a randomly generated key pair.
    pub fn create() -> Result<Self> {
        let key_pair = Ed25519KeyPair::new();
        Ok(Self::from_key_pair(&key_pair))
    }

    /// Imports an Ed25519Signer instance from a given 32-byte secret key.
    pub fn import(secret_key: &[u8]) -> Result<Self> {
        let key_pair = Ed25519KeyPair::from_secret_key(secret_key);
        Ok(Self::from_key_pair(&key_pair))
    }

    fn from_key_pair(key_pair: &Ed25519KeyPair) -> Self {
        let did_doc = key_pair.get_did_document(did_key::Config {
            use_jose_format: true,
            serialize_secrets: false,
        });
        Ed25519Signer {
            secret_key: key_pair.private_key_bytes(),
            did_doc,
        }
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    async fn sign(&self, ctx: &Context, data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        ctx.check()?;
        log::trace!("Signing {} bytes with Ed25519 key", data.len());
        let keypair = Ed25519KeyPair::from_secret_key(&self.secret_key);
        Ok(keypair.sign(data))
    }

    fn key_id(&self) -> Result<String> {
        Ok(self.did_doc.id.clone())
    }
}
