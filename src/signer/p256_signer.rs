use anyhow::Result;
use async_trait::async_trait;
use did_key::{CoreSign, DIDCore, Document, Generate, KeyMaterial, P256KeyPair};
use serde::{Deserialize, Serialize};

use crate::{context::Context, error::CapabilityError, signer::Signer};

/// Signer implementation using P-256 (secp256r1) elliptic curve.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct P256Signer {
    secret_key: Vec<u8>,
    /// DID document derived from the P-256 public key
    pub did_doc: Document,
}

impl P256Signer {
    /// Creates a new P256Signer instance with a randomly generated key pair.
    pub fn create() -> Result<Self> {
        let key_pair = P256KeyPair::new();
        Ok(Self::from_key_pair(&key_pair))
    }

    fn from_key_pair(key_pair: &P256KeyPair) -> Self {
        let did_doc = key_pair.get_did_document(did_key::Config {
            use_jose_format: true,
            serialize_secrets: false,
        });
        P256Signer {
            secret_key: key_pair.private_key_bytes(),
            did_doc,
        }
    }
}

#[async_trait]
impl Signer for P256Signer {
    async fn sign(&self, ctx: &Context, data: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        ctx.check()?;
        log::trace!("Signing {} bytes with P256 key", data.len());
        let keypair = P256KeyPair::from_secret_key(&self.secret_key);
        Ok(keypair.sign(data))
    }

    fn key_id(&self) -> Result<String> {
        Ok(self.did_doc.id.clone())
    }
}
