use anyhow::{anyhow, Context as _};
use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::{
    dsse::{Extension, Signature},
    error::{CapabilityError, DecodeError, Error, Result},
};

/// Media type of the bundles produced by Sigstore signers.
pub const SIGSTORE_BUNDLE_MEDIA_TYPE: &str = "application/vnd.dev.sigstore.bundle.v0.3+json";

/// Extension kind tagging Sigstore verification material on a DSSE signature.
pub const SIGSTORE_EXTENSION_KIND: &str =
    "application/vnd.dev.sigstore.verificationmaterial;version=0.3";

/// A Sigstore bundle containing a signature and its verification material.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SigstoreBundle {
    media_type: String,
    verification_material: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_signature: Option<MessageSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dsse_envelope: Option<Value>,
}

/// Signature over a message, as carried by a Sigstore bundle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessageSignature {
    /// Digest of the signed message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_digest: Option<MessageDigest>,
    /// The base64-encoded signature bytes
    pub signature: String,
}

/// Hash of a signed message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageDigest {
    /// Hash algorithm name, e.g. `SHA2_256`
    pub algorithm: String,
    /// The base64-encoded digest
    pub digest: String,
}

impl SigstoreBundle {
    /// Creates a new Sigstore bundle with the given verification material and message signature.
    ///
    /// # Arguments
    ///
    /// * `verification_material` - JSON value containing certificate and transparency log information.
    /// * `message_signature` - The signature over the signed message.
    ///
    /// # Returns
    ///
    /// A new `SigstoreBundle` with the standard media type.
    pub fn new(verification_material: Value, message_signature: MessageSignature) -> SigstoreBundle {
        SigstoreBundle {
            media_type: SIGSTORE_BUNDLE_MEDIA_TYPE.to_owned(),
            verification_material,
            message_signature: Some(message_signature),
            dsse_envelope: None,
        }
    }

    /// Unpacks the bundle into a DSSE signature record.
    ///
    /// The bare signature goes into `sig`; the verification material is
    /// attached as a [`SIGSTORE_EXTENSION_KIND`] extension. `signed` is the
    /// message the bundle claims to sign and is checked against a SHA2-256
    /// message digest when one is present.
    pub fn into_signature(self, keyid: String, signed: &[u8]) -> Result<Signature> {
        let SigstoreBundle {
            verification_material,
            message_signature,
            ..
        } = self;

        let message_signature = message_signature
            .ok_or_else(|| bundle_error(anyhow!("bundle carries no message signature")))?;

        let sig = BASE64
            .decode(&message_signature.signature)
            .map_err(|source| DecodeError::Base64 {
                what: "bundle signature",
                source,
            })?;
        if sig.is_empty() {
            return Err(bundle_error(anyhow!("bundle signature is empty")));
        }

        if let Some(digest) = &message_signature.message_digest {
            check_digest(digest, signed)?;
        }

        if !verification_material.is_object() {
            return Err(bundle_error(anyhow!(
                "bundle verification material is not an object"
            )));
        }

        Ok(Signature {
            keyid,
            sig,
            extension: Some(Extension {
                kind: SIGSTORE_EXTENSION_KIND.to_owned(),
                ext: verification_material,
            }),
        })
    }
}

fn bundle_error(e: anyhow::Error) -> Error {
    Error::Signing(CapabilityError::Failed(e))
}

fn check_digest(digest: &MessageDigest, signed: &[u8]) -> Result<()> {
    if digest.algorithm != "SHA2_256" {
        log::warn!(
            "Not checking bundle message digest with unsupported algorithm {}",
            digest.algorithm
        );
        return Ok(());
    }

    let claimed = BASE64
        .decode(&digest.digest)
        .map_err(|source| DecodeError::Base64 {
            what: "bundle message digest",
            source,
        })?;
    let actual = Sha256::digest(signed);

    if claimed.as_slice() != &actual[..] {
        return Err(bundle_error(anyhow!(
            "bundle message digest {} does not match signed bytes {}",
            hex::encode(claimed),
            hex::encode(actual)
        )));
    }
    Ok(())
}

/// Extracts the DER leaf certificate from Sigstore verification material.
///
/// Accepts both the v0.3 `certificate` field and the older
/// `x509CertificateChain` form.
pub fn leaf_certificate(verification_material: &Value) -> anyhow::Result<Vec<u8>> {
    let raw = verification_material
        .pointer("/certificate/rawBytes")
        .or_else(|| verification_material.pointer("/x509CertificateChain/certificates/0/rawBytes"))
        .ok_or_else(|| anyhow!("verification material carries no certificate"))?
        .as_str()
        .ok_or_else(|| anyhow!("certificate rawBytes is not a string"))?;

    BASE64
        .decode(raw)
        .context("certificate rawBytes is not valid base64")
}
