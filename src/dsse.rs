/// Serializable DSSE wire models
pub mod models;

use std::{convert::TryFrom, fmt, str::FromStr};

use base64::engine::{general_purpose::STANDARD as BASE64, Engine};

pub use models::Extension;

use crate::error::{DecodeError, Error, Result};

/// Dead Simple Signing Envelope (DSSE) for secure payload signatures.
///
/// The payload and payload type are fixed once the envelope exists; signing
/// only ever appends to `signatures`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// The type/format of the payload being signed
    pub payload_type: PayloadType,
    /// The raw payload data in bytes
    pub payload: Vec<u8>,
    /// Signatures over the payload, in insertion order
    pub signatures: Vec<Signature>,
}

impl Envelope {
    /// Creates an unsigned envelope around `payload`.
    pub fn new(payload_type: PayloadType, payload: Vec<u8>) -> Self {
        Self {
            payload_type,
            payload,
            signatures: Vec::new(),
        }
    }

    /// Pre-authentication encoding of this envelope's payload, the bytes signatures cover.
    pub fn pae(&self) -> Vec<u8> {
        pae(&self.payload_type.to_string(), &self.payload)
    }

    /// Appends a signature. The signed bytes are left untouched.
    pub fn push_signature(&mut self, signature: Signature) {
        self.signatures.push(signature);
    }

    /// Converts the envelope into its persisted JSON form.
    pub fn to_json_vec(&self) -> Result<Vec<u8>> {
        let envelope = models::Envelope::from(self.clone());
        serde_json::to_vec(&envelope).map_err(Error::Serialization)
    }

    /// Converts the envelope into a JSON string representation.
    pub fn into_json_string(self) -> Result<String> {
        let envelope = models::Envelope::from(self);
        serde_json::to_string(&envelope).map_err(Error::Serialization)
    }

    /// Parses an envelope from its persisted JSON form.
    pub fn try_from_json_slice(bytes: &[u8]) -> Result<Self> {
        let envelope: models::Envelope =
            serde_json::from_slice(bytes).map_err(|source| DecodeError::Json {
                what: "envelope",
                source,
            })?;
        Self::try_from(envelope)
    }

    /// Creates an envelope from a JSON string representation.
    pub fn try_from_json_string(s: &str) -> Result<Self> {
        Self::try_from_json_slice(s.as_bytes())
    }
}

/// Computes the DSSE v1 pre-authentication encoding of `(payload_type, payload)`.
///
/// `"DSSEv1" SP len(type) SP type SP len(payload) SP payload`, lengths in
/// base-10 ASCII. The length prefixes make the encoding injective.
pub fn pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let type_len = payload_type.len().to_string();
    let payload_len = payload.len().to_string();

    let mut out = Vec::with_capacity(
        b"DSSEv1".len() + 4 + type_len.len() + payload_type.len() + payload_len.len() + payload.len(),
    );
    out.extend_from_slice(b"DSSEv1 ");
    out.extend_from_slice(type_len.as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload_type.as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload_len.as_bytes());
    out.push(b' ');
    out.extend_from_slice(payload);
    out
}

/// Payload types for DSSE envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadType {
    /// in-toto attestation in JSON format
    InTotoJson,
    /// Any other payload type, kept verbatim
    Other(String),
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadType::InTotoJson => write!(f, "application/vnd.in-toto+json"),
            PayloadType::Other(s) => write!(f, "{}", s),
        }
    }
}

impl FromStr for PayloadType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application/vnd.in-toto+json" => Ok(PayloadType::InTotoJson),
            _ => Ok(PayloadType::Other(s.to_owned())),
        }
    }
}

impl From<&str> for PayloadType {
    fn from(s: &str) -> Self {
        match PayloadType::from_str(s) {
            Ok(t) => t,
            Err(never) => match never {},
        }
    }
}

/// Digital signature within a DSSE envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Key identifier used to create the signature, empty if unidentified
    pub keyid: String,
    /// The actual signature bytes
    pub sig: Vec<u8>,
    /// Verification material attached by bundle-producing signers
    pub extension: Option<Extension>,
}

impl Signature {
    /// A plain key-pair signature without attached material.
    pub fn new(keyid: String, sig: Vec<u8>) -> Self {
        Self {
            keyid,
            sig,
            extension: None,
        }
    }

    /// Whether the signature declares a key ID.
    pub fn is_identified(&self) -> bool {
        !self.keyid.is_empty()
    }
}

impl TryFrom<models::Envelope> for Envelope {
    type Error = Error;

    fn try_from(envelope: models::Envelope) -> Result<Self> {
        let payload = envelope.decode_payload()?;

        let models::Envelope {
            payload_type,
            signatures,
            ..
        } = envelope;

        let payload_type = PayloadType::from(payload_type.as_str());

        let signatures = signatures
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            payload_type,
            payload,
            signatures,
        })
    }
}

impl From<Envelope> for models::Envelope {
    fn from(envelope: Envelope) -> Self {
        let Envelope {
            payload_type,
            payload,
            signatures,
        } = envelope;

        let payload_type = payload_type.to_string();
        let payload = BASE64.encode(payload);
        let signatures = signatures.into_iter().map(Into::into).collect();

        Self {
            payload_type,
            payload,
            signatures,
        }
    }
}

impl TryFrom<models::Signature> for Signature {
    type Error = Error;

    fn try_from(signature: models::Signature) -> Result<Self> {
        let models::Signature {
            keyid,
            sig,
            extension,
        } = signature;

        let sig = BASE64.decode(sig).map_err(|source| DecodeError::Base64 {
            what: "signature",
            source,
        })?;

        Ok(Self {
            keyid,
            sig,
            extension,
        })
    }
}

impl From<Signature> for models::Signature {
    fn from(signature: Signature) -> Self {
        let Signature {
            keyid,
            sig,
            extension,
        } = signature;

        let sig = BASE64.encode(sig);

        Self {
            keyid,
            sig,
            extension,
        }
    }
}
