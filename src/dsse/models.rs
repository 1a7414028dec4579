use base64::engine::{general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DecodeError, Result};

/// Persisted DSSE envelope.
///
/// All three fields are required, so arbitrary JSON documents do not parse
/// as envelopes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// The type/format of the payload
    pub payload_type: String,
    /// The base64-encoded payload data
    pub payload: String,
    /// Signatures over the payload, in insertion order
    pub signatures: Vec<Signature>,
}

impl Envelope {
    /// Decodes the payload without touching the signatures.
    pub fn decode_payload(&self) -> Result<Vec<u8>> {
        let payload = BASE64
            .decode(&self.payload)
            .map_err(|source| DecodeError::Base64 {
                what: "envelope payload",
                source,
            })?;
        Ok(payload)
    }
}

/// Persisted signature within a DSSE envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signature {
    /// Key identifier, empty when the signature is unidentified
    #[serde(default)]
    pub keyid: String,
    /// The base64-encoded signature bytes
    pub sig: String,
    /// Auxiliary verification material attached by bundle-producing signers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<Extension>,
}

/// Typed attachment carrying verification material for a signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Extension {
    /// Type tag of the attached material
    pub kind: String,
    /// The material itself
    pub ext: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_payload_is_strict() {
        let envelope = Envelope {
            payload_type: "t".to_owned(),
            payload: "aGk=".to_owned(),
            signatures: vec![],
        };
        assert_eq!(envelope.decode_payload().unwrap(), b"hi".to_vec());

        let unpadded = Envelope {
            payload: "aGk".to_owned(),
            ..envelope
        };
        assert!(unpadded.decode_payload().is_err());
    }

    #[test]
    fn missing_keyid_defaults_to_empty() {
        let signature: Signature = serde_json::from_str(r#"{"sig": "AA=="}"#).unwrap();
        assert!(signature.keyid.is_empty());
        assert!(signature.extension.is_none());
    }
}
