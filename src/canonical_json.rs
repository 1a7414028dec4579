use serde_json::Value;

use crate::error::{DecodeError, Error, Result};

/// Canonicalizes a JSON value to JCS (RFC 8785).
///
/// # Arguments
///
/// * `json` - The JSON value to canonicalize.
///
/// # Returns
///
/// The bytes of the JCS canonicalization.
pub fn canonicalize_value(json: &Value) -> Result<Vec<u8>> {
    let jcs_json = serde_jcs::to_vec(json).map_err(Error::Serialization)?;
    Ok(jcs_json)
}

/// Parses `bytes` as JSON and re-encodes them canonically.
///
/// # Arguments
///
/// * `bytes` - A JSON document.
///
/// # Returns
///
/// The canonical bytes, or a decode error if `bytes` is not JSON.
pub fn canonicalize_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let json: Value = serde_json::from_slice(bytes).map_err(|source| DecodeError::Json {
        what: "payload",
        source,
    })?;
    canonicalize_value(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_keys_and_strips_whitespace() {
        let input = br#"{ "b": [1, 2.0, "x"], "a": { "d": null, "c": true } }"#;
        let out = canonicalize_bytes(input).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"{"a":{"c":true,"d":null},"b":[1,2,"x"]}"#
        );
    }

    #[test]
    fn canonical_input_is_a_fixed_point() {
        let input = br#"{"a":{"c":true,"d":null},"b":[1,2,"x"]}"#;
        let once = canonicalize_bytes(input).unwrap();
        assert_eq!(once, input.to_vec());
        assert_eq!(canonicalize_bytes(&once).unwrap(), once);
    }

    #[test]
    fn rejects_non_json() {
        let err = canonicalize_bytes(b"not json").unwrap_err();
        assert!(matches!(err, Error::Decode(DecodeError::Json { .. })));
    }
}
