//! Library for signing, verifying, and inspecting DSSE envelopes.
//!
//! Payloads are wrapped in a Dead Simple Signing Envelope whose signatures
//! cover the pre-authentication encoding of the payload and its type.
//! Envelopes can carry signatures from several identities and are verified
//! against a threshold of trusted verifiers.

/// Canonical JSON encoding of payloads
pub mod canonical_json;

/// Thin command-line layer over the signing and verification core
pub mod cmd;

/// Cancellation and deadline scope for signer and verifier calls
pub mod context;

/// Dead Simple Signing Envelope (DSSE) implementation
pub mod dsse;

/// Error taxonomy of the envelope core
pub mod error;

/// Signing workflow: new envelopes and added signatures
pub mod sign;

/// Signer capabilities (ed25519, p256, remote Sigstore signing)
pub mod signer;

/// Sigstore bundle format support
pub mod sigstore_bundle;

/// Multi-verifier threshold verification
pub mod threshold;

/// Verifier capabilities (did:key, Fulcio identity)
pub mod verifier;

pub use context::Context;
pub use dsse::{pae, Envelope, PayloadType, Signature};
pub use error::{Error, Result};
pub use sign::{sign, SignOptions};
pub use signer::EnvelopeSigner;
pub use threshold::ThresholdVerifier;
