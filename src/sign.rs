use std::path::{Path, PathBuf};

use crate::{
    canonical_json,
    context::Context,
    dsse::{models, Envelope, PayloadType},
    error::{Error, Result},
    signer::EnvelopeSigner,
};

/// Suffix appended to the input path when a new envelope has no explicit output.
pub const ENVELOPE_SUFFIX: &str = ".dsse";

/// Per-invocation signing options.
#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Payload type for a new envelope. Rejected when augmenting.
    pub payload_type: Option<String>,
    /// Where to write the envelope. Rejected when augmenting.
    pub output: Option<PathBuf>,
    /// Re-encode a new JSON payload as canonical JSON before signing.
    pub canonicalize_json: bool,
}

/// Whether the input is a payload to wrap or an envelope to add a signature to.
#[derive(Debug, Clone, PartialEq)]
pub enum SigningMode {
    /// The input is a raw payload.
    NewEnvelope,
    /// The input is an existing envelope.
    Augment(Envelope),
}

impl SigningMode {
    /// Classifies `input`.
    ///
    /// Anything that does not parse as a persisted envelope is a raw payload.
    /// An input that does parse but carries malformed base64 is a decode
    /// error, not a payload.
    pub fn classify(input: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<models::Envelope>(input) {
            Ok(envelope) => Ok(SigningMode::Augment(Envelope::try_from(envelope)?)),
            Err(e) => {
                log::trace!("Input is not an envelope: {e}");
                Ok(SigningMode::NewEnvelope)
            }
        }
    }
}

/// An envelope ready to be signed, with its destination.
#[derive(Debug, Clone, PartialEq)]
pub struct SigningPlan {
    /// Envelope whose payload and payload type are final.
    pub envelope: Envelope,
    /// Where the signed envelope is to be written.
    pub output_path: PathBuf,
    /// True when adding a signature to an existing envelope.
    pub augment: bool,
}

/// A signed envelope and its serialized form.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub envelope: Envelope,
    pub output_path: PathBuf,
    pub bytes: Vec<u8>,
}

/// Resolves the signing mode and validates `options` against it.
///
/// No signer is involved; every configuration error surfaces here.
pub fn plan(input_path: &Path, input: &[u8], options: &SignOptions) -> Result<SigningPlan> {
    let payload_type = options
        .payload_type
        .as_deref()
        .filter(|t| !t.is_empty());

    match SigningMode::classify(input)? {
        SigningMode::Augment(envelope) => {
            log::debug!("Envelope exists, adding signature...");

            if options.canonicalize_json {
                return Err(Error::config(
                    "cannot canonicalize JSON when signing an existing envelope",
                ));
            }
            if options.output.is_some() {
                return Err(Error::config(
                    "cannot set an output path when signing an existing envelope",
                ));
            }
            if payload_type.is_some() {
                return Err(Error::config(
                    "cannot set a payload type when signing an existing envelope",
                ));
            }

            Ok(SigningPlan {
                envelope,
                output_path: input_path.to_path_buf(),
                augment: true,
            })
        }
        SigningMode::NewEnvelope => {
            log::debug!("Creating new envelope...");

            let payload_type = payload_type.ok_or_else(|| {
                Error::config("a payload type is required when creating a new envelope")
            })?;

            let payload = if options.canonicalize_json {
                canonical_json::canonicalize_bytes(input)?
            } else {
                input.to_vec()
            };

            let output_path = options
                .output
                .clone()
                .unwrap_or_else(|| default_output_path(input_path));

            Ok(SigningPlan {
                envelope: Envelope::new(PayloadType::from(payload_type), payload),
                output_path,
                augment: false,
            })
        }
    }
}

/// Signs `input` read from `input_path`, producing a new or augmented envelope.
///
/// Nothing is written; the caller persists `bytes` to `output_path` only
/// after this returns successfully.
pub async fn sign(
    ctx: &Context,
    input_path: &Path,
    input: &[u8],
    options: &SignOptions,
    signer: &EnvelopeSigner,
) -> Result<SignedEnvelope> {
    let SigningPlan {
        mut envelope,
        output_path,
        augment,
    } = plan(input_path, input, options)?;

    let pae = envelope.pae();
    let signature = signer.sign_pae(ctx, &pae).await?;
    envelope.push_signature(signature);

    let bytes = envelope.to_json_vec()?;

    log::info!(
        "{} envelope with {} signature(s) for {}",
        if augment { "Augmented" } else { "Created" },
        envelope.signatures.len(),
        output_path.display()
    );

    Ok(SignedEnvelope {
        envelope,
        output_path,
        bytes,
    })
}

fn default_output_path(input_path: &Path) -> PathBuf {
    let mut path = input_path.as_os_str().to_owned();
    path.push(ENVELOPE_SUFFIX);
    PathBuf::from(path)
}
