use std::{fs, path::PathBuf, str::FromStr, sync::Arc};

use anyhow::{anyhow, bail, Context as _, Result};
use clap::Args;

use crate::{
    context::Context,
    threshold::ThresholdVerifier,
    verifier::{DidKeyVerifier, FulcioVerifier, Verifier},
};

#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Envelopes to verify
    #[arg(required = true)]
    pub envelopes: Vec<PathBuf>,

    /// Key to use for verifying signatures: a did:key, a file holding one,
    /// or fulcio:<identity>::<issuer>
    #[arg(short, long = "key", required = true)]
    pub keys: Vec<KeyReference>,

    /// Number of distinct keys that must have signed each envelope
    #[arg(long, default_value_t = 1)]
    pub threshold: usize,
}

/// A verification key as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyReference {
    /// A did:key identifier.
    DidKey(String),
    /// A file holding a did:key identifier or a signer key file.
    File(PathBuf),
    /// A certificate identity and its OIDC issuer.
    Fulcio { identity: String, issuer: String },
}

impl FromStr for KeyReference {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix("fulcio:") {
            let Some((identity, issuer)) = rest.split_once("::") else {
                bail!("invalid fulcio format: {rest}");
            };
            if identity.is_empty() || issuer.is_empty() || issuer.contains("::") {
                bail!("invalid fulcio format: {rest}");
            }
            return Ok(KeyReference::Fulcio {
                identity: identity.to_owned(),
                issuer: issuer.to_owned(),
            });
        }
        if s.starts_with("did:key:") {
            return Ok(KeyReference::DidKey(s.to_owned()));
        }
        Ok(KeyReference::File(PathBuf::from(s)))
    }
}

impl KeyReference {
    pub fn verifier(&self) -> Result<Arc<dyn Verifier>> {
        let verifier: Arc<dyn Verifier> = match self {
            KeyReference::DidKey(did) => Arc::new(DidKeyVerifier::new(did)?),
            KeyReference::File(path) => Arc::new(
                DidKeyVerifier::from_file(path)
                    .map_err(|e| anyhow!("unable to load '{}': {e}", path.display()))?,
            ),
            KeyReference::Fulcio { identity, issuer } => {
                Arc::new(FulcioVerifier::new(identity.clone(), issuer.clone()))
            }
        };
        Ok(verifier)
    }
}

pub async fn run(args: &VerifyArgs, ctx: &Context) -> Result<()> {
    let verifiers = args
        .keys
        .iter()
        .map(KeyReference::verifier)
        .collect::<Result<Vec<_>>>()?;
    let verifier = ThresholdVerifier::new(verifiers, args.threshold)?;

    for path in &args.envelopes {
        let bytes = fs::read(path).with_context(|| format!("unable to read {}", path.display()))?;
        let accepted = verifier
            .verify_json(ctx, &bytes)
            .await
            .with_context(|| format!("verification of {} failed", path.display()))?;

        log::info!(
            "{} verified by {}",
            path.display(),
            accepted.join(", ")
        );
    }

    Ok(())
}
