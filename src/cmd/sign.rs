use std::{fs, path::PathBuf, sync::Arc};

use anyhow::{Context as _, Result};
use clap::{ArgGroup, Args};

use crate::{
    context::Context,
    sign::{self, SignOptions},
    signer::{load_signer, EnvelopeSigner},
};

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("signer").required(true).args(["key", "sigstore"])))]
pub struct SignArgs {
    /// Payload to wrap, or existing envelope to add a signature to
    pub input: PathBuf,

    /// Path of signer key file to sign with
    #[arg(short, long)]
    pub key: Option<PathBuf>,

    /// Sign with Sigstore, using the signing service described in this file
    #[arg(long, value_name = "CONFIG")]
    pub sigstore: Option<PathBuf>,

    /// Payload type for a new DSSE envelope
    #[arg(short = 't', long)]
    pub payload_type: Option<String>,

    /// Output path to write a new envelope to
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Encode payload using canonical JSON (payload MUST be JSON)
    #[arg(long)]
    pub canonicalize_json: bool,
}

impl SignArgs {
    fn options(&self) -> SignOptions {
        SignOptions {
            payload_type: self.payload_type.clone(),
            output: self.output.clone(),
            canonicalize_json: self.canonicalize_json,
        }
    }

    fn signer(&self) -> Result<EnvelopeSigner> {
        #[cfg(feature = "signer-sigstore")]
        if let Some(config) = &self.sigstore {
            let signer = crate::signer::SigstoreSigner::load(config)?;
            return Ok(EnvelopeSigner::RemoteBundle(Arc::new(signer)));
        }

        #[cfg(not(feature = "signer-sigstore"))]
        if self.sigstore.is_some() {
            anyhow::bail!("this build does not include Sigstore signing");
        }

        let key = self
            .key
            .as_ref()
            .context("either --key or --sigstore is required")?;
        let signer = load_signer(key)?;
        Ok(EnvelopeSigner::LocalKey(Arc::new(signer)))
    }
}

pub async fn run(args: &SignArgs, ctx: &Context) -> Result<()> {
    let input = fs::read(&args.input)
        .with_context(|| format!("unable to read {}", args.input.display()))?;

    let options = args.options();
    // Reject incompatible options before loading any key material.
    sign::plan(&args.input, &input, &options)?;

    let signer = args.signer()?;
    let signed = sign::sign(ctx, &args.input, &input, &options, &signer).await?;

    fs::write(&signed.output_path, &signed.bytes)
        .with_context(|| format!("unable to write {}", signed.output_path.display()))?;

    log::info!("Wrote {}", signed.output_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dsse::Envelope,
        error::Error,
        signer::{save_signer, KeyType, SignerType},
    };

    fn args(input: PathBuf, key: PathBuf) -> SignArgs {
        SignArgs {
            input,
            key: Some(key),
            sigstore: None,
            payload_type: None,
            output: None,
            canonicalize_json: false,
        }
    }

    #[tokio::test]
    async fn signs_then_augments_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload.txt");
        fs::write(&payload, "hello").unwrap();

        let key = dir.path().join("key");
        save_signer(&SignerType::create(KeyType::ED25519).unwrap(), &key).unwrap();

        let create = SignArgs {
            payload_type: Some("text/plain".to_owned()),
            ..args(payload.clone(), key.clone())
        };
        run(&create, &Context::new()).await.unwrap();

        let envelope_path = dir.path().join("payload.txt.dsse");
        let envelope = Envelope::try_from_json_slice(&fs::read(&envelope_path).unwrap()).unwrap();
        assert_eq!(envelope.payload, b"hello".to_vec());
        assert_eq!(envelope.signatures.len(), 1);

        run(&args(envelope_path.clone(), key), &Context::new())
            .await
            .unwrap();
        let envelope = Envelope::try_from_json_slice(&fs::read(&envelope_path).unwrap()).unwrap();
        assert_eq!(envelope.signatures.len(), 2);
    }

    #[tokio::test]
    async fn rejected_augment_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload.txt");
        fs::write(&payload, "hello").unwrap();
        let key = dir.path().join("key");
        save_signer(&SignerType::create(KeyType::ED25519).unwrap(), &key).unwrap();

        let create = SignArgs {
            payload_type: Some("text/plain".to_owned()),
            ..args(payload, key.clone())
        };
        run(&create, &Context::new()).await.unwrap();

        let envelope_path = dir.path().join("payload.txt.dsse");
        let before = fs::read(&envelope_path).unwrap();

        let augment = SignArgs {
            payload_type: Some("text/plain".to_owned()),
            ..args(envelope_path.clone(), key)
        };
        let err = run(&augment, &Context::new()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
        assert_eq!(fs::read(&envelope_path).unwrap(), before);
    }

    #[tokio::test]
    async fn config_error_precedes_key_loading() {
        let dir = tempfile::tempdir().unwrap();
        let payload = dir.path().join("payload.txt");
        fs::write(&payload, "hello").unwrap();

        let err = run(&args(payload, dir.path().join("missing-key")), &Context::new())
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Config(_))));
        assert!(!dir.path().join("payload.txt.dsse").exists());
    }
}
