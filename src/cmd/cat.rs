use std::{fs, io::Write, path::PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::Args;

use crate::dsse::models::Envelope;

#[derive(Debug, Args)]
pub struct CatArgs {
    /// Envelopes to read
    #[arg(required = true)]
    pub envelopes: Vec<PathBuf>,

    /// Summary of envelope (default)
    #[arg(long, conflicts_with_all = ["payload", "payload_type"])]
    pub summary: bool,

    /// Envelope payload
    #[arg(short, long, conflicts_with = "payload_type")]
    pub payload: bool,

    /// Envelope's payload type
    #[arg(short = 't', long)]
    pub payload_type: bool,

    /// Base64 decode payload
    #[arg(short, long)]
    pub decode_base64: bool,
}

pub fn run(args: &CatArgs, out: &mut impl Write) -> Result<()> {
    if args.decode_base64 && !args.payload {
        bail!("--decode-base64 can only be used with --payload");
    }

    for path in &args.envelopes {
        let bytes = fs::read(path).with_context(|| format!("unable to read {}", path.display()))?;
        let envelope: Envelope = serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not a DSSE envelope", path.display()))?;

        if args.payload {
            if args.decode_base64 {
                let payload = envelope
                    .decode_payload()
                    .context("unable to decode base64 encoded payload")?;
                out.write_all(&payload)?;
                writeln!(out)?;
            } else {
                writeln!(out, "{}", envelope.payload)?;
            }
        } else if args.payload_type {
            writeln!(out, "{}", envelope.payload_type)?;
        } else {
            write_summary(out, &path.display().to_string(), &envelope)?;
        }
    }

    Ok(())
}

fn write_summary(out: &mut impl Write, name: &str, envelope: &Envelope) -> Result<()> {
    let (unidentified, identified): (Vec<_>, Vec<_>) = envelope
        .signatures
        .iter()
        .partition(|s| s.keyid.is_empty());

    writeln!(out, "Summary for {name}:")?;
    writeln!(out, "\tPayload Type: {}", envelope.payload_type)?;
    writeln!(out, "\tSignatures without key IDs: {}", unidentified.len())?;
    if !identified.is_empty() {
        writeln!(out, "\tSignatures from declared key IDs:")?;
        for signature in identified {
            writeln!(out, "\t\t{}", signature.keyid)?;
        }
    }
    Ok(())
}
