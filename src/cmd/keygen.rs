use std::{io::Write, path::PathBuf};

use anyhow::{bail, Result};
use clap::Args;

use crate::signer::{save_signer, KeyType, SignerType};

#[derive(Debug, Args)]
pub struct KeygenArgs {
    /// Key type to generate
    #[arg(short = 't', long, default_value_t = KeyType::ED25519)]
    pub key_type: KeyType,

    /// Path to write the signer key file to
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Writes a new signer key file and prints its did:key, which is the
/// reference to pass to `verify --key`.
pub fn run(args: &KeygenArgs, out: &mut impl Write) -> Result<()> {
    if args.output.exists() {
        bail!("{} already exists", args.output.display());
    }

    let signer = SignerType::create(args.key_type)?;
    save_signer(&signer, &args.output)?;
    log::info!("Wrote {} key to {}", args.key_type, args.output.display());

    writeln!(out, "{}", signer.did())?;
    Ok(())
}
