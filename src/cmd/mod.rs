/// Print parts of envelopes
pub mod cat;
/// Create signer key files
pub mod keygen;
/// Create or add to signed envelopes
pub mod sign;
/// Verify envelopes against trusted keys
pub mod verify;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::context::Context;

/// A tool to sign, verify, and inspect DSSE envelopes.
#[derive(Debug, Parser)]
#[command(name = "essd", version, about)]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Abort signing or verification after this many seconds
    #[arg(long, global = true, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Concatenate specified parts of DSSE envelopes
    Cat(cat::CatArgs),
    /// Create a signing key file
    Keygen(keygen::KeygenArgs),
    /// Create signed DSSE envelope for an arbitrary payload, or add a signature to one
    Sign(sign::SignArgs),
    /// Verify signatures in DSSE envelopes using specified keys
    Verify(verify::VerifyArgs),
}

pub async fn run(cli: Cli, ctx: &Context) -> Result<()> {
    match cli.command {
        Command::Cat(args) => cat::run(&args, &mut std::io::stdout().lock()),
        Command::Keygen(args) => keygen::run(&args, &mut std::io::stdout().lock()),
        Command::Sign(args) => sign::run(&args, ctx).await,
        Command::Verify(args) => verify::run(&args, ctx).await,
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_verify_keys() {
        let cli = Cli::try_parse_from([
            "essd",
            "verify",
            "env.dsse",
            "-k",
            "did:key:z6MkhaXgBZDvotDkL5257faiztiGiC2QtKLGpbnnEGta2doK",
            "-k",
            "fulcio:alice@example.com::https://issuer.example.com",
            "--threshold",
            "2",
        ])
        .unwrap();

        match cli.command {
            Command::Verify(args) => {
                assert_eq!(args.keys.len(), 2);
                assert_eq!(args.threshold, 2);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn sign_requires_exactly_one_signer() {
        assert!(Cli::try_parse_from(["essd", "sign", "payload", "-t", "text/plain"]).is_err());
        assert!(Cli::try_parse_from([
            "essd", "sign", "payload", "-k", "key", "--sigstore", "cfg.json"
        ])
        .is_err());
    }
}
