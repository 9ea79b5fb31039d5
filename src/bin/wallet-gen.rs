//! Wallet Generator CLI.
//!
//! Generates a deterministic keystore from a BIP-39 mnemonic, or a fresh mnemonic
//! when none is given.
//!
//! Usage:
//!   cargo run --bin wallet-gen -- --mnemonic "word1 word2 ..." --password "..." \
//!       --output "path/to/wallet.json"

use anyhow::{bail, Context};
use bip39::Mnemonic;
use clap::Parser;
use rand::RngCore;
use std::path::PathBuf;

use quorum_gov::wallet::{Keystore, DEFAULT_KDF_ROUNDS};

#[derive(Parser, Debug)]
#[command(name = "wallet-gen", version, about = "Create a password-protected committee keystore")]
struct Args {
    /// BIP-39 phrase; a new 24-word phrase is generated and printed when omitted
    #[arg(long)]
    mnemonic: Option<String>,

    #[arg(long)]
    password: String,

    #[arg(long, default_value = "wallet.json")]
    output: PathBuf,

    #[arg(long, default_value_t = DEFAULT_KDF_ROUNDS)]
    kdf_rounds: u32,

    /// Overwrite an existing file at --output
    #[arg(long)]
    force: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.password.is_empty() {
        bail!("--password must not be empty");
    }
    if args.output.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", args.output.display());
    }

    let phrase = match args.mnemonic {
        Some(phrase) => phrase,
        None => {
            let mut entropy = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut entropy);
            let mnemonic = Mnemonic::from_entropy(&entropy).context("failed to build mnemonic")?;
            println!("Generated mnemonic (store it offline):");
            println!("{}", mnemonic);
            mnemonic.to_string()
        }
    };

    println!("Keystore Path: {}", args.output.display());
    println!("Deriving and encrypting key...");
    let keystore = Keystore::from_mnemonic(&phrase, &args.password, args.kdf_rounds)?;
    keystore.save(&args.output)?;

    println!("Success! Keystore saved to {}", args.output.display());
    println!("Address: {}", keystore.address);
    println!("Public Key (hex): {}", keystore.public_key);
    Ok(())
}
