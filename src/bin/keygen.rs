//! Payer keypair generator for mcpay.
//!
//! Generates a fresh secp256k1 key, prints the settlement address, and saves
//! the private key to a file.
//!
//! Usage:
//!   cargo run --bin mcpay-keygen [output-dir]

use alloy_signer_local::PrivateKeySigner;
use std::env;
use std::fs;
use std::path::Path;

fn main() {
    println!("Payer keypair generator for mcpay\n");

    // Get output directory from args or use current directory
    let args: Vec<String> = env::args().collect();
    let output_dir = if args.len() > 1 {
        Path::new(&args[1]).to_path_buf()
    } else {
        env::current_dir().expect("Failed to get current directory")
    };

    // Create output directory if it doesn't exist
    fs::create_dir_all(&output_dir).expect("Failed to create output directory");

    println!("Generating secp256k1 keypair...");

    let signer = PrivateKeySigner::random();
    let address = signer.address();
    let sk_bytes = signer.to_bytes();

    println!("  Address: {address}");

    // Save secret key to file (KEEP THIS SECURE!)
    let sk_path = output_dir.join("payer-key.secret");
    fs::write(&sk_path, hex::encode(sk_bytes)).expect("Failed to write secret key");
    println!("\nSecret key saved to: {}", sk_path.display());
    println!("  WARNING: Keep this file secure! It controls the payer's collateral.");

    let addr_path = output_dir.join("payer-key.address");
    fs::write(&addr_path, address.to_string()).expect("Failed to write address");
    println!("Address saved to: {}", addr_path.display());

    println!("\nDone! Deposit collateral to this address's escrow account to start paying.");
}
