//! # Derive-Key Command
//!
//! Implementation of the `sessiongate derive-key` command. A session key is
//! derived deterministically from a seed string, so a test harness and a
//! client can agree on a signer address without exchanging key material.
//!
//! The private key is redacted unless `--reveal` is passed.

use sessiongate_crypto::Secp256k1KeyPair;

use crate::logging::{log_security_event, redact_sensitive};

/// A derived session key, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    /// Checksummed signer address.
    pub address: String,
    /// Uncompressed public key, hex with `0x04` prefix.
    pub public_key: String,
    /// Private key hex, redacted unless revealed.
    pub secret: String,
}

/// The `sessiongate derive-key` command handler.
#[derive(Debug, Clone)]
pub struct DeriveKeyCommand {
    seed: String,
    reveal: bool,
}

impl DeriveKeyCommand {
    /// Create a new `DeriveKeyCommand`.
    #[must_use]
    pub fn new(seed: impl Into<String>, reveal: bool) -> Self {
        Self {
            seed: seed.into(),
            reveal,
        }
    }

    /// Derive the key.
    #[must_use]
    pub fn execute(&self) -> DerivedKey {
        let pair = Secp256k1KeyPair::from_seed_phrase(&self.seed);
        let secret_hex = pair.secret_key().reveal_hex();

        let secret = if self.reveal {
            log_security_event("secret_key_revealed", &pair.address().to_string());
            secret_hex
        } else {
            redact_sensitive(&secret_hex)
        };

        DerivedKey {
            address: pair.address().to_checksum(None),
            public_key: format!("0x{}", hex::encode(pair.public_key().uncompressed())),
            secret,
        }
    }

    /// Derive the key and print it.
    pub fn run(&self) {
        let key = self.execute();
        println!("Address:     {}", key.address);
        println!("Public key:  {}", key.public_key);
        println!("Private key: {}", key.secret);
    }
}
