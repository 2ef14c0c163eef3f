//! # sessiongate-crypto
//!
//! secp256k1 session keys and signer recovery for the `SessionGate`
//! session-key policy engine.
//!
//! ## Internal Crate Warning
//!
//! **This crate is an internal implementation detail of `sessiongate`.** Its
//! API is unstable and may change between any versions.
//!
//! ## Modules
//!
//! - [`keys`] - Zeroizing secret key material and seed derivation
//! - [`keypair`] - Session key pairs that sign operations
//! - [`recovery`] - Signer recovery behind the engine's `SignerRecovery` seam
//!
//! ## Security
//!
//! - No unsafe code allowed
//! - Secret keys are zeroized on drop and compared in constant time
//! - Produced signatures are low-`s` normalized

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod keypair;
pub mod keys;
pub mod recovery;

pub use keypair::{Secp256k1KeyPair, Secp256k1PublicKey};
pub use keys::{SecretKey, SECRET_KEY_LEN};
pub use recovery::Secp256k1Recovery;
