//! Secret key material for session keys.
//!
//! [`SecretKey`] holds 32 bytes of secp256k1 scalar material. It is zeroized
//! on drop, redacted in debug output, compared in constant time, and never
//! cloned.
//!
//! Session keys are either generated from the OS RNG or derived from a seed
//! string with [`SecretKey::from_seed`].

use rand::RngCore;
use sha3::{Digest, Keccak256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The length of a secret key in bytes.
pub const SECRET_KEY_LEN: usize = 32;

/// A 32-byte secret key with automatic zeroization.
///
/// # Example
///
/// ```
/// use sessiongate_crypto::keys::SecretKey;
///
/// let a = SecretKey::from_seed("session for alice");
/// let b = SecretKey::from_seed("session for alice");
/// assert_eq!(a, b);
///
/// assert_eq!(format!("{a:?}"), "SecretKey([REDACTED])");
/// ```
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretKey {
    bytes: [u8; SECRET_KEY_LEN],
}

impl SecretKey {
    /// Wraps raw key bytes.
    ///
    /// The caller should zeroize its own copy of `bytes` afterwards.
    #[must_use]
    pub const fn new(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generates a random key from `OsRng`.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Derives a key deterministically as `keccak256(utf8(seed))`.
    ///
    /// Anyone who knows the seed can reproduce the key, so the seed must be
    /// treated with the same care as the key itself.
    #[must_use]
    pub fn from_seed(seed: &str) -> Self {
        let digest = Keccak256::digest(seed.as_bytes());
        let mut bytes = [0u8; SECRET_KEY_LEN];
        bytes.copy_from_slice(&digest);
        Self { bytes }
    }

    /// Exposes the raw bytes for a cryptographic operation.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.bytes
    }

    /// Returns the key as lowercase hex with a `0x` prefix.
    ///
    /// Only for explicit export requests; the result must not be logged.
    #[must_use]
    pub fn reveal_hex(&self) -> String {
        format!("0x{}", hex::encode(self.bytes))
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for SecretKey {}

impl From<[u8; SECRET_KEY_LEN]> for SecretKey {
    fn from(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self::new(bytes)
    }
}
