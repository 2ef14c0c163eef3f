//! secp256k1 session key pairs.
//!
//! A session key is an ordinary secp256k1 key whose address the account
//! owner registers in a session policy. [`Secp256k1KeyPair`] signs
//! operations in the format the engine's recovery primitive expects.
//!
//! # Example
//!
//! ```rust
//! use sessiongate_crypto::keypair::Secp256k1KeyPair;
//! use sessiongate_crypto::recovery::Secp256k1Recovery;
//! use sessiongate_core::signing::{Operation, SignerRecovery};
//! use sessiongate_core::types::Asset;
//! use alloy_primitives::{Address, U256};
//!
//! let session = Secp256k1KeyPair::from_seed_phrase("my session key");
//! let op = Operation {
//!     account: Address::repeat_byte(0x01),
//!     asset: Asset::Native,
//!     recipient: Address::repeat_byte(0x02),
//!     amount: U256::from(10u64),
//!     nonce: 0,
//! };
//!
//! let signed = session.sign_operation(&op).expect("signing");
//! let recovered = signed.recover_signer(&Secp256k1Recovery).expect("recovery");
//! assert_eq!(recovered, session.address());
//! ```

use alloy_primitives::Address;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};

use crate::keys::SecretKey;
use sessiongate_core::error::SignError;
use sessiongate_core::signing::{
    personal_message_digest, Operation, SignatureBytes, SignedOperation,
};

/// Offset added to the recovery id in the `v` byte of produced signatures.
const V_OFFSET: u8 = 27;

// ============================================================================
// Public key
// ============================================================================

/// An uncompressed secp256k1 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct Secp256k1PublicKey {
    /// `0x04 || X || Y`
    uncompressed: [u8; 65],
}

impl Secp256k1PublicKey {
    /// Creates a public key from a k256 `VerifyingKey`.
    #[must_use]
    pub fn from_verifying_key(verifying: &VerifyingKey) -> Self {
        let point = verifying.to_encoded_point(false);
        let mut uncompressed = [0u8; 65];
        uncompressed.copy_from_slice(point.as_bytes());
        Self { uncompressed }
    }

    /// Returns the uncompressed encoding (65 bytes).
    #[must_use]
    pub const fn uncompressed(&self) -> &[u8; 65] {
        &self.uncompressed
    }

    /// Returns the account address of this key.
    ///
    /// The address is the last 20 bytes of the Keccak-256 hash of the
    /// uncompressed key without its `0x04` prefix.
    #[must_use]
    pub fn address(&self) -> Address {
        let hash = Keccak256::digest(self.uncompressed.get(1..).unwrap_or_default());

        let mut address = [0u8; 20];
        if let Some(tail) = hash.get(12..32) {
            address.copy_from_slice(tail);
        }
        Address::from(address)
    }
}

impl std::fmt::Debug for Secp256k1PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1PublicKey")
            .field("address", &self.address())
            .finish()
    }
}

// ============================================================================
// Key pair
// ============================================================================

/// A secp256k1 session key pair.
///
/// The private key never appears in debug output.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
    public_key: Secp256k1PublicKey,
}

impl Secp256k1KeyPair {
    /// Generates a random key pair.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidKey`] in the negligible case that the RNG
    /// produced an invalid scalar.
    pub fn generate() -> Result<Self, SignError> {
        Self::from_secret_key(&SecretKey::generate())
    }

    /// Creates a key pair from raw private key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidKey`] if the bytes are zero or not below
    /// the curve order.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SignError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| SignError::InvalidKey)?;
        let public_key = Secp256k1PublicKey::from_verifying_key(signing_key.verifying_key());

        Ok(Self {
            signing_key,
            public_key,
        })
    }

    /// Creates a key pair from a [`SecretKey`].
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidKey`] if the key is not a valid scalar.
    pub fn from_secret_key(secret: &SecretKey) -> Result<Self, SignError> {
        Self::from_bytes(*secret.as_bytes())
    }

    /// Derives a key pair from a seed string.
    ///
    /// The private key is `keccak256(utf8(seed))`. A Keccak output is
    /// outside the scalar range with negligible probability; in that case the
    /// digest is hashed again until it is valid.
    #[must_use]
    pub fn from_seed_phrase(seed: &str) -> Self {
        let mut secret = SecretKey::from_seed(seed);
        loop {
            if let Ok(pair) = Self::from_secret_key(&secret) {
                return pair;
            }
            let mut rehashed = [0u8; 32];
            rehashed.copy_from_slice(&Keccak256::digest(secret.as_bytes()));
            secret = SecretKey::new(rehashed);
        }
    }

    /// Exports the private key.
    ///
    /// Only for explicit export requests such as `derive-key --reveal`.
    #[must_use]
    pub fn secret_key(&self) -> SecretKey {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.signing_key.to_bytes());
        SecretKey::new(bytes)
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> &Secp256k1PublicKey {
        &self.public_key
    }

    /// Returns the address registered as `signer` in session policies.
    #[must_use]
    pub fn address(&self) -> Address {
        self.public_key.address()
    }

    /// Signs a 32-byte digest, returning `r || s || v` with `v` in `{27, 28}`.
    ///
    /// The `s` value is normalized to the lower half of the curve order.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::SignatureFailed`] if the signing operation fails.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<SignatureBytes, SignError> {
        let (signature, recovery_id): (K256Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|_| SignError::signature_failed("secp256k1 signing failed"))?;

        // Flipping s to the low half flips the parity of R.
        let (signature, recovery_id) = match signature.normalize_s() {
            Some(normalized) => (normalized, recovery_id.to_byte() ^ 1),
            None => (signature, recovery_id.to_byte()),
        };

        let mut bytes = [0u8; 65];
        let (rs, v) = bytes.split_at_mut(64);
        rs.copy_from_slice(&signature.to_bytes());
        if let Some(v) = v.first_mut() {
            *v = recovery_id + V_OFFSET;
        }
        Ok(bytes)
    }

    /// Signs `message_hash` as an EIP-191 personal message.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::SignatureFailed`] if the signing operation fails.
    pub fn sign_message(&self, message_hash: &[u8; 32]) -> Result<SignatureBytes, SignError> {
        self.sign_digest(&personal_message_digest(message_hash))
    }

    /// Signs an operation for submission to the engine.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::SignatureFailed`] if the signing operation fails.
    pub fn sign_operation(&self, operation: &Operation) -> Result<SignedOperation, SignError> {
        let signature = self.sign_message(&operation.hash().0)?;
        Ok(SignedOperation::new(operation.clone(), signature))
    }

    /// Verifies a 65-byte signature over `digest` against this key.
    #[must_use]
    pub fn verify(&self, digest: &[u8; 32], signature: &SignatureBytes) -> bool {
        use k256::ecdsa::signature::hazmat::PrehashVerifier;

        let Some(rs) = signature.get(..64) else {
            return false;
        };
        let Ok(sig) = K256Signature::from_slice(rs) else {
            return false;
        };
        self.signing_key
            .verifying_key()
            .verify_prehash(digest, &sig)
            .is_ok()
    }
}

impl std::fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}
