//! secp256k1 signer recovery.
//!
//! [`Secp256k1Recovery`] implements the engine's
//! [`SignerRecovery`](sessiongate_core::signing::SignerRecovery) seam: given a
//! digest and a 65-byte `r || s || v` signature it returns the address of the
//! key that signed.
//!
//! Accepted `v` values are `0`, `1`, `27` and `28`. High-`s` signatures are
//! rejected during recovery.

use alloy_primitives::Address;
use k256::ecdsa::{RecoveryId, Signature as K256Signature, VerifyingKey};

use crate::keypair::Secp256k1PublicKey;
use sessiongate_core::error::SignError;
use sessiongate_core::signing::SignerRecovery;

/// Recovers signer addresses from secp256k1 signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Recovery;

impl Secp256k1Recovery {
    /// Normalizes a `v` byte to a recovery id.
    fn recovery_id(v: u8) -> Result<RecoveryId, SignError> {
        let id = match v {
            0 | 1 => v,
            27 | 28 => v - 27,
            other => {
                return Err(SignError::invalid_signature(format!(
                    "unsupported recovery byte {other}"
                )))
            }
        };
        RecoveryId::from_byte(id)
            .ok_or_else(|| SignError::invalid_signature(format!("invalid recovery id {id}")))
    }
}

impl SignerRecovery for Secp256k1Recovery {
    fn recover_signer(&self, digest: &[u8; 32], signature: &[u8]) -> Result<Address, SignError> {
        if signature.len() != 65 {
            return Err(SignError::invalid_signature(format!(
                "expected 65 bytes, got {}",
                signature.len()
            )));
        }
        let (v, rs) = signature
            .split_last()
            .ok_or_else(|| SignError::invalid_signature("empty signature"))?;

        let recovery_id = Self::recovery_id(*v)?;
        let signature = K256Signature::from_slice(rs)
            .map_err(|_| SignError::invalid_signature("r or s out of range"))?;

        let verifying_key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|_| SignError::RecoveryFailed)?;

        Ok(Secp256k1PublicKey::from_verifying_key(&verifying_key).address())
    }
}
