//! Signed operations and the seams to external collaborators.
//!
//! A session key authorizes a transfer by signing an [`Operation`]. The engine
//! recovers the signer address from that signature through a
//! [`SignerRecovery`] implementation, validates the transfer, and on admit
//! hands an [`Authorization`] to the host's [`TransferExecutor`].
//!
//! # Operation Hash
//!
//! ```text
//! operation_hash = keccak256(account ‖ asset ‖ recipient ‖ amount_be32 ‖ nonce_be8)
//! digest         = keccak256("\x19Ethereum Signed Message:\n32" ‖ operation_hash)
//! ```
//!
//! Native currency is encoded with the zero address. The signature is 65
//! bytes, `r ‖ s ‖ v`, with `v` in `{0, 1, 27, 28}`.
//!
//! # Example
//!
//! ```
//! use sessiongate_core::signing::Operation;
//! use sessiongate_core::types::Asset;
//! use alloy_primitives::{Address, U256};
//!
//! let op = Operation {
//!     account: Address::repeat_byte(0x01),
//!     asset: Asset::Native,
//!     recipient: Address::repeat_byte(0x03),
//!     amount: U256::from(100u64),
//!     nonce: 7,
//! };
//!
//! // The digest commits to every field, including the nonce.
//! let mut bumped = op.clone();
//! bumped.nonce = 8;
//! assert_ne!(op.signing_digest(), bumped.signing_digest());
//! ```

use crate::error::SignError;
use crate::types::{Asset, Authorization, TransferRequest};
use alloy_primitives::{eip191_hash_message, keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Length of an encoded operation: three addresses, a 32-byte amount and an 8-byte nonce.
const OPERATION_ENCODED_LEN: usize = 20 * 3 + 32 + 8;

/// Recoverable ECDSA signature as 65 bytes (`r ‖ s ‖ v`).
pub type SignatureBytes = [u8; 65];

// ============================================================================
// Traits
// ============================================================================

/// Recovers the address that produced a signature over a digest.
///
/// The recovery primitive is external to the policy core; the
/// `sessiongate-crypto` crate provides a secp256k1 implementation.
pub trait SignerRecovery: Send + Sync {
    /// Recovers the signer address.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] if the signature is malformed or recovery fails.
    fn recover_signer(&self, digest: &[u8; 32], signature: &[u8]) -> Result<Address, SignError>;
}

/// Performs the actual asset movement after an authorization.
///
/// Hosts must only call this with an [`Authorization`] returned by the
/// engine, never with an unvalidated request.
pub trait TransferExecutor: Send + Sync {
    /// The error produced by the underlying transfer mechanism.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes the authorized transfer.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if the transfer could not be performed.
    fn execute(&self, authorization: &Authorization) -> Result<(), Self::Error>;
}

// ============================================================================
// Operation
// ============================================================================

/// A transfer operation as signed by a session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// The account the funds leave from.
    pub account: Address,
    /// The asset to move.
    pub asset: Asset,
    /// The destination of the transfer.
    pub recipient: Address,
    /// Amount in the asset's smallest unit.
    pub amount: U256,
    /// Host-managed replay nonce.
    pub nonce: u64,
}

impl Operation {
    /// Returns the packed encoding the operation hash is taken over.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(OPERATION_ENCODED_LEN);
        buf.extend_from_slice(self.account.as_slice());
        buf.extend_from_slice(self.asset.sentinel_address().as_slice());
        buf.extend_from_slice(self.recipient.as_slice());
        buf.extend_from_slice(&self.amount.to_be_bytes::<32>());
        buf.extend_from_slice(&self.nonce.to_be_bytes());
        buf
    }

    /// Returns the Keccak-256 hash of the packed encoding.
    #[must_use]
    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }

    /// Returns the EIP-191 personal-message digest of [`Self::hash`].
    ///
    /// This is the digest a session key signs.
    #[must_use]
    pub fn signing_digest(&self) -> [u8; 32] {
        personal_message_digest(&self.hash().0)
    }

    /// Builds the transfer request this operation asks for, given the
    /// recovered signer.
    #[must_use]
    pub const fn to_request(&self, signer: Address) -> TransferRequest {
        TransferRequest {
            account: self.account,
            signer,
            asset: self.asset,
            recipient: self.recipient,
            amount: self.amount,
        }
    }
}

/// Computes the EIP-191 digest of a 32-byte message hash.
#[must_use]
pub fn personal_message_digest(message_hash: &[u8; 32]) -> [u8; 32] {
    eip191_hash_message(message_hash).0
}

// ============================================================================
// SignedOperation
// ============================================================================

/// An [`Operation`] together with the session key's signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOperation {
    /// The signed operation.
    pub operation: Operation,
    /// The 65-byte recoverable signature.
    pub signature: SignatureBytes,
}

impl SignedOperation {
    /// Creates a signed operation from a fixed-size signature.
    #[must_use]
    pub const fn new(operation: Operation, signature: SignatureBytes) -> Self {
        Self {
            operation,
            signature,
        }
    }

    /// Creates a signed operation from a signature slice.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidSignature`] if the slice is not 65 bytes.
    pub fn from_slice(operation: Operation, signature: &[u8]) -> Result<Self, SignError> {
        let signature: SignatureBytes = signature.try_into().map_err(|_| {
            SignError::invalid_signature(format!(
                "expected 65 bytes, got {}",
                signature.len()
            ))
        })?;
        Ok(Self::new(operation, signature))
    }

    /// Recovers the signer of this operation.
    ///
    /// # Errors
    ///
    /// Returns [`SignError`] if the recovery primitive rejects the signature.
    pub fn recover_signer(&self, recovery: &dyn SignerRecovery) -> Result<Address, SignError> {
        recovery.recover_signer(&self.operation.signing_digest(), &self.signature)
    }
}
