//! Plain-function ECDSA (secp256k1) sign/recover over the crate's
//! [`Hash`]/[`PublicKey`]/[`Signature`] newtypes.
//!
//! Not a capability trait: unlike the key-value store or the Merkle
//! backend, there is exactly one correct implementation here and no
//! realistic swap target, so a `Signer`/`Crypto` trait would be an
//! abstraction with nothing to abstract over.

use secp256k1::{
    Message, PublicKey as Secp256k1PublicKey, Secp256k1, SecretKey,
    ecdsa::{RecoverableSignature, RecoveryId},
};
use std::fmt;

use crate::types::{Hash, PublicKey, Signature};

#[derive(Debug)]
pub enum CryptoError {
    InvalidSecretKey,
    InvalidSignature,
    RecoveryFailed,
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::InvalidSecretKey => write!(f, "invalid secp256k1 secret key"),
            CryptoError::InvalidSignature => write!(f, "malformed compact signature"),
            CryptoError::RecoveryFailed => write!(f, "public key recovery from signature failed"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// Signs `digest` with `secret_key_bytes` (32 raw bytes), returning a
/// compact 65-byte signature (64-byte r||s plus recovery id).
pub fn sign_compact(secret_key_bytes: &[u8; 32], digest: &Hash) -> Result<Signature, CryptoError> {
    let secp = Secp256k1::signing_only();
    let secret_key =
        SecretKey::from_slice(secret_key_bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
    let message = Message::from_digest(*digest.as_bytes());
    let recoverable = secp.sign_ecdsa_recoverable(&message, &secret_key);
    let (recovery_id, compact) = recoverable.serialize_compact();

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&compact);
    out[64] = recovery_id.to_i32() as u8;
    Ok(Signature(out))
}

/// Recovers the signer's compressed public key from a compact signature
/// over `digest`.
pub fn recover_public_key(sig: &Signature, digest: &Hash) -> Result<PublicKey, CryptoError> {
    let recovery_id =
        RecoveryId::from_i32(sig.0[64] as i32).map_err(|_| CryptoError::InvalidSignature)?;
    let recoverable = RecoverableSignature::from_compact(&sig.0[..64], recovery_id)
        .map_err(|_| CryptoError::InvalidSignature)?;
    let message = Message::from_digest(*digest.as_bytes());
    let secp = Secp256k1::verification_only();
    let pubkey: Secp256k1PublicKey = secp
        .recover_ecdsa(&message, &recoverable)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(PublicKey(pubkey.serialize()))
}

/// Derives the compressed public key for a raw secret key, for callers
/// constructing a chain for the first time.
pub fn public_key_from_secret(secret_key_bytes: &[u8; 32]) -> Result<PublicKey, CryptoError> {
    let secret_key =
        SecretKey::from_slice(secret_key_bytes).map_err(|_| CryptoError::InvalidSecretKey)?;
    let secp = Secp256k1::signing_only();
    let pubkey = Secp256k1PublicKey::from_secret_key(&secp, &secret_key);
    Ok(PublicKey(pubkey.serialize()))
}
